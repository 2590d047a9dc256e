//! Record trait and tag projection
//!
//! A record is any persisted entity with an id and a flat tag projection.
//! Tags are the only indexed facts about a record; queries match on tag
//! equality, never on record fields.

use std::collections::BTreeMap;

use serde::de::DeserializeOwned;
use serde::Serialize;

/// Flat key/value facts about a record, used for indexed lookup
pub type RecordTags = BTreeMap<String, String>;

/// Build a tag map from `(key, value)` pairs, skipping `None` values
pub fn tags<K, V, I>(pairs: I) -> RecordTags
where
    K: Into<String>,
    V: Into<String>,
    I: IntoIterator<Item = (K, Option<V>)>,
{
    pairs
        .into_iter()
        .filter_map(|(key, value)| value.map(|value| (key.into(), value.into())))
        .collect()
}

/// A persisted entity with identity and a tag projection
pub trait Record: Clone + Serialize + DeserializeOwned + Send + Sync + 'static {
    /// Storage type discriminator for this record kind
    const RECORD_TYPE: &'static str;

    /// The record's unique id
    fn id(&self) -> &str;

    /// The record's current tag projection
    fn tags(&self) -> RecordTags;
}

/// Whether a record's tags satisfy a query: every queried key must be
/// present with the queried value
pub fn tags_match(record_tags: &RecordTags, query: &RecordTags) -> bool {
    query
        .iter()
        .all(|(key, value)| record_tags.get(key) == Some(value))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tags_builder_skips_absent_values() {
        let built = tags([
            ("connection_id", Some("conn-1")),
            ("thread_id", None),
        ]);
        assert_eq!(built.get("connection_id").map(String::as_str), Some("conn-1"));
        assert!(!built.contains_key("thread_id"));
    }

    #[test]
    fn tags_match_requires_all_pairs() {
        let record_tags = tags([
            ("connection_id", Some("conn-1")),
            ("thread_id", Some("thread-1")),
        ]);

        assert!(tags_match(&record_tags, &tags([("connection_id", Some("conn-1"))])));
        assert!(tags_match(&record_tags, &RecordTags::new()));
        assert!(!tags_match(
            &record_tags,
            &tags([("connection_id", Some("conn-1")), ("thread_id", Some("other"))])
        ));
        assert!(!tags_match(&record_tags, &tags([("missing", Some("x"))])));
    }
}

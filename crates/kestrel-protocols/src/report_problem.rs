//! Report-problem 1.0
//!
//! A problem report describes a fault to the other party. When a report
//! is triggered by a specific message, its thread id is the `@id` of
//! the triggering message and its parent thread id is the triggering
//! message's own thread id, so the reader can locate both the message
//! and the exchange it belonged to.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use kestrel_core::{MessageMeta, ThreadDecorator, TypedMessage, WireMessage};

/// Message type for problem reports
pub const PROBLEM_REPORT_TYPE: &str = "https://didcomm.org/report-problem/1.0/problem-report";

/// Machine-readable code plus an English rendering of the problem
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProblemDescription {
    /// Machine-readable problem code
    pub code: String,
    /// English description of the problem
    #[serde(skip_serializing_if = "Option::is_none")]
    pub en: Option<String>,
}

/// Who the reporter believes should retry to resolve the problem
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WhoRetries {
    /// The recipient of the report should retry
    You,
    /// The reporter will retry
    Me,
    /// Both parties should retry
    Both,
    /// The problem is permanent, retrying will not help
    None,
}

/// Breadth of impact of the problem
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProblemImpact {
    /// A single message only, the rest of the interaction may be fine
    Message,
    /// Invalidates the entire thread
    Thread,
    /// Invalidates the entire connection
    Connection,
}

/// Localized suggestion about how to fix this instance of the problem
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FixHint {
    /// English fix suggestion
    #[serde(skip_serializing_if = "Option::is_none")]
    pub en: Option<String>,
}

/// Reporter → counterparty: something went wrong
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProblemReportMessage {
    /// Wire headers
    #[serde(flatten)]
    pub meta: MessageMeta,
    /// What went wrong
    pub description: ProblemDescription,
    /// Key/value parameters about the problem
    #[serde(rename = "problem_items", skip_serializing_if = "Option::is_none")]
    pub problem_items: Option<Vec<BTreeMap<String, String>>>,
    /// Who should retry, when the reporter has an opinion
    #[serde(rename = "who_retries", skip_serializing_if = "Option::is_none")]
    pub who_retries: Option<WhoRetries>,
    /// How to fix this instance of the problem
    #[serde(rename = "fix-hint", skip_serializing_if = "Option::is_none")]
    pub fix_hint: Option<FixHint>,
    /// Breadth of impact
    #[serde(skip_serializing_if = "Option::is_none")]
    pub impact: Option<ProblemImpact>,
    /// Where the error happened from the reporter's perspective,
    /// a "you"/"me"/"other" prefix followed by a location suffix
    #[serde(rename = "where", skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    /// When the problem was detected
    #[serde(
        rename = "noticed_time",
        with = "time::serde::rfc3339::option",
        skip_serializing_if = "Option::is_none",
        default
    )]
    pub noticed_time: Option<OffsetDateTime>,
    /// URI for tracking the status of the problem
    #[serde(rename = "tracking_uri", skip_serializing_if = "Option::is_none")]
    pub tracking_uri: Option<String>,
    /// URI where additional help can be requested
    #[serde(rename = "escalation_uri", skip_serializing_if = "Option::is_none")]
    pub escalation_uri: Option<String>,
}

impl ProblemReportMessage {
    /// A minimal report carrying only a problem code
    pub fn new(code: impl Into<String>) -> Self {
        Self {
            meta: MessageMeta::new(PROBLEM_REPORT_TYPE),
            description: ProblemDescription {
                code: code.into(),
                en: None,
            },
            problem_items: None,
            who_retries: None,
            fix_hint: None,
            impact: None,
            location: None,
            noticed_time: None,
            tracking_uri: None,
            escalation_uri: None,
        }
    }

    /// English description of the problem
    pub fn with_description(mut self, en: impl Into<String>) -> Self {
        self.description.en = Some(en.into());
        self
    }

    /// Thread the report to the message that triggered it
    pub fn in_response_to(mut self, trigger: &WireMessage) -> Self {
        let mut thread = ThreadDecorator::new(trigger.id());
        if trigger.thread_id() != trigger.id() {
            thread = thread.with_parent(trigger.thread_id());
        }
        self.meta = self.meta.with_thread(thread);
        self
    }

    pub fn with_impact(mut self, impact: ProblemImpact) -> Self {
        self.impact = Some(impact);
        self
    }

    pub fn with_who_retries(mut self, who_retries: WhoRetries) -> Self {
        self.who_retries = Some(who_retries);
        self
    }
}

impl TypedMessage for ProblemReportMessage {
    const TYPE: &'static str = PROBLEM_REPORT_TYPE;

    fn meta(&self) -> &MessageMeta {
        &self.meta
    }
}

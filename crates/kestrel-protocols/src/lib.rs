//! Protocol state machines for the Kestrel messaging agent
//!
//! Each protocol follows the same shape: typed messages over the wire
//! model, a record type persisted through a tagged repository, a service
//! that drives the state machine, handlers that plug the service into
//! the dispatcher, and a module facade that wires it all up against an
//! agent context.

pub mod mediation;
pub mod proofs;
pub mod report_problem;

pub use mediation::{MediationModule, MediationService};
pub use proofs::{ProofService, ProofsModule};
pub use report_problem::{ProblemImpact, ProblemReportMessage, WhoRetries};

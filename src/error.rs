//! Closed error taxonomy for the property model, DAG builder, and reshaper.
//!
//! `spec.md` §7 requires the pass to surface a small, closed set of error
//! kinds rather than an open-ended bag of strings, so that a caller embedding
//! the pass in a larger compiler pipeline can match on the failure and decide
//! whether it is recoverable. `anyhow::Error` (what the teacher crate uses at
//! its own public boundary, e.g. `planner::build_plan`) intentionally erases
//! that structure; here we need the opposite, so `ReshapeError` is a
//! `thiserror`-derived enum in the style of the Nexus SDK's `NexusError`
//! (`examples/Talus-Network-nexus-sdk/sdk/src/nexus/error.rs`), the one
//! example repo in the retrieval pack that models this shape of error type.

use crate::property::PropertyKind;
use thiserror::Error;

/// All failure modes the property model, DAG builder, and sampling reshaper
/// can produce. See `spec.md` §7 for the authoritative description of each
/// kind.
#[derive(Debug, Error)]
pub enum ReshapeError {
    /// A property the pass must read is absent from the element's bag.
    #[error("{element} is missing required property {kind}")]
    MissingRequiredProperty {
        /// Human-readable id of the offending vertex or edge.
        element: String,
        /// The property kind that was required but absent.
        kind: PropertyKind,
    },

    /// An edge carries a communication pattern the pass does not recognise.
    #[error("edge {edge} carries unsupported communication pattern {pattern}")]
    UnsupportedCommunicationPattern {
        /// Id of the offending edge.
        edge: String,
        /// The pattern name as read from the edge.
        pattern: String,
    },

    /// A permanent property was set again with a conflicting value.
    #[error("{element} already has a permanent value set for {kind}; cannot override with a different value")]
    PermanentConflict {
        /// Human-readable id of the offending vertex or edge.
        element: String,
        /// The property kind in conflict.
        kind: PropertyKind,
    },

    /// An edge references an endpoint that was never added to the builder.
    #[error("edge {edge} references unknown endpoint {endpoint}")]
    UnknownEndpoint {
        /// Id of the offending edge.
        edge: String,
        /// Id of the missing vertex endpoint.
        endpoint: String,
    },

    /// The accumulated graph contains a cycle.
    #[error("graph contains a cycle")]
    CycleDetected,

    /// A property value fell outside its kind's closed domain.
    #[error("invalid value for property {kind}: {reason}")]
    InvalidPropertyValue {
        /// The property kind whose domain was violated.
        kind: PropertyKind,
        /// Human-readable explanation of the violation.
        reason: String,
    },
}

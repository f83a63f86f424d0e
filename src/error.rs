//! Structured error types for Tribune.
//!
//! Fallible public APIs return `Result<T, TribuneError>`. Nothing inside a
//! tick is fallible: invalid references and stale messages degrade to
//! logged no-ops, so these errors only surface from setup APIs and from
//! commands issued by the outer layer.

use crate::node::NodeId;
use crate::time::Tick;

/// The top-level error type for the simulator.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum TribuneError {
    // ── Registry errors ───────────────────────────────────

    /// A node ID was referenced but is not registered.
    #[error("node {0} not found")]
    NodeNotFound(NodeId),

    /// Attempted to register a node with an ID that is already in use.
    #[error("node {0} is already registered")]
    NodeAlreadyRegistered(NodeId),

    // ── History errors ────────────────────────────────────

    /// No snapshot has been recorded for the requested tick.
    #[error("no snapshot recorded at {0}")]
    SnapshotMissing(Tick),

    // ── Command errors ────────────────────────────────────

    /// A speed that is not a finite positive number.
    #[error("speed {0} must be a finite positive number")]
    InvalidSpeed(f64),

    /// The requested operation is a reserved hook with no implementation.
    #[error("{0} is not implemented")]
    Unimplemented(&'static str),

    // ── Setup errors ──────────────────────────────────────

    /// A cluster description could not be turned into a simulation.
    #[error("invalid scenario: {0}")]
    InvalidScenario(String),

    /// A configuration value is out of range.
    #[error("invalid config: {0}")]
    InvalidConfig(String),

    /// A serialization error at the JSON boundary.
    #[error("serialization error: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for TribuneError {
    fn from(err: serde_json::Error) -> Self {
        TribuneError::Serialization(err.to_string())
    }
}

/// Convenience alias for `Result<T, TribuneError>`.
pub type TribuneResult<T> = Result<T, TribuneError>;

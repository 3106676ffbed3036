//! Error types for Strata.
//!
//! This module provides strongly-typed errors with actionable context.
//! Errors carry the relevant identifiers (unit ID, port, session) so that
//! a failed run can be traced back to the unit that caused it.

use crate::types::{InputRef, LinkId, OutputRef, SessionId, UnitId};
use thiserror::Error;

/// Boxed error returned by unit implementations.
///
/// Units may fail with any error type; the engine keeps the original
/// cause as the `source` of [`StrataError::UnitExecution`].
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// The main error type for Strata operations.
#[derive(Error, Debug)]
pub enum StrataError {
    // =========================================================================
    // Unit Execution Errors (E300-E399)
    // =========================================================================
    /// A unit's `execute` returned an error.
    #[error("E301: Unit {unit_id} ('{unit_name}') execution failed: {cause}")]
    UnitExecution {
        /// The unit that failed.
        unit_id: UnitId,
        /// The unit's display name.
        unit_name: String,
        /// The original failure.
        #[source]
        cause: BoxError,
    },

    /// A unit did not complete within the configured unit timeout.
    #[error("E302: Unit {unit_id} timed out after {timeout_ms}ms")]
    UnitTimeout {
        /// The unit that timed out.
        unit_id: UnitId,
        /// Timeout duration in milliseconds.
        timeout_ms: u64,
    },

    /// A unit panicked while executing.
    #[error("E303: Unit {unit_id} panicked: {message}")]
    UnitPanic {
        /// The unit that panicked.
        unit_id: UnitId,
        /// The panic message, when it could be recovered.
        message: String,
    },

    /// A unit referenced by ID is not part of the graph.
    #[error("E305: Unit {unit_id} not found in graph")]
    UnitNotFound {
        /// The missing unit.
        unit_id: UnitId,
    },

    // =========================================================================
    // Interruption / Shutdown Errors (E310-E319)
    // =========================================================================
    /// The driving or waiting task was interrupted.
    #[error("E310: Execution interrupted: {cause}")]
    Interrupted {
        /// What interrupted the execution.
        cause: String,
    },

    /// The worker pool did not drain within the shutdown budget.
    #[error("E311: Worker pool did not terminate within {waited_ms}ms ({pending} tasks pending)")]
    ShutdownTimeout {
        /// Total time waited across the graceful and forced phases.
        waited_ms: u64,
        /// Number of tasks still tracked by the pool.
        pending: usize,
    },

    // =========================================================================
    // Graph/Topology Errors (E400-E499)
    // =========================================================================
    /// The dependency relation contains a cycle within the considered units.
    #[error("E403: Dependency cycle detected involving units: {units:?}")]
    DependencyCycle {
        /// Units that could never be scheduled.
        units: Vec<UnitId>,
    },

    /// A port index is out of range for its unit.
    #[error("E404: Invalid {direction} port {index} on unit {unit_id} ({available} available)")]
    InvalidPort {
        /// The unit the port was looked up on.
        unit_id: UnitId,
        /// "input" or "output".
        direction: &'static str,
        /// The requested index.
        index: usize,
        /// Number of ports the unit declares in that direction.
        available: usize,
    },

    /// A link referenced by ID is not part of the graph.
    #[error("E406: Link {link_id} not found in graph")]
    InvalidLink {
        /// The missing link.
        link_id: LinkId,
    },

    /// The target input port already has an incoming link.
    #[error("E407: Input {input} already connected by {existing}")]
    InputAlreadyConnected {
        /// The input port.
        input: InputRef,
        /// The link already feeding it.
        existing: LinkId,
    },

    /// The type context rejected a link.
    #[error("E408: Incompatible link from {from} to {to}: expected {expected}, got {actual}")]
    IncompatibleLink {
        /// The source output port.
        from: OutputRef,
        /// The target input port.
        to: InputRef,
        /// Resolved type expected by the input.
        expected: String,
        /// Resolved type produced by the output.
        actual: String,
    },

    // =========================================================================
    // Executor Errors (E500-E599)
    // =========================================================================
    /// An execution is already running on this executor.
    #[error("E501: Execution already in progress (session {session_id})")]
    ExecutionInProgress {
        /// The active session.
        session_id: SessionId,
    },

    /// The worker pool no longer accepts tasks.
    #[error("E502: Worker pool is shut down")]
    PoolShutdown,

    // =========================================================================
    // Configuration Errors (E800-E899)
    // =========================================================================
    /// Invalid configuration value.
    #[error("E802: Invalid configuration '{field}': {cause}")]
    ConfigValue {
        /// The configuration field with invalid value.
        field: String,
        /// Description of why the value is invalid.
        cause: String,
    },
}

impl StrataError {
    /// Create an interruption error.
    pub fn interrupted(cause: impl Into<String>) -> Self {
        Self::Interrupted {
            cause: cause.into(),
        }
    }

    /// Get the error code (e.g., "E301").
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::UnitExecution { .. } => "E301",
            Self::UnitTimeout { .. } => "E302",
            Self::UnitPanic { .. } => "E303",
            Self::UnitNotFound { .. } => "E305",
            Self::Interrupted { .. } => "E310",
            Self::ShutdownTimeout { .. } => "E311",
            Self::DependencyCycle { .. } => "E403",
            Self::InvalidPort { .. } => "E404",
            Self::InvalidLink { .. } => "E406",
            Self::InputAlreadyConnected { .. } => "E407",
            Self::IncompatibleLink { .. } => "E408",
            Self::ExecutionInProgress { .. } => "E501",
            Self::PoolShutdown => "E502",
            Self::ConfigValue { .. } => "E802",
        }
    }

    /// The unit this error originated from, if any.
    #[must_use]
    pub fn unit_id(&self) -> Option<UnitId> {
        match self {
            Self::UnitExecution { unit_id, .. }
            | Self::UnitTimeout { unit_id, .. }
            | Self::UnitPanic { unit_id, .. }
            | Self::UnitNotFound { unit_id }
            | Self::InvalidPort { unit_id, .. } => Some(*unit_id),
            _ => None,
        }
    }

    /// Check if this error was raised by a unit while executing.
    #[must_use]
    pub fn is_unit_fault(&self) -> bool {
        matches!(
            self,
            Self::UnitExecution { .. } | Self::UnitTimeout { .. } | Self::UnitPanic { .. }
        )
    }

    /// Check if this error reports an interruption or a refused submission.
    #[must_use]
    pub fn is_cancellation(&self) -> bool {
        matches!(self, Self::Interrupted { .. } | Self::PoolShutdown)
    }

    /// Check if this error is a graph construction/validation error.
    #[must_use]
    pub fn is_graph_error(&self) -> bool {
        matches!(
            self,
            Self::UnitNotFound { .. }
                | Self::DependencyCycle { .. }
                | Self::InvalidPort { .. }
                | Self::InvalidLink { .. }
                | Self::InputAlreadyConnected { .. }
                | Self::IncompatibleLink { .. }
        )
    }
}

/// Result type alias using `StrataError`.
pub type Result<T> = std::result::Result<T, StrataError>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn error_codes_are_correct() {
        let err = StrataError::UnitTimeout {
            unit_id: UnitId::new(1),
            timeout_ms: 10,
        };
        assert_eq!(err.code(), "E302");

        let err = StrataError::DependencyCycle {
            units: vec![UnitId::new(1), UnitId::new(2)],
        };
        assert_eq!(err.code(), "E403");
        assert_eq!(StrataError::PoolShutdown.code(), "E502");
    }

    #[test]
    fn unit_execution_keeps_cause() {
        let err = StrataError::UnitExecution {
            unit_id: UnitId::new(4),
            unit_name: "loader".to_string(),
            cause: "file missing".into(),
        };
        let msg = err.to_string();
        assert!(msg.contains("E301"));
        assert!(msg.contains("unit_4"));
        assert!(msg.contains("file missing"));
        assert_eq!(
            err.source().map(|s| s.to_string()),
            Some("file missing".to_string())
        );
        assert_eq!(err.unit_id(), Some(UnitId::new(4)));
        assert!(err.is_unit_fault());
    }

    #[test]
    fn classification() {
        assert!(StrataError::interrupted("host").is_cancellation());
        assert!(!StrataError::interrupted("host").is_unit_fault());
        assert!(
            StrataError::InvalidLink {
                link_id: LinkId::new(3)
            }
            .is_graph_error()
        );
        assert!(
            !StrataError::ShutdownTimeout {
                waited_ms: 20,
                pending: 1
            }
            .is_graph_error()
        );
    }
}

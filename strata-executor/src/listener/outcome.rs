//! Run scopes and outcomes.

use std::time::Duration;
use strata_core::error::StrataError;
use strata_core::types::{SessionId, UnitId};

/// Which units a run covered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunScope {
    /// Every unit of the graph.
    Full,
    /// A unit whose configuration changed, plus everything downstream of it.
    Triggered {
        /// The unit whose configuration changed.
        origin: UnitId,
        /// The re-executed closure, in ascending ID order (includes `origin`).
        units: Vec<UnitId>,
    },
}

impl RunScope {
    /// Whether the run was started by a configuration change.
    pub fn is_triggered(&self) -> bool {
        matches!(self, Self::Triggered { .. })
    }

    /// The unit that triggered the run, if any.
    pub fn origin(&self) -> Option<UnitId> {
        match self {
            Self::Full => None,
            Self::Triggered { origin, .. } => Some(*origin),
        }
    }
}

/// The result of one run.
///
/// `errors` is empty on success and holds the first fault otherwise; later
/// sibling faults are discarded. `cancelled` is set when termination was
/// requested during the run and may coincide with an error.
#[derive(Debug)]
pub struct ExecutionOutcome {
    /// Session the run belonged to.
    pub session_id: SessionId,
    /// Units the run covered.
    pub scope: RunScope,
    /// Whether termination was requested during the run.
    pub cancelled: bool,
    /// The first fault, if any.
    pub errors: Vec<StrataError>,
    /// Units that completed without fault.
    pub units_completed: usize,
    /// Wall-clock duration of the run.
    pub elapsed: Duration,
}

impl ExecutionOutcome {
    /// Whether the run completed without fault or cancellation.
    pub fn is_success(&self) -> bool {
        self.errors.is_empty() && !self.cancelled
    }

    /// Whether the run ended with a fault.
    pub fn is_failure(&self) -> bool {
        !self.errors.is_empty()
    }

    /// The first fault, if any.
    pub fn first_error(&self) -> Option<&StrataError> {
        self.errors.first()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn outcome(cancelled: bool, errors: Vec<StrataError>) -> ExecutionOutcome {
        ExecutionOutcome {
            session_id: SessionId::new(),
            scope: RunScope::Full,
            cancelled,
            errors,
            units_completed: 0,
            elapsed: Duration::ZERO,
        }
    }

    #[test]
    fn success_requires_no_error_and_no_cancellation() {
        assert!(outcome(false, Vec::new()).is_success());
        assert!(!outcome(true, Vec::new()).is_success());

        let failed = outcome(true, vec![StrataError::interrupted("aborted")]);
        assert!(failed.is_failure());
        assert_eq!(failed.first_error().map(StrataError::code), Some("E310"));
    }

    #[test]
    fn triggered_scope() {
        let scope = RunScope::Triggered {
            origin: UnitId::new(1),
            units: vec![UnitId::new(1), UnitId::new(2)],
        };
        assert!(scope.is_triggered());
        assert_eq!(scope.origin(), Some(UnitId::new(1)));
        assert_eq!(RunScope::Full.origin(), None);
    }
}

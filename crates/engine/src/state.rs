//! Lifecycle of a rule record as the service drives it.

use std::fmt;

use rollout_core::RuleRecord;

use crate::error::ServiceError;

/// Stage a record has reached inside one service call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecordState {
    /// Received from the caller, nothing checked.
    Draft,
    /// Passed tree, distribution and uniqueness checks.
    Validated,
    /// Written together with its reorganized siblings.
    Persisted,
    /// Rewritten after being persisted.
    Updated,
    /// Removed; siblings compacted.
    Deleted,
}

impl RecordState {
    /// Lowercase name.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Validated => "validated",
            Self::Persisted => "persisted",
            Self::Updated => "updated",
            Self::Deleted => "deleted",
        }
    }

    /// State of the record currently stored under an id: `Draft` when
    /// nothing is stored, `Persisted` otherwise.
    #[must_use]
    pub fn of_stored(stored: Option<&RuleRecord>) -> Self {
        match stored {
            Some(_) => Self::Persisted,
            None => Self::Draft,
        }
    }

    /// Returns `true` for states with no outgoing transitions.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Deleted)
    }
}

impl fmt::Display for RecordState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returns `true` if the record transition from `from` to `to` is valid.
#[must_use]
pub fn can_transition(from: RecordState, to: RecordState) -> bool {
    matches!(
        (from, to),
        (RecordState::Draft, RecordState::Validated)
            | (RecordState::Validated, RecordState::Persisted)
            | (RecordState::Persisted, RecordState::Updated)
            | (RecordState::Updated, RecordState::Updated)
            | (RecordState::Persisted, RecordState::Deleted)
            | (RecordState::Updated, RecordState::Deleted)
    )
}

/// Validate a record transition, returning an error if invalid.
pub fn validate_transition(from: RecordState, to: RecordState) -> Result<(), ServiceError> {
    if can_transition(from, to) {
        Ok(())
    } else {
        Err(ServiceError::InvalidTransition { from, to })
    }
}

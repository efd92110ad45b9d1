//! Errors returned by [`RuleRecordService`](crate::RuleRecordService).

use http::StatusCode;
use rollout_core::RuleId;
use rollout_storage::StoreError;
use rollout_validator::ValidationError;

use crate::config::ConfigError;
use crate::state::RecordState;

/// Error type for service operations.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ServiceError {
    /// The record failed tree, distribution or field validation.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// Another record in the partition already uses this name.
    #[error("a rule named {name:?} already exists")]
    NameConflict {
        /// The conflicting name.
        name: String,
    },

    /// Another record in the partition has an equivalent condition tree.
    #[error("rule duplicates the condition tree of {existing}")]
    DuplicateRule {
        /// Id of the record with the same tree.
        existing: RuleId,
    },

    /// The partition changed between reading siblings and writing them.
    #[error("stale priority state in {partition}: read version {expected}, store at {actual}")]
    StalePriorityState {
        /// Partition being reorganized.
        partition: String,
        /// Version the reorganization was computed from.
        expected: u64,
        /// Version found at commit time.
        actual: u64,
    },

    /// No record with this id.
    #[error("rule not found: {id}")]
    NotFound {
        /// Id that was looked up.
        id: RuleId,
    },

    /// An update tried to move a record to another partition.
    #[error("rule {id} cannot change application type or class")]
    PartitionMismatch {
        /// The record being updated.
        id: RuleId,
    },

    /// The stored state of the record does not allow the requested step.
    #[error("invalid record transition: {from} -> {to}")]
    InvalidTransition {
        /// Current state.
        from: RecordState,
        /// Requested state.
        to: RecordState,
    },

    /// Engine configuration is unusable.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The store failed.
    #[error(transparent)]
    Store(StoreError),
}

impl From<StoreError> for ServiceError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Conflict {
                partition,
                expected,
                actual,
            } => Self::StalePriorityState {
                partition,
                expected,
                actual,
            },
            other => Self::Store(other),
        }
    }
}

impl ServiceError {
    /// Convenience constructor for [`ServiceError::NotFound`].
    pub fn not_found(id: impl Into<RuleId>) -> Self {
        Self::NotFound { id: id.into() }
    }

    /// Stable identifier for programmatic handling.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::Validation(err) => err.code(),
            Self::NameConflict { .. } => "NAME_CONFLICT",
            Self::DuplicateRule { .. } => "DUPLICATE_RULE",
            Self::StalePriorityState { .. } => "STALE_PRIORITY_STATE",
            Self::NotFound { .. } => "RULE_NOT_FOUND",
            Self::PartitionMismatch { .. } => "PARTITION_MISMATCH",
            Self::InvalidTransition { .. } => "INVALID_TRANSITION",
            Self::Config(_) => "CONFIG_ERROR",
            Self::Store(err) => err.code(),
        }
    }

    /// HTTP-style status for the client response.
    #[must_use]
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Validation(err) => err.status(),
            Self::PartitionMismatch { .. } => StatusCode::BAD_REQUEST,
            Self::NameConflict { .. }
            | Self::DuplicateRule { .. }
            | Self::StalePriorityState { .. }
            | Self::InvalidTransition { .. } => StatusCode::CONFLICT,
            Self::NotFound { .. } => StatusCode::NOT_FOUND,
            Self::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Store(err) => err.status(),
        }
    }

    /// Returns `true` when repeating the call may succeed.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::StalePriorityState { .. } => true,
            Self::Store(err) => err.is_retryable(),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::time::Duration;

    #[test]
    fn store_conflict_becomes_stale_priority_state() {
        let err: ServiceError = StoreError::conflict("stb/firmware_rule", 3, 4).into();
        assert_eq!(
            err,
            ServiceError::StalePriorityState {
                partition: "stb/firmware_rule".into(),
                expected: 3,
                actual: 4,
            }
        );
        assert_eq!(err.status(), StatusCode::CONFLICT);
        assert_eq!(err.code(), "STALE_PRIORITY_STATE");
        assert!(err.is_retryable());
    }

    #[test]
    fn validation_keeps_its_code() {
        let err = ServiceError::from(ValidationError::EmptyRule);
        assert_eq!(err.code(), "EMPTY_RULE");
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        assert_eq!(err.to_string(), ValidationError::EmptyRule.to_string());
    }

    #[test]
    fn statuses() {
        assert_eq!(
            ServiceError::NameConflict { name: "a".into() }.status(),
            StatusCode::CONFLICT
        );
        assert_eq!(ServiceError::not_found("x").status(), StatusCode::NOT_FOUND);
        assert_eq!(
            ServiceError::from(StoreError::timeout("get_all", Duration::from_secs(1))).status(),
            StatusCode::SERVICE_UNAVAILABLE
        );
    }

    #[test]
    fn transient_store_errors_are_retryable() {
        assert!(ServiceError::from(StoreError::Connection("reset".into())).is_retryable());
        assert!(!ServiceError::from(StoreError::not_found("record", "x")).is_retryable());
        assert!(!ServiceError::DuplicateRule { existing: "x".into() }.is_retryable());
    }
}

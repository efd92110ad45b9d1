//! Error type for store operations.
//!
//! Backends map their internal errors into these variants so the service
//! can tell stale writes and transient failures apart without inspecting
//! messages.

use std::time::Duration;

use http::StatusCode;

/// Error type for all [`RecordStore`](crate::RecordStore) operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    /// Entity not found.
    #[error("{entity} not found: {id}")]
    NotFound {
        /// Kind of entity (e.g. "record", "partition").
        entity: String,
        /// Identifier that was looked up.
        id: String,
    },

    /// The partition changed since the caller's snapshot.
    #[error("partition {partition}: expected version {expected}, got {actual}")]
    Conflict {
        /// Partition written to.
        partition: String,
        /// Version the caller read.
        expected: u64,
        /// Version currently stored.
        actual: u64,
    },

    /// A batch write carried records that do not belong together.
    #[error("invalid batch: {0}")]
    InvalidBatch(String),

    /// Backend connection failure.
    #[error("connection error: {0}")]
    Connection(String),

    /// Operation exceeded its timeout.
    #[error("timeout: {operation} after {duration:?}")]
    Timeout {
        /// Name of the operation that timed out.
        operation: String,
        /// How long was waited before giving up.
        duration: Duration,
    },

    /// Serialization or deserialization failure.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Catch-all internal error.
    #[error("internal error: {0}")]
    Internal(String),
}

impl StoreError {
    /// Convenience constructor for [`StoreError::NotFound`].
    pub fn not_found(entity: impl Into<String>, id: impl Into<String>) -> Self {
        Self::NotFound {
            entity: entity.into(),
            id: id.into(),
        }
    }

    /// Convenience constructor for [`StoreError::Conflict`].
    pub fn conflict(partition: impl Into<String>, expected: u64, actual: u64) -> Self {
        Self::Conflict {
            partition: partition.into(),
            expected,
            actual,
        }
    }

    /// Convenience constructor for [`StoreError::Timeout`].
    pub fn timeout(operation: impl Into<String>, duration: Duration) -> Self {
        Self::Timeout {
            operation: operation.into(),
            duration,
        }
    }

    /// Returns `true` for transient errors a caller may retry.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Connection(_) | Self::Timeout { .. })
    }

    /// Stable identifier for programmatic handling.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::NotFound { .. } => "STORE_NOT_FOUND",
            Self::Conflict { .. } => "STORE_CONFLICT",
            Self::InvalidBatch(_) => "STORE_INVALID_BATCH",
            Self::Connection(_) => "STORE_CONNECTION",
            Self::Timeout { .. } => "STORE_TIMEOUT",
            Self::Serialization(_) => "STORE_SERIALIZATION",
            Self::Internal(_) => "STORE_INTERNAL",
        }
    }

    /// HTTP-style status.
    #[must_use]
    pub fn status(&self) -> StatusCode {
        match self {
            Self::NotFound { .. } => StatusCode::NOT_FOUND,
            Self::Conflict { .. } => StatusCode::CONFLICT,
            Self::Connection(_) | Self::Timeout { .. } => StatusCode::SERVICE_UNAVAILABLE,
            Self::InvalidBatch(_) | Self::Serialization(_) | Self::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

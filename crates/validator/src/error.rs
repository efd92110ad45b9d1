//! Validation failures.
//!
//! Every variant is a client error: the payload is rejected, nothing is
//! written, and callers answer with [`ValidationError::status`] (always
//! `400 Bad Request`) plus the message.

use http::StatusCode;
use rollout_core::CoreError;
use thiserror::Error;

/// A rule payload failed structural, semantic or distribution checks.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    // ── condition tree ────────────────────────────────────────────────────
    /// The tree holds no condition at all.
    #[error("rule has no conditions")]
    EmptyRule,

    /// A compound part after the first has no relation.
    #[error("compound part {index} is missing a relation")]
    MissingRelation {
        /// Zero-based index of the offending part.
        index: usize,
    },

    /// A compound part itself holds compound parts.
    #[error("compound part {index} nests further compound parts")]
    IllegalNesting {
        /// Zero-based index of the offending part.
        index: usize,
    },

    /// The same condition appears twice in the tree.
    #[error("duplicate condition: {condition}")]
    DuplicateCondition {
        /// Rendered condition.
        condition: String,
    },

    /// A condition's free argument is blank.
    #[error("condition is missing a free argument")]
    MissingFreeArg,

    /// The operation is not allowed for this rule class.
    #[error("operation {operation} is not allowed")]
    UnknownOperation {
        /// Operation name as given.
        operation: String,
    },

    /// The condition needs a fixed argument and has none.
    #[error("{free_arg} {operation} requires a fixed argument")]
    MissingFixedArg {
        /// Free argument of the condition.
        free_arg: String,
        /// Operation of the condition.
        operation: String,
    },

    /// A collection argument is empty, has duplicates or malformed items.
    #[error("invalid collection for {field}: {reason}")]
    InvalidCollectionValue {
        /// Field or free argument the collection belongs to.
        field: String,
        /// What is wrong with it.
        reason: String,
    },

    /// A scalar argument has the wrong shape or value.
    #[error("invalid value for {field}: {reason}")]
    InvalidScalarValue {
        /// Field or free argument the value belongs to.
        field: String,
        /// What is wrong with it.
        reason: String,
    },

    /// A pattern argument does not compile.
    #[error("invalid regular expression {pattern:?}: {reason}")]
    InvalidRegex {
        /// The pattern as given.
        pattern: String,
        /// Compiler message.
        reason: String,
    },

    // ── distribution ──────────────────────────────────────────────────────
    /// Range start outside `[0, 100)`.
    #[error("range start {start} must be within [0, 100)")]
    InvalidStartRange {
        /// The offending start.
        start: f64,
    },

    /// Range end outside `(0, 100]`.
    #[error("range end {end} must be within (0, 100]")]
    InvalidEndRange {
        /// The offending end.
        end: f64,
    },

    /// Range start is not below its end.
    #[error("range start {start} must be less than end {end}")]
    StartNotLessThanEnd {
        /// Range start.
        start: f64,
        /// Range end.
        end: f64,
    },

    /// Two ranges overlap.
    #[error("percent ranges {first} and {second} overlap")]
    RangesOverlap {
        /// The range the other one starts inside.
        first: String,
        /// The range starting inside `first`.
        second: String,
    },

    /// The distribution claims more than the whole population.
    #[error("total percentage {total} exceeds 100")]
    TotalExceeds100 {
        /// Sum of widths or flat percentages.
        total: f64,
    },

    /// A flat percentage outside `[0, 100]`.
    #[error("percentage {value} must be within [0, 100]")]
    InvalidPercentage {
        /// The offending value.
        value: f64,
    },

    /// A `start-end` text could not be parsed.
    #[error("malformed percent range: {0}")]
    MalformedRange(String),

    /// Two targets roll out the same config.
    #[error("config {config_id} is targeted more than once")]
    DuplicateTarget {
        /// The repeated config.
        config_id: String,
    },

    /// Targets mix explicit ranges and flat percentages.
    #[error("targets mix explicit ranges and flat percentages")]
    MixedAllocation,
}

impl ValidationError {
    /// Stable identifier for programmatic handling.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::EmptyRule => "EMPTY_RULE",
            Self::MissingRelation { .. } => "MISSING_RELATION",
            Self::IllegalNesting { .. } => "ILLEGAL_NESTING",
            Self::DuplicateCondition { .. } => "DUPLICATE_CONDITION",
            Self::MissingFreeArg => "MISSING_FREE_ARG",
            Self::UnknownOperation { .. } => "UNKNOWN_OPERATION",
            Self::MissingFixedArg { .. } => "MISSING_FIXED_ARG",
            Self::InvalidCollectionValue { .. } => "INVALID_COLLECTION_VALUE",
            Self::InvalidScalarValue { .. } => "INVALID_SCALAR_VALUE",
            Self::InvalidRegex { .. } => "INVALID_REGEX",
            Self::InvalidStartRange { .. } => "INVALID_START_RANGE",
            Self::InvalidEndRange { .. } => "INVALID_END_RANGE",
            Self::StartNotLessThanEnd { .. } => "START_NOT_LESS_THAN_END",
            Self::RangesOverlap { .. } => "RANGES_OVERLAP",
            Self::TotalExceeds100 { .. } => "TOTAL_EXCEEDS_100",
            Self::InvalidPercentage { .. } => "INVALID_PERCENTAGE",
            Self::MalformedRange(_) => "MALFORMED_RANGE",
            Self::DuplicateTarget { .. } => "DUPLICATE_TARGET",
            Self::MixedAllocation => "MIXED_ALLOCATION",
        }
    }

    /// HTTP-style status for the client response.
    #[must_use]
    pub fn status(&self) -> StatusCode {
        StatusCode::BAD_REQUEST
    }

    /// Returns `true` for failures found by the distribution checks.
    #[must_use]
    pub fn is_distribution_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidStartRange { .. }
                | Self::InvalidEndRange { .. }
                | Self::StartNotLessThanEnd { .. }
                | Self::RangesOverlap { .. }
                | Self::TotalExceeds100 { .. }
                | Self::InvalidPercentage { .. }
                | Self::MalformedRange(_)
                | Self::DuplicateTarget { .. }
                | Self::MixedAllocation
        )
    }

    /// Convenience constructor for [`ValidationError::InvalidScalarValue`].
    pub fn scalar(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidScalarValue {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Convenience constructor for [`ValidationError::InvalidCollectionValue`].
    pub fn collection(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidCollectionValue {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

impl From<CoreError> for ValidationError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::UnknownOperation(operation) => Self::UnknownOperation { operation },
            CoreError::MalformedRange(text) => Self::MalformedRange(text),
            CoreError::UnknownRelation(relation) => Self::scalar("relation", format!("unknown relation {relation}")),
            CoreError::UnknownRuleClass(class) => Self::scalar("class", format!("unknown rule class {class}")),
        }
    }
}

//! Parse errors for the core data model.

use thiserror::Error;

/// Errors raised while turning text into core types.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CoreError {
    /// The operation name is not one of the known operations.
    #[error("unknown operation: {0}")]
    UnknownOperation(String),

    /// The relation is neither `AND` nor `OR`.
    #[error("unknown relation: {0}")]
    UnknownRelation(String),

    /// The rule class name is not recognised.
    #[error("unknown rule class: {0}")]
    UnknownRuleClass(String),

    /// A `start-end` percent range could not be parsed.
    #[error("malformed percent range: {0}")]
    MalformedRange(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_messages() {
        assert_eq!(
            CoreError::UnknownOperation("FOO".into()).to_string(),
            "unknown operation: FOO"
        );
        assert_eq!(
            CoreError::MalformedRange("10_20".into()).to_string(),
            "malformed percent range: 10_20"
        );
    }
}

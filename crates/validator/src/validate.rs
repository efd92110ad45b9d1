//! The validator trait shared by every check in this crate.

use crate::error::ValidationError;

/// A reusable check over some input.
///
/// `Input` may be unsized so validators can take `str` or slices directly.
///
/// ```rust,ignore
/// use rollout_validator::{Validate, ValidationError};
///
/// struct NotBlank;
///
/// impl Validate for NotBlank {
///     type Input = str;
///
///     fn validate(&self, input: &str) -> Result<(), ValidationError> {
///         if input.trim().is_empty() {
///             return Err(ValidationError::MissingFreeArg);
///         }
///         Ok(())
///     }
/// }
/// ```
pub trait Validate {
    /// The type being validated.
    type Input: ?Sized;

    /// Check `input`, returning the first failure found.
    fn validate(&self, input: &Self::Input) -> Result<(), ValidationError>;

    /// Returns `true` when `input` passes.
    fn is_valid(&self, input: &Self::Input) -> bool {
        self.validate(input).is_ok()
    }
}

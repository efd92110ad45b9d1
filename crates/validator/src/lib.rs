#![forbid(unsafe_code)]
#![warn(missing_docs)]

//! # Rollout Validator
//!
//! Pure, side-effect-free checks run before any rule record is written.
//!
//! - [`ConditionTreeValidator`] enforces the shape of a rule's condition tree
//!   and the argument types of each condition
//! - [`DistributionValidator`] checks the percent ranges or flat percentages
//!   a firmware action splits the population into
//! - [`MacAddress`] and [`IpAddress`] check address syntax for well-known
//!   free arguments
//!
//! Every failure is a [`ValidationError`] that maps to a `400 Bad Request`.
//!
//! ```rust,ignore
//! use rollout_core::{Condition, ConditionTree, Operation, RuleClass};
//! use rollout_validator::{ConditionTreeValidator, Validate};
//!
//! let tree = ConditionTree::single(Condition::new("model", Operation::Is, "X1"));
//! ConditionTreeValidator::for_class(RuleClass::FirmwareRule).validate(&tree)?;
//! ```

pub mod condition;
pub mod distribution;
pub mod error;
pub mod network;
pub mod validate;

pub use condition::{ConditionTreeValidator, validate_condition_tree};
pub use distribution::{DistributionOptions, DistributionValidator};
pub use error::ValidationError;
pub use network::{IpAddress, MacAddress, normalize_mac};
pub use validate::Validate;

/// Result type for validation.
pub type Result<T> = std::result::Result<T, ValidationError>;

#![forbid(unsafe_code)]
#![warn(missing_docs)]

//! # Rollout Core
//!
//! Data model shared by every rollout crate.
//!
//! - [`ConditionTree`], [`Condition`], [`Operation`] and [`FixedArg`] describe
//!   the boolean predicate a rule matches devices against
//! - [`RuleRecord`] pairs a condition tree with a [`RuleAction`] and carries
//!   the dense 1..N [`Prioritized`] rank that orders evaluation
//! - [`PercentRange`] and [`RolloutTarget`] describe how a partial rollout
//!   slices the bucketing space between firmware configs
//! - [`PartitionKey`] groups records that share one priority sequence

pub mod action;
pub mod condition;
pub mod error;
pub mod id;
pub mod operation;
pub mod range;
pub mod record;
pub mod well_known;

pub use action::{Allocation, RolloutTarget, RuleAction};
pub use condition::{Condition, ConditionTree, FixedArg};
pub use error::CoreError;
pub use id::{ApplicationType, PartitionKey, RuleId};
pub use operation::{Operation, Relation};
pub use range::PercentRange;
pub use record::{Prioritized, RuleClass, RuleRecord};

/// Result type used by parsing helpers in this crate.
pub type Result<T> = std::result::Result<T, CoreError>;

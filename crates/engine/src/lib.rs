#![forbid(unsafe_code)]
#![warn(missing_docs)]

//! # Rollout Engine
//!
//! Decides which rule applies to a device and keeps rule priorities dense.
//!
//! - [`PercentBucketer`] maps a device identifier to a stable position in
//!   `[0, 100)` using SipHash-2-4 under a deployment-wide key
//! - [`priority`] moves, inserts and removes records while keeping each
//!   partition's priorities exactly `1..=N`
//! - [`Evaluator`] walks a partition in priority order and returns the first
//!   matching record with its bucketed rollout target
//! - [`RuleRecordService`] validates, reorganizes and persists records through
//!   a [`RecordStore`](rollout_storage::RecordStore), one partition at a time
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use rollout_engine::{EngineConfig, RuleRecordService};
//! use rollout_storage::MemoryRecordStore;
//!
//! let service = RuleRecordService::new(Arc::new(MemoryRecordStore::new()), EngineConfig::load(None)?);
//! let created = service.create(record).await?;
//! let changed = service.change_priority(&created.id, 1).await?;
//! ```

pub mod bucket;
pub mod config;
pub mod error;
pub mod evaluate;
pub mod priority;
pub mod service;
pub mod state;

pub use bucket::{Bucket, BucketKey, PercentBucketer};
pub use config::{BucketingConfig, ConfigError, EngineConfig};
pub use error::ServiceError;
pub use evaluate::{Decision, DeviceContext, Evaluator, allocate};
pub use service::{Removal, Result, RuleRecordService};
pub use state::{RecordState, can_transition, validate_transition};

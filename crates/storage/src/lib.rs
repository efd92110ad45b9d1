#![forbid(unsafe_code)]
#![warn(missing_docs)]

//! # Rollout Storage
//!
//! The persistence boundary of the rollout engine.
//!
//! [`RecordStore`] reads a whole `(application type, class)` partition at a
//! [`PartitionVersion`] and writes a [`WriteBatch`] back only if that
//! version is still current. [`MemoryRecordStore`] is the in-process
//! backend used by tests and single-node deployments.

pub mod error;
pub mod memory;
pub mod store;

pub use error::StoreError;
pub use memory::MemoryRecordStore;
pub use store::{PartitionSnapshot, PartitionVersion, RecordStore, WriteBatch};

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;

//! The record store port.
//!
//! The store owns durability. The service reads a whole partition, computes
//! the priority changes in memory, and writes the changed subset back as one
//! batch guarded by the partition version it read.

use async_trait::async_trait;
use rollout_core::{PartitionKey, RuleId, RuleRecord};

use crate::error::StoreError;

/// Monotonic version of one partition. `0` means the partition was never
/// written.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct PartitionVersion(pub u64);

impl PartitionVersion {
    /// The version following this one.
    #[must_use]
    pub fn next(self) -> Self {
        Self(self.0 + 1)
    }
}

/// Every record of a partition, read at one version.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PartitionSnapshot {
    /// Records sorted ascending by priority.
    pub records: Vec<RuleRecord>,
    /// Version the records were read at.
    pub version: PartitionVersion,
}

/// Records to write to one partition, all or nothing.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WriteBatch {
    /// Version the caller's snapshot was read at.
    pub expected_version: PartitionVersion,
    /// Records to insert or replace.
    pub upserts: Vec<RuleRecord>,
    /// Ids of records to remove.
    pub removals: Vec<RuleId>,
}

impl WriteBatch {
    /// An empty batch against `expected_version`.
    #[must_use]
    pub fn new(expected_version: PartitionVersion) -> Self {
        Self {
            expected_version,
            ..Self::default()
        }
    }

    /// Add records to insert or replace.
    #[must_use = "builder methods must be chained or built"]
    pub fn upsert(mut self, records: impl IntoIterator<Item = RuleRecord>) -> Self {
        self.upserts.extend(records);
        self
    }

    /// Add a record to remove.
    #[must_use = "builder methods must be chained or built"]
    pub fn remove(mut self, id: RuleId) -> Self {
        self.removals.push(id);
        self
    }

    /// Returns `true` when the batch writes nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.upserts.is_empty() && self.removals.is_empty()
    }
}

/// Persistence interface for rule records.
///
/// All methods are async and object-safe. Implementations must be
/// `Send + Sync` so the trait object can be shared across Tokio tasks.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Every record of `partition`, sorted ascending by priority, with the
    /// partition's current version.
    async fn get_all(&self, partition: &PartitionKey) -> Result<PartitionSnapshot, StoreError>;

    /// A single record by id.
    async fn get(&self, id: &RuleId) -> Result<Option<RuleRecord>, StoreError>;

    /// Apply `batch` to `partition` if its version still equals
    /// `batch.expected_version`; returns the new version. On
    /// [`StoreError::Conflict`] nothing is written.
    async fn set_many(
        &self,
        partition: &PartitionKey,
        batch: WriteBatch,
    ) -> Result<PartitionVersion, StoreError>;
}

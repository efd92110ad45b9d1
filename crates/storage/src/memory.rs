//! In-memory record store.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use parking_lot::RwLock;
use rollout_core::{PartitionKey, RuleId, RuleRecord};

use crate::error::StoreError;
use crate::store::{PartitionSnapshot, PartitionVersion, RecordStore, WriteBatch};

#[derive(Debug, Default)]
struct Partition {
    version: PartitionVersion,
    records: HashMap<RuleId, RuleRecord>,
}

/// In-memory implementation of [`RecordStore`].
///
/// Each partition carries its own version; a batch commits under the
/// partition's write lock only when the caller's expected version matches.
#[derive(Debug, Default)]
pub struct MemoryRecordStore {
    partitions: DashMap<PartitionKey, Arc<RwLock<Partition>>>,
    index: DashMap<RuleId, PartitionKey>,
}

impl MemoryRecordStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored records across all partitions.
    pub fn len(&self) -> usize {
        self.index.len()
    }

    /// Check if empty.
    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// Drop every partition.
    pub fn clear(&self) {
        self.partitions.clear();
        self.index.clear();
    }

    fn partition(&self, key: &PartitionKey) -> Option<Arc<RwLock<Partition>>> {
        self.partitions.get(key).map(|entry| Arc::clone(entry.value()))
    }

    fn check_batch(&self, key: &PartitionKey, batch: &WriteBatch) -> Result<(), StoreError> {
        for record in &batch.upserts {
            let record_key = record.partition();
            if record_key != *key {
                return Err(StoreError::InvalidBatch(format!(
                    "record {} belongs to partition {record_key}, not {key}",
                    record.id
                )));
            }
            if let Some(owner) = self.index.get(&record.id) {
                if owner.value() != key {
                    return Err(StoreError::InvalidBatch(format!(
                        "record {} is stored in partition {}",
                        record.id,
                        owner.value()
                    )));
                }
            }
        }
        Ok(())
    }
}

#[async_trait]
impl RecordStore for MemoryRecordStore {
    async fn get_all(&self, key: &PartitionKey) -> Result<PartitionSnapshot, StoreError> {
        let Some(partition) = self.partition(key) else {
            return Ok(PartitionSnapshot::default());
        };
        let guard = partition.read();
        let mut records: Vec<RuleRecord> = guard.records.values().cloned().collect();
        records.sort_by(|a, b| a.priority.cmp(&b.priority).then_with(|| a.id.cmp(&b.id)));
        Ok(PartitionSnapshot {
            records,
            version: guard.version,
        })
    }

    async fn get(&self, id: &RuleId) -> Result<Option<RuleRecord>, StoreError> {
        let Some(key) = self.index.get(id).map(|entry| entry.value().clone()) else {
            return Ok(None);
        };
        Ok(self
            .partition(&key)
            .and_then(|partition| partition.read().records.get(id).cloned()))
    }

    async fn set_many(
        &self,
        key: &PartitionKey,
        batch: WriteBatch,
    ) -> Result<PartitionVersion, StoreError> {
        self.check_batch(key, &batch)?;

        let partition = Arc::clone(self.partitions.entry(key.clone()).or_default().value());
        let mut guard = partition.write();
        if guard.version != batch.expected_version {
            return Err(StoreError::conflict(
                key.to_string(),
                batch.expected_version.0,
                guard.version.0,
            ));
        }
        if let Some(missing) = batch.removals.iter().find(|id| !guard.records.contains_key(*id)) {
            return Err(StoreError::not_found("record", missing.as_str()));
        }

        let (upserts, removals) = (batch.upserts.len(), batch.removals.len());
        for id in batch.removals {
            guard.records.remove(&id);
            self.index.remove(&id);
        }
        for record in batch.upserts {
            self.index.insert(record.id.clone(), key.clone());
            guard.records.insert(record.id.clone(), record);
        }
        guard.version = guard.version.next();

        tracing::debug!(
            partition = %key,
            version = guard.version.0,
            upserts,
            removals,
            "partition committed"
        );
        Ok(guard.version)
    }
}

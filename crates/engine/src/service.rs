//! Rule record orchestration.
//!
//! Every mutation runs one critical section per partition: take the
//! partition lock, read all siblings at a version, validate uniqueness,
//! reorganize priorities in memory, and write the mutated record plus the
//! changed siblings as one batch guarded by that version. A failure at any
//! step leaves the store untouched.

use std::path::Path;
use std::sync::Arc;

use chrono::Utc;
use dashmap::DashMap;
use rollout_core::{PartitionKey, RuleId, RuleRecord};
use rollout_storage::{PartitionSnapshot, PartitionVersion, RecordStore, WriteBatch};
use rollout_validator::{DistributionValidator, ValidationError, validate_condition_tree};
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::bucket::PercentBucketer;
use crate::config::EngineConfig;
use crate::error::ServiceError;
use crate::evaluate::{Decision, DeviceContext, Evaluator};
use crate::priority;
use crate::state::{RecordState, validate_transition};

/// Result type for service operations.
pub type Result<T> = std::result::Result<T, ServiceError>;

/// A deleted record and the siblings whose priority moved up.
#[derive(Debug, Clone, PartialEq)]
pub struct Removal {
    /// The record that was removed.
    pub record: RuleRecord,
    /// Siblings renumbered by the compaction, in priority order.
    pub changed: Vec<RuleRecord>,
}

/// Siblings of one partition as read for a mutation.
struct Loaded {
    records: Vec<RuleRecord>,
    version: PartitionVersion,
    repaired: Vec<RuleRecord>,
}

/// Creates, updates, reorders and deletes rule records.
pub struct RuleRecordService<S: RecordStore + ?Sized> {
    store: Arc<S>,
    config: Arc<EngineConfig>,
    distribution: DistributionValidator,
    evaluator: Evaluator,
    locks: DashMap<PartitionKey, Arc<Mutex<()>>>,
}

impl<S: RecordStore + ?Sized> RuleRecordService<S> {
    /// Service over `store`, bucketing with the key in `config`.
    pub fn new(store: Arc<S>, config: EngineConfig) -> Self {
        let evaluator = Evaluator::new(PercentBucketer::new(config.bucket_key()));
        Self {
            store,
            config: Arc::new(config),
            distribution: DistributionValidator::default(),
            evaluator,
            locks: DashMap::new(),
        }
    }

    /// Service over `store` configured from the TOML file at `path`, with
    /// environment key overrides applied.
    pub fn from_config_file(store: Arc<S>, path: impl AsRef<Path>) -> Result<Self> {
        let config = EngineConfig::load(Some(path.as_ref()))?;
        Ok(Self::new(store, config))
    }

    /// Configuration in use.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Underlying store.
    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// Check a record without touching the store: id and name present,
    /// condition tree valid for its class, distribution valid.
    pub fn validate(&self, record: &RuleRecord) -> Result<()> {
        if record.id.is_blank() {
            return Err(ValidationError::scalar("id", "must not be blank").into());
        }
        if record.name.trim().is_empty() {
            return Err(ValidationError::scalar("name", "must not be blank").into());
        }
        let allowed = self.config.allowed_operations(record.class);
        validate_condition_tree(&record.rule, &allowed)?;
        self.distribution.validate_action(&record.action)?;
        Ok(())
    }

    /// Persist a new record at its requested priority (`0` appends).
    ///
    /// Returns the stored record with its final priority.
    pub async fn create(&self, record: RuleRecord) -> Result<RuleRecord> {
        self.validate(&record)?;
        let key = record.partition();
        let _guard = self.lock(&key).await;

        let Loaded {
            mut records,
            version,
            repaired,
        } = self.load(&key).await?;
        check_unique(&records, &record)?;
        let stored = self.store.get(&record.id).await?;
        validate_transition(RecordState::of_stored(stored.as_ref()), RecordState::Validated)?;

        let id = record.id.clone();
        let requested = record.priority;
        let mut record = record;
        record.updated = Some(Utc::now());
        let changed = priority::insert(&mut records, record, requested);
        debug_assert!(priority::is_contiguous(&records));
        let created = find(&records, &id)?;

        let written = self
            .commit(&key, version, repaired.into_iter().chain(changed), Vec::new())
            .await?;
        tracing::info!(
            partition = %key,
            record = %id,
            priority = created.priority,
            version = written.0,
            "rule created"
        );
        Ok(created)
    }

    /// Replace a stored record. Application type and class cannot change.
    ///
    /// A non-zero priority that differs from the current one also moves the
    /// record; `0` keeps it in place.
    pub async fn update(&self, record: RuleRecord) -> Result<RuleRecord> {
        self.validate(&record)?;
        let key = record.partition();
        let _guard = self.lock(&key).await;

        let existing = self
            .store
            .get(&record.id)
            .await?
            .ok_or_else(|| ServiceError::not_found(record.id.clone()))?;
        if existing.partition() != key {
            return Err(ServiceError::PartitionMismatch { id: record.id });
        }

        let Loaded {
            mut records,
            version,
            repaired,
        } = self.load(&key).await?;
        check_unique(&records, &record)?;
        let current = priority::position_of(&records, record.id.as_str())
            .ok_or_else(|| ServiceError::not_found(record.id.clone()))?;
        validate_transition(RecordState::of_stored(Some(&existing)), RecordState::Updated)?;

        let id = record.id.clone();
        let requested = record.priority;
        let mut record = record;
        record.priority = current;
        record.updated = Some(Utc::now());
        let slot = (current - 1) as usize;
        records[slot] = record;

        let moved = if requested == 0 {
            Vec::new()
        } else {
            priority::reorganize(&mut records, current, requested)
        };
        debug_assert!(priority::is_contiguous(&records));
        let updated = find(&records, &id)?;

        let changes = repaired
            .into_iter()
            .chain(std::iter::once(updated.clone()))
            .chain(moved);
        let written = self.commit(&key, version, changes, Vec::new()).await?;
        tracing::info!(
            partition = %key,
            record = %id,
            from = current,
            to = updated.priority,
            version = written.0,
            "rule updated"
        );
        Ok(updated)
    }

    /// Move a record to `new_priority`; out-of-range values move it to the
    /// end. Returns the records whose priority changed, in priority order.
    pub async fn change_priority(&self, id: &RuleId, new_priority: u32) -> Result<Vec<RuleRecord>> {
        let existing = self.get(id).await?;
        let key = existing.partition();
        let _guard = self.lock(&key).await;

        let Loaded {
            mut records,
            version,
            repaired,
        } = self.load(&key).await?;
        let current = priority::position_of(&records, id.as_str())
            .ok_or_else(|| ServiceError::not_found(id.clone()))?;
        validate_transition(RecordState::of_stored(Some(&existing)), RecordState::Updated)?;

        let now = Utc::now();
        let mut changed = priority::reorganize(&mut records, current, new_priority);
        for record in &mut changed {
            record.updated = Some(now);
        }
        if changed.is_empty() && repaired.is_empty() {
            return Ok(changed);
        }

        let written = self
            .commit(&key, version, repaired.into_iter().chain(changed.clone()), Vec::new())
            .await?;
        tracing::info!(
            partition = %key,
            record = %id,
            from = current,
            to = priority::position_of(&records, id.as_str()).unwrap_or(current),
            changed = changed.len(),
            version = written.0,
            "rule priority changed"
        );
        Ok(changed)
    }

    /// Remove a record and close the gap it leaves.
    pub async fn delete(&self, id: &RuleId) -> Result<Removal> {
        let existing = self.get(id).await?;
        let key = existing.partition();
        let _guard = self.lock(&key).await;

        let Loaded {
            mut records,
            version,
            repaired,
        } = self.load(&key).await?;
        let (record, changed) = priority::remove(&mut records, id.as_str())
            .ok_or_else(|| ServiceError::not_found(id.clone()))?;
        debug_assert!(priority::is_contiguous(&records));
        validate_transition(RecordState::of_stored(Some(&existing)), RecordState::Deleted)?;

        let changes = repaired
            .into_iter()
            .filter(|r| r.id != record.id)
            .chain(changed.clone());
        let written = self
            .commit(&key, version, changes, vec![record.id.clone()])
            .await?;
        tracing::info!(
            partition = %key,
            record = %id,
            compacted = changed.len(),
            version = written.0,
            "rule deleted"
        );
        Ok(Removal { record, changed })
    }

    /// Fetch one record.
    pub async fn get(&self, id: &RuleId) -> Result<RuleRecord> {
        self.store
            .get(id)
            .await?
            .ok_or_else(|| ServiceError::not_found(id.clone()))
    }

    /// All records of a partition in ascending priority.
    pub async fn list(&self, key: &PartitionKey) -> Result<Vec<RuleRecord>> {
        let PartitionSnapshot { mut records, .. } = self.store.get_all(key).await?;
        priority::sort_by_priority(&mut records);
        Ok(records)
    }

    /// Evaluate a partition for one device.
    pub async fn evaluate(
        &self,
        key: &PartitionKey,
        device: &DeviceContext,
    ) -> Result<Option<Decision>> {
        let records = self.list(key).await?;
        Ok(self.evaluator.evaluate(&records, device))
    }

    async fn lock(&self, key: &PartitionKey) -> OwnedMutexGuard<()> {
        let lock = Arc::clone(self.locks.entry(key.clone()).or_default().value());
        lock.lock_owned().await
    }

    async fn load(&self, key: &PartitionKey) -> Result<Loaded> {
        let PartitionSnapshot {
            mut records,
            version,
        } = self.store.get_all(key).await?;
        priority::sort_by_priority(&mut records);
        let repaired = if priority::is_contiguous(&records) {
            Vec::new()
        } else {
            let repaired = priority::compact(&mut records);
            tracing::warn!(
                partition = %key,
                repaired = repaired.len(),
                "partition priorities were not contiguous, compacting"
            );
            repaired
        };
        Ok(Loaded {
            records,
            version,
            repaired,
        })
    }

    async fn commit(
        &self,
        key: &PartitionKey,
        version: PartitionVersion,
        upserts: impl IntoIterator<Item = RuleRecord>,
        removals: Vec<RuleId>,
    ) -> Result<PartitionVersion> {
        let mut batch = WriteBatch::new(version).upsert(dedup_latest(upserts));
        for id in removals {
            batch = batch.remove(id);
        }
        self.store.set_many(key, batch).await.map_err(|err| {
            let err = ServiceError::from(err);
            if let ServiceError::StalePriorityState {
                expected, actual, ..
            } = &err
            {
                tracing::warn!(partition = %key, expected, actual, "stale partition snapshot");
            }
            err
        })
    }
}

impl<S: RecordStore + ?Sized> std::fmt::Debug for RuleRecordService<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RuleRecordService")
            .field("config", &self.config)
            .field("partitions", &self.locks.len())
            .finish_non_exhaustive()
    }
}

/// Reject names (case-insensitive) and condition trees already used by a
/// sibling other than `record` itself.
fn check_unique(siblings: &[RuleRecord], record: &RuleRecord) -> Result<()> {
    let name = record.name.trim().to_lowercase();
    let tree = record.rule.normalized();
    for sibling in siblings.iter().filter(|s| s.id != record.id) {
        if sibling.name.trim().to_lowercase() == name {
            return Err(ServiceError::NameConflict {
                name: record.name.clone(),
            });
        }
        if sibling.rule.normalized() == tree {
            return Err(ServiceError::DuplicateRule {
                existing: sibling.id.clone(),
            });
        }
    }
    Ok(())
}

fn find(records: &[RuleRecord], id: &RuleId) -> Result<RuleRecord> {
    records
        .iter()
        .find(|r| r.id == *id)
        .cloned()
        .ok_or_else(|| ServiceError::not_found(id.clone()))
}

/// Keep one entry per id, the last one seen, in first-seen order.
fn dedup_latest(records: impl IntoIterator<Item = RuleRecord>) -> Vec<RuleRecord> {
    let mut out: Vec<RuleRecord> = Vec::new();
    for record in records {
        match out.iter_mut().find(|r| r.id == record.id) {
            Some(slot) => *slot = record,
            None => out.push(record),
        }
    }
    out
}

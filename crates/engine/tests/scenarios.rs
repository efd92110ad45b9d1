//! Rule administration end to end over the memory store.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use pretty_assertions::assert_eq;
use rollout_core::{
    ApplicationType, Condition, ConditionTree, Operation, PartitionKey, PercentRange, Relation,
    RolloutTarget, RuleAction, RuleClass, RuleId, RuleRecord,
};
use rollout_engine::{DeviceContext, EngineConfig, RuleRecordService, ServiceError, priority};
use rollout_storage::{
    MemoryRecordStore, PartitionSnapshot, PartitionVersion, RecordStore, StoreError, WriteBatch,
};

fn key() -> PartitionKey {
    PartitionKey::new(ApplicationType::default(), RuleClass::FirmwareRule)
}

fn rule(id: &str, model: &str) -> RuleRecord {
    RuleRecord::new(
        id,
        ApplicationType::default(),
        RuleClass::FirmwareRule,
        ConditionTree::single(Condition::new("model", Operation::Is, model)),
        RuleAction::AssignFirmware {
            targets: Vec::new(),
            last_known_good: Some(format!("cfg-{model}")),
        },
    )
    .with_id(id)
}

fn summary(records: &[RuleRecord]) -> Vec<(String, u32)> {
    records
        .iter()
        .map(|r| (r.id.to_string(), r.priority))
        .collect()
}

fn pairs(expected: &[(&str, u32)]) -> Vec<(String, u32)> {
    expected.iter().map(|(id, p)| ((*id).to_string(), *p)).collect()
}

async fn seeded() -> RuleRecordService<MemoryRecordStore> {
    let _log = rollout_log::init_test();
    let service =
        RuleRecordService::new(Arc::new(MemoryRecordStore::new()), EngineConfig::default());
    for (id, model) in [("r1", "X1"), ("r2", "X2"), ("r3", "X3")] {
        service.create(rule(id, model)).await.unwrap();
    }
    service
}

#[tokio::test]
async fn moving_last_rule_to_front_returns_changed_span() {
    let service = seeded().await;

    let changed = service.change_priority(&RuleId::new("r3"), 1).await.unwrap();

    assert_eq!(summary(&changed), pairs(&[("r3", 1), ("r1", 2), ("r2", 3)]));
    let listed = service.list(&key()).await.unwrap();
    assert_eq!(summary(&listed), pairs(&[("r3", 1), ("r1", 2), ("r2", 3)]));
}

#[tokio::test]
async fn no_op_move_writes_nothing() {
    let service = seeded().await;
    let before = service.store().get_all(&key()).await.unwrap().version;

    let changed = service.change_priority(&RuleId::new("r2"), 2).await.unwrap();

    assert!(changed.is_empty());
    assert_eq!(service.store().get_all(&key()).await.unwrap().version, before);
}

#[tokio::test]
async fn create_at_requested_priority_shifts_the_tail() {
    let service = seeded().await;

    let created = service
        .create(rule("r4", "X4").with_priority(2))
        .await
        .unwrap();

    assert_eq!(created.priority, 2);
    let listed = service.list(&key()).await.unwrap();
    assert_eq!(
        summary(&listed),
        pairs(&[("r1", 1), ("r4", 2), ("r2", 3), ("r3", 4)])
    );
}

#[tokio::test]
async fn delete_compacts_remaining_priorities() {
    let service = seeded().await;

    let removal = service.delete(&RuleId::new("r1")).await.unwrap();

    assert_eq!(removal.record.id, RuleId::new("r1"));
    assert_eq!(summary(&removal.changed), pairs(&[("r2", 1), ("r3", 2)]));
    let listed = service.list(&key()).await.unwrap();
    assert_eq!(summary(&listed), pairs(&[("r2", 1), ("r3", 2)]));
    assert_eq!(
        service.get(&RuleId::new("r1")).await.unwrap_err(),
        ServiceError::not_found("r1")
    );
}

#[tokio::test]
async fn names_are_unique_ignoring_case() {
    let service = seeded().await;
    let mut clash = rule("r9", "X9");
    clash.name = "R2".into();

    let err = service.create(clash).await.unwrap_err();

    assert_eq!(err, ServiceError::NameConflict { name: "R2".into() });
    assert_eq!(err.status(), http::StatusCode::CONFLICT);
    assert_eq!(service.store().len(), 3);
}

#[tokio::test]
async fn equivalent_condition_trees_are_duplicates() {
    let service = seeded().await;
    let tree = |first: Condition, second: Condition| {
        ConditionTree::compound(vec![
            ConditionTree::part(None, first),
            ConditionTree::part(Some(Relation::And), second),
        ])
    };
    let env = || Condition::new("env", Operation::Is, "QA");
    let model = || Condition::new("model", Operation::Is, "X7");

    let mut first = rule("a", "unused");
    first.rule = tree(env(), model());
    service.create(first).await.unwrap();

    let mut reordered = rule("b", "unused");
    reordered.rule = tree(model(), env());
    let err = service.create(reordered).await.unwrap_err();

    assert_eq!(
        err,
        ServiceError::DuplicateRule {
            existing: RuleId::new("a")
        }
    );
}

#[tokio::test]
async fn invalid_rules_write_nothing() {
    let service = seeded().await;

    let mut range_rule = rule("r9", "X9");
    range_rule.rule = ConditionTree::single(Condition::new("eStbMac", Operation::Range, "0-50"));
    let err = service.create(range_rule).await.unwrap_err();
    assert_eq!(err.code(), "UNKNOWN_OPERATION");
    assert_eq!(err.status(), http::StatusCode::BAD_REQUEST);

    let mut overlapping = rule("r10", "X10");
    overlapping.action = RuleAction::AssignFirmware {
        targets: vec![
            RolloutTarget::ranged("cfg-a", PercentRange::new(0.0, 60.0)),
            RolloutTarget::ranged("cfg-b", PercentRange::new(50.0, 100.0)),
        ],
        last_known_good: None,
    };
    let err = service.create(overlapping).await.unwrap_err();
    assert_eq!(err.code(), "RANGES_OVERLAP");

    assert_eq!(service.store().len(), 3);
}

#[tokio::test]
async fn update_rewrites_and_moves() {
    let service = seeded().await;

    let mut changed = rule("r3", "X30").with_priority(1);
    changed.name = "renamed".into();
    let updated = service.update(changed).await.unwrap();

    assert_eq!(updated.priority, 1);
    assert_eq!(updated.name, "renamed");
    let listed = service.list(&key()).await.unwrap();
    assert_eq!(summary(&listed), pairs(&[("r3", 1), ("r1", 2), ("r2", 3)]));
    assert_eq!(listed[0].rule, ConditionTree::single(Condition::new("model", Operation::Is, "X30")));
}

#[tokio::test]
async fn update_with_zero_priority_stays_in_place() {
    let service = seeded().await;

    let updated = service.update(rule("r2", "X22")).await.unwrap();

    assert_eq!(updated.priority, 2);
    let listed = service.list(&key()).await.unwrap();
    assert_eq!(summary(&listed), pairs(&[("r1", 1), ("r2", 2), ("r3", 3)]));
}

#[tokio::test]
async fn update_rejects_missing_and_moved_records() {
    let service = seeded().await;

    assert_eq!(
        service.update(rule("nope", "X0")).await.unwrap_err(),
        ServiceError::not_found("nope")
    );

    let mut reclassed = rule("r2", "X2");
    reclassed.class = RuleClass::FeatureRule;
    assert_eq!(
        service.update(reclassed).await.unwrap_err(),
        ServiceError::PartitionMismatch {
            id: RuleId::new("r2")
        }
    );
}

#[tokio::test]
async fn partitions_keep_separate_sequences() {
    let service = seeded().await;
    let other_app = ApplicationType::new("xhome");

    let mut foreign = rule("x1", "X1");
    foreign.application_type = other_app.clone();
    let created = service.create(foreign).await.unwrap();

    assert_eq!(created.priority, 1);
    let other = PartitionKey::new(other_app, RuleClass::FirmwareRule);
    assert_eq!(service.list(&other).await.unwrap().len(), 1);
    assert_eq!(service.list(&key()).await.unwrap().len(), 3);
}

#[tokio::test]
async fn evaluation_follows_priority_and_buckets() {
    let service = seeded().await;

    let mut split = rule("split", "X9");
    split.action = RuleAction::AssignFirmware {
        targets: vec![
            RolloutTarget::ranged("cfg-a", PercentRange::new(0.0, 50.0)),
            RolloutTarget::ranged("cfg-b", PercentRange::new(50.0, 100.0)),
        ],
        last_known_good: Some("cfg-stable".into()),
    };
    service.create(split).await.unwrap();

    let device = DeviceContext::new()
        .with("model", "X2")
        .with("eStbMac", "aa:bb:cc:dd:ee:01");
    let decision = service.evaluate(&key(), &device).await.unwrap().unwrap();
    assert_eq!(decision.record.id, RuleId::new("r2"));
    assert_eq!(decision.config_id(), Some("cfg-X2"));

    let high = DeviceContext::new()
        .with("model", "X9")
        .with("eStbMac", "AA:BB:CC:DD:EE:01");
    let decision = service.evaluate(&key(), &high).await.unwrap().unwrap();
    assert_eq!(decision.config_id(), Some("cfg-b"));

    let low = DeviceContext::new()
        .with("model", "X9")
        .with("eStbMac", "00:0A:95:9D:68:16");
    let decision = service.evaluate(&key(), &low).await.unwrap().unwrap();
    assert_eq!(decision.config_id(), Some("cfg-a"));

    let unknown = DeviceContext::new().with("model", "Z");
    assert!(service.evaluate(&key(), &unknown).await.unwrap().is_none());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_creates_keep_priorities_dense() {
    let service = Arc::new(seeded().await);

    let mut handles = Vec::new();
    for i in 0..16 {
        let service = Arc::clone(&service);
        handles.push(tokio::spawn(async move {
            let requested = (i % 4) + 1;
            service
                .create(rule(&format!("c{i}"), &format!("C{i}")).with_priority(requested))
                .await
        }));
    }
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    let listed = service.list(&key()).await.unwrap();
    assert_eq!(listed.len(), 19);
    assert!(priority::is_contiguous(&listed));
}

/// Store whose partition is written by "another replica" right after the
/// next read.
struct RacingStore {
    inner: MemoryRecordStore,
    interfere: AtomicBool,
}

#[async_trait]
impl RecordStore for RacingStore {
    async fn get_all(&self, key: &PartitionKey) -> Result<PartitionSnapshot, StoreError> {
        let snapshot = self.inner.get_all(key).await?;
        if self.interfere.swap(false, Ordering::SeqCst) {
            let touch = WriteBatch::new(snapshot.version).upsert(snapshot.records.clone());
            self.inner.set_many(key, touch).await?;
        }
        Ok(snapshot)
    }

    async fn get(&self, id: &RuleId) -> Result<Option<RuleRecord>, StoreError> {
        self.inner.get(id).await
    }

    async fn set_many(
        &self,
        key: &PartitionKey,
        batch: WriteBatch,
    ) -> Result<PartitionVersion, StoreError> {
        self.inner.set_many(key, batch).await
    }
}

#[tokio::test]
async fn stale_snapshot_is_rejected_without_writes() {
    let store = Arc::new(RacingStore {
        inner: MemoryRecordStore::new(),
        interfere: AtomicBool::new(false),
    });
    let service = RuleRecordService::new(Arc::clone(&store), EngineConfig::default());
    service.create(rule("r1", "X1")).await.unwrap();

    store.interfere.store(true, Ordering::SeqCst);
    let err = service
        .create(rule("r2", "X2").with_priority(1))
        .await
        .unwrap_err();

    assert_eq!(
        err,
        ServiceError::StalePriorityState {
            partition: key().to_string(),
            expected: 1,
            actual: 2,
        }
    );
    assert!(err.is_retryable());
    assert_eq!(store.inner.get(&RuleId::new("r2")).await.unwrap(), None);
    let listed = service.list(&key()).await.unwrap();
    assert_eq!(summary(&listed), pairs(&[("r1", 1)]));

    // The caller retries against a fresh snapshot.
    let created = service
        .create(rule("r2", "X2").with_priority(1))
        .await
        .unwrap();
    assert_eq!(created.priority, 1);
    let listed = service.list(&key()).await.unwrap();
    assert_eq!(summary(&listed), pairs(&[("r2", 1), ("r1", 2)]));
}

#[tokio::test]
async fn non_contiguous_partitions_are_repaired_on_write() {
    let store = Arc::new(MemoryRecordStore::new());
    let gappy = [rule("g1", "G1").with_priority(3), rule("g2", "G2").with_priority(7)];
    store
        .set_many(&key(), WriteBatch::new(PartitionVersion(0)).upsert(gappy))
        .await
        .unwrap();
    let service = RuleRecordService::new(Arc::clone(&store), EngineConfig::default());

    service.create(rule("g3", "G3")).await.unwrap();

    let listed = service.list(&key()).await.unwrap();
    assert_eq!(summary(&listed), pairs(&[("g1", 1), ("g2", 2), ("g3", 3)]));
}

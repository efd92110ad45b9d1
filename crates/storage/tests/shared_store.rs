//! The memory store used through a shared trait object.

use std::sync::Arc;

use pretty_assertions::assert_eq;
use rollout_core::{
    ApplicationType, Condition, ConditionTree, Operation, PartitionKey, RuleAction, RuleClass,
    RuleRecord,
};
use rollout_storage::{MemoryRecordStore, PartitionVersion, RecordStore, StoreError, WriteBatch};

fn record(id: &str, priority: u32) -> RuleRecord {
    RuleRecord::new(
        id,
        ApplicationType::default(),
        RuleClass::FeatureRule,
        ConditionTree::single(Condition::new("model", Operation::Is, id)),
        RuleAction::Block,
    )
    .with_id(id)
    .with_priority(priority)
}

fn key() -> PartitionKey {
    PartitionKey::new(ApplicationType::default(), RuleClass::FeatureRule)
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn only_one_writer_wins_per_version() {
    let store: Arc<dyn RecordStore> = Arc::new(MemoryRecordStore::new());

    let mut handles = Vec::new();
    for i in 0..8 {
        let store = Arc::clone(&store);
        handles.push(tokio::spawn(async move {
            let batch = WriteBatch::new(PartitionVersion(0)).upsert([record(&format!("r{i}"), 1)]);
            store.set_many(&key(), batch).await
        }));
    }

    let mut wins = 0;
    let mut conflicts = 0;
    for handle in handles {
        match handle.await.expect("task") {
            Ok(version) => {
                assert_eq!(version, PartitionVersion(1));
                wins += 1;
            }
            Err(StoreError::Conflict { .. }) => conflicts += 1,
            Err(other) => panic!("unexpected error: {other}"),
        }
    }
    assert_eq!((wins, conflicts), (1, 7));

    let snapshot = store.get_all(&key()).await.unwrap();
    assert_eq!(snapshot.records.len(), 1);
    assert_eq!(snapshot.version, PartitionVersion(1));
}

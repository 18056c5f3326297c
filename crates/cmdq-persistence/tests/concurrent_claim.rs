use cmdq_domain::{NewQueuedCommand, QueueState};
use cmdq_persistence::{SqliteStore, WorkQueueStore};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tempfile::tempdir;

const LEASE: Duration = Duration::from_secs(300);

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_claimers_never_share_a_row() {
    let dir = tempdir().unwrap();
    let db_path = dir.path().join("cmdq.db");

    let seed = SqliteStore::new(&db_path);
    for i in 0..200 {
        seed.enqueue(&NewQueuedCommand::new("job run", format!("--n={}", i)))
            .await
            .unwrap();
    }

    let mut tasks = Vec::new();
    for _ in 0..4 {
        let store = Arc::new(SqliteStore::new(&db_path));
        tasks.push(tokio::spawn(async move {
            let mut ids = Vec::new();
            loop {
                let batch = store.claim_batch(7, LEASE).await.unwrap();
                if batch.is_empty() {
                    break;
                }
                ids.extend(batch.into_iter().map(|c| c.id));
            }
            ids
        }));
    }

    let mut seen = HashSet::new();
    let mut total = 0;
    for task in tasks {
        for id in task.await.unwrap() {
            assert!(seen.insert(id), "row {} was claimed twice", id);
            total += 1;
        }
    }
    assert_eq!(total, 200);

    let processing = seed.list(Some(QueueState::Processing), 500).await.unwrap();
    assert_eq!(processing.len(), 200);
}

#[tokio::test]
async fn test_second_store_sees_first_store_rows() {
    let dir = tempdir().unwrap();
    let db_path = dir.path().join("cmdq.db");
    let writer = SqliteStore::new(&db_path);
    let reader = SqliteStore::new(&db_path);

    let id = writer
        .enqueue(&NewQueuedCommand::new("orden pagar", "--orderId=5"))
        .await
        .unwrap();

    let claimed = reader.claim_batch(10, LEASE).await.unwrap();
    assert_eq!(claimed.len(), 1);
    assert_eq!(claimed[0].id, id);
    assert_eq!(claimed[0].args, "--orderId=5");
}

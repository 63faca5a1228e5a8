//! Property-style tests over the public orchestrator API

use std::sync::Arc;

use orchestrator::core::partition;
use orchestrator::{ExecutionRegistry, ExecutionUpdate, RegistryConfig};
use shared::{EntityResult, ExecutionId, ExecutionStatus, RelationshipFinding};
use tokio_test::assert_ok;

mod common;
use common::TestFixtures;

#[test]
fn test_partition_assigns_every_entity_once() {
    for entity_count in 0..20 {
        for pool_count in 1..7 {
            let entities = TestFixtures::entities(entity_count);
            let pools = partition(&entities, pool_count).unwrap();

            assert_eq!(pools.len(), pool_count);
            let mut flattened: Vec<_> = pools.iter().flat_map(|p| p.entities.iter().cloned()).collect();
            flattened.sort_by(|a, b| a.name.cmp(&b.name));
            assert_eq!(flattened, entities);

            for pool in &pools {
                for pair in pool.entities.windows(2) {
                    assert!(pair[0].name < pair[1].name, "pool {} lost input order", pool.index);
                }
            }
        }
    }
}

/// Pools report progress concurrently and out of order; the stored count only rises
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_progress_is_monotonic() {
    let registry = Arc::new(ExecutionRegistry::new(RegistryConfig::default()));
    let id = ExecutionId::new("concurrent");
    assert_ok!(registry.create(id.clone(), "owner", TestFixtures::INSTITUTION, 400).await);

    let mut handles = Vec::new();
    for pool in 0..4usize {
        let registry = Arc::clone(&registry);
        let id = id.clone();
        handles.push(tokio::spawn(async move {
            let mut observed = Vec::new();
            for step in 0..100usize {
                // interleaved, non-monotonic inputs across pools
                let processed = step * 4 + (3 - pool);
                let result = EntityResult::found(format!("e-{pool}-{step}"), pool, 1, RelationshipFinding::default());
                let snapshot = registry.update(&id, ExecutionUpdate::progress(processed, result)).await.unwrap();
                observed.push(snapshot.processed);
            }
            observed
        }));
    }

    for handle in handles {
        let observed = handle.await.unwrap();
        assert!(observed.windows(2).all(|w| w[0] <= w[1]));
    }

    let snapshot = registry.get(&id).await.unwrap();
    assert_eq!(snapshot.processed, 399);
    assert_eq!(snapshot.results.len(), 400);
    assert_eq!(snapshot.status, ExecutionStatus::Pending);
}

#[tokio::test]
async fn test_history_bound_holds_at_configured_size() {
    let max_history_size = 100;
    let registry = ExecutionRegistry::new(RegistryConfig {
        max_history_size,
        ..RegistryConfig::default()
    });

    for i in 0..(max_history_size + 25) {
        let id = ExecutionId::new(format!("run-{i:04}"));
        assert_ok!(registry.create(id.clone(), "owner", TestFixtures::INSTITUTION, 1).await);
        assert_ok!(registry.update(&id, ExecutionUpdate::status(ExecutionStatus::Failed)).await);
    }

    assert_eq!(registry.history_len().await, max_history_size);
    assert!(registry.get(&ExecutionId::new("run-0024")).await.is_none());
    assert!(registry.get(&ExecutionId::new("run-0025")).await.is_some());
}

//! Round-robin credential pool partitioning

use shared::Entity;

use crate::error::{OrchestratorError, OrchestratorResult};
use crate::types::Pool;

/// Split entities across `pool_count` pools
///
/// The entity at position `i` lands in pool `i % pool_count`, keeping the
/// input's relative order inside every pool. Pools may be empty when there
/// are fewer entities than credentials.
pub fn partition(entities: &[Entity], pool_count: usize) -> OrchestratorResult<Vec<Pool>> {
    if pool_count == 0 {
        return Err(OrchestratorError::Partition {
            message: "cannot partition entities across zero credentials".to_string(),
        });
    }

    let mut pools: Vec<Pool> = (0..pool_count)
        .map(|index| Pool {
            index,
            entities: Vec::with_capacity(entities.len() / pool_count + 1),
        })
        .collect();

    for (position, entity) in entities.iter().enumerate() {
        pools[position % pool_count].entities.push(entity.clone());
    }

    Ok(pools)
}

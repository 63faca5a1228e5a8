//! Sequential per-credential pool worker
//!
//! A pool issues at most one provider call at a time. Failures of a single
//! entity never abort the pool; every entity ends with exactly one result
//! slot, either a finding or a failure placeholder.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use shared::{Entity, EntityResult, FailureReason};
use tokio::time::{sleep, timeout};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::config::{ProviderSettings, SearchConfig};
use crate::core::backoff::backoff_delay;
use crate::core::classifier::{retry_decision, ErrorLog, RetryDecision};
use crate::core::query::build_query;
use crate::traits::{AnswerParser, DiscoveryProvider, ProgressObserver};
use crate::types::{ApiFailure, BatchRequest, Credential, Pool, ProgressUpdate};

/// Everything a pool needs that is shared across the batch
#[derive(Clone)]
pub struct PoolContext {
    pub provider: Arc<dyn DiscoveryProvider>,
    pub parser: Arc<dyn AnswerParser>,
    pub error_log: Arc<ErrorLog>,
    pub observer: Arc<dyn ProgressObserver>,
    pub settings: Arc<ProviderSettings>,
    pub config: SearchConfig,
    pub batch: Arc<BatchRequest>,
    /// Entities finished across all pools
    pub global_completed: Arc<AtomicUsize>,
    pub token: CancellationToken,
}

/// Result of driving one entity to a terminal outcome
enum EntityOutcome {
    Done(EntityResult),
    Cancelled { attempts: u32 },
}

/// Run every entity of `pool` in order with `credential`
///
/// Returns one result per entity, in pool order. Entities not reached
/// before cancellation become cancelled placeholders without a progress
/// callback.
pub async fn run_pool(ctx: PoolContext, pool: Pool, credential: Credential) -> Vec<EntityResult> {
    let pool_total = pool.len();
    let total = ctx.batch.entities.len();
    let mut results = Vec::with_capacity(pool_total);
    let mut pool_completed = 0;

    debug!(pool = pool.index, credential = %credential.label, entities = pool_total, "Pool started");

    for entity in &pool.entities {
        if ctx.token.is_cancelled() {
            results.push(cancelled_placeholder(entity, pool.index, 0));
            continue;
        }

        match search_entity(&ctx, &credential, pool.index, entity).await {
            EntityOutcome::Done(result) => {
                pool_completed += 1;
                let global_completed = ctx.global_completed.fetch_add(1, Ordering::SeqCst) + 1;

                ctx.observer
                    .on_progress(ProgressUpdate {
                        pool_index: pool.index,
                        pool_completed,
                        pool_total,
                        global_completed,
                        total,
                        result: result.clone(),
                    })
                    .await;
                results.push(result);
            }
            EntityOutcome::Cancelled { attempts } => {
                results.push(cancelled_placeholder(entity, pool.index, attempts));
            }
        }
    }

    debug!(pool = pool.index, completed = pool_completed, "Pool finished");
    results
}

async fn search_entity(ctx: &PoolContext, credential: &Credential, pool_index: usize, entity: &Entity) -> EntityOutcome {
    let batch = &ctx.batch;
    let query = build_query(&batch.target_institution, batch.region.as_deref(), entity);
    let date_range = ctx.config.date_range.as_ref().or(batch.date_range.as_ref());
    let request = ctx.settings.request_for(query, date_range);

    let mut attempts = 0u32;
    loop {
        attempts += 1;

        let call = tokio::select! {
            biased;
            _ = ctx.token.cancelled() => return EntityOutcome::Cancelled { attempts },
            call = timeout(ctx.config.per_call_timeout, ctx.provider.search(credential, &request)) => call,
        };

        let failure = match call {
            Ok(Ok(response)) => match ctx.parser.parse(entity, &response) {
                Ok(finding) => {
                    return EntityOutcome::Done(EntityResult::found(&entity.name, pool_index, attempts, finding));
                }
                Err(failure) => failure,
            },
            Ok(Err(failure)) => failure,
            Err(_elapsed) => ApiFailure::Timeout,
        };

        let reason = match retry_decision(&failure) {
            RetryDecision::Retry { floor } if attempts <= ctx.config.max_retries => {
                let delay = backoff_delay(attempts - 1, floor);
                warn!(
                    pool = pool_index,
                    entity = %entity.name,
                    attempt = attempts,
                    delay_ms = delay.as_millis() as u64,
                    "Retrying after {}",
                    failure
                );

                tokio::select! {
                    biased;
                    _ = ctx.token.cancelled() => return EntityOutcome::Cancelled { attempts },
                    _ = sleep(delay) => {}
                }
                continue;
            }
            RetryDecision::Retry { .. } => FailureReason::RetriesExhausted,
            RetryDecision::Fail => FailureReason::NonRetryable,
        };

        let context = format!("pool {pool_index} entity {}", entity.name);
        let severity = ctx.error_log.report_failure(context, &failure);
        warn!(
            pool = pool_index,
            entity = %entity.name,
            attempts,
            ?severity,
            ?reason,
            "Entity search failed: {}",
            failure
        );

        return EntityOutcome::Done(EntityResult::placeholder(
            &entity.name,
            pool_index,
            attempts,
            reason,
            failure.to_string(),
        ));
    }
}

fn cancelled_placeholder(entity: &Entity, pool_index: usize, attempts: u32) -> EntityResult {
    EntityResult::placeholder(&entity.name, pool_index, attempts, FailureReason::Cancelled, "search cancelled")
}

//! Batch search orchestrator
//!
//! Partitions the entity list across credentials, runs one sequential pool
//! per credential concurrently, and bounds the whole batch with a ceiling
//! timeout. Collaborators are injected so tests can drive the orchestrator
//! with scripted providers.

use std::pin::pin;
use std::sync::atomic::AtomicUsize;
use std::sync::Arc;

use futures_util::future::join_all;
use shared::logging::{self, Component};
use shared::EntityResult;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::{ProviderSettings, SearchConfig};
use crate::core::classifier::ErrorLog;
use crate::core::partition::partition;
use crate::core::pool::{run_pool, PoolContext};
use crate::error::{AbortReason, OrchestratorError, OrchestratorResult};
use crate::traits::{AnswerParser, DiscoveryProvider, ProgressObserver};
use crate::types::{BatchRequest, Credential};

/// Runs relationship-discovery batches against an injected provider
#[derive(Clone)]
pub struct SearchOrchestrator {
    provider: Arc<dyn DiscoveryProvider>,
    parser: Arc<dyn AnswerParser>,
    settings: Arc<ProviderSettings>,
    error_log: Arc<ErrorLog>,
}

impl SearchOrchestrator {
    /// Create new orchestrator with injected dependencies
    pub fn new(provider: Arc<dyn DiscoveryProvider>, parser: Arc<dyn AnswerParser>, settings: ProviderSettings) -> Self {
        Self {
            provider,
            parser,
            settings: Arc::new(settings),
            error_log: Arc::new(ErrorLog::default()),
        }
    }

    /// Share an existing error log instead of the private default
    pub fn with_error_log(mut self, error_log: Arc<ErrorLog>) -> Self {
        self.error_log = error_log;
        self
    }

    pub fn error_log(&self) -> Arc<ErrorLog> {
        Arc::clone(&self.error_log)
    }

    /// Search every entity of `request` for a relationship with its target
    ///
    /// The returned list is the concatenation of each pool's results in pool
    /// order, not the original entity order. Per-entity failures are kept as
    /// placeholders. The batch only fails as a whole on caller cancellation,
    /// ceiling timeout or a pool task failure; aborts carry the partial
    /// results.
    pub async fn run_search(
        &self,
        request: BatchRequest,
        credentials: &[Credential],
        config: &SearchConfig,
        cancel_token: CancellationToken,
        observer: Arc<dyn ProgressObserver>,
    ) -> OrchestratorResult<Vec<EntityResult>> {
        config.validate()?;
        if credentials.is_empty() {
            return Err(OrchestratorError::NoCredentials);
        }

        let total = request.entities.len();
        let pools = partition(&request.entities, credentials.len())?;
        info!(
            target_institution = %request.target_institution,
            entities = total,
            pools = pools.len(),
            "Starting search batch"
        );

        // Child token so the ceiling can stop pools without touching the caller's token
        let batch_token = cancel_token.child_token();
        let context = PoolContext {
            provider: Arc::clone(&self.provider),
            parser: Arc::clone(&self.parser),
            error_log: Arc::clone(&self.error_log),
            observer,
            settings: Arc::clone(&self.settings),
            config: config.clone(),
            batch: Arc::new(request),
            global_completed: Arc::new(AtomicUsize::new(0)),
            token: batch_token.clone(),
        };

        let handles: Vec<_> = pools
            .into_iter()
            .zip(credentials.iter().cloned())
            .map(|(pool, credential)| tokio::spawn(run_pool(context.clone(), pool, credential)))
            .collect();

        let mut all_pools = pin!(join_all(handles));
        let (joined, ceiling_hit) = tokio::select! {
            joined = &mut all_pools => (joined, false),
            _ = sleep(config.ceiling_timeout) => {
                warn!(ceiling_secs = config.ceiling_timeout.as_secs(), "Ceiling timeout reached, aborting pools");
                batch_token.cancel();
                (all_pools.await, true)
            }
        };

        let mut results = Vec::with_capacity(total);
        for (pool_index, outcome) in joined.into_iter().enumerate() {
            match outcome {
                Ok(pool_results) => results.extend(pool_results),
                Err(join_error) => {
                    batch_token.cancel();
                    logging::log_error(Component::Orchestrator, &format!("Pool {pool_index} task"), &join_error);
                    let message = join_error.to_string();
                    return Err(OrchestratorError::PoolTaskFailed { pool_index, message });
                }
            }
        }

        if ceiling_hit {
            return Err(OrchestratorError::BatchAborted {
                reason: AbortReason::CeilingTimeout(config.ceiling_timeout),
                results,
            });
        }

        if cancel_token.is_cancelled() && results.iter().any(EntityResult::is_cancelled) {
            debug!(results = results.len(), "Search batch cancelled by caller");
            return Err(OrchestratorError::BatchAborted {
                reason: AbortReason::Cancelled,
                results,
            });
        }

        let found = results.iter().filter(|r| r.finding().is_some()).count();
        info!(results = results.len(), found, "Search batch finished");
        Ok(results)
    }
}

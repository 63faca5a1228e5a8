//! Search lifecycle controller
//!
//! Owns the glue between the execution registry, the orchestrator and the
//! progress sink: creates the execution, runs the batch in the background,
//! turns pool callbacks into registry updates and events, and maps the batch
//! outcome onto the terminal transition.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use orchestrator::{
    AbortReason, BatchRequest, Credential, ErrorLog, ExecutionMetrics, ExecutionRegistry, ExecutionSnapshot, ExecutionUpdate,
    OrchestratorError, ProgressObserver, ProgressUpdate, SearchConfig, SearchOrchestrator,
};
use serde_json::json;
use shared::{execution_debug, execution_error, execution_info, execution_warn};
use shared::{EntityResult, ExecutionId, ExecutionStatus};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::error::{WebServerError, WebServerResult};
use crate::traits::ProgressSink;
use crate::types::StartSearchRequest;

/// Delay before the post-cancel safety net runs
pub const FORCE_CLEANUP_DELAY: Duration = Duration::from_secs(5);

/// A search accepted by [`SearchService::start_search`]
#[derive(Debug)]
pub struct StartedSearch {
    pub snapshot: ExecutionSnapshot,
    /// Background batch; finishes after the terminal event was sent
    pub task: JoinHandle<()>,
}

#[derive(Clone)]
pub struct SearchService {
    registry: Arc<ExecutionRegistry>,
    orchestrator: SearchOrchestrator,
    sink: Arc<dyn ProgressSink>,
    credentials: Arc<[Credential]>,
    search_config: SearchConfig,
    cleanup_delay: Duration,
}

impl SearchService {
    pub fn new(
        registry: Arc<ExecutionRegistry>,
        orchestrator: SearchOrchestrator,
        sink: Arc<dyn ProgressSink>,
        credentials: Vec<Credential>,
        search_config: SearchConfig,
    ) -> Self {
        Self {
            registry,
            orchestrator,
            sink,
            credentials: credentials.into(),
            search_config,
            cleanup_delay: FORCE_CLEANUP_DELAY,
        }
    }

    pub fn with_cleanup_delay(mut self, delay: Duration) -> Self {
        self.cleanup_delay = delay;
        self
    }

    pub fn registry(&self) -> &Arc<ExecutionRegistry> {
        &self.registry
    }

    /// Rolling log shared with the orchestrator's pools
    pub fn error_log(&self) -> Arc<ErrorLog> {
        self.orchestrator.error_log()
    }

    pub fn credential_count(&self) -> usize {
        self.credentials.len()
    }

    /// Accept a batch and start it in the background
    ///
    /// The execution is created `pending` and advanced to `processing` before
    /// any pool work begins.
    pub async fn start_search(&self, request: StartSearchRequest) -> WebServerResult<StartedSearch> {
        if request.owner_id.trim().is_empty() {
            return Err(WebServerError::invalid("ownerId must not be empty"));
        }
        if request.target_institution.trim().is_empty() {
            return Err(WebServerError::invalid("targetInstitution must not be empty"));
        }
        if request.entities.is_empty() {
            return Err(WebServerError::invalid("entities must not be empty"));
        }
        if request.entities.iter().any(|e| e.name.trim().is_empty()) {
            return Err(WebServerError::invalid("entity names must not be empty"));
        }
        let config = self.search_config.clone().with_date_range(request.date_range);
        config.validate()?;
        if self.credentials.is_empty() {
            return Err(WebServerError::Orchestrator(OrchestratorError::NoCredentials));
        }

        let execution_id = request.execution_id.unwrap_or_else(ExecutionId::generate);
        let total = request.entities.len();
        self.registry
            .create(execution_id.clone(), request.owner_id, request.target_institution.clone(), total)
            .await?;
        self.sink.reset_execution(&execution_id);

        let token = self
            .registry
            .cancellation_token(&execution_id)
            .await
            .ok_or_else(|| OrchestratorError::not_found(&execution_id))?;
        let snapshot = self
            .registry
            .update(&execution_id, ExecutionUpdate::status(ExecutionStatus::Processing))
            .await?;

        let pools = self.credentials.len().min(total);
        self.sink
            .send_custom(
                &execution_id,
                "search".to_string(),
                "started".to_string(),
                format!("Searching {total} entities across {pools} credential pools"),
                Some(json!({ "totalEntities": total, "pools": pools })),
            )
            .await;
        execution_info!(execution_id, total, pools, "🔍 Search started");

        let batch = BatchRequest {
            target_institution: request.target_institution,
            region: request.region,
            entities: request.entities,
            date_range: request.date_range,
        };
        let service = self.clone();
        let task = tokio::spawn(async move {
            service.run_execution(execution_id, batch, config, token).await;
        });

        Ok(StartedSearch { snapshot, task })
    }

    async fn run_execution(
        &self,
        execution_id: ExecutionId,
        batch: BatchRequest,
        config: SearchConfig,
        token: CancellationToken,
    ) {
        let total = batch.entities.len();
        let observer = Arc::new(ExecutionObserver::new(
            execution_id.clone(),
            Arc::clone(&self.registry),
            Arc::clone(&self.sink),
        ));

        let outcome = self
            .orchestrator
            .run_search(batch, &self.credentials, &config, token, observer)
            .await;

        match outcome {
            Ok(results) => self.complete(&execution_id, &results).await,
            Err(OrchestratorError::BatchAborted {
                reason: AbortReason::Cancelled,
                results,
            }) => {
                execution_info!(execution_id, finished = results.len(), "Search batch stopped by cancellation");
                self.registry.cancel(&execution_id).await;
                self.sink.send_cancellation(&execution_id).await;
            }
            Err(error) => {
                let processed = self.registry.get(&execution_id).await.map(|s| s.processed);
                self.fail(&execution_id, &error, processed, total).await;
            }
        }
    }

    async fn complete(&self, execution_id: &ExecutionId, results: &[EntityResult]) {
        match self
            .registry
            .update(execution_id, ExecutionUpdate::status(ExecutionStatus::Completed))
            .await
        {
            Ok(snapshot) => {
                let duration_ms = snapshot
                    .ended_at
                    .map(|ended| (ended - snapshot.started_at).num_milliseconds().max(0) as u64)
                    .unwrap_or_default();
                execution_info!(
                    execution_id,
                    results = results.len(),
                    found = snapshot.found,
                    duration_ms,
                    "✅ Search completed"
                );
                self.sink.send_completion(execution_id, results.len(), duration_ms).await;
            }
            Err(e) => {
                // cancelled or swept while the last pool was finishing
                execution_debug!(execution_id, error = %e, "Completion for inactive execution ignored");
            }
        }
    }

    async fn fail(&self, execution_id: &ExecutionId, error: &OrchestratorError, processed: Option<usize>, total: usize) {
        execution_error!(execution_id, error = %error, "❌ Search failed");
        self.orchestrator
            .error_log()
            .report_message(format!("execution {execution_id}"), error.to_string());

        if let Err(e) = self
            .registry
            .update(execution_id, ExecutionUpdate::status(ExecutionStatus::Failed))
            .await
        {
            execution_debug!(execution_id, error = %e, "Failure for inactive execution ignored");
            return;
        }
        self.sink
            .send_error(execution_id, error.to_string(), processed, Some(total))
            .await;
    }

    /// Cancel an active execution
    ///
    /// Emits `cancelled` and schedules the force-cleanup safety net. Returns
    /// `NotFound` when the execution is not active.
    ///
    /// The safety net always closes the execution's subscriber connections,
    /// but it only force-cleans the registry record if the execution is still
    /// active when it fires. A normally archived cancellation stays in history
    /// so `GET /api/searches/:id` keeps answering `cancelled`.
    pub async fn cancel_search(&self, execution_id: &ExecutionId) -> WebServerResult<JoinHandle<()>> {
        if !self.registry.cancel(execution_id).await {
            return Err(WebServerError::NotFound {
                execution_id: execution_id.clone(),
            });
        }
        self.sink.send_cancellation(execution_id).await;
        Ok(self.schedule_force_cleanup(execution_id.clone()))
    }

    fn schedule_force_cleanup(&self, execution_id: ExecutionId) -> JoinHandle<()> {
        let registry = Arc::clone(&self.registry);
        let sink = Arc::clone(&self.sink);
        let delay = self.cleanup_delay;
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if registry.is_active(&execution_id).await {
                execution_warn!(execution_id, "Execution still active after cancel, forcing cleanup");
                registry.force_cleanup(&execution_id).await;
            }
            sink.close_execution(&execution_id).await;
        })
    }

    pub async fn get_search(&self, execution_id: &ExecutionId) -> WebServerResult<ExecutionSnapshot> {
        self.registry.get(execution_id).await.ok_or_else(|| WebServerError::NotFound {
            execution_id: execution_id.clone(),
        })
    }

    pub async fn metrics(&self) -> ExecutionMetrics {
        self.registry.metrics().await
    }
}

/// Turns pool callbacks into registry updates and subscriber events
///
/// Pools report from separate tasks, so recording and emitting happen under
/// one lock and events carry the count the registry recorded. Subscribers
/// never see `current` go backwards.
pub(crate) struct ExecutionObserver {
    execution_id: ExecutionId,
    registry: Arc<ExecutionRegistry>,
    sink: Arc<dyn ProgressSink>,
    emit: Mutex<()>,
}

impl ExecutionObserver {
    pub(crate) fn new(execution_id: ExecutionId, registry: Arc<ExecutionRegistry>, sink: Arc<dyn ProgressSink>) -> Self {
        Self {
            execution_id,
            registry,
            sink,
            emit: Mutex::new(()),
        }
    }
}

#[async_trait]
impl ProgressObserver for ExecutionObserver {
    async fn on_progress(&self, update: ProgressUpdate) {
        let id = &self.execution_id;
        let _emitting = self.emit.lock().await;
        let recorded = self
            .registry
            .update(id, ExecutionUpdate::progress(update.global_completed, update.result.clone()))
            .await;
        let current = match recorded {
            Ok(snapshot) => snapshot.processed,
            Err(e) => {
                execution_debug!(id, error = %e, "Progress for inactive execution dropped");
                return;
            }
        };

        let entity = update.result.entity_name.clone();
        self.sink
            .send_progress(
                id,
                current,
                update.total,
                format!("Processed {entity} ({current}/{})", update.total),
                Some(update.pool_index),
                Some(entity),
            )
            .await;
        self.sink
            .send_new_result(id, &update.result, current, update.total, Some(update.pool_index))
            .await;
    }
}

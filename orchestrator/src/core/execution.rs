//! Execution lifecycle state machine
//!
//! Every execution lives in exactly one of two registries: `active` while it
//! is pending or processing, `history` once it reaches a terminal status.
//! Each registry has its own lock. Archival takes `active` then `history` and
//! holds both until the record has moved, so readers never observe a record
//! in neither registry.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use shared::{execution_debug, execution_info, execution_warn};
use shared::{EntityResult, ExecutionId, ExecutionStatus};
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::config::RegistryConfig;
use crate::error::{OrchestratorError, OrchestratorResult};

/// One search run
#[derive(Debug, Clone)]
pub struct Execution {
    pub id: ExecutionId,
    pub owner_id: String,
    pub target_institution: String,
    pub total_entities: usize,
    pub processed: usize,
    pub found: usize,
    pub status: ExecutionStatus,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    pub cancelled: bool,
    pub cancel_token: CancellationToken,
    pub results: Vec<EntityResult>,
}

impl Execution {
    fn new(id: ExecutionId, owner_id: String, target_institution: String, total_entities: usize) -> Self {
        Self {
            id,
            owner_id,
            target_institution,
            total_entities,
            processed: 0,
            found: 0,
            status: ExecutionStatus::Pending,
            started_at: Utc::now(),
            ended_at: None,
            cancelled: false,
            cancel_token: CancellationToken::new(),
            results: Vec::new(),
        }
    }

    pub fn duration_ms(&self) -> Option<i64> {
        self.ended_at
            .map(|ended| (ended - self.started_at).num_milliseconds())
    }

    pub fn snapshot(&self) -> ExecutionSnapshot {
        ExecutionSnapshot {
            id: self.id.clone(),
            owner_id: self.owner_id.clone(),
            target_institution: self.target_institution.clone(),
            total_entities: self.total_entities,
            processed: self.processed,
            found: self.found,
            status: self.status,
            started_at: self.started_at,
            ended_at: self.ended_at,
            cancelled: self.cancelled,
            results: self.results.clone(),
        }
    }

    fn finish(&mut self, status: ExecutionStatus) {
        self.status = status;
        self.ended_at = Some(Utc::now());
    }
}

/// Read-only copy of an execution, safe to hand out and serialize
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionSnapshot {
    pub id: ExecutionId,
    pub owner_id: String,
    pub target_institution: String,
    pub total_entities: usize,
    pub processed: usize,
    pub found: usize,
    pub status: ExecutionStatus,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    pub cancelled: bool,
    pub results: Vec<EntityResult>,
}

/// Partial update merged into an active execution
#[derive(Debug, Clone, Default)]
pub struct ExecutionUpdate {
    pub status: Option<ExecutionStatus>,
    /// Ignored when lower than the current value
    pub processed: Option<usize>,
    pub found_increment: usize,
    pub append_results: Vec<EntityResult>,
}

impl ExecutionUpdate {
    pub fn status(status: ExecutionStatus) -> Self {
        Self {
            status: Some(status),
            ..Self::default()
        }
    }

    /// Progress from one entity outcome
    pub fn progress(processed: usize, result: EntityResult) -> Self {
        let found_increment = usize::from(result.finding().is_some_and(|f| f.has_relationship()));
        Self {
            status: None,
            processed: Some(processed),
            found_increment,
            append_results: vec![result],
        }
    }
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionMetrics {
    pub pending: usize,
    pub processing: usize,
    pub completed: usize,
    pub failed: usize,
    pub cancelled: usize,
    pub average_duration_ms: Option<f64>,
    pub total_processed: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub stale_cancelled: Vec<ExecutionId>,
    pub purged: usize,
}

/// Insertion-ordered terminal records with FIFO eviction
#[derive(Debug, Default)]
struct History {
    records: HashMap<ExecutionId, Execution>,
    order: VecDeque<ExecutionId>,
}

impl History {
    fn insert(&mut self, execution: Execution, max_size: usize) {
        let id = execution.id.clone();
        if self.records.insert(id.clone(), execution).is_some() {
            self.order.retain(|existing| existing != &id);
        }
        self.order.push_back(id);

        while self.order.len() > max_size {
            if let Some(oldest) = self.order.pop_front() {
                self.records.remove(&oldest);
                debug!(execution = %oldest, "Evicted oldest execution from history");
            }
        }
    }

    fn remove(&mut self, id: &ExecutionId) -> Option<Execution> {
        let removed = self.records.remove(id);
        if removed.is_some() {
            self.order.retain(|existing| existing != id);
        }
        removed
    }
}

/// Registry of active and archived executions
#[derive(Debug)]
pub struct ExecutionRegistry {
    config: RegistryConfig,
    active: RwLock<HashMap<ExecutionId, Execution>>,
    history: RwLock<History>,
    total_processed: AtomicU64,
}

impl ExecutionRegistry {
    pub fn new(config: RegistryConfig) -> Self {
        Self {
            config,
            active: RwLock::new(HashMap::new()),
            history: RwLock::new(History::default()),
            total_processed: AtomicU64::new(0),
        }
    }

    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }

    /// Register a new pending execution
    ///
    /// Fails with `Conflict` if the id is already active. A history record
    /// with the same id is superseded.
    pub async fn create(
        &self,
        id: ExecutionId,
        owner_id: impl Into<String>,
        target_institution: impl Into<String>,
        total_entities: usize,
    ) -> OrchestratorResult<ExecutionSnapshot> {
        let mut active = self.active.write().await;
        if active.contains_key(&id) {
            return Err(OrchestratorError::Conflict { execution_id: id });
        }

        let stale = self.history.write().await.remove(&id);
        if stale.is_some() {
            execution_debug!(id, "Superseding archived execution with the same id");
        }

        let execution = Execution::new(id.clone(), owner_id.into(), target_institution.into(), total_entities);
        let snapshot = execution.snapshot();
        active.insert(id.clone(), execution);

        execution_info!(id, total_entities, "Execution created");
        Ok(snapshot)
    }

    /// Look up an execution in either registry
    pub async fn get(&self, id: &ExecutionId) -> Option<ExecutionSnapshot> {
        if let Some(execution) = self.active.read().await.get(id) {
            return Some(execution.snapshot());
        }
        self.history.read().await.records.get(id).map(Execution::snapshot)
    }

    pub async fn is_active(&self, id: &ExecutionId) -> bool {
        self.active.read().await.contains_key(id)
    }

    /// Cancellation token of an active execution
    pub async fn cancellation_token(&self, id: &ExecutionId) -> Option<CancellationToken> {
        self.active.read().await.get(id).map(|e| e.cancel_token.clone())
    }

    /// Merge a partial update into an active execution
    ///
    /// A terminal status sets the end time and archives the record in the
    /// same critical section.
    pub async fn update(&self, id: &ExecutionId, update: ExecutionUpdate) -> OrchestratorResult<ExecutionSnapshot> {
        let mut active = self.active.write().await;
        let execution = active.get_mut(id).ok_or_else(|| OrchestratorError::not_found(id))?;

        // pending -> processing -> terminal; never back to pending
        if update.status == Some(ExecutionStatus::Pending) && execution.status != ExecutionStatus::Pending {
            return Err(OrchestratorError::InvalidTransition {
                execution_id: id.clone(),
                from: execution.status,
                to: ExecutionStatus::Pending,
            });
        }

        if let Some(processed) = update.processed {
            execution.processed = execution.processed.max(processed).min(execution.total_entities);
        }
        execution.found += update.found_increment;
        execution.results.extend(update.append_results);

        match update.status {
            Some(status) if status.is_terminal() => {
                execution.finish(status);
                if status == ExecutionStatus::Cancelled {
                    execution.cancelled = true;
                    execution.cancel_token.cancel();
                }
                let snapshot = execution.snapshot();
                self.archive_locked(&mut active, id).await;
                execution_info!(id, status = %status, "Execution reached terminal state");
                Ok(snapshot)
            }
            Some(status) => {
                execution.status = status;
                Ok(execution.snapshot())
            }
            None => Ok(execution.snapshot()),
        }
    }

    /// Cancel an active execution
    ///
    /// Returns `false` when the id is not active, including when it was
    /// already cancelled and archived.
    pub async fn cancel(&self, id: &ExecutionId) -> bool {
        let mut active = self.active.write().await;
        let Some(execution) = active.get_mut(id) else {
            return false;
        };

        execution.cancelled = true;
        execution.finish(ExecutionStatus::Cancelled);
        execution.cancel_token.cancel();
        self.archive_locked(&mut active, id).await;

        execution_info!(id, "Execution cancelled");
        true
    }

    /// Remove an execution from both registries unconditionally
    pub async fn force_cleanup(&self, id: &ExecutionId) -> bool {
        let mut active = self.active.write().await;
        let removed_active = active.remove(id);
        if let Some(execution) = &removed_active {
            execution.cancel_token.cancel();
        }
        let removed_history = self.history.write().await.remove(id);

        let removed = removed_active.is_some() || removed_history.is_some();
        if removed {
            execution_warn!(id, "Execution force-cleaned");
        }
        removed
    }

    /// Archive stale active records and purge expired history
    pub async fn sweep(&self, now: DateTime<Utc>) -> SweepReport {
        let staleness = to_chrono(self.config.staleness_threshold);
        let retention = to_chrono(self.config.history_retention);

        let mut report = SweepReport::default();

        {
            let mut active = self.active.write().await;
            let stale: Vec<ExecutionId> = active
                .values()
                .filter(|e| now - e.started_at > staleness)
                .map(|e| e.id.clone())
                .collect();

            for id in stale {
                if let Some(execution) = active.get_mut(&id) {
                    execution.cancelled = true;
                    execution.finish(ExecutionStatus::Cancelled);
                    execution.cancel_token.cancel();
                }
                self.archive_locked(&mut active, &id).await;
                execution_warn!(id, "Stale execution force-cancelled by sweep");
                report.stale_cancelled.push(id);
            }
        }

        {
            let mut history = self.history.write().await;
            let expired: Vec<ExecutionId> = history
                .records
                .values()
                .filter(|e| {
                    let reference = e.ended_at.unwrap_or(e.started_at);
                    now - reference > retention
                })
                .map(|e| e.id.clone())
                .collect();

            for id in expired {
                history.remove(&id);
                report.purged += 1;
            }
        }

        if !report.stale_cancelled.is_empty() || report.purged > 0 {
            info!(
                stale = report.stale_cancelled.len(),
                purged = report.purged,
                "Execution sweep finished"
            );
        }
        report
    }

    /// Run [`sweep`](Self::sweep) on the configured interval until `shutdown` fires
    pub fn spawn_sweeper(self: &Arc<Self>, shutdown: CancellationToken) -> JoinHandle<()> {
        let registry = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(registry.config.sweep_interval);
            // first tick completes immediately
            ticker.tick().await;
            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => break,
                    _ = ticker.tick() => {
                        registry.sweep(Utc::now()).await;
                    }
                }
            }
            debug!("Execution sweeper stopped");
        })
    }

    pub async fn metrics(&self) -> ExecutionMetrics {
        let mut metrics = ExecutionMetrics {
            total_processed: self.total_processed.load(Ordering::Relaxed),
            ..ExecutionMetrics::default()
        };

        let active = self.active.read().await;
        let history = self.history.read().await;

        let mut completed_durations = Vec::new();
        for execution in active.values().chain(history.records.values()) {
            match execution.status {
                ExecutionStatus::Pending => metrics.pending += 1,
                ExecutionStatus::Processing => metrics.processing += 1,
                ExecutionStatus::Completed => {
                    metrics.completed += 1;
                    if let Some(duration) = execution.duration_ms() {
                        completed_durations.push(duration as f64);
                    }
                }
                ExecutionStatus::Failed => metrics.failed += 1,
                ExecutionStatus::Cancelled => metrics.cancelled += 1,
            }
        }

        if !completed_durations.is_empty() {
            let total: f64 = completed_durations.iter().sum();
            metrics.average_duration_ms = Some(total / completed_durations.len() as f64);
        }
        metrics
    }

    pub async fn active_ids(&self) -> Vec<ExecutionId> {
        self.active.read().await.keys().cloned().collect()
    }

    pub async fn history_len(&self) -> usize {
        self.history.read().await.order.len()
    }

    /// Cancel every active execution; returns how many were cancelled
    pub async fn shutdown(&self) -> usize {
        let ids = self.active_ids().await;
        let mut cancelled = 0;
        for id in ids {
            if self.cancel(&id).await {
                cancelled += 1;
            }
        }
        info!(cancelled, "Execution registry shut down");
        cancelled
    }

    /// Move a terminal record from `active` to `history`; caller holds `active`
    async fn archive_locked(&self, active: &mut HashMap<ExecutionId, Execution>, id: &ExecutionId) {
        if let Some(execution) = active.remove(id) {
            let mut history = self.history.write().await;
            history.insert(execution, self.config.max_history_size);
            self.total_processed.fetch_add(1, Ordering::Relaxed);
        }
    }
}

/// Out-of-range thresholds saturate to a century
fn to_chrono(duration: std::time::Duration) -> chrono::Duration {
    chrono::Duration::from_std(duration).unwrap_or_else(|_| chrono::Duration::days(36_500))
}

impl Default for ExecutionRegistry {
    fn default() -> Self {
        Self::new(RegistryConfig::default())
    }
}

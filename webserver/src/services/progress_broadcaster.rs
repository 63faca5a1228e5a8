//! Progress broadcaster
//!
//! Keeps the registry of subscriber streams and pushes NDJSON frames to every
//! connection of an execution. Progress delivery never blocks on a slow
//! client: a full buffer drops the frame for that client, a closed one
//! removes it. Terminal events are delivered once per execution, waiting a
//! bounded time for buffer room, and schedule a teardown of that execution's
//! connections after a short grace period.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use futures_util::future::join_all;
use serde_json::Value;
use shared::{ConnectionId, EntityResult, EventFrame, ExecutionId, KeepaliveFrame, ProgressEvent};
use shared::{execution_debug, execution_info, execution_warn};
use tokio::sync::mpsc::error::{SendTimeoutError, TrySendError};
use tokio::sync::{mpsc, RwLock};
use tokio::task::JoinHandle;
use tokio::time::{sleep, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::services::payload::new_result_frame;
use crate::traits::ProgressSink;
use crate::types::{BroadcasterConfig, ClientConnection};

/// Executions remembered as terminated
const TERMINAL_LEDGER_CAPACITY: usize = 1024;

type ConnectionMap = Arc<RwLock<HashMap<ConnectionId, ClientConnection>>>;

/// Outcome of one keepalive round
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PingReport {
    pub pinged: usize,
    pub evicted: usize,
}

/// Insertion-ordered set of executions that already received a terminal event
#[derive(Debug)]
struct TerminalLedger {
    seen: HashSet<ExecutionId>,
    order: VecDeque<ExecutionId>,
    capacity: usize,
}

impl TerminalLedger {
    fn new(capacity: usize) -> Self {
        Self {
            seen: HashSet::new(),
            order: VecDeque::new(),
            capacity,
        }
    }

    /// Returns `false` if the execution was already recorded
    fn record(&mut self, execution_id: &ExecutionId) -> bool {
        if !self.seen.insert(execution_id.clone()) {
            return false;
        }
        self.order.push_back(execution_id.clone());
        while self.order.len() > self.capacity {
            if let Some(oldest) = self.order.pop_front() {
                self.seen.remove(&oldest);
            }
        }
        true
    }

    fn contains(&self, execution_id: &ExecutionId) -> bool {
        self.seen.contains(execution_id)
    }

    fn forget(&mut self, execution_id: &ExecutionId) {
        if self.seen.remove(execution_id) {
            self.order.retain(|existing| existing != execution_id);
        }
    }
}

/// Fan-out of execution events to subscriber streams
#[derive(Debug)]
pub struct ProgressBroadcaster {
    config: BroadcasterConfig,
    connections: ConnectionMap,
    terminal: Mutex<TerminalLedger>,
}

impl ProgressBroadcaster {
    pub fn new(config: BroadcasterConfig) -> Self {
        Self {
            config,
            connections: Arc::new(RwLock::new(HashMap::new())),
            terminal: Mutex::new(TerminalLedger::new(TERMINAL_LEDGER_CAPACITY)),
        }
    }

    pub fn config(&self) -> &BroadcasterConfig {
        &self.config
    }

    fn ledger(&self) -> std::sync::MutexGuard<'_, TerminalLedger> {
        self.terminal.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Register a stream for `execution_id`
    ///
    /// The `connected` frame is queued before this returns. Subscribing to an
    /// execution that already terminated schedules the usual teardown so the
    /// stream does not stay open forever.
    pub async fn subscribe(
        &self,
        execution_id: ExecutionId,
        owner_id: impl Into<String>,
    ) -> (ConnectionId, mpsc::Receiver<String>) {
        let (sender, receiver) = mpsc::channel(self.config.channel_capacity.max(1));
        let connection_id = ConnectionId::new();
        let now = Instant::now();

        let connected = EventFrame::new(
            execution_id.clone(),
            ProgressEvent::Connected {
                connection_id,
                message: format!("Subscribed to execution {execution_id}"),
            },
        );
        match connected.to_ndjson() {
            Ok(line) => {
                // fresh channel with capacity >= 1 always has room
                let _ = sender.try_send(line);
            }
            Err(e) => warn!(error = %e, "Failed to encode connected frame"),
        }

        let connection = ClientConnection {
            id: connection_id,
            execution_id: execution_id.clone(),
            owner_id: owner_id.into(),
            sender,
            connected_at: now,
            last_ping: now,
        };
        self.connections.write().await.insert(connection_id, connection);
        execution_info!(execution_id, connection = %connection_id, "📱 Subscriber connected");

        if self.ledger().contains(&execution_id) {
            self.schedule_teardown(execution_id);
        }
        (connection_id, receiver)
    }

    /// Allow events again for an execution id that is being reused
    pub fn reset_execution(&self, execution_id: &ExecutionId) {
        self.ledger().forget(execution_id);
    }

    /// Push `event` to every connection of `execution_id`
    ///
    /// Returns the number of connections the frame was queued for. Terminal
    /// events are delivered once; anything sent after the terminal event is
    /// dropped.
    pub async fn broadcast(&self, execution_id: &ExecutionId, event: ProgressEvent) -> usize {
        let terminal = event.is_terminal();
        let tag = event.tag();
        if !self.admit(execution_id, terminal, tag) {
            return 0;
        }

        let line = match EventFrame::new(execution_id.clone(), event).to_ndjson() {
            Ok(line) => line,
            Err(e) => {
                execution_warn!(execution_id, error = %e, event = tag, "Failed to encode event");
                return 0;
            }
        };

        let delivered = self.deliver(execution_id, line, terminal).await;
        if terminal {
            self.schedule_teardown(execution_id.clone());
        }
        delivered
    }

    /// Terminal-once gate; records terminal events as a side effect
    fn admit(&self, execution_id: &ExecutionId, terminal: bool, tag: &str) -> bool {
        let mut ledger = self.ledger();
        if ledger.contains(execution_id) {
            execution_debug!(execution_id, event = tag, "Dropping event after terminal event");
            return false;
        }
        if terminal {
            ledger.record(execution_id);
        }
        true
    }

    /// Queue a pre-encoded line on every connection of `execution_id`
    ///
    /// Regular frames use `try_send` and are dropped for a full subscriber.
    /// Terminal frames wait up to the teardown grace period for buffer room.
    async fn deliver(&self, execution_id: &ExecutionId, line: String, terminal: bool) -> usize {
        let targets: Vec<(ConnectionId, mpsc::Sender<String>)> = self
            .connections
            .read()
            .await
            .values()
            .filter(|c| &c.execution_id == execution_id)
            .map(|c| (c.id, c.sender.clone()))
            .collect();

        let mut delivered = 0;
        let mut closed = Vec::new();
        if terminal {
            let grace = self.config.teardown_grace;
            let sends = targets.iter().map(|(id, sender)| {
                let line = line.clone();
                async move { (*id, sender.send_timeout(line, grace).await) }
            });
            for (id, outcome) in join_all(sends).await {
                match outcome {
                    Ok(()) => delivered += 1,
                    Err(SendTimeoutError::Timeout(_)) => {
                        execution_warn!(execution_id, connection = %id, "Subscriber did not drain in time, terminal frame dropped");
                    }
                    Err(SendTimeoutError::Closed(_)) => closed.push(id),
                }
            }
        } else {
            for (id, sender) in &targets {
                match sender.try_send(line.clone()) {
                    Ok(()) => delivered += 1,
                    Err(TrySendError::Full(_)) => {
                        execution_warn!(execution_id, connection = %id, "Subscriber buffer full, frame dropped");
                    }
                    Err(TrySendError::Closed(_)) => closed.push(*id),
                }
            }
        }

        if !closed.is_empty() {
            let mut connections = self.connections.write().await;
            for id in closed {
                connections.remove(&id);
                execution_debug!(execution_id, connection = %id, "Removed closed subscriber");
            }
        }
        delivered
    }

    /// Close the connections of `execution_id` after the grace period
    ///
    /// Only connections that exist when the teardown is scheduled are closed.
    pub fn schedule_teardown(&self, execution_id: ExecutionId) -> JoinHandle<()> {
        let connections = Arc::clone(&self.connections);
        let grace = self.config.teardown_grace;
        let cutoff = Instant::now();
        tokio::spawn(async move {
            sleep(grace).await;
            let removed = remove_execution(&connections, &execution_id, Some(cutoff)).await;
            if removed > 0 {
                execution_debug!(execution_id, removed, "Tore down subscriber connections");
            }
        })
    }

    /// Drop every connection of `execution_id` now
    pub async fn close_execution(&self, execution_id: &ExecutionId) -> usize {
        remove_execution(&self.connections, execution_id, None).await
    }

    /// Drop one connection; used when the client goes away
    pub async fn remove_connection(&self, connection_id: &ConnectionId) -> bool {
        let removed = self.connections.write().await.remove(connection_id);
        if let Some(connection) = &removed {
            execution_debug!(connection.execution_id, connection = %connection_id, "🔌 Subscriber disconnected");
        }
        removed.is_some()
    }

    /// Send a keepalive frame to every connection and evict dead ones
    ///
    /// Closed streams are evicted at once. A full stream is kept until it has
    /// gone `ping_timeout` without a successful ping.
    pub async fn ping_all(&self, now: Instant) -> PingReport {
        let line = match KeepaliveFrame::now().to_ndjson() {
            Ok(line) => line,
            Err(e) => {
                warn!(error = %e, "Failed to encode keepalive frame");
                return PingReport::default();
            }
        };

        let mut report = PingReport::default();
        let mut connections = self.connections.write().await;
        connections.retain(|id, connection| match connection.sender.try_send(line.clone()) {
            Ok(()) => {
                connection.last_ping = now;
                report.pinged += 1;
                true
            }
            Err(TrySendError::Full(_)) if now.saturating_duration_since(connection.last_ping) <= self.config.ping_timeout => true,
            Err(_) => {
                debug!(connection = %id, execution = %connection.execution_id, "Evicting unresponsive subscriber");
                report.evicted += 1;
                false
            }
        });

        if report.evicted > 0 {
            info!(evicted = report.evicted, remaining = connections.len(), "Keepalive sweep evicted subscribers");
        }
        report
    }

    /// Run [`ping_all`](Self::ping_all) every ping interval until `shutdown` fires
    pub fn spawn_keepalive(self: &Arc<Self>, shutdown: CancellationToken) -> JoinHandle<()> {
        let broadcaster = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(broadcaster.config.ping_interval);
            ticker.tick().await;
            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => break,
                    _ = ticker.tick() => {
                        broadcaster.ping_all(Instant::now()).await;
                    }
                }
            }
            debug!("Keepalive task stopped");
        })
    }

    pub async fn connection_count(&self) -> usize {
        self.connections.read().await.len()
    }

    pub async fn connections_for(&self, execution_id: &ExecutionId) -> usize {
        self.connections
            .read()
            .await
            .values()
            .filter(|c| &c.execution_id == execution_id)
            .count()
    }

    /// Close every connection; returns how many were open
    pub async fn shutdown(&self) -> usize {
        let mut connections = self.connections.write().await;
        let closed = connections.len();
        connections.clear();
        info!(closed, "Progress broadcaster shut down");
        closed
    }
}

impl Default for ProgressBroadcaster {
    fn default() -> Self {
        Self::new(BroadcasterConfig::default())
    }
}

async fn remove_execution(
    connections: &ConnectionMap,
    execution_id: &ExecutionId,
    connected_before: Option<Instant>,
) -> usize {
    let mut connections = connections.write().await;
    let before = connections.len();
    connections.retain(|_, c| {
        let matches = &c.execution_id == execution_id
            && connected_before.map_or(true, |cutoff| c.connected_at <= cutoff);
        !matches
    });
    before - connections.len()
}

#[async_trait]
impl ProgressSink for ProgressBroadcaster {
    fn reset_execution(&self, execution_id: &ExecutionId) {
        ProgressBroadcaster::reset_execution(self, execution_id)
    }

    async fn send_progress(
        &self,
        execution_id: &ExecutionId,
        current: usize,
        total: usize,
        message: String,
        api_index: Option<usize>,
        current_entity: Option<String>,
    ) -> usize {
        self.broadcast(
            execution_id,
            ProgressEvent::Progress {
                current,
                total,
                message,
                api_index,
                current_entity,
            },
        )
        .await
    }

    async fn send_new_result(
        &self,
        execution_id: &ExecutionId,
        result: &EntityResult,
        current: usize,
        total: usize,
        api_index: Option<usize>,
    ) -> usize {
        if !self.admit(execution_id, false, "new_result") {
            return 0;
        }
        match new_result_frame(execution_id, result, current, total, api_index, self.config.payload_ceiling) {
            Ok((_, line)) => self.deliver(execution_id, line, false).await,
            Err(e) => {
                execution_warn!(execution_id, error = %e, "Failed to encode new_result event");
                0
            }
        }
    }

    async fn send_completion(&self, execution_id: &ExecutionId, total_results: usize, duration_ms: u64) -> usize {
        self.broadcast(
            execution_id,
            ProgressEvent::Completed {
                total_results,
                duration_ms,
            },
        )
        .await
    }

    async fn send_error(
        &self,
        execution_id: &ExecutionId,
        message: String,
        current: Option<usize>,
        total: Option<usize>,
    ) -> usize {
        self.broadcast(execution_id, ProgressEvent::Error { message, current, total })
            .await
    }

    async fn send_cancellation(&self, execution_id: &ExecutionId) -> usize {
        self.broadcast(execution_id, ProgressEvent::Cancelled).await
    }

    async fn send_custom(
        &self,
        execution_id: &ExecutionId,
        stage: String,
        status: String,
        message: String,
        data: Option<Value>,
    ) -> usize {
        self.broadcast(
            execution_id,
            ProgressEvent::Custom {
                stage,
                status,
                message,
                data,
            },
        )
        .await
    }

    async fn close_execution(&self, execution_id: &ExecutionId) -> usize {
        ProgressBroadcaster::close_execution(self, execution_id).await
    }
}

//! Service trait definitions for dependency injection
//!
//! The controller glue talks to the broadcaster only through `ProgressSink`,
//! so search lifecycle tests can assert on emitted events with a mock.

use async_trait::async_trait;
use serde_json::Value;
use shared::{EntityResult, ExecutionId};

/// Destination of execution lifecycle events
///
/// Every method returns the number of connections the event was delivered to.
#[mockall::automock]
#[async_trait]
pub trait ProgressSink: Send + Sync {
    /// Forget any terminal state recorded for a reused execution id
    fn reset_execution(&self, execution_id: &ExecutionId);

    async fn send_progress(
        &self,
        execution_id: &ExecutionId,
        current: usize,
        total: usize,
        message: String,
        api_index: Option<usize>,
        current_entity: Option<String>,
    ) -> usize;

    async fn send_new_result(
        &self,
        execution_id: &ExecutionId,
        result: &EntityResult,
        current: usize,
        total: usize,
        api_index: Option<usize>,
    ) -> usize;

    /// Terminal; at most once per execution
    async fn send_completion(&self, execution_id: &ExecutionId, total_results: usize, duration_ms: u64) -> usize;

    /// Terminal; at most once per execution
    async fn send_error(
        &self,
        execution_id: &ExecutionId,
        message: String,
        current: Option<usize>,
        total: Option<usize>,
    ) -> usize;

    /// Terminal; at most once per execution
    async fn send_cancellation(&self, execution_id: &ExecutionId) -> usize;

    async fn send_custom(
        &self,
        execution_id: &ExecutionId,
        stage: String,
        status: String,
        message: String,
        data: Option<Value>,
    ) -> usize;

    /// Drop every connection of an execution immediately
    async fn close_execution(&self, execution_id: &ExecutionId) -> usize;
}

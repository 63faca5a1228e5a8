//! REST API handlers
//!
//! JSON endpoints for starting, inspecting and cancelling searches, plus the
//! NDJSON event stream subscribers read progress from.

use std::convert::Infallible;
use std::sync::Arc;

use axum::body::Body;
use axum::extract::{Path, Query, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Json, Response};
use futures_util::stream;
use orchestrator::{ErrorReport, ExecutionSnapshot};
use serde_json::{json, Value};
use shared::{execution_info, ConnectionId, ExecutionId};
use tracing::debug;

use crate::error::{WebServerError, WebServerResult};
use crate::services::ProgressBroadcaster;
use crate::state::AppState;
use crate::types::{EventsQuery, StartSearchRequest, StartSearchResponse};

pub const NDJSON_CONTENT_TYPE: &str = "application/x-ndjson";

/// Start a search - POST /api/searches
pub async fn start_search(
    State(state): State<Arc<AppState>>,
    Json(request): Json<StartSearchRequest>,
) -> WebServerResult<(StatusCode, Json<StartSearchResponse>)> {
    let started = state.search.start_search(request).await?;
    let response = StartSearchResponse {
        execution_id: started.snapshot.id,
        status: started.snapshot.status,
    };
    Ok((StatusCode::ACCEPTED, Json(response)))
}

/// Execution snapshot - GET /api/searches/:id
pub async fn get_search(
    State(state): State<Arc<AppState>>,
    Path(execution_id): Path<String>,
) -> WebServerResult<Json<ExecutionSnapshot>> {
    let snapshot = state.search.get_search(&ExecutionId::new(execution_id)).await?;
    Ok(Json(snapshot))
}

/// Cancel a search - DELETE /api/searches/:id
pub async fn cancel_search(
    State(state): State<Arc<AppState>>,
    Path(execution_id): Path<String>,
) -> WebServerResult<Json<Value>> {
    let execution_id = ExecutionId::new(execution_id);
    // safety net runs detached
    let _cleanup = state.search.cancel_search(&execution_id).await?;
    Ok(Json(json!({
        "executionId": execution_id,
        "status": "cancelled"
    })))
}

/// Event stream - GET /api/searches/:id/events
///
/// One JSON frame per line. The connection is removed from the broadcaster
/// as soon as the client goes away.
pub async fn stream_events(
    State(state): State<Arc<AppState>>,
    Path(execution_id): Path<String>,
    Query(query): Query<EventsQuery>,
) -> WebServerResult<Response> {
    let execution_id = ExecutionId::new(execution_id);
    let snapshot = state
        .registry()
        .get(&execution_id)
        .await
        .ok_or_else(|| WebServerError::NotFound {
            execution_id: execution_id.clone(),
        })?;
    let owner_id = query.owner_id.unwrap_or(snapshot.owner_id);

    let (connection_id, receiver) = state.broadcaster.subscribe(execution_id.clone(), owner_id).await;
    execution_info!(execution_id, connection = %connection_id, "📡 Event stream opened");

    let guard = ConnectionGuard {
        broadcaster: Arc::clone(&state.broadcaster),
        connection_id,
    };
    let frames = stream::unfold((receiver, guard), |(mut receiver, guard)| async move {
        receiver
            .recv()
            .await
            .map(|line| (Ok::<_, Infallible>(line), (receiver, guard)))
    });

    Ok((
        [
            (header::CONTENT_TYPE, NDJSON_CONTENT_TYPE),
            (header::CACHE_CONTROL, "no-cache"),
        ],
        Body::from_stream(frames),
    )
        .into_response())
}

/// Execution metrics - GET /api/metrics
pub async fn metrics(State(state): State<Arc<AppState>>) -> Json<Value> {
    let executions = state.search.metrics().await;
    Json(json!({
        "executions": executions,
        "connections": state.broadcaster.connection_count().await,
        "uptimeSeconds": state.uptime_seconds(),
    }))
}

/// Recent classified errors - GET /api/errors
pub async fn recent_errors(State(state): State<Arc<AppState>>) -> Json<Vec<ErrorReport>> {
    Json(state.search.error_log().recent())
}

/// Health check endpoint
pub async fn health_check(State(state): State<Arc<AppState>>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "credentials": state.search.credential_count(),
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// Removes the subscriber when the response body is dropped
struct ConnectionGuard {
    broadcaster: Arc<ProgressBroadcaster>,
    connection_id: ConnectionId,
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            return;
        };
        let broadcaster = Arc::clone(&self.broadcaster);
        let connection_id = self.connection_id;
        runtime.spawn(async move {
            if broadcaster.remove_connection(&connection_id).await {
                debug!(connection = %connection_id, "Event stream closed by client");
            }
        });
    }
}

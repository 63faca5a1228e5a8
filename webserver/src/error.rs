//! WebServer-specific error types

use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use orchestrator::OrchestratorError;
use serde_json::json;
use shared::ExecutionId;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum WebServerError {
    #[error("Execution already exists: {execution_id}")]
    Conflict { execution_id: ExecutionId },

    #[error("Execution not found: {execution_id}")]
    NotFound { execution_id: ExecutionId },

    #[error("Invalid request format: {details}")]
    InvalidRequest { details: String },

    #[error("Server startup error: {0}")]
    ServerStartup(String),

    #[error("Orchestrator error: {0}")]
    Orchestrator(OrchestratorError),

    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

impl WebServerError {
    pub fn invalid(details: impl Into<String>) -> Self {
        Self::InvalidRequest { details: details.into() }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            WebServerError::Conflict { .. } => StatusCode::CONFLICT,
            WebServerError::NotFound { .. } => StatusCode::NOT_FOUND,
            WebServerError::InvalidRequest { .. } => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Lifts registry conflicts and misses into their HTTP-facing variants
impl From<OrchestratorError> for WebServerError {
    fn from(error: OrchestratorError) -> Self {
        match error {
            OrchestratorError::Conflict { execution_id } => Self::Conflict { execution_id },
            OrchestratorError::NotFound { execution_id } => Self::NotFound { execution_id },
            OrchestratorError::Configuration { field } => Self::InvalidRequest { details: field },
            other => Self::Orchestrator(other),
        }
    }
}

impl IntoResponse for WebServerError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(error = %self, "Request failed");
        }
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}

pub type WebServerResult<T> = Result<T, WebServerError>;

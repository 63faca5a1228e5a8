//! Orchestrator-specific error types

use std::fmt;
use std::time::Duration;

use shared::{EntityResult, ExecutionId, ExecutionStatus};
use thiserror::Error;

/// Why a whole batch was aborted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AbortReason {
    Cancelled,
    CeilingTimeout(Duration),
}

impl fmt::Display for AbortReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AbortReason::Cancelled => write!(f, "cancelled"),
            AbortReason::CeilingTimeout(timeout) => {
                write!(f, "ceiling timeout of {}s exceeded", timeout.as_secs())
            }
        }
    }
}

#[derive(Error, Debug)]
pub enum OrchestratorError {
    #[error("Execution already exists: {execution_id}")]
    Conflict { execution_id: ExecutionId },

    #[error("Execution not found: {execution_id}")]
    NotFound { execution_id: ExecutionId },

    #[error("Execution {execution_id} cannot move from {from} to {to}")]
    InvalidTransition {
        execution_id: ExecutionId,
        from: ExecutionStatus,
        to: ExecutionStatus,
    },

    #[error("No credentials available for search")]
    NoCredentials,

    #[error("Partitioning failed: {message}")]
    Partition { message: String },

    /// Orchestration-wide abort; carries whatever the pools produced
    #[error("Search batch aborted: {reason}")]
    BatchAborted {
        reason: AbortReason,
        results: Vec<EntityResult>,
    },

    #[error("Pool {pool_index} task failed: {message}")]
    PoolTaskFailed { pool_index: usize, message: String },

    #[error("Configuration error: {field}")]
    Configuration { field: String },

    #[error("Missing required credential: {key_name}")]
    MissingCredential { key_name: String },
}

impl OrchestratorError {
    pub fn config(field: impl Into<String>) -> Self {
        Self::Configuration { field: field.into() }
    }

    pub fn not_found(execution_id: &ExecutionId) -> Self {
        Self::NotFound {
            execution_id: execution_id.clone(),
        }
    }
}

pub type OrchestratorResult<T> = Result<T, OrchestratorError>;

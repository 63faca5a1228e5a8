//! Progress event catalog

use serde::{Deserialize, Serialize};

use crate::types::ConnectionId;

/// Subscriber-facing view of one entity result
///
/// Built from an `EntityResult` with list fields capped. The raw provider
/// response never appears here.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OptimizedResult {
    pub entity_name: String,
    pub found: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub relationship_type: Option<String>,
    pub finding_summary: String,
    pub intermediary_organizations: Vec<String>,
    pub source_urls: Vec<String>,
    pub attempts: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure: Option<String>,
    /// Set when emergency truncation was applied
    #[serde(default)]
    pub truncated: bool,
}

/// Event pushed to every subscriber of an execution
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum ProgressEvent {
    Connected {
        connection_id: ConnectionId,
        message: String,
    },
    Progress {
        current: usize,
        total: usize,
        message: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        api_index: Option<usize>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        current_entity: Option<String>,
    },
    NewResult {
        optimized_result: OptimizedResult,
        current: usize,
        total: usize,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        api_index: Option<usize>,
    },
    Completed {
        total_results: usize,
        duration_ms: u64,
    },
    Error {
        message: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        current: Option<usize>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        total: Option<usize>,
    },
    Cancelled,
    Custom {
        stage: String,
        status: String,
        message: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        data: Option<serde_json::Value>,
    },
}

impl ProgressEvent {
    /// Wire tag of the event
    pub fn tag(&self) -> &'static str {
        match self {
            ProgressEvent::Connected { .. } => "connected",
            ProgressEvent::Progress { .. } => "progress",
            ProgressEvent::NewResult { .. } => "new_result",
            ProgressEvent::Completed { .. } => "completed",
            ProgressEvent::Error { .. } => "error",
            ProgressEvent::Cancelled => "cancelled",
            ProgressEvent::Custom { .. } => "custom",
        }
    }

    /// Terminal events end the stream for an execution
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ProgressEvent::Completed { .. } | ProgressEvent::Error { .. } | ProgressEvent::Cancelled
        )
    }
}

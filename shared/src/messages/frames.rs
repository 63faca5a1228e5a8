//! Newline-delimited JSON framing

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::{SharedError, SharedResult};
use crate::messages::events::ProgressEvent;
use crate::types::ExecutionId;

/// One event addressed to one execution
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventFrame {
    pub execution_id: ExecutionId,
    pub timestamp: DateTime<Utc>,
    #[serde(flatten)]
    pub event: ProgressEvent,
}

impl EventFrame {
    pub fn new(execution_id: ExecutionId, event: ProgressEvent) -> Self {
        Self {
            execution_id,
            timestamp: Utc::now(),
            event,
        }
    }

    /// Serialize as a single line terminated by `\n`
    pub fn to_ndjson(&self) -> SharedResult<String> {
        to_line(self)
    }
}

/// Keepalive frame sent on every ping tick
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename = "ping")]
pub struct KeepaliveFrame {
    pub timestamp: DateTime<Utc>,
}

impl KeepaliveFrame {
    pub fn now() -> Self {
        Self { timestamp: Utc::now() }
    }

    pub fn to_ndjson(&self) -> SharedResult<String> {
        to_line(self)
    }
}

fn to_line<T: Serialize>(value: &T) -> SharedResult<String> {
    let mut line = serde_json::to_string(value).map_err(|e| SharedError::SerializationError {
        message: e.to_string(),
    })?;
    line.push('\n');
    Ok(line)
}

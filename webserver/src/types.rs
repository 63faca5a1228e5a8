//! Type definitions for webserver
//!
//! Connection records, broadcaster settings and the JSON bodies of the HTTP API.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use shared::{ConnectionId, DateRange, Entity, ExecutionId, ExecutionStatus};
use tokio::sync::mpsc;
use tokio::time::Instant;

/// Hard ceiling on one serialized `new_result` frame
pub const PAYLOAD_CEILING_BYTES: usize = 15 * 1024;

/// Progress broadcaster settings
#[derive(Debug, Clone)]
pub struct BroadcasterConfig {
    /// Frames buffered per connection before new frames are dropped
    pub channel_capacity: usize,
    pub ping_interval: Duration,
    /// Connections not pinged successfully within this window are evicted
    pub ping_timeout: Duration,
    /// Delay between a terminal event and connection teardown
    pub teardown_grace: Duration,
    pub payload_ceiling: usize,
}

impl Default for BroadcasterConfig {
    fn default() -> Self {
        Self {
            channel_capacity: 256,
            ping_interval: Duration::from_secs(30),
            ping_timeout: Duration::from_secs(60),
            teardown_grace: Duration::from_secs(2),
            payload_ceiling: PAYLOAD_CEILING_BYTES,
        }
    }
}

/// One subscriber stream
#[derive(Debug)]
pub struct ClientConnection {
    pub id: ConnectionId,
    pub execution_id: ExecutionId,
    pub owner_id: String,
    /// NDJSON lines, each terminated by `\n`
    pub sender: mpsc::Sender<String>,
    pub connected_at: Instant,
    pub last_ping: Instant,
}

/// Body of `POST /api/searches`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartSearchRequest {
    /// Optional caller-chosen id; generated when absent
    #[serde(default)]
    pub execution_id: Option<ExecutionId>,
    pub owner_id: String,
    pub target_institution: String,
    #[serde(default)]
    pub region: Option<String>,
    pub entities: Vec<Entity>,
    #[serde(default)]
    pub date_range: Option<DateRange>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartSearchResponse {
    pub execution_id: ExecutionId,
    pub status: ExecutionStatus,
}

/// Query of the event stream endpoint
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventsQuery {
    #[serde(default)]
    pub owner_id: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_start_request_accepts_minimal_body() {
        let body = r#"{
            "ownerId": "user-1",
            "targetInstitution": "Example University",
            "entities": [{"name": "Acme"}, {"name": "Globex", "countries": ["DE"]}]
        }"#;

        let request: StartSearchRequest = serde_json::from_str(body).unwrap();
        assert!(request.execution_id.is_none());
        assert_eq!(request.entities.len(), 2);
        assert_eq!(request.entities[1].primary_country(), Some("DE"));
    }

    #[test]
    fn test_default_config_matches_operational_limits() {
        let config = BroadcasterConfig::default();
        assert_eq!(config.payload_ceiling, 15 * 1024);
        assert_eq!(config.teardown_grace, Duration::from_secs(2));
        assert!(config.ping_timeout > config.ping_interval);
    }
}

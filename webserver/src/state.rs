//! Webserver state management
//!
//! Shared handles every HTTP handler needs.

use std::sync::Arc;
use std::time::Instant;

use orchestrator::ExecutionRegistry;

use crate::services::{ProgressBroadcaster, SearchService};

/// Core webserver state
pub struct AppState {
    pub search: SearchService,
    pub broadcaster: Arc<ProgressBroadcaster>,
    pub server_start_time: Instant,
}

impl AppState {
    pub fn new(search: SearchService, broadcaster: Arc<ProgressBroadcaster>) -> Self {
        Self {
            search,
            broadcaster,
            server_start_time: Instant::now(),
        }
    }

    pub fn registry(&self) -> &Arc<ExecutionRegistry> {
        self.search.registry()
    }

    /// Get server uptime in seconds
    pub fn uptime_seconds(&self) -> u64 {
        self.server_start_time.elapsed().as_secs()
    }
}

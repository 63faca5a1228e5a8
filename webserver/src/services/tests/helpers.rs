//! Test helpers for webserver service tests

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use orchestrator::{
    ApiFailure, Credential, DiscoveryProvider, ExecutionRegistry, ProviderRequest, ProviderResponse,
    ProviderSettings, RegistryConfig, SearchConfig, SearchOrchestrator, StructuredAnswerParser,
};
use serde_json::Value;
use tokio::sync::mpsc;

use super::fixtures::{credentials, direct_answer, entity_name};
use crate::services::{ProgressBroadcaster, SearchService};
use crate::traits::ProgressSink;

/// Provider that answers every entity after a fixed delay
///
/// Entities listed in `failures` fail with the given error instead.
#[derive(Default)]
pub struct FakeProvider {
    delay: Duration,
    failures: HashMap<String, ApiFailure>,
}

impl FakeProvider {
    pub fn with_delay(delay: Duration) -> Self {
        Self {
            delay,
            failures: HashMap::new(),
        }
    }

    pub fn failing(mut self, entity_index: usize, failure: ApiFailure) -> Self {
        self.failures.insert(entity_name(entity_index), failure);
        self
    }
}

#[async_trait]
impl DiscoveryProvider for FakeProvider {
    async fn search(&self, _credential: &Credential, request: &ProviderRequest) -> Result<ProviderResponse, ApiFailure> {
        tokio::time::sleep(self.delay).await;
        let entity = request
            .query
            .split(|c: char| !(c.is_alphanumeric() || c == '-'))
            .find(|word| word.starts_with("Entity-"))
            .unwrap_or_default()
            .to_string();
        match self.failures.get(&entity) {
            Some(failure) => Err(failure.clone()),
            None => Ok(direct_answer(&entity)),
        }
    }
}

pub fn service_with(
    provider: FakeProvider,
    sink: Arc<dyn ProgressSink>,
    credential_count: usize,
    config: SearchConfig,
) -> SearchService {
    let registry = Arc::new(ExecutionRegistry::new(RegistryConfig::default()));
    let orchestrator = SearchOrchestrator::new(
        Arc::new(provider),
        Arc::new(StructuredAnswerParser::new()),
        ProviderSettings::default(),
    );
    SearchService::new(registry, orchestrator, sink, credentials(credential_count), config)
}

pub fn broadcaster() -> Arc<ProgressBroadcaster> {
    Arc::new(ProgressBroadcaster::default())
}

/// Every frame queued so far, parsed
pub fn drain_frames(receiver: &mut mpsc::Receiver<String>) -> Vec<Value> {
    let mut frames = Vec::new();
    while let Ok(line) = receiver.try_recv() {
        assert!(line.ends_with('\n'));
        frames.push(serde_json::from_str(line.trim_end()).unwrap());
    }
    frames
}

pub fn count_type(frames: &[Value], tag: &str) -> usize {
    frames.iter().filter(|f| f["type"] == tag).count()
}

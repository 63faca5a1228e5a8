//! Test helpers for driving the orchestrator with scripted collaborators
//!
//! `ScriptedProvider` replays a per-entity script of responses and records
//! every call with its (paused) tokio instant, so backoff delays can be
//! asserted exactly.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use orchestrator::{
    ApiFailure, Credential, DiscoveryProvider, ProgressObserver, ProgressUpdate, ProviderRequest, ProviderResponse,
    ProviderSettings, SearchOrchestrator, StructuredAnswerParser,
};
use tokio::time::Instant;

use super::fixtures::TestFixtures;

/// One scripted provider reply
#[derive(Debug, Clone)]
pub enum Step {
    Answer(ProviderResponse),
    Fail(ApiFailure),
    /// Wait this long, then answer
    Delay(Duration),
}

#[derive(Debug, Clone)]
pub struct CallRecord {
    pub entity: String,
    pub credential_index: usize,
    pub at: Instant,
}

/// Provider that replays scripted steps per entity name
#[derive(Default)]
pub struct ScriptedProvider {
    entity_names: Vec<String>,
    scripts: Mutex<HashMap<String, VecDeque<Step>>>,
    calls: Mutex<Vec<CallRecord>>,
    in_flight: Mutex<HashMap<usize, usize>>,
    max_in_flight_per_credential: AtomicUsize,
}

impl ScriptedProvider {
    /// Every entity answers successfully unless scripted otherwise
    pub fn new(entity_count: usize) -> Self {
        Self {
            entity_names: (0..entity_count).map(TestFixtures::entity_name).collect(),
            ..Self::default()
        }
    }

    pub fn script(self, entity_index: usize, steps: Vec<Step>) -> Self {
        self.scripts
            .lock()
            .unwrap()
            .insert(TestFixtures::entity_name(entity_index), steps.into());
        self
    }

    pub fn calls(&self) -> Vec<CallRecord> {
        self.calls.lock().unwrap().clone()
    }

    pub fn calls_for(&self, entity_index: usize) -> Vec<CallRecord> {
        let name = TestFixtures::entity_name(entity_index);
        self.calls().into_iter().filter(|c| c.entity == name).collect()
    }

    pub fn max_in_flight_per_credential(&self) -> usize {
        self.max_in_flight_per_credential.load(Ordering::SeqCst)
    }

    fn entity_for(&self, request: &ProviderRequest) -> String {
        self.entity_names
            .iter()
            .find(|name| request.query.contains(name.as_str()))
            .cloned()
            .unwrap_or_default()
    }

    fn enter(&self, credential_index: usize) {
        let mut in_flight = self.in_flight.lock().unwrap();
        let count = in_flight.entry(credential_index).or_insert(0);
        *count += 1;
        self.max_in_flight_per_credential.fetch_max(*count, Ordering::SeqCst);
    }

    fn leave(&self, credential_index: usize) {
        if let Some(count) = self.in_flight.lock().unwrap().get_mut(&credential_index) {
            *count -= 1;
        }
    }
}

#[async_trait]
impl DiscoveryProvider for ScriptedProvider {
    async fn search(&self, credential: &Credential, request: &ProviderRequest) -> Result<ProviderResponse, ApiFailure> {
        let entity = self.entity_for(request);
        self.calls.lock().unwrap().push(CallRecord {
            entity: entity.clone(),
            credential_index: credential.index,
            at: Instant::now(),
        });

        let step = self
            .scripts
            .lock()
            .unwrap()
            .get_mut(&entity)
            .and_then(VecDeque::pop_front);

        self.enter(credential.index);
        let reply = match step {
            Some(Step::Fail(failure)) => Err(failure),
            Some(Step::Answer(response)) => Ok(response),
            Some(Step::Delay(delay)) => {
                tokio::time::sleep(delay).await;
                Ok(TestFixtures::direct_answer(&entity))
            }
            None => {
                // yield so pools interleave
                tokio::time::sleep(Duration::from_millis(10)).await;
                Ok(TestFixtures::direct_answer(&entity))
            }
        };
        self.leave(credential.index);
        reply
    }
}

/// Observer that stores every update it receives
#[derive(Default)]
pub struct RecordingObserver {
    updates: Mutex<Vec<ProgressUpdate>>,
}

impl RecordingObserver {
    pub fn updates(&self) -> Vec<ProgressUpdate> {
        self.updates.lock().unwrap().clone()
    }
}

#[async_trait]
impl ProgressObserver for RecordingObserver {
    async fn on_progress(&self, update: ProgressUpdate) {
        self.updates.lock().unwrap().push(update);
    }
}

/// Helper functions for common test scenarios
pub struct TestHelpers;

impl TestHelpers {
    pub fn orchestrator(provider: Arc<ScriptedProvider>) -> SearchOrchestrator {
        SearchOrchestrator::new(provider, Arc::new(StructuredAnswerParser::new()), ProviderSettings::default())
    }
}

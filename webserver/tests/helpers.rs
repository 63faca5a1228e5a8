//! Test helper utilities for webserver integration tests

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use axum::Router;
use futures_util::StreamExt;
use orchestrator::{
    ApiFailure, Credential, DiscoveryProvider, ExecutionRegistry, ProviderRequest, ProviderResponse,
    ProviderSettings, RegistryConfig, SearchConfig, SearchOrchestrator, StructuredAnswerParser,
};
use serde_json::Value;
use tower::ServiceExt;
use webserver::{AppState, ProgressBroadcaster, SearchService, WebServer};

use crate::fixtures::{credentials, direct_answer, entity_name};

/// Provider that answers every entity after a fixed delay
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

pub struct TestApp {
    pub server: WebServer,
    pub router: Router,
    pub broadcaster: Arc<ProgressBroadcaster>,
}

impl TestApp {
    pub fn new(provider: FakeProvider, credential_count: usize) -> Self {
        let registry = Arc::new(ExecutionRegistry::new(RegistryConfig::default()));
        let orchestrator = SearchOrchestrator::new(
            Arc::new(provider),
            Arc::new(StructuredAnswerParser::new()),
            ProviderSettings::default(),
        );
        let broadcaster = Arc::new(ProgressBroadcaster::default());
        let search = SearchService::new(
            registry,
            orchestrator,
            broadcaster.clone(),
            credentials(credential_count),
            SearchConfig::default(),
        );
        let server = WebServer::new(Arc::new(AppState::new(search, broadcaster.clone())));
        Self {
            router: server.build_router(),
            server,
            broadcaster,
        }
    }

    /// Send a request and parse the JSON reply
    pub async fn send(&self, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let request = Request::builder().method(method).uri(uri);
        let request = match body {
            Some(body) => request
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => request.body(Body::empty()).unwrap(),
        };

        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, json)
    }

    /// Open an event stream; returns the response status, content type and body
    pub async fn open_events(&self, uri: &str) -> (StatusCode, Option<String>, Body) {
        let request = Request::builder().uri(uri).body(Body::empty()).unwrap();
        let response = self.router.clone().oneshot(request).await.unwrap();
        let content_type = response
            .headers()
            .get("content-type")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        (response.status(), content_type, response.into_body())
    }
}

/// Read an NDJSON body to its end and parse every frame
pub async fn read_frames(body: Body) -> Vec<Value> {
    let mut stream = body.into_data_stream();
    let mut buffer = String::new();
    while let Some(chunk) = stream.next().await {
        buffer.push_str(std::str::from_utf8(&chunk.unwrap()).unwrap());
    }
    buffer
        .lines()
        .filter(|line| !line.is_empty())
        .map(|line| serde_json::from_str(line).unwrap())
        .collect()
}

pub fn count_type(frames: &[Value], tag: &str) -> usize {
    frames.iter().filter(|f| f["type"] == tag).count()
}

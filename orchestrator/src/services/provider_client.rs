//! HTTP client for the relationship-discovery provider

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::RETRY_AFTER;
use reqwest::StatusCode;

use crate::traits::DiscoveryProvider;
use crate::types::{ApiFailure, Credential, ProviderRequest, ProviderResponse};

/// Longest error body kept in a client failure message
const MAX_ERROR_BODY: usize = 200;

/// Real provider client issuing bearer-authenticated POST requests
#[derive(Debug, Clone)]
pub struct RealDiscoveryProvider {
    client: reqwest::Client,
    endpoint: String,
}

impl RealDiscoveryProvider {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: endpoint.into(),
        }
    }
}

/// Map a non-success HTTP status to a classified failure
pub fn failure_for_status(status: StatusCode, retry_after: Option<Duration>, body: &str) -> ApiFailure {
    match status.as_u16() {
        401 | 403 => ApiFailure::Unauthorized { status: status.as_u16() },
        404 => ApiFailure::NotFound,
        429 => ApiFailure::RateLimited { retry_after },
        code if status.is_server_error() => ApiFailure::Server { status: code },
        code => ApiFailure::Client {
            status: code,
            message: body.chars().take(MAX_ERROR_BODY).collect(),
        },
    }
}

/// `Retry-After` in delta-seconds form; HTTP-date values are ignored
fn parse_retry_after(value: Option<&reqwest::header::HeaderValue>) -> Option<Duration> {
    value
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<u64>().ok())
        .map(Duration::from_secs)
}

#[async_trait]
impl DiscoveryProvider for RealDiscoveryProvider {
    async fn search(&self, credential: &Credential, request: &ProviderRequest) -> Result<ProviderResponse, ApiFailure> {
        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&credential.api_key)
            .json(request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ApiFailure::Timeout
                } else {
                    ApiFailure::Network(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let retry_after = parse_retry_after(response.headers().get(RETRY_AFTER));
            let body = response.text().await.unwrap_or_default();
            return Err(failure_for_status(status, retry_after, &body));
        }

        let body: ProviderResponse = response
            .json()
            .await
            .map_err(|e| ApiFailure::MalformedResponse(format!("failed to decode response: {e}")))?;

        if body.answer.trim().is_empty() {
            return Err(ApiFailure::MalformedResponse("missing answer".to_string()));
        }
        Ok(body)
    }
}

//! Relationship search server entry point
//!
//! Loads credentials, wires the registry, orchestrator and broadcaster
//! together and serves the HTTP API until Ctrl+C.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use orchestrator::{
    CredentialSource, ExecutionRegistry, ProviderSettings, RealCredentialSource, RealDiscoveryProvider, RegistryConfig,
    SearchConfig, SearchOrchestrator, StructuredAnswerParser,
};
use shared::logging::{self, Component};
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::info;

use webserver::{AppState, BroadcasterConfig, ProgressBroadcaster, SearchService, WebServer};

/// Command line arguments
#[derive(Parser, Debug)]
#[command(name = "webserver")]
#[command(about = "Bulk relationship search server")]
struct Args {
    /// Address for the HTTP API
    #[arg(long, default_value = "127.0.0.1:8080")]
    bind: SocketAddr,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Relationship-discovery provider endpoint
    #[arg(long, default_value = "https://api.linkup.so/v1/search")]
    provider_endpoint: String,

    /// Environment prefix of the provider credentials
    #[arg(long, default_value = "DISCOVERY")]
    credential_prefix: String,

    /// Timeout of a single provider call, in seconds
    #[arg(long, default_value = "60")]
    per_call_timeout_secs: u64,

    /// Wall-clock limit of a whole batch, in seconds
    #[arg(long, default_value = "1500")]
    ceiling_timeout_secs: u64,

    #[arg(long, default_value = "3")]
    max_retries: u32,

    /// Informational; one pool runs per credential
    #[arg(long, default_value = "3")]
    max_concurrent_credentials: usize,

    /// Terminal executions kept in history
    #[arg(long, default_value = "100")]
    max_history: usize,

    #[arg(long, default_value = "24")]
    history_retention_hours: u64,

    /// Active executions older than this are force-cancelled by the sweep
    #[arg(long, default_value = "30")]
    staleness_minutes: u64,

    #[arg(long, default_value = "30")]
    ping_interval_secs: u64,
}

impl Args {
    fn search_config(&self) -> SearchConfig {
        SearchConfig {
            max_concurrent_credentials: self.max_concurrent_credentials,
            per_call_timeout: Duration::from_secs(self.per_call_timeout_secs),
            ceiling_timeout: Duration::from_secs(self.ceiling_timeout_secs),
            max_retries: self.max_retries,
            date_range: None,
        }
    }

    fn registry_config(&self) -> RegistryConfig {
        RegistryConfig {
            max_history_size: self.max_history,
            history_retention: Duration::from_secs(self.history_retention_hours * 60 * 60),
            staleness_threshold: Duration::from_secs(self.staleness_minutes * 60),
            ..RegistryConfig::default()
        }
    }

    fn broadcaster_config(&self) -> BroadcasterConfig {
        let ping_interval = Duration::from_secs(self.ping_interval_secs.max(1));
        BroadcasterConfig {
            ping_interval,
            ping_timeout: ping_interval * 2,
            ..BroadcasterConfig::default()
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    dotenv::dotenv().ok();
    logging::init_tracing(Component::WebServer, Some(&args.log_level));
    logging::log_startup(Component::WebServer, &format!("relationship search server on {}", args.bind));

    let search_config = args.search_config();
    search_config.validate().context("invalid search configuration")?;

    let credentials = RealCredentialSource::with_prefix(args.credential_prefix.clone())
        .load_credentials()
        .await
        .context("failed to load provider credentials")?;
    info!(credentials = credentials.len(), "🔑 Provider credentials loaded");

    let settings = ProviderSettings {
        endpoint: args.provider_endpoint.clone(),
        ..ProviderSettings::default()
    };
    let orchestrator = SearchOrchestrator::new(
        Arc::new(RealDiscoveryProvider::new(settings.endpoint.clone())),
        Arc::new(StructuredAnswerParser::new()),
        settings,
    );

    let registry = Arc::new(ExecutionRegistry::new(args.registry_config()));
    let broadcaster = Arc::new(ProgressBroadcaster::new(args.broadcaster_config()));
    let search = SearchService::new(
        Arc::clone(&registry),
        orchestrator,
        broadcaster.clone(),
        credentials,
        search_config,
    );

    let shutdown = CancellationToken::new();
    let sweeper = registry.spawn_sweeper(shutdown.clone());
    let keepalive = broadcaster.spawn_keepalive(shutdown.clone());

    tokio::spawn({
        let shutdown = shutdown.clone();
        async move {
            match signal::ctrl_c().await {
                Ok(()) => logging::log_shutdown(Component::WebServer, "Received Ctrl+C signal"),
                Err(err) => logging::log_error(Component::WebServer, "Signal handling", &err),
            }
            shutdown.cancel();
        }
    });

    // the server cancels executions and closes subscribers once the token fires
    let server = WebServer::new(Arc::new(AppState::new(search, broadcaster)));
    let served = server.run(args.bind, shutdown.clone()).await;
    shutdown.cancel();

    let _ = tokio::join!(sweeper, keepalive);
    info!("Background tasks stopped");

    served?;
    logging::log_success(Component::WebServer, "Server stopped gracefully");
    Ok(())
}

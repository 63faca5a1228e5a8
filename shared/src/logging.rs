//! Shared logging utilities for consistent tracing across components

use chrono::{DateTime, Utc};
use std::fmt;
use tracing::{error, info};

/// Component emitting the logs, used to build the default filter
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Component {
    Orchestrator,
    WebServer,
}

impl fmt::Display for Component {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Component::Orchestrator => write!(f, "orchestrator"),
            Component::WebServer => write!(f, "webserver"),
        }
    }
}

/// Default `EnvFilter` directives for a component at the given level
pub fn default_filter(component: Component, log_level: &str) -> String {
    match component {
        Component::Orchestrator => {
            format!("orchestrator={log_level},shared={log_level},reqwest=warn")
        }
        Component::WebServer => {
            format!(
                "webserver={log_level},orchestrator={log_level},shared={log_level},tower_http=warn,axum={log_level},reqwest=warn"
            )
        }
    }
}

/// Initialize the tracing subscriber
///
/// `RUST_LOG` takes precedence over the component defaults.
pub fn init_tracing(component: Component, log_level: Option<&str>) {
    use tracing_subscriber::{fmt, EnvFilter};

    let base_level = log_level.unwrap_or("info");
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_filter(component, base_level)));

    fmt()
        .with_env_filter(env_filter)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .init();
}

/// Get formatted timestamp for consistent logging
pub fn format_timestamp() -> String {
    let now: DateTime<Utc> = Utc::now();
    now.format("%H:%M:%S%.3f").to_string()
}

/// Info log scoped to one execution
#[macro_export]
macro_rules! execution_info {
    ($execution_id:expr, $($arg:tt)*) => {
        tracing::info!(
            execution = %$execution_id,
            $($arg)*
        );
    };
}

/// Warning log scoped to one execution
#[macro_export]
macro_rules! execution_warn {
    ($execution_id:expr, $($arg:tt)*) => {
        tracing::warn!(
            execution = %$execution_id,
            $($arg)*
        );
    };
}

/// Error log scoped to one execution
#[macro_export]
macro_rules! execution_error {
    ($execution_id:expr, $($arg:tt)*) => {
        tracing::error!(
            execution = %$execution_id,
            $($arg)*
        );
    };
}

/// Debug log scoped to one execution
#[macro_export]
macro_rules! execution_debug {
    ($execution_id:expr, $($arg:tt)*) => {
        tracing::debug!(
            execution = %$execution_id,
            $($arg)*
        );
    };
}

/// Contextual logging helper for startup messages
pub fn log_startup(component: Component, details: &str) {
    info!(
        component = %component,
        timestamp = format_timestamp(),
        "🚀 Starting {}",
        details
    );
}

/// Contextual logging helper for shutdown messages
pub fn log_shutdown(component: Component, reason: &str) {
    info!(
        component = %component,
        timestamp = format_timestamp(),
        "🛑 Shutting down: {}",
        reason
    );
}

/// Contextual logging helper for error conditions
pub fn log_error(component: Component, context: &str, error: &dyn fmt::Display) {
    error!(
        component = %component,
        timestamp = format_timestamp(),
        error = %error,
        "❌ {} failed: {}",
        context,
        error
    );
}

/// Contextual logging helper for success conditions
pub fn log_success(component: Component, message: &str) {
    info!(
        component = %component,
        timestamp = format_timestamp(),
        "✅ {}",
        message
    );
}

//! Webserver library for the relationship search system
//!
//! Hosts the progress broadcaster, the search lifecycle controller and the
//! HTTP API subscribers and callers talk to.

pub mod error;
pub mod services;
pub mod state;
pub mod traits;
pub mod types;
pub mod web;
pub mod webserver_impl;

// Re-export main types
pub use error::{WebServerError, WebServerResult};
pub use state::AppState;
pub use types::*;
pub use webserver_impl::WebServer;

// Re-export trait definitions
pub use traits::ProgressSink;

// Re-export service implementations
pub use services::{PingReport, ProgressBroadcaster, SearchService, StartedSearch};

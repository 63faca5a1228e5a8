//! Service implementations
//!
//! Real implementations of the webserver services for production use

pub mod payload;
pub mod progress_broadcaster;
pub mod search_service;

#[cfg(test)]
mod tests;

// Re-export service implementations
pub use progress_broadcaster::{PingReport, ProgressBroadcaster};
pub use search_service::{SearchService, StartedSearch, FORCE_CLEANUP_DELAY};

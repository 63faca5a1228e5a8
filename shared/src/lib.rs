//! Shared types for the relationship search system
//!
//! Contains the identifiers, result shapes and progress events used by both
//! the search engine and the subscriber-facing server.

pub mod errors;
pub mod logging;
pub mod messages;
pub mod types;

pub use errors::*;
pub use types::*;

pub use messages::{EventFrame, KeepaliveFrame, OptimizedResult, ProgressEvent};

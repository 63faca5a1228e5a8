//! Messages pushed from the search engine to subscribers
//!
//! Events are modelled as a closed sum type so framing and payload shaping
//! stay exhaustive.

pub mod events;
pub mod frames;

pub use events::{OptimizedResult, ProgressEvent};
pub use frames::{EventFrame, KeepaliveFrame};

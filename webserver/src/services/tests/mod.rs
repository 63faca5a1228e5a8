//! Service tests for webserver
//!
//! Drives the search lifecycle against fake providers and the real broadcaster.

pub mod fixtures;
pub mod helpers;

//! HTTP surface

pub mod handlers;

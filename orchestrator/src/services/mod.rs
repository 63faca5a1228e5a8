//! Service implementations
//!
//! Production implementations of the collaborator traits. These are the
//! pieces that perform real I/O.

pub mod answer_parser;
pub mod api_keys;
pub mod provider_client;

#[cfg(test)]
mod tests;

// Re-export all service implementations
pub use answer_parser::StructuredAnswerParser;
pub use api_keys::RealCredentialSource;
pub use provider_client::RealDiscoveryProvider;

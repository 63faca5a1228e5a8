//! Service-specific tests
//!
//! Each service has its own test file with dedicated fixtures.

#[cfg(test)]
mod answer_parser;
#[cfg(test)]
mod api_keys;

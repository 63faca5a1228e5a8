//! Shared error types for the relationship search system

use thiserror::Error;

#[derive(Error, Debug)]
pub enum SharedError {
    #[error("Serialization failed: {message}")]
    SerializationError { message: String },
}

pub type SharedResult<T> = Result<T, SharedError>;

//! Error types for the serving glue.

use thiserror::Error;

/// Errors that can occur while accepting and serving connections.
///
/// Faults raised by request handlers are not represented here: the
/// recovering middleware absorbs them and turns them into responses, so
/// they never surface as service errors.
#[derive(Error, Debug)]
pub enum ServerError {
    /// I/O error while binding or accepting
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Connection-level protocol failure
    #[error("Connection error: {0}")]
    Connection(String),
}

/// Result type alias for server operations.
pub type ServerResult<T> = Result<T, ServerError>;

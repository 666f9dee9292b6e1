//! Error types shared across conversation MCTS crates.

use thiserror::Error;

/// Result type for core operations.
pub type Result<T> = std::result::Result<T, CoreError>;

/// Error types that can occur in the shared core layer.
#[derive(Error, Debug)]
pub enum CoreError {
    /// Error from a model/transport client.
    #[error("client error: {0}")]
    ClientError(String),

    /// A value failed validation.
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// A JSON payload could not be parsed.
    #[error("parsing error: {0}")]
    ParsingError(String),
}

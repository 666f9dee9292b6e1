//! Error taxonomy for the search engine and orchestrator.

use thiserror::Error;

/// Result type for engine operations.
pub type Result<T> = std::result::Result<T, EngineError>;

/// Errors raised by the search engine, analyzer, and orchestrator.
///
/// Oracle transport/parse failures are never represented here: per the
/// oracle fallback contracts, those are logged and absorbed into a
/// default value instead of surfacing as an `Err`.
#[derive(Error, Debug)]
pub enum EngineError {
    /// The conversation history supplied to the orchestrator was empty.
    #[error("conversation history is empty")]
    NoHistory,

    /// A configuration value was invalid (e.g. non-positive where a
    /// positive count or weight is required).
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// The search was cancelled or exceeded its deadline before producing
    /// a result. No partial result is returned.
    #[error("search cancelled or timed out: {0}")]
    Cancelled(String),

    /// An internal tree invariant was violated. This indicates a bug in
    /// the engine rather than a runtime/environment failure.
    #[error("tree invariant violated: {0}")]
    TreeInvariant(String),
}

impl From<convo_mcts_core::CoreError> for EngineError {
    fn from(err: convo_mcts_core::CoreError) -> Self {
        EngineError::InvalidConfig(err.to_string())
    }
}

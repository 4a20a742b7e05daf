//! Error types for the round tracker.

use thiserror::Error;

/// Top-level error type for tracker operations.
#[derive(Debug, Error)]
pub enum TrackerError {
    /// Event listener errors.
    #[error("listener error: {0}")]
    Listener(#[from] ListenerError),

    /// Aggregation publication errors.
    #[error("publish error: {0}")]
    Publish(#[from] PublishError),

    /// Round could not be resolved through the round directory.
    #[error("round lookup failed for {round_id}: {reason}")]
    Lookup {
        /// Round that could not be resolved.
        round_id: String,
        /// Underlying failure.
        reason: String,
    },

    /// Configuration errors.
    #[error("configuration error: {0}")]
    Config(String),

    /// Metrics registration errors.
    #[error("metrics error: {0}")]
    Metrics(#[from] prometheus::Error),
}

/// Errors consuming the ledger event stream.
#[derive(Debug, Error)]
pub enum ListenerError {
    /// Upstream event stream is gone. Fatal; the process is expected to be
    /// restarted by its supervisor.
    #[error("event subscription failed: {0}")]
    Subscription(String),
}

/// Errors publishing an aggregation request.
#[derive(Debug, Error)]
pub enum PublishError {
    /// Nobody is listening for aggregation requests.
    #[error("no aggregation listeners connected")]
    NoListeners,

    /// Request could not be encoded.
    #[error("failed to encode aggregation request: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Result type alias for tracker operations.
pub type TrackerResult<T> = Result<T, TrackerError>;

/// Result type alias for listener operations.
pub type ListenerResult<T> = Result<T, ListenerError>;

/// Result type alias for publish operations.
pub type PublishResult<T> = Result<T, PublishError>;

//! Error types for simbatch

use thiserror::Error;

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// Simbatch error types
#[derive(Error, Debug)]
pub enum Error {
    /// Malformed batch configuration (bad sweep input, duplicate engine
    /// session, invalid run-mode combination). Raised before submission.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Native engine missing or unusable at session construction time.
    #[error("Engine unavailable: {0}\nNo jobs were submitted")]
    EngineUnavailable(String),

    /// Engine rejected a submission or returned no valid job identifier.
    /// Fatal for that job only; sibling jobs keep running.
    #[error("Dispatch failed for assignment {index}: {reason}")]
    Dispatch {
        /// Zero-based index of the assignment or trial that failed
        index: usize,
        /// Engine-side reason, verbatim
        reason: String,
    },

    /// A telemetry or status line could not be decoded. The record is
    /// dropped and the batch continues.
    #[error("Protocol parse error: {0}")]
    ProtocolParse(String),

    /// Lifecycle violation (finish on an unknown or already-finished job).
    /// Should not occur under correct engine behavior.
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Report serialization error
    #[error("Serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
}

//! Error types for the Bouncer admission-control core.

use thiserror::Error;

/// Main error type for Bouncer operations.
///
/// Quota and block outcomes are never errors; they are returned as a
/// [`Decision`](crate::ratelimit::Decision).
#[derive(Error, Debug)]
pub enum BouncerError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// A limit policy that can never admit anything
    #[error("Invalid limit policy: {0}")]
    InvalidPolicy(String),

    /// An identifier that cannot be tracked or blocked
    #[error("Invalid identifier: {0}")]
    InvalidIdentifier(String),

    /// Infrastructure faults inside the limiter
    #[error("Internal limiter fault: {0}")]
    Internal(String),

    /// JSON encoding errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for Bouncer operations.
pub type Result<T> = std::result::Result<T, BouncerError>;

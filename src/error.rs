//! Error types for kyrorx.
//!
//! Errors are split by how they reach the caller:
//! - `ArgumentError` is returned synchronously from constructors and never
//!   travels through a stream.
//! - `StreamError` is the payload of a `Failed` notification and is delivered
//!   through the notification channel to the consumer's failure handler.
//! - `RxError` is the top-level error for APIs that can produce either.

use thiserror::Error;

/// Errors raised synchronously while setting up a source, hub or combinator.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ArgumentError {
    #[error("Required argument '{name}' is missing")]
    MissingArgument {
        name: String,
    },

    #[error("Invalid argument '{name}': {reason}")]
    InvalidArgument {
        name: String,
        reason: String,
    },
}

impl ArgumentError {
    /// Creates a missing-argument error.
    #[must_use]
    pub fn missing(name: impl Into<String>) -> Self {
        Self::MissingArgument { name: name.into() }
    }

    /// Creates an invalid-argument error.
    #[must_use]
    pub fn invalid(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidArgument {
            name: name.into(),
            reason: reason.into(),
        }
    }
}

/// Failures delivered through the `Failed` notification.
///
/// Stream errors are cloneable because a hub fans a single failure out to
/// every attached consumer and records it for late attachers.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StreamError {
    #[error("Upstream failed: {message}")]
    Upstream {
        message: String,
    },

    #[error("Projection failed: {message}")]
    Projection {
        message: String,
    },

    #[error("Consumer handler failed: {message}")]
    Handler {
        message: String,
    },

    #[error("Serialization failed: {message}")]
    Serialization {
        message: String,
    },

    #[error("Transport error: {message}")]
    Transport {
        message: String,
    },

    #[error("Timed out after {duration_ms}ms")]
    Timeout {
        duration_ms: u64,
    },
}

impl StreamError {
    /// Creates an upstream producer failure.
    #[must_use]
    pub fn upstream(message: impl Into<String>) -> Self {
        Self::Upstream {
            message: message.into(),
        }
    }

    /// Creates a projection failure (a flattening projection refused a value).
    #[must_use]
    pub fn projection(message: impl Into<String>) -> Self {
        Self::Projection {
            message: message.into(),
        }
    }

    /// Creates a consumer handler failure.
    #[must_use]
    pub fn handler(message: impl Into<String>) -> Self {
        Self::Handler {
            message: message.into(),
        }
    }

    /// Creates a serialization failure.
    #[must_use]
    pub fn serialization(message: impl Into<String>) -> Self {
        Self::Serialization {
            message: message.into(),
        }
    }

    /// Creates a transport failure.
    #[must_use]
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
        }
    }

    /// Returns true if this failure came from a consumer handler.
    #[must_use]
    pub const fn is_handler(&self) -> bool {
        matches!(self, Self::Handler { .. })
    }

    /// Returns true if this failure came from (de)serialization.
    #[must_use]
    pub const fn is_serialization(&self) -> bool {
        matches!(self, Self::Serialization { .. })
    }
}

/// Top-level error type for kyrorx.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RxError {
    #[error("Argument error: {0}")]
    Argument(#[from] ArgumentError),

    #[error("Stream error: {0}")]
    Stream(#[from] StreamError),

    #[error("Internal error: {message}")]
    Internal {
        message: String,
    },
}

impl RxError {
    /// Creates an internal error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Returns true if this is an argument error.
    #[must_use]
    pub const fn is_argument(&self) -> bool {
        matches!(self, Self::Argument(_))
    }

    /// Returns true if this is a stream error.
    #[must_use]
    pub const fn is_stream(&self) -> bool {
        matches!(self, Self::Stream(_))
    }

    /// Returns true if this is an internal error.
    #[must_use]
    pub const fn is_internal(&self) -> bool {
        matches!(self, Self::Internal { .. })
    }
}

/// Result type alias for kyrorx operations.
pub type RxResult<T> = Result<T, RxError>;

//! Error types for the request pipeline.
//!
//! Misuse errors ([`Error::Configuration`], [`Error::Validation`]) are returned
//! synchronously at the call that caused them and never enter a chain.
//! Everything else is the outcome of a running invocation. Interceptor
//! failures are reported as [`Error::Chain`], which displays exactly like the
//! error the interceptor raised.

use std::fmt;
use std::time::Duration;
use thiserror::Error;

use crate::client::config::ConfigError;

/// Boxed error raised by interceptors and transports.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// A specialized `Result` type for request operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Interceptor chain phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    /// Runs over `(url, options)` before the transport is called.
    Request,
    /// Runs over `(response, options)` after the transport returns.
    Response,
}

impl Phase {
    /// Lowercase phase name used in logs.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Request => "request",
            Self::Response => "response",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors produced by clients, registries and the pipeline.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum Error {
    /// An interceptor registration was rejected.
    #[error("{message}")]
    Configuration { message: String },

    /// Invocation input was malformed.
    #[error("{message}")]
    Validation { message: String },

    /// An interceptor raised an error; the chain was aborted at `index`.
    #[error("{source}")]
    Chain {
        /// Phase whose chain failed
        phase: Phase,
        /// Position of the failing interceptor in the resolved chain
        index: usize,
        /// The error raised by the interceptor, unchanged
        source: BoxError,
    },

    /// The transport could not complete the exchange.
    #[error("{message}")]
    Transport {
        message: String,
        /// HTTP status when the failure was a rejected status code
        status: Option<u16>,
        #[source]
        source: Option<BoxError>,
    },

    /// The caller cancelled the invocation.
    #[error("Request cancelled: {reason}")]
    Cancelled { reason: String },

    /// The transport stage exceeded the configured timeout.
    #[error("timeout of {}ms exceeded", timeout.as_millis())]
    Timeout { timeout: Duration },

    /// The response body could not be decoded.
    #[error("Failed to decode response body: {message}")]
    Decode { message: String },

    /// Client configuration could not be loaded.
    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl Error {
    /// Create a configuration error
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Create a validation error
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    /// Create a chain error wrapping the interceptor's own error
    pub fn chain(phase: Phase, index: usize, source: BoxError) -> Self {
        Self::Chain {
            phase,
            index,
            source,
        }
    }

    /// Create a transport error without an underlying cause
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
            status: None,
            source: None,
        }
    }

    /// Create a transport error for a rejected HTTP status
    pub fn http_status(status: u16, url: &str) -> Self {
        Self::Transport {
            message: format!("Request to {url} failed with status {status}"),
            status: Some(status),
            source: None,
        }
    }

    /// Create a transport error from an underlying cause
    pub fn transport_source(message: impl Into<String>, source: impl Into<BoxError>) -> Self {
        Self::Transport {
            message: message.into(),
            status: None,
            source: Some(source.into()),
        }
    }

    /// Create a cancellation error
    pub fn cancelled(reason: impl Into<String>) -> Self {
        Self::Cancelled {
            reason: reason.into(),
        }
    }

    /// Create a decode error
    pub fn decode(message: impl Into<String>) -> Self {
        Self::Decode {
            message: message.into(),
        }
    }

    /// Whether the invocation was cancelled by the caller.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled { .. })
    }

    /// Whether the transport stage timed out.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }

    /// Whether an interceptor aborted the chain.
    pub fn is_chain(&self) -> bool {
        matches!(self, Self::Chain { .. })
    }

    /// HTTP status attached to a transport failure, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Transport { status, .. } => *status,
            _ => None,
        }
    }

    /// Phase and chain position of an interceptor failure.
    pub fn chain_position(&self) -> Option<(Phase, usize)> {
        match self {
            Self::Chain { phase, index, .. } => Some((*phase, *index)),
            _ => None,
        }
    }

    /// Recover the error an interceptor raised.
    ///
    /// Returns `Err(self)` for any other kind of error.
    pub fn into_source(self) -> std::result::Result<BoxError, Self> {
        match self {
            Self::Chain { source, .. } => Ok(source),
            other => Err(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Error)]
    #[error("custom failure {code}")]
    struct CustomError {
        code: u32,
    }

    #[test]
    fn misuse_errors_display_their_message_verbatim() {
        assert_eq!(
            Error::configuration("Interceptor must be function!").to_string(),
            "Interceptor must be function!"
        );
        assert_eq!(
            Error::validation("url MUST be a string").to_string(),
            "url MUST be a string"
        );
    }

    #[test]
    fn chain_error_preserves_original_error() {
        let err = Error::chain(Phase::Response, 2, Box::new(CustomError { code: 7 }));
        assert_eq!(err.to_string(), "custom failure 7");
        assert_eq!(err.chain_position(), Some((Phase::Response, 2)));

        let source = err.into_source().unwrap();
        let custom = source.downcast_ref::<CustomError>().unwrap();
        assert_eq!(custom.code, 7);
    }

    #[test]
    fn predicates() {
        assert!(Error::cancelled("user").is_cancelled());
        assert!(
            Error::Timeout {
                timeout: Duration::from_millis(50)
            }
            .is_timeout()
        );
        assert_eq!(Error::http_status(404, "http://x").status(), Some(404));
        assert_eq!(Error::transport("boom").status(), None);
        assert!(Error::transport("boom").into_source().is_err());
    }

    #[test]
    fn timeout_message_mentions_duration() {
        let err = Error::Timeout {
            timeout: Duration::from_millis(1200),
        };
        assert_eq!(err.to_string(), "timeout of 1200ms exceeded");
    }
}

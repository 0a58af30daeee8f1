//! Transport abstraction
//!
//! The pipeline never performs network I/O itself. It hands the final
//! `(url, options)` to a [`Transport`] and runs the response chain over
//! whatever comes back.

#[cfg(feature = "http")]
pub mod http_client;

use async_trait::async_trait;

use crate::error::Result;
use crate::options::RequestOptions;
use crate::response::Response;

#[cfg(feature = "http")]
pub use http_client::HttpTransport;

/// Performs one HTTP exchange.
#[async_trait]
pub trait Transport: Send + Sync + std::fmt::Debug {
    /// Send the request described by `url` and `options`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Transport`] for network failures and, when the
    /// transport is configured to, for non-success status codes.
    async fn send(&self, url: &str, options: &RequestOptions) -> Result<Response>;
}

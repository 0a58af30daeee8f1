//! # onion-request
//!
//! HTTP request client built around two interceptor chains, one for outgoing
//! requests and one for incoming responses, composed around a pluggable
//! transport.
//!
//! ## Features
//!
//! - Request and response interceptors, synchronous or async
//! - Two registration scopes: process-wide (`global`) and per client
//! - Deterministic onion ordering: global entries first, then instance
//!   entries, each in registration order
//! - First failure aborts the chain and reaches the caller unchanged
//! - Per-request cancellation and transport timeout
//! - `extend` for layered default options, `prefix`/`suffix`, method shortcuts
//! - Configuration from TOML/YAML/JSON files with environment overrides
//!
//! ## Architecture
//!
//! ```text
//! client.request(url, options)
//!        ↓  Building        (validate url, merge defaults)
//!        ↓  RequestChain    (global₁ … globalₙ, instance₁ … instanceₘ)
//!        ↓  Transporting    (Transport::send, timeout, cancellation)
//!        ↓  ResponseChain   (same order)
//!        ↓  Settled         (data, or { data, response } with getResponse)
//! ```
//!
//! ## Usage
//!
//! ```rust,no_run
//! use onion_request::interceptor::{request_fn, response_fn, Intercepted, UseOptions};
//! use onion_request::{RequestOptions, RequestState};
//!
//! # async fn example() -> onion_request::Result<()> {
//! // Runs for every client in the process
//! onion_request::interceptors().request().register(
//!     request_fn(|url, options| {
//!         Ok(RequestState::new(format!("{url}?x=1"), options.clone()).into())
//!     }),
//!     UseOptions::global(),
//! );
//!
//! // Runs only for `api`
//! let api = onion_request::extend(RequestOptions::new().with("prefix", "http://localhost:8080"));
//! api.interceptors().response().register(
//!     response_fn(|response, _options| {
//!         response.headers_mut().append("x-seen", "1")?;
//!         Ok(Intercepted::Unchanged)
//!     }),
//!     UseOptions::instance(),
//! );
//!
//! let reply = api.get("/users", RequestOptions::new()).await?;
//! println!("{}", reply.data());
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod error;
pub mod interceptor;
pub mod options;
pub mod pipeline;
pub mod response;
pub mod transport;

pub use client::{Client, ClientBuilder, ClientConfig, ConfigError, HttpConfig, PendingRequest};
pub use error::{BoxError, Error, Phase, Result};
pub use interceptor::{Intercepted, InterceptorId, UseOptions};
pub use options::{RequestOptions, RequestState, ResponseType};
pub use response::{Headers, Reply, Response, ResponseState};
pub use tokio_util::sync::CancellationToken;
pub use transport::Transport;

#[cfg(feature = "http")]
pub use transport::HttpTransport;

#[cfg(feature = "http")]
pub use ambient::{default_client, extend, interceptors, prepare, request};

/// The process-wide default client and its top-level helpers.
#[cfg(feature = "http")]
mod ambient {
    use serde_json::Value;
    use std::sync::LazyLock;

    use crate::client::{Client, Interceptors, PendingRequest};
    use crate::error::Result;
    use crate::options::RequestOptions;
    use crate::response::Reply;
    use crate::transport::HttpTransport;

    static DEFAULT_CLIENT: LazyLock<Client> = LazyLock::new(|| {
        Client::builder().build().unwrap_or_else(|e| {
            tracing::error!(error = %e, "Falling back to an unconfigured HTTP transport");
            Client::with_transport(HttpTransport::default())
        })
    });

    /// The ambient client, created on first use.
    pub fn default_client() -> &'static Client {
        &DEFAULT_CLIENT
    }

    /// Interceptor surface of the ambient client.
    ///
    /// `global: false` registrations land in the ambient client's own
    /// registry and do not apply to clients created with [`extend`].
    pub fn interceptors() -> Interceptors<'static> {
        DEFAULT_CLIENT.interceptors()
    }

    /// New client layered over the ambient one's defaults.
    pub fn extend(defaults: RequestOptions) -> Client {
        DEFAULT_CLIENT.extend(defaults)
    }

    /// [`Client::prepare`] on the ambient client.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Validation`] if `url` is not a string.
    pub fn prepare(url: impl Into<Value>, options: RequestOptions) -> Result<PendingRequest> {
        DEFAULT_CLIENT.prepare(url, options)
    }

    /// [`Client::request`] on the ambient client.
    ///
    /// # Errors
    ///
    /// Same as [`Client::request`].
    pub async fn request(url: impl Into<Value>, options: RequestOptions) -> Result<Reply> {
        DEFAULT_CLIENT.request(url, options).await
    }
}

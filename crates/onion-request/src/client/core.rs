//! Core client implementation
//!
//! A [`Client`] owns a transport, default options and a private instance
//! registry. Every invocation resolves the process-wide registry and the
//! instance registry into fresh chains, so registrations made while requests
//! are in flight only affect requests started afterwards.

use futures::future::BoxFuture;
use http::Method;
use serde_json::Value;
use std::fmt;
use std::future::IntoFuture;
use std::sync::Arc;
use tracing::debug;

use super::builder::ClientBuilder;
use super::config::ClientConfig;
use super::interceptors::Interceptors;
use crate::error::Result;
use crate::interceptor::{Registry, ResolvedChains, Scope, resolve};
use crate::options::{RequestOptions, RequestState};
use crate::pipeline::{Pipeline, build_state};
use crate::response::Reply;
use crate::transport::Transport;

/// Inner client state shared by clones.
pub(super) struct ClientInner {
    /// Performs the network exchange
    pub(super) transport: Arc<dyn Transport>,

    /// Interceptors registered with `global: false`
    pub(super) registry: Registry,

    /// Options every invocation starts from
    pub(super) defaults: RequestOptions,

    pub(super) config: ClientConfig,
}

/// HTTP client with request and response interceptor chains.
///
/// # Clone Pattern
///
/// Clones share the same transport, defaults and instance registry:
///
/// ```rust
/// use onion_request::{Client, RequestOptions};
/// use onion_request::transport::Transport;
/// # use onion_request::{Response, Result};
/// # #[derive(Debug)]
/// # struct Echo;
/// # #[async_trait::async_trait]
/// # impl Transport for Echo {
/// #     async fn send(&self, url: &str, _: &RequestOptions) -> Result<Response> {
/// #         Ok(Response::new(http::StatusCode::OK, url).with_body("\"ok\""))
/// #     }
/// # }
///
/// # async fn example() -> Result<()> {
/// let client = Client::with_transport(Echo);
/// let api = client.extend(RequestOptions::new().with("prefix", "http://api.local"));
///
/// let reply = api.get("/status", RequestOptions::new()).await?;
/// assert_eq!(reply.data(), "ok");
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct Client {
    pub(super) inner: Arc<ClientInner>,
}

impl fmt::Debug for Client {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Client")
            .field("transport", &self.inner.transport)
            .field("registry", &self.inner.registry)
            .field("defaults", &self.inner.defaults)
            .finish()
    }
}

impl Client {
    /// Client over the built-in HTTP transport with default configuration.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Transport`] if the HTTP client cannot be built.
    #[cfg(feature = "http")]
    pub fn new() -> Result<Self> {
        ClientBuilder::new().build()
    }

    /// Client over a custom transport with default configuration.
    pub fn with_transport(transport: impl Transport + 'static) -> Self {
        Self::from_parts(Arc::new(transport), ClientConfig::default(), RequestOptions::new())
    }

    pub fn builder() -> ClientBuilder {
        ClientBuilder::new()
    }

    pub(crate) fn from_parts(
        transport: Arc<dyn Transport>,
        config: ClientConfig,
        defaults: RequestOptions,
    ) -> Self {
        Self {
            inner: Arc::new(ClientInner {
                transport,
                registry: Registry::new(Scope::Instance),
                defaults,
                config,
            }),
        }
    }

    /// Create a new client layered over this one.
    ///
    /// The new client shares the transport and configuration, merges
    /// `defaults` over this client's defaults, and starts with an empty
    /// instance registry. Global interceptors apply to it as to every client.
    pub fn extend(&self, defaults: RequestOptions) -> Client {
        let defaults = defaults.merged_over(&self.inner.defaults);
        debug!(defaults = %defaults.to_json(), "Extending client");
        Self::from_parts(
            Arc::clone(&self.inner.transport),
            self.inner.config.clone(),
            defaults,
        )
    }

    /// Interceptor registration surface.
    pub fn interceptors(&self) -> Interceptors<'_> {
        Interceptors::new(&self.inner.registry)
    }

    pub fn defaults(&self) -> &RequestOptions {
        &self.inner.defaults
    }

    pub fn config(&self) -> &ClientConfig {
        &self.inner.config
    }

    pub fn transport(&self) -> &Arc<dyn Transport> {
        &self.inner.transport
    }

    /// This client's own registry (`global: false` entries).
    pub fn instance_registry(&self) -> &Registry {
        &self.inner.registry
    }

    /// Chains a request started now would run.
    pub fn resolve_chains(&self) -> ResolvedChains {
        resolve(Registry::global(), &self.inner.registry)
    }

    /// Validate the input and resolve the interceptor chains without sending.
    ///
    /// Nothing runs until the returned [`PendingRequest`] is awaited.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Validation`] ("url MUST be a string") if `url`
    /// is not a string.
    pub fn prepare(
        &self,
        url: impl Into<Value>,
        options: RequestOptions,
    ) -> Result<PendingRequest> {
        let state = build_state(url.into(), options, &self.inner.defaults)?;
        let pipeline = Pipeline::new(Arc::clone(&self.inner.transport), self.resolve_chains());
        Ok(PendingRequest { pipeline, state })
    }

    /// Send a request through both interceptor chains.
    ///
    /// # Errors
    ///
    /// - [`crate::Error::Validation`] if `url` is not a string
    /// - [`crate::Error::Chain`] with the original message if an interceptor fails
    /// - [`crate::Error::Transport`], [`crate::Error::Timeout`] or
    ///   [`crate::Error::Cancelled`] from the transport stage
    pub async fn request(&self, url: impl Into<Value>, options: RequestOptions) -> Result<Reply> {
        self.prepare(url, options)?.send().await
    }

    /// `GET` request.
    ///
    /// # Errors
    ///
    /// Same as [`Client::request`].
    pub async fn get(&self, url: impl Into<Value>, options: RequestOptions) -> Result<Reply> {
        self.request(url, options.with_method(&Method::GET)).await
    }

    /// `POST` request.
    ///
    /// # Errors
    ///
    /// Same as [`Client::request`].
    pub async fn post(&self, url: impl Into<Value>, options: RequestOptions) -> Result<Reply> {
        self.request(url, options.with_method(&Method::POST)).await
    }

    /// `PUT` request.
    ///
    /// # Errors
    ///
    /// Same as [`Client::request`].
    pub async fn put(&self, url: impl Into<Value>, options: RequestOptions) -> Result<Reply> {
        self.request(url, options.with_method(&Method::PUT)).await
    }

    /// `PATCH` request.
    ///
    /// # Errors
    ///
    /// Same as [`Client::request`].
    pub async fn patch(&self, url: impl Into<Value>, options: RequestOptions) -> Result<Reply> {
        self.request(url, options.with_method(&Method::PATCH)).await
    }

    /// `DELETE` request.
    ///
    /// # Errors
    ///
    /// Same as [`Client::request`].
    pub async fn delete(&self, url: impl Into<Value>, options: RequestOptions) -> Result<Reply> {
        self.request(url, options.with_method(&Method::DELETE)).await
    }

    /// `HEAD` request.
    ///
    /// # Errors
    ///
    /// Same as [`Client::request`].
    pub async fn head(&self, url: impl Into<Value>, options: RequestOptions) -> Result<Reply> {
        self.request(url, options.with_method(&Method::HEAD)).await
    }
}

/// A validated invocation with its chains already resolved.
///
/// Await it (or call [`PendingRequest::send`]) to run it.
#[derive(Debug)]
#[must_use = "requests do nothing unless awaited"]
pub struct PendingRequest {
    pipeline: Pipeline,
    state: RequestState,
}

impl PendingRequest {
    /// Url after `prefix`/`suffix`, before any interceptor ran.
    pub fn url(&self) -> &str {
        &self.state.url
    }

    pub fn options(&self) -> &RequestOptions {
        &self.state.options
    }

    pub fn chains(&self) -> &ResolvedChains {
        self.pipeline.chains()
    }

    /// Run the request.
    ///
    /// # Errors
    ///
    /// Same as [`Client::request`], minus validation.
    pub async fn send(self) -> Result<Reply> {
        self.pipeline.run(self.state).await
    }
}

impl IntoFuture for PendingRequest {
    type Output = Result<Reply>;
    type IntoFuture = BoxFuture<'static, Result<Reply>>;

    fn into_future(self) -> Self::IntoFuture {
        Box::pin(self.send())
    }
}

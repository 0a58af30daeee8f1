//! Request and response interceptors
//!
//! An interceptor inspects the in-flight value of one phase and either leaves
//! it alone, replaces it, or aborts the whole invocation by returning an
//! error. Interceptors of a phase run strictly one after another:
//!
//! ```text
//! (url, options) → global₁ → … → globalₙ → instance₁ → … → Transport
//!                                                            ↓
//! Reply ← instance… ← global… ← (response, options) ←────────┘ (same order)
//! ```
//!
//! Both phases are driven by the same composer in [`onion`]. Interceptors are
//! registered through [`registry`] and merged per invocation by [`scope`].
//!
//! ## Writing interceptors
//!
//! Implement [`RequestInterceptor`] / [`ResponseInterceptor`] directly, or
//! wrap a closure with [`request_fn`], [`request_fn_async`], [`response_fn`]
//! or [`response_fn_async`].
//!
//! ```rust
//! use onion_request::interceptor::{request_fn, Intercepted};
//! use onion_request::RequestState;
//!
//! let add_flag = request_fn(|url, options| {
//!     Ok(Intercepted::Replace(RequestState::new(
//!         format!("{url}?interceptors=yes"),
//!         options.clone().with("interceptors", true),
//!     )))
//! });
//! # let _ = add_flag;
//! ```

pub mod onion;
pub mod registry;
pub mod scope;

use async_trait::async_trait;
use futures::future::BoxFuture;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

use crate::error::BoxError;
use crate::options::{RequestOptions, RequestState};
use crate::response::Response;

pub use onion::Onion;
pub use registry::{InterceptorEntry, InterceptorId, Registry, Scope, UseOptions};
pub use scope::{ResolvedChains, resolve};

/// Outcome of one interceptor step.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Intercepted<T> {
    /// Keep the running value as it is.
    #[default]
    Unchanged,
    /// Continue with this value instead.
    Replace(T),
}

impl<T> Intercepted<T> {
    /// True when the step kept the running value.
    pub fn is_unchanged(&self) -> bool {
        matches!(self, Self::Unchanged)
    }
}

impl<T> From<T> for Intercepted<T> {
    fn from(value: T) -> Self {
        Self::Replace(value)
    }
}

impl<T> From<Option<T>> for Intercepted<T> {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::Unchanged, Self::Replace)
    }
}

/// Result of one interceptor step.
pub type InterceptResult<T> = Result<Intercepted<T>, BoxError>;

/// Interceptor run over `(url, options)` before the transport is called.
#[async_trait]
pub trait RequestInterceptor: Send + Sync {
    /// Inspect the current request and decide how to continue.
    async fn intercept(&self, url: &str, options: &RequestOptions) -> InterceptResult<RequestState>;

    /// Name used in logs.
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }
}

/// Interceptor run over `(response, options)` after the transport returns.
///
/// `options` are the final options the transport was called with.
/// Mutations made through `response` are kept when the interceptor returns
/// [`Intercepted::Unchanged`].
#[async_trait]
pub trait ResponseInterceptor: Send + Sync {
    async fn intercept(
        &self,
        response: &mut Response,
        options: &RequestOptions,
    ) -> InterceptResult<Response>;

    /// Name used in logs.
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }
}

/// Shared handle to a request interceptor.
pub type RequestHandler = Arc<dyn RequestInterceptor>;

/// Shared handle to a response interceptor.
pub type ResponseHandler = Arc<dyn ResponseInterceptor>;

impl fmt::Debug for dyn RequestInterceptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RequestInterceptor({})", self.name())
    }
}

impl fmt::Debug for dyn ResponseInterceptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ResponseInterceptor({})", self.name())
    }
}

// ============================================================================
// CLOSURE ADAPTERS
// ============================================================================

/// Request interceptor backed by a synchronous closure.
pub struct RequestFn<F> {
    f: F,
}

/// Wrap a synchronous `(url, options)` closure.
pub fn request_fn<F>(f: F) -> RequestFn<F>
where
    F: Fn(&str, &RequestOptions) -> InterceptResult<RequestState> + Send + Sync + 'static,
{
    RequestFn { f }
}

#[async_trait]
impl<F> RequestInterceptor for RequestFn<F>
where
    F: Fn(&str, &RequestOptions) -> InterceptResult<RequestState> + Send + Sync + 'static,
{
    async fn intercept(&self, url: &str, options: &RequestOptions) -> InterceptResult<RequestState> {
        (self.f)(url, options)
    }

    fn name(&self) -> &str {
        "request_fn"
    }
}

/// Request interceptor backed by an async closure.
pub struct RequestFnAsync<F> {
    f: F,
}

/// Wrap an async closure. The closure receives owned copies of the current
/// url and options, so it may hold them across `.await` points.
pub fn request_fn_async<F, Fut>(f: F) -> RequestFnAsync<F>
where
    F: Fn(String, RequestOptions) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = InterceptResult<RequestState>> + Send + 'static,
{
    RequestFnAsync { f }
}

#[async_trait]
impl<F, Fut> RequestInterceptor for RequestFnAsync<F>
where
    F: Fn(String, RequestOptions) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = InterceptResult<RequestState>> + Send + 'static,
{
    async fn intercept(&self, url: &str, options: &RequestOptions) -> InterceptResult<RequestState> {
        (self.f)(url.to_string(), options.clone()).await
    }

    fn name(&self) -> &str {
        "request_fn_async"
    }
}

/// Response interceptor backed by a synchronous closure.
pub struct ResponseFn<F> {
    f: F,
}

/// Wrap a synchronous closure that may mutate the response in place.
pub fn response_fn<F>(f: F) -> ResponseFn<F>
where
    F: Fn(&mut Response, &RequestOptions) -> InterceptResult<Response> + Send + Sync + 'static,
{
    ResponseFn { f }
}

#[async_trait]
impl<F> ResponseInterceptor for ResponseFn<F>
where
    F: Fn(&mut Response, &RequestOptions) -> InterceptResult<Response> + Send + Sync + 'static,
{
    async fn intercept(
        &self,
        response: &mut Response,
        options: &RequestOptions,
    ) -> InterceptResult<Response> {
        (self.f)(response, options)
    }

    fn name(&self) -> &str {
        "response_fn"
    }
}

/// Response interceptor backed by an async closure.
pub struct ResponseFnAsync<F> {
    f: F,
}

/// Wrap an async closure. The closure works on an owned copy of the
/// response; return [`Intercepted::Replace`] to keep its changes.
pub fn response_fn_async<F>(f: F) -> ResponseFnAsync<F>
where
    F: Fn(Response, RequestOptions) -> BoxFuture<'static, InterceptResult<Response>>
        + Send
        + Sync
        + 'static,
{
    ResponseFnAsync { f }
}

#[async_trait]
impl<F> ResponseInterceptor for ResponseFnAsync<F>
where
    F: Fn(Response, RequestOptions) -> BoxFuture<'static, InterceptResult<Response>>
        + Send
        + Sync
        + 'static,
{
    async fn intercept(
        &self,
        response: &mut Response,
        options: &RequestOptions,
    ) -> InterceptResult<Response> {
        (self.f)(response.clone(), options.clone()).await
    }

    fn name(&self) -> &str {
        "response_fn_async"
    }
}

//! Interceptor registration surface
//!
//! ```rust
//! use onion_request::interceptor::{request_fn, Intercepted, UseOptions};
//! use onion_request::{Client, RequestState};
//! # use onion_request::{RequestOptions, Response, Result};
//! # use onion_request::transport::Transport;
//! # #[derive(Debug)]
//! # struct Null;
//! # #[async_trait::async_trait]
//! # impl Transport for Null {
//! #     async fn send(&self, url: &str, _: &RequestOptions) -> Result<Response> {
//! #         Ok(Response::new(http::StatusCode::OK, url))
//! #     }
//! # }
//!
//! let client = Client::with_transport(Null);
//! let id = client.interceptors().request().register(
//!     request_fn(|url, options| {
//!         Ok(RequestState::new(format!("{url}&y=2"), options.clone()).into())
//!     }),
//!     UseOptions::instance(),
//! );
//! assert!(client.interceptors().request().eject(id));
//! ```

use std::any::Any;
use std::sync::Arc;

use crate::error::Result;
use crate::interceptor::{
    InterceptorId, Registry, RequestHandler, RequestInterceptor, ResponseHandler,
    ResponseInterceptor, UseOptions,
};

/// Entry point returned by [`crate::Client::interceptors`].
#[derive(Debug, Clone, Copy)]
pub struct Interceptors<'a> {
    instance: &'a Registry,
}

impl<'a> Interceptors<'a> {
    pub(crate) fn new(instance: &'a Registry) -> Self {
        Self { instance }
    }

    pub fn request(&self) -> RequestInterceptors<'a> {
        RequestInterceptors {
            instance: self.instance,
        }
    }

    pub fn response(&self) -> ResponseInterceptors<'a> {
        ResponseInterceptors {
            instance: self.instance,
        }
    }
}

fn target(instance: &Registry, options: UseOptions) -> &Registry {
    if options.global {
        Registry::global()
    } else {
        instance
    }
}

/// `interceptors.request`
#[derive(Debug, Clone, Copy)]
pub struct RequestInterceptors<'a> {
    instance: &'a Registry,
}

impl RequestInterceptors<'_> {
    /// Register a request interceptor.
    ///
    /// With `global: true` (the default) it runs for every client; otherwise
    /// only for this client.
    #[doc(alias = "use")]
    pub fn register<I>(&self, interceptor: I, options: UseOptions) -> InterceptorId
    where
        I: RequestInterceptor + 'static,
    {
        self.register_handler(Arc::new(interceptor), options)
    }

    /// Register an already shared handler.
    pub fn register_handler(&self, handler: RequestHandler, options: UseOptions) -> InterceptorId {
        target(self.instance, options).use_request(handler)
    }

    /// Register a type-erased handler, which must hold a [`RequestHandler`].
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Configuration`] ("Interceptor must be function!")
    /// if `handler` is not a request interceptor.
    pub fn register_dyn(
        &self,
        handler: Arc<dyn Any + Send + Sync>,
        options: UseOptions,
    ) -> Result<InterceptorId> {
        target(self.instance, options).use_request_dyn(handler)
    }

    /// Remove a request or response entry from this client or the global
    /// registry.
    pub fn eject(&self, id: InterceptorId) -> bool {
        self.instance.eject(id) || Registry::global().eject(id)
    }
}

/// `interceptors.response`
#[derive(Debug, Clone, Copy)]
pub struct ResponseInterceptors<'a> {
    instance: &'a Registry,
}

impl ResponseInterceptors<'_> {
    /// Register a response interceptor.
    ///
    /// With `global: true` (the default) it runs for every client; otherwise
    /// only for this client.
    #[doc(alias = "use")]
    pub fn register<I>(&self, interceptor: I, options: UseOptions) -> InterceptorId
    where
        I: ResponseInterceptor + 'static,
    {
        self.register_handler(Arc::new(interceptor), options)
    }

    pub fn register_handler(&self, handler: ResponseHandler, options: UseOptions) -> InterceptorId {
        target(self.instance, options).use_response(handler)
    }

    /// Register a type-erased handler, which must hold a [`ResponseHandler`].
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Configuration`] ("Interceptor must be function!")
    /// if `handler` is not a response interceptor.
    pub fn register_dyn(
        &self,
        handler: Arc<dyn Any + Send + Sync>,
        options: UseOptions,
    ) -> Result<InterceptorId> {
        target(self.instance, options).use_response_dyn(handler)
    }

    pub fn eject(&self, id: InterceptorId) -> bool {
        self.instance.eject(id) || Registry::global().eject(id)
    }
}

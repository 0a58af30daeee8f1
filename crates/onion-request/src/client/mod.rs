//! Client surface
//!
//! - `core`: [`Client`] and [`PendingRequest`]
//! - `builder`: [`ClientBuilder`]
//! - `config`: [`ClientConfig`] and file/env loading
//! - `interceptors`: the `client.interceptors().request().register(..)` surface
//!
//! `Client` is cheaply cloneable via `Arc<ClientInner>`; clones share the
//! transport, defaults and instance registry. [`Client::extend`] is the way to
//! get a client with its own instance registry.

pub mod builder;
pub mod config;
pub mod core;
pub mod interceptors;

pub use self::builder::ClientBuilder;
pub use self::config::{ClientConfig, ConfigError, HttpConfig};
pub use self::core::{Client, PendingRequest};
pub use self::interceptors::{Interceptors, RequestInterceptors, ResponseInterceptors};

//! reqwest-backed transport.
//!
//! Maps the well-known option keys onto a reqwest request:
//!
//! | Option | Effect |
//! |--------|--------|
//! | `method` | HTTP method (default `GET`) |
//! | `headers` | request headers |
//! | `params` | query string |
//! | `data` | body for methods other than `GET`/`HEAD`; strings are sent verbatim, other values as JSON |
//!
//! Timeouts and cancellation are enforced by the pipeline, not here.

use async_trait::async_trait;
use http::Method;
use serde_json::Value;
use tracing::{debug, warn};

use super::Transport;
use crate::client::config::HttpConfig;
use crate::error::{Error, Result};
use crate::options::RequestOptions;
use crate::response::Response;

/// HTTP transport over a shared [`reqwest::Client`].
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    config: HttpConfig,
}

impl Default for HttpTransport {
    fn default() -> Self {
        Self::with_client(reqwest::Client::new(), HttpConfig::default())
    }
}

impl HttpTransport {
    /// Build a transport with its own connection pool.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Transport`] if the HTTP client cannot be built.
    pub fn new(config: HttpConfig) -> Result<Self> {
        let mut builder = reqwest::Client::builder();

        if let Some(user_agent) = &config.user_agent {
            builder = builder.user_agent(user_agent);
        }
        if let Some(connect_timeout) = config.connect_timeout() {
            builder = builder.connect_timeout(connect_timeout);
        }

        let client = builder
            .build()
            .map_err(|e| Error::transport_source("Failed to build HTTP client", e))?;

        Ok(Self { client, config })
    }

    /// Use an existing reqwest client.
    pub fn with_client(client: reqwest::Client, config: HttpConfig) -> Self {
        Self { client, config }
    }

    pub fn config(&self) -> &HttpConfig {
        &self.config
    }

    fn build_request(&self, url: &str, options: &RequestOptions) -> reqwest::RequestBuilder {
        let method = options.method();
        let mut request = self.client.request(method.clone(), url);

        for (name, value) in options.headers() {
            request = request.header(name, value);
        }

        let params = options.params();
        if !params.is_empty() {
            request = request.query(&params);
        }

        if method != Method::GET && method != Method::HEAD {
            request = match options.data() {
                None | Some(Value::Null) => request,
                Some(Value::String(text)) => request.body(text.clone()),
                Some(data) => request.json(data),
            };
        }

        request
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, url: &str, options: &RequestOptions) -> Result<Response> {
        debug!(method = %options.method(), url, "Sending HTTP request");

        let response = self
            .build_request(url, options)
            .send()
            .await
            .map_err(|e| {
                warn!(url, error = %e, "HTTP request failed");
                Error::transport_source(format!("Request to {url} failed: {e}"), e)
            })?;

        let status = response.status();
        let final_url = response.url().to_string();
        let headers = response.headers().clone();
        let body = response.bytes().await.map_err(|e| {
            Error::transport_source(format!("Failed to read response body from {final_url}"), e)
        })?;

        debug!(status = status.as_u16(), url = %final_url, bytes = body.len(), "Received HTTP response");

        if self.config.error_for_status && !status.is_success() {
            return Err(Error::http_status(status.as_u16(), &final_url));
        }

        Ok(Response::new(status, final_url)
            .with_headers(headers)
            .with_body(body))
    }
}

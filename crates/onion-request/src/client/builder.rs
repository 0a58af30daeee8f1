//! Client builder pattern
//!
//! Provides a fluent interface for configuring a client before creation.

use std::sync::Arc;
use std::time::Duration;

use super::config::ClientConfig;
use super::core::Client;
use crate::error::Result;
use crate::options::RequestOptions;
use crate::transport::Transport;

/// Builder for configuring and creating clients
///
/// # Examples
///
/// ```rust,no_run
/// use onion_request::{ClientBuilder, ClientConfig};
///
/// # fn example() -> onion_request::Result<()> {
/// let client = ClientBuilder::new()
///     .with_config(ClientConfig::from_file("client.toml")?)
///     .with_prefix("https://api.example.com")
///     .with_header("accept", "application/json")
///     .with_timeout(5_000)
///     .build()?;
/// # let _ = client;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Default)]
pub struct ClientBuilder {
    config: ClientConfig,
    transport: Option<Arc<dyn Transport>>,
    defaults: RequestOptions,
}

impl ClientBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    // ============================================================================
    // CONFIGURATION
    // ============================================================================

    /// Replace the whole configuration
    pub fn with_config(mut self, config: ClientConfig) -> Self {
        self.config = config;
        self
    }

    /// Default transport timeout in milliseconds
    pub fn with_timeout(mut self, timeout_ms: u64) -> Self {
        self.config.timeout_ms = Some(timeout_ms);
        self
    }

    /// Prepended to every request url
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.config.prefix = Some(prefix.into());
        self
    }

    /// Appended to every request url
    pub fn with_suffix(mut self, suffix: impl Into<String>) -> Self {
        self.config.suffix = Some(suffix.into());
        self
    }

    /// Header sent with every request
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.config.headers.insert(name.into(), value.into());
        self
    }

    /// Treat non-2xx responses as transport failures (default `true`)
    pub fn with_error_for_status(mut self, enabled: bool) -> Self {
        self.config.http.error_for_status = enabled;
        self
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.config.http.user_agent = Some(user_agent.into());
        self
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.config.http.connect_timeout_ms =
            Some(u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX));
        self
    }

    // ============================================================================
    // TRANSPORT AND DEFAULTS
    // ============================================================================

    /// Use a custom transport instead of the built-in HTTP one
    pub fn with_transport(self, transport: impl Transport + 'static) -> Self {
        self.with_shared_transport(Arc::new(transport))
    }

    pub fn with_shared_transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Options every request starts from; they win over configured defaults
    pub fn with_defaults(mut self, defaults: RequestOptions) -> Self {
        self.defaults = defaults;
        self
    }

    // ============================================================================
    // BUILD
    // ============================================================================

    /// Build the client
    ///
    /// # Errors
    ///
    /// - [`crate::Error::Transport`] if the HTTP client cannot be built
    /// - [`crate::Error::Configuration`] if no transport was given and the
    ///   `http` feature is disabled
    pub fn build(self) -> Result<Client> {
        let transport = match self.transport {
            Some(transport) => transport,
            None => default_transport(&self.config)?,
        };
        let defaults = self.defaults.merged_over(&self.config.default_options());
        Ok(Client::from_parts(transport, self.config, defaults))
    }

    // ============================================================================
    // INSPECTION METHODS
    // ============================================================================

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn has_transport(&self) -> bool {
        self.transport.is_some()
    }
}

#[cfg(feature = "http")]
fn default_transport(config: &ClientConfig) -> Result<Arc<dyn Transport>> {
    let transport = crate::transport::HttpTransport::new(config.http.clone())?;
    Ok(Arc::new(transport))
}

#[cfg(not(feature = "http"))]
fn default_transport(_config: &ClientConfig) -> Result<Arc<dyn Transport>> {
    Err(crate::error::Error::configuration(
        "No transport configured: enable the `http` feature or call `with_transport`",
    ))
}

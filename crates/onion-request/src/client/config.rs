//! Client configuration
//!
//! [`ClientConfig`] can be built in code or loaded from a TOML, YAML or JSON
//! file. Environment variables prefixed with `ONION_REQUEST` override file
//! settings, using `__` for nesting (e.g. `ONION_REQUEST__HTTP__USER_AGENT`).

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::options::{RequestOptions, keys};

/// Default prefix for environment overrides.
pub const ENV_PREFIX: &str = "ONION_REQUEST";

/// Configuration error types
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Config file not found
    #[error("Configuration file not found: {0}")]
    FileNotFound(PathBuf),

    /// Unsupported file format
    #[error("Unsupported configuration file format. Use .toml, .yaml, .yml, or .json")]
    UnsupportedFormat,

    /// Configuration parsing error
    #[error("Failed to parse configuration: {0}")]
    ParseError(#[from] config::ConfigError),
}

/// Settings for the built-in HTTP transport.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    /// User-Agent header (set to `None` to send none)
    pub user_agent: Option<String>,

    /// Treat non-2xx responses as transport failures
    pub error_for_status: bool,

    /// TCP connect timeout in milliseconds
    pub connect_timeout_ms: Option<u64>,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            user_agent: Some(format!("onion-request/{}", env!("CARGO_PKG_VERSION"))),
            error_for_status: true,
            connect_timeout_ms: None,
        }
    }
}

impl HttpConfig {
    pub fn connect_timeout(&self) -> Option<Duration> {
        self.connect_timeout_ms.map(Duration::from_millis)
    }
}

/// Client-wide settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Transport timeout in milliseconds, used when a request sets none
    pub timeout_ms: Option<u64>,

    /// Prepended to every request url
    pub prefix: Option<String>,

    /// Appended to every request url
    pub suffix: Option<String>,

    /// Headers sent with every request
    pub headers: BTreeMap<String, String>,

    /// HTTP transport settings
    pub http: HttpConfig,
}

impl ClientConfig {
    /// Load configuration from a file (TOML, YAML, or JSON)
    ///
    /// The file format is detected from the extension. Environment variables
    /// with the `ONION_REQUEST__` prefix override file settings.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The file doesn't exist
    /// - The file format is unsupported
    /// - The file contains invalid configuration
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        Self::from_file_with_prefix(path, ENV_PREFIX)
    }

    /// Load configuration from a file with a custom environment prefix
    ///
    /// # Errors
    ///
    /// Same as [`ClientConfig::from_file`].
    pub fn from_file_with_prefix(
        path: impl AsRef<Path>,
        env_prefix: &str,
    ) -> Result<Self, ConfigError> {
        use config::{Config, File, FileFormat};

        let path = path.as_ref();

        if !path.exists() {
            return Err(ConfigError::FileNotFound(path.to_path_buf()));
        }

        let format = match path.extension().and_then(|s| s.to_str()) {
            Some("toml") => FileFormat::Toml,
            Some("yaml") | Some("yml") => FileFormat::Yaml,
            Some("json") => FileFormat::Json,
            _ => return Err(ConfigError::UnsupportedFormat),
        };

        let config = Config::builder()
            .add_source(File::new(
                path.to_str().ok_or(ConfigError::UnsupportedFormat)?,
                format,
            ))
            .add_source(
                config::Environment::with_prefix(env_prefix)
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        Ok(config.try_deserialize()?)
    }

    /// Default transport timeout; `Some(0)` means none.
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_ms
            .filter(|millis| *millis > 0)
            .map(Duration::from_millis)
    }

    /// Request options implied by this configuration.
    pub fn default_options(&self) -> RequestOptions {
        let mut options = RequestOptions::new();
        if let Some(timeout) = self.timeout_ms {
            options.insert(keys::TIMEOUT, timeout);
        }
        if let Some(prefix) = &self.prefix {
            options.insert(keys::PREFIX, prefix.as_str());
        }
        if let Some(suffix) = &self.suffix {
            options.insert(keys::SUFFIX, suffix.as_str());
        }
        for (name, value) in &self.headers {
            options.set_header(name.as_str(), value.as_str());
        }
        options
    }
}

//! Response types handed to response interceptors and returned to callers.

use bytes::Bytes;
use http::header::{HeaderMap, HeaderName, HeaderValue};
use http::StatusCode;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::{Error, Result};
use crate::options::{RequestOptions, ResponseType};

/// Response headers with fetch-style read/append semantics.
///
/// [`Headers::get`] joins repeated values with `", "`, so appending to an
/// existing header is visible as one combined value.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Headers {
    inner: HeaderMap,
}

impl Headers {
    /// Empty header set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Combined value of `name`, or `None` if absent.
    pub fn get(&self, name: &str) -> Option<String> {
        let mut values = self.inner.get_all(name).iter().peekable();
        values.peek()?;
        let joined = values
            .map(|v| String::from_utf8_lossy(v.as_bytes()).into_owned())
            .collect::<Vec<_>>()
            .join(", ");
        Some(joined)
    }

    /// Add a value for `name`, keeping existing values.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] for an invalid header name or value.
    pub fn append(&mut self, name: &str, value: &str) -> Result<()> {
        let (name, value) = parse_header(name, value)?;
        self.inner.append(name, value);
        Ok(())
    }

    /// Replace all values of `name`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] for an invalid header name or value.
    pub fn set(&mut self, name: &str, value: &str) -> Result<()> {
        let (name, value) = parse_header(name, value)?;
        self.inner.insert(name, value);
        Ok(())
    }

    /// Remove `name`, returning whether it was present.
    pub fn delete(&mut self, name: &str) -> bool {
        self.inner.remove(name).is_some()
    }

    /// Whether `name` has at least one value.
    pub fn contains(&self, name: &str) -> bool {
        self.inner.contains_key(name)
    }

    /// Number of distinct header names.
    pub fn len(&self) -> usize {
        self.inner.keys_len()
    }

    /// True when no header is set.
    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    /// Underlying header map.
    pub fn as_map(&self) -> &HeaderMap {
        &self.inner
    }
}

impl From<HeaderMap> for Headers {
    fn from(inner: HeaderMap) -> Self {
        Self { inner }
    }
}

fn parse_header(name: &str, value: &str) -> Result<(HeaderName, HeaderValue)> {
    let name = HeaderName::from_bytes(name.as_bytes())
        .map_err(|e| Error::validation(format!("invalid header name '{name}': {e}")))?;
    let value = HeaderValue::from_str(value)
        .map_err(|e| Error::validation(format!("invalid header value for '{name}': {e}")))?;
    Ok((name, value))
}

/// A fully received response.
///
/// The body is buffered by the transport and decoded on demand.
#[derive(Debug, Clone)]
pub struct Response {
    status: StatusCode,
    url: String,
    headers: Headers,
    body: Bytes,
}

impl Response {
    /// Empty-bodied response for `url`.
    pub fn new(status: StatusCode, url: impl Into<String>) -> Self {
        Self {
            status,
            url: url.into(),
            headers: Headers::new(),
            body: Bytes::new(),
        }
    }

    /// Replace the headers (builder style).
    pub fn with_headers(mut self, headers: impl Into<Headers>) -> Self {
        self.headers = headers.into();
        self
    }

    /// Replace the body (builder style).
    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    /// Numeric status code.
    pub fn status(&self) -> u16 {
        self.status.as_u16()
    }

    /// Status as [`StatusCode`].
    pub fn status_code(&self) -> StatusCode {
        self.status
    }

    /// Whether the status is in `200..300`.
    pub fn ok(&self) -> bool {
        self.status.is_success()
    }

    /// Final url of the exchange.
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Response headers.
    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    /// Mutable headers, for in-place edits by interceptors.
    pub fn headers_mut(&mut self) -> &mut Headers {
        &mut self.headers
    }

    /// Raw body bytes.
    pub fn bytes(&self) -> &Bytes {
        &self.body
    }

    /// Body as UTF-8 text, replacing invalid sequences.
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    /// Deserialize the body as JSON.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Decode`] if the body is not valid JSON for `T`.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T> {
        serde_json::from_slice(&self.body).map_err(|e| Error::decode(e.to_string()))
    }

    /// Decode the body the way the caller asked for it.
    ///
    /// JSON mode yields `null` for an empty body and falls back to a string
    /// when the body is not JSON.
    pub fn decode(&self, response_type: ResponseType) -> Value {
        match response_type {
            ResponseType::Text => Value::String(self.text()),
            ResponseType::Json if self.body.is_empty() => Value::Null,
            ResponseType::Json => self
                .json::<Value>()
                .unwrap_or_else(|_| Value::String(self.text())),
        }
    }
}

/// The `(response, options)` pair threaded through the response chain.
#[derive(Debug, Clone)]
pub struct ResponseState {
    pub response: Response,
    /// Final request options, as handed to the transport.
    pub options: RequestOptions,
}

/// What a successful invocation returns.
#[derive(Debug, Clone)]
pub enum Reply {
    /// Decoded body only.
    Data(Value),
    /// Decoded body plus the response it came from (`getResponse: true`).
    Full { data: Value, response: Response },
}

impl Reply {
    /// Decoded body.
    pub fn data(&self) -> &Value {
        match self {
            Self::Data(data) | Self::Full { data, .. } => data,
        }
    }

    pub fn into_data(self) -> Value {
        match self {
            Self::Data(data) | Self::Full { data, .. } => data,
        }
    }

    /// The response, when it was requested.
    pub fn response(&self) -> Option<&Response> {
        match self {
            Self::Data(_) => None,
            Self::Full { response, .. } => Some(response),
        }
    }
}

//! Request options and in-flight request state.
//!
//! [`RequestOptions`] is an open string-keyed map. The pipeline reads only a
//! handful of well-known keys (see [`keys`]); everything else is passed
//! through untouched for interceptors and transports to interpret.

use http::Method;
use serde_json::{Map, Value};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use crate::error::{Error, Result};

/// Option keys inspected by the pipeline and the HTTP transport.
pub mod keys {
    /// HTTP method, case-insensitive string. Defaults to `GET`.
    pub const METHOD: &str = "method";
    /// Request body.
    pub const DATA: &str = "data";
    /// Return `{ data, response }` instead of only the parsed body.
    pub const GET_RESPONSE: &str = "getResponse";
    /// Transport timeout in milliseconds. `0` disables it.
    pub const TIMEOUT: &str = "timeout";
    /// Request headers, an object of string values.
    pub const HEADERS: &str = "headers";
    /// Query parameters, an object of scalar values.
    pub const PARAMS: &str = "params";
    /// Prepended to the url before the request chain runs.
    pub const PREFIX: &str = "prefix";
    /// Appended to the url before the request chain runs.
    pub const SUFFIX: &str = "suffix";
    /// `"json"` (default) or `"text"`.
    pub const RESPONSE_TYPE: &str = "responseType";
}

/// How the response body is turned into the returned data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResponseType {
    /// Parse as JSON, falling back to text when the body is not JSON.
    #[default]
    Json,
    /// Return the body as a string.
    Text,
}

/// Caller-supplied options for one invocation.
///
/// Cloning is cheap enough to do once per interceptor step; the cancellation
/// token is shared between clones.
#[derive(Debug, Clone, Default)]
pub struct RequestOptions {
    values: Map<String, Value>,
    cancel_token: Option<CancellationToken>,
}

impl PartialEq for RequestOptions {
    fn eq(&self, other: &Self) -> bool {
        self.values == other.values
    }
}

impl RequestOptions {
    /// Create empty options
    pub fn new() -> Self {
        Self::default()
    }

    /// Build options from a JSON object.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] if `value` is not an object.
    pub fn from_json(value: Value) -> Result<Self> {
        match value {
            Value::Object(values) => Ok(Self {
                values,
                cancel_token: None,
            }),
            Value::Null => Ok(Self::default()),
            other => Err(Error::validation(format!(
                "options MUST be an object, got {other}"
            ))),
        }
    }

    /// Set `key` and return the options (builder style).
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.values.insert(key.into(), value.into());
        self
    }

    /// Set `key`, returning the previous value.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.values.insert(key.into(), value.into())
    }

    /// Read `key`.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    /// Mutable access to `key`.
    pub fn get_mut(&mut self, key: &str) -> Option<&mut Value> {
        self.values.get_mut(key)
    }

    /// Remove `key`.
    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.values.remove(key)
    }

    /// Whether `key` is set.
    pub fn contains(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    /// All option values.
    pub fn values(&self) -> &Map<String, Value> {
        &self.values
    }

    /// Options as a JSON object (the cancellation token is not included).
    pub fn to_json(&self) -> Value {
        Value::Object(self.values.clone())
    }

    /// HTTP method, `GET` when unset or unparsable.
    pub fn method(&self) -> Method {
        self.get(keys::METHOD)
            .and_then(Value::as_str)
            .and_then(|m| Method::from_bytes(m.to_ascii_uppercase().as_bytes()).ok())
            .unwrap_or(Method::GET)
    }

    /// Set the HTTP method.
    pub fn with_method(self, method: &Method) -> Self {
        self.with(keys::METHOD, method.as_str())
    }

    /// Request body.
    pub fn data(&self) -> Option<&Value> {
        self.get(keys::DATA)
    }

    /// Mutable request body.
    pub fn data_mut(&mut self) -> Option<&mut Value> {
        self.get_mut(keys::DATA)
    }

    /// Set the request body.
    pub fn with_data(self, data: impl Into<Value>) -> Self {
        self.with(keys::DATA, data)
    }

    /// Whether the caller asked for `{ data, response }`.
    pub fn get_response(&self) -> bool {
        self.get(keys::GET_RESPONSE)
            .and_then(Value::as_bool)
            .unwrap_or(false)
    }

    /// Transport timeout, if configured.
    ///
    /// Accepts a non-negative number of milliseconds; fractional values are
    /// rounded up. `0` means no timeout. Negative, non-finite and non-numeric
    /// values are ignored.
    pub fn timeout(&self) -> Option<Duration> {
        let millis = match self.get(keys::TIMEOUT)? {
            Value::Number(n) => match n.as_u64() {
                Some(millis) => millis,
                None => {
                    let millis = n.as_f64().filter(|m| m.is_finite() && *m >= 0.0)?;
                    // float to int casts saturate
                    millis.ceil() as u64
                }
            },
            _ => return None,
        };
        (millis > 0).then(|| Duration::from_millis(millis))
    }

    /// Set the transport timeout.
    pub fn with_timeout(self, timeout: Duration) -> Self {
        let millis = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
        self.with(keys::TIMEOUT, millis)
    }

    /// Header values as `(name, value)` pairs. Non-string values are rendered
    /// as JSON text.
    pub fn headers(&self) -> Vec<(String, String)> {
        self.object_entries(keys::HEADERS)
    }

    /// Query parameters as `(name, value)` pairs.
    pub fn params(&self) -> Vec<(String, String)> {
        self.object_entries(keys::PARAMS)
    }

    /// Set one header, creating the `headers` object if needed.
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.set_header(name, value);
        self
    }

    /// Set one header in place.
    pub fn set_header(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let headers = self
            .values
            .entry(keys::HEADERS)
            .or_insert_with(|| Value::Object(Map::new()));
        if !headers.is_object() {
            *headers = Value::Object(Map::new());
        }
        if let Value::Object(map) = headers {
            map.insert(name.into(), Value::String(value.into()));
        }
    }

    /// Body decoding mode.
    pub fn response_type(&self) -> ResponseType {
        match self.get(keys::RESPONSE_TYPE).and_then(Value::as_str) {
            Some(t) if t.eq_ignore_ascii_case("text") => ResponseType::Text,
            _ => ResponseType::Json,
        }
    }

    /// Cancellation token observed by the pipeline.
    pub fn cancel_token(&self) -> Option<&CancellationToken> {
        self.cancel_token.as_ref()
    }

    /// Attach a cancellation token.
    pub fn with_cancel_token(mut self, token: CancellationToken) -> Self {
        self.cancel_token = Some(token);
        self
    }

    /// Layer these options over `defaults`.
    ///
    /// Keys set here win. `headers` and `params` objects are merged key by key.
    pub fn merged_over(&self, defaults: &RequestOptions) -> RequestOptions {
        let mut values = defaults.values.clone();
        for (key, value) in &self.values {
            match (values.get_mut(key), value) {
                (Some(Value::Object(base)), Value::Object(overlay))
                    if key == keys::HEADERS || key == keys::PARAMS =>
                {
                    for (k, v) in overlay {
                        base.insert(k.clone(), v.clone());
                    }
                }
                _ => {
                    values.insert(key.clone(), value.clone());
                }
            }
        }
        RequestOptions {
            values,
            cancel_token: self
                .cancel_token
                .clone()
                .or_else(|| defaults.cancel_token.clone()),
        }
    }

    fn object_entries(&self, key: &str) -> Vec<(String, String)> {
        match self.get(key) {
            Some(Value::Object(map)) => map
                .iter()
                .filter(|(_, v)| !v.is_null())
                .map(|(k, v)| {
                    let rendered = match v {
                        Value::String(s) => s.clone(),
                        other => other.to_string(),
                    };
                    (k.clone(), rendered)
                })
                .collect(),
            _ => Vec::new(),
        }
    }
}

impl From<Map<String, Value>> for RequestOptions {
    fn from(values: Map<String, Value>) -> Self {
        Self {
            values,
            cancel_token: None,
        }
    }
}

/// The `(url, options)` pair threaded through the request chain.
#[derive(Debug, Clone, PartialEq)]
pub struct RequestState {
    pub url: String,
    pub options: RequestOptions,
}

impl RequestState {
    pub fn new(url: impl Into<String>, options: RequestOptions) -> Self {
        Self {
            url: url.into(),
            options,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn reads_well_known_keys() {
        let options = RequestOptions::from_json(json!({
            "method": "post",
            "data": { "bar": "bar" },
            "getResponse": true,
            "timeout": 1200,
            "responseType": "TEXT",
        }))
        .unwrap();

        assert_eq!(options.method(), Method::POST);
        assert_eq!(options.data(), Some(&json!({ "bar": "bar" })));
        assert!(options.get_response());
        assert_eq!(options.timeout(), Some(Duration::from_millis(1200)));
        assert_eq!(options.response_type(), ResponseType::Text);
    }

    #[test]
    fn defaults_when_keys_are_missing() {
        let options = RequestOptions::new();
        assert_eq!(options.method(), Method::GET);
        assert!(!options.get_response());
        assert_eq!(options.timeout(), None);
        assert_eq!(options.response_type(), ResponseType::Json);
        assert!(options.headers().is_empty());
    }

    #[test]
    fn zero_timeout_disables_it() {
        assert_eq!(RequestOptions::new().with("timeout", 0).timeout(), None);
        assert_eq!(
            RequestOptions::new().with_timeout(Duration::ZERO).timeout(),
            None
        );
    }

    #[test]
    fn fractional_timeout_rounds_up_and_junk_is_ignored() {
        assert_eq!(
            RequestOptions::new().with("timeout", 250.2).timeout(),
            Some(Duration::from_millis(251))
        );
        assert_eq!(RequestOptions::new().with("timeout", -5).timeout(), None);
        assert_eq!(RequestOptions::new().with("timeout", -0.5).timeout(), None);
        assert_eq!(RequestOptions::new().with("timeout", "100").timeout(), None);
        assert_eq!(RequestOptions::new().with("timeout", true).timeout(), None);
    }

    #[test]
    fn rejects_non_object_json() {
        let err = RequestOptions::from_json(json!([1, 2])).unwrap_err();
        assert!(matches!(err, Error::Validation { .. }));
    }

    #[test]
    fn merge_prefers_caller_and_merges_headers() {
        let defaults = RequestOptions::new()
            .with("timeout", 500)
            .with("flag", "default")
            .with_header("x-default", "1")
            .with_header("x-shared", "default");
        let caller = RequestOptions::new()
            .with("flag", "caller")
            .with_header("x-shared", "caller");

        let merged = caller.merged_over(&defaults);
        assert_eq!(merged.get("flag"), Some(&json!("caller")));
        assert_eq!(merged.timeout(), Some(Duration::from_millis(500)));

        let mut headers = merged.headers();
        headers.sort();
        assert_eq!(
            headers,
            vec![
                ("x-default".to_string(), "1".to_string()),
                ("x-shared".to_string(), "caller".to_string()),
            ]
        );
    }

    #[test]
    fn clones_share_cancel_token() {
        let token = CancellationToken::new();
        let options = RequestOptions::new().with_cancel_token(token.clone());
        let copy = options.clone();
        token.cancel();
        assert!(copy.cancel_token().unwrap().is_cancelled());
    }

    #[test]
    fn headers_render_non_string_values() {
        let options = RequestOptions::from_json(json!({
            "headers": { "x-count": 3, "x-skip": null }
        }))
        .unwrap();
        assert_eq!(
            options.headers(),
            vec![("x-count".to_string(), "3".to_string())]
        );
    }
}

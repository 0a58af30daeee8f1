//! Shared test infrastructure
//!
//! - [`EchoQuery`] / [`EchoBody`]: wiremock responders that reflect the
//!   request back as JSON
//! - [`Recorder`]: in-memory transport that records every call

#![allow(dead_code)]

use async_trait::async_trait;
use onion_request::transport::Transport;
use onion_request::{RequestOptions, Response, Result};
use serde_json::{Map, Value, json};
use std::sync::Mutex;
use std::time::Duration;
use wiremock::{Request, Respond, ResponseTemplate};

/// Responds with the query string as a JSON object.
pub struct EchoQuery;

impl Respond for EchoQuery {
    fn respond(&self, request: &Request) -> ResponseTemplate {
        let query: Map<String, Value> = request
            .url
            .query_pairs()
            .map(|(k, v)| (k.into_owned(), Value::String(v.into_owned())))
            .collect();

        ResponseTemplate::new(200)
            .insert_header("access-control-allow-origin", "*")
            .set_body_json(Value::Object(query))
    }
}

/// Responds with the request body, as JSON.
pub struct EchoBody;

impl Respond for EchoBody {
    fn respond(&self, request: &Request) -> ResponseTemplate {
        ResponseTemplate::new(200)
            .insert_header("access-control-allow-origin", "*")
            .set_body_raw(request.body.clone(), "application/json")
    }
}

/// Transport that records calls and answers `{ "url", "options" }`.
#[derive(Debug, Default)]
pub struct Recorder {
    calls: Mutex<Vec<(String, RequestOptions)>>,
    delay: Option<Duration>,
}

impl Recorder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sleep for `delay` before answering.
    pub fn with_delay(delay: Duration) -> Self {
        Self {
            delay: Some(delay),
            ..Self::default()
        }
    }

    pub fn calls(&self) -> Vec<(String, RequestOptions)> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait]
impl Transport for Recorder {
    async fn send(&self, url: &str, options: &RequestOptions) -> Result<Response> {
        self.calls
            .lock()
            .unwrap()
            .push((url.to_string(), options.clone()));

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let body = json!({ "url": url, "options": options.to_json() });
        Ok(Response::new(http::StatusCode::OK, url).with_body(body.to_string()))
    }
}

/// Install a test subscriber honouring `RUST_LOG`.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

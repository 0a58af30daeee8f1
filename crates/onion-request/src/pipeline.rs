//! Request pipeline
//!
//! Drives one invocation through its stages:
//!
//! ```text
//! Building → RequestChain → Transporting → ResponseChain → Settled
//! ```
//!
//! `Building` runs synchronously when the invocation is created, so input
//! errors surface before any interceptor or network activity. The remaining
//! stages run when the [`Pipeline`] is awaited. Any failure jumps straight to
//! `Settled` with that error.

use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, debug_span, warn};

use crate::error::{Error, Result};
use crate::interceptor::ResolvedChains;
use crate::options::{RequestOptions, RequestState, keys};
use crate::response::{Reply, Response, ResponseState};
use crate::transport::Transport;

/// Message of the error returned for a non-string url.
pub const URL_NOT_STRING: &str = "url MUST be a string";

/// Lifecycle stage of one invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Building,
    RequestChain,
    Transporting,
    ResponseChain,
    Settled,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Building => "building",
            Self::RequestChain => "request_chain",
            Self::Transporting => "transporting",
            Self::ResponseChain => "response_chain",
            Self::Settled => "settled",
        };
        f.write_str(name)
    }
}

/// `Building`: validate the url and layer the caller's options over the
/// client defaults.
///
/// `prefix` and `suffix` are applied here so every interceptor sees the
/// final url.
///
/// # Errors
///
/// Returns [`Error::Validation`] ("url MUST be a string") if `url` is not a
/// JSON string.
pub fn build_state(
    url: Value,
    options: RequestOptions,
    defaults: &RequestOptions,
) -> Result<RequestState> {
    let Value::String(url) = url else {
        debug!(stage = %Stage::Building, "Rejected non-string url");
        return Err(Error::validation(URL_NOT_STRING));
    };

    let options = options.merged_over(defaults);
    let prefix = options.get(keys::PREFIX).and_then(Value::as_str).unwrap_or("");
    let suffix = options.get(keys::SUFFIX).and_then(Value::as_str).unwrap_or("");
    let url = format!("{prefix}{url}{suffix}");

    Ok(RequestState::new(url, options))
}

/// The awaitable part of one invocation.
#[derive(Debug, Clone)]
pub struct Pipeline {
    transport: Arc<dyn Transport>,
    chains: ResolvedChains,
}

impl Pipeline {
    pub fn new(transport: Arc<dyn Transport>, chains: ResolvedChains) -> Self {
        Self { transport, chains }
    }

    pub fn chains(&self) -> &ResolvedChains {
        &self.chains
    }

    /// Run `state` through the remaining stages.
    ///
    /// # Errors
    ///
    /// - [`Error::Chain`] if a request or response interceptor fails
    /// - [`Error::Transport`] if the transport fails
    /// - [`Error::Timeout`] if the transport outlives the `timeout` option
    /// - [`Error::Cancelled`] if the cancellation token fires
    pub async fn run(self, state: RequestState) -> Result<Reply> {
        let span = debug_span!(
            "request",
            method = %state.options.method(),
            url = %state.url
        );

        async move {
            let outcome = self.drive(state).await;
            match &outcome {
                Ok(_) => debug!(stage = %Stage::Settled, "Request succeeded"),
                Err(e) => warn!(stage = %Stage::Settled, error = %e, "Request failed"),
            }
            outcome
        }
        .instrument(span)
        .await
    }

    async fn drive(&self, state: RequestState) -> Result<Reply> {
        let cancel = state.options.cancel_token().cloned();

        debug!(stage = %Stage::RequestChain, interceptors = self.chains.request.len());
        let state = self.chains.request.run(state, cancel.as_ref()).await?;
        ensure_not_cancelled(cancel.as_ref(), Stage::Transporting)?;

        debug!(stage = %Stage::Transporting, url = %state.url);
        let response = self.transport_stage(&state, cancel.as_ref()).await?;

        debug!(
            stage = %Stage::ResponseChain,
            interceptors = self.chains.response.len(),
            status = response.status()
        );
        let seed = ResponseState {
            response,
            options: state.options,
        };
        let ResponseState { response, options } =
            self.chains.response.run(seed, cancel.as_ref()).await?;

        Ok(settle(response, &options))
    }

    async fn transport_stage(
        &self,
        state: &RequestState,
        cancel: Option<&CancellationToken>,
    ) -> Result<Response> {
        let timeout = state.options.timeout();
        let send = send_with_timeout(self.transport.as_ref(), state, timeout);

        match cancel {
            Some(token) => tokio::select! {
                biased;
                () = token.cancelled() => Err(Error::cancelled("cancelled during transport")),
                result = send => result,
            },
            None => send.await,
        }
    }
}

async fn send_with_timeout(
    transport: &dyn Transport,
    state: &RequestState,
    timeout: Option<Duration>,
) -> Result<Response> {
    let send = transport.send(&state.url, &state.options);
    match timeout {
        Some(timeout) => tokio::time::timeout(timeout, send)
            .await
            .map_err(|_| Error::Timeout { timeout })?,
        None => send.await,
    }
}

fn ensure_not_cancelled(cancel: Option<&CancellationToken>, next: Stage) -> Result<()> {
    if cancel.is_some_and(CancellationToken::is_cancelled) {
        return Err(Error::cancelled(format!("cancelled before {next}")));
    }
    Ok(())
}

/// `Settled(Success)`: shape the caller's value per `getResponse`.
fn settle(response: Response, options: &RequestOptions) -> Reply {
    let data = response.decode(options.response_type());
    if options.get_response() {
        Reply::Full { data, response }
    } else {
        Reply::Data(data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn non_string_url_is_rejected() {
        let err = build_state(json!({ "hello": 1 }), RequestOptions::new(), &RequestOptions::new())
            .unwrap_err();
        assert_eq!(err.to_string(), "url MUST be a string");
        assert!(matches!(err, Error::Validation { .. }));

        assert!(build_state(json!(42), RequestOptions::new(), &RequestOptions::new()).is_err());
        assert!(build_state(Value::Null, RequestOptions::new(), &RequestOptions::new()).is_err());
    }

    #[test]
    fn building_merges_defaults_and_applies_affixes() {
        let defaults = RequestOptions::new()
            .with(keys::PREFIX, "http://api.local")
            .with(keys::TIMEOUT, 300)
            .with_header("x-default", "1");
        let options = RequestOptions::new()
            .with(keys::SUFFIX, ".json")
            .with(keys::TIMEOUT, 900);

        let state = build_state(json!("/users"), options, &defaults).unwrap();
        assert_eq!(state.url, "http://api.local/users.json");
        assert_eq!(state.options.timeout(), Some(Duration::from_millis(900)));
        assert_eq!(state.options.headers(), vec![("x-default".into(), "1".into())]);
    }

    #[test]
    fn settle_honours_get_response() {
        let response =
            Response::new(http::StatusCode::OK, "http://a/").with_body(r#"{"ok":true}"#);

        match settle(response.clone(), &RequestOptions::new()) {
            Reply::Data(data) => assert_eq!(data, json!({ "ok": true })),
            Reply::Full { .. } => panic!("expected data only"),
        }

        let options = RequestOptions::new().with(keys::GET_RESPONSE, true);
        match settle(response, &options) {
            Reply::Full { data, response } => {
                assert_eq!(data, json!({ "ok": true }));
                assert_eq!(response.status(), 200);
            }
            Reply::Data(_) => panic!("expected full reply"),
        }
    }

    #[test]
    fn stage_names() {
        assert_eq!(Stage::RequestChain.to_string(), "request_chain");
        assert_eq!(Stage::Settled.to_string(), "settled");
    }
}

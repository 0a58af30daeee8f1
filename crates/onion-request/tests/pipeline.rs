//! Pipeline behaviour over an in-memory transport
//!
//! Every client here registers with `global: false` only, so tests can run
//! in parallel without touching the process-wide registry.

mod common;

use common::Recorder;
use futures::future::join_all;
use onion_request::interceptor::{
    InterceptResult, Intercepted, UseOptions, request_fn, request_fn_async, response_fn,
};
use onion_request::{
    CancellationToken, Client, ClientBuilder, Error, Phase, Reply, RequestOptions, RequestState,
    Response,
};
use pretty_assertions::assert_eq;
use serde_json::{Value, json};
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

fn client_over(recorder: &Arc<Recorder>) -> Client {
    common::init_tracing();
    ClientBuilder::new()
        .with_shared_transport(recorder.clone())
        .build()
        .unwrap()
}

fn append_trail(
    segment: &'static str,
) -> impl Fn(&str, &RequestOptions) -> InterceptResult<RequestState> + Send + Sync + 'static {
    move |url: &str, options: &RequestOptions| {
        let mut options = options.clone();
        let mut trail = options
            .get("trail")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();
        trail.push(json!(segment));
        options.insert("trail", trail);
        Ok(RequestState::new(format!("{url}/{segment}"), options).into())
    }
}

#[derive(Debug, thiserror::Error)]
#[error("response rejected: {status}")]
struct Rejected {
    status: u16,
}

// ============================================================================
// ORDERING AND THE NO-OP LAW
// ============================================================================

#[tokio::test]
async fn request_mutations_apply_in_registration_order() {
    let recorder = Arc::new(Recorder::new());
    let client = client_over(&recorder);
    let request = client.interceptors().request();

    for segment in ["a", "b", "c"] {
        request.register(request_fn(append_trail(segment)), UseOptions::instance());
    }

    client.get("http://svc", RequestOptions::new()).await.unwrap();

    let (url, options) = &recorder.calls()[0];
    assert_eq!(url, "http://svc/a/b/c");
    assert_eq!(options.get("trail"), Some(&json!(["a", "b", "c"])));
}

#[tokio::test]
async fn noop_interceptor_leaves_state_unchanged() {
    let recorder = Arc::new(Recorder::new());
    let client = client_over(&recorder);
    let seen = Arc::new(Mutex::new(Vec::new()));

    client
        .interceptors()
        .request()
        .register(request_fn(|_, _| Ok(Intercepted::Unchanged)), UseOptions::instance());

    let observed = seen.clone();
    client.interceptors().request().register(
        request_fn(move |url, options| {
            observed
                .lock()
                .unwrap()
                .push((url.to_string(), options.clone()));
            Ok(Intercepted::Unchanged)
        }),
        UseOptions::instance(),
    );

    let options = RequestOptions::new().with("flag", 1).with_header("x-a", "1");
    client.request("http://svc/x", options.clone()).await.unwrap();

    let seen = seen.lock().unwrap();
    assert_eq!(seen[0].0, "http://svc/x");
    assert_eq!(seen[0].1, options);
    assert_eq!(recorder.calls()[0], ("http://svc/x".to_string(), options));
}

// ============================================================================
// OPTIONS CARRY-FORWARD AND RETURN SHAPE
// ============================================================================

#[tokio::test]
async fn replaced_options_reach_transport_and_response_chain() {
    let recorder = Arc::new(Recorder::new());
    let client = client_over(&recorder);
    let token_in_response_chain = Arc::new(Mutex::new(None));

    client.interceptors().request().register(
        request_fn(|url, options| {
            Ok(RequestState::new(url, options.clone().with("token", "t-1")).into())
        }),
        UseOptions::instance(),
    );

    let captured = token_in_response_chain.clone();
    client.interceptors().response().register(
        response_fn(move |_, options| {
            *captured.lock().unwrap() = options.get("token").cloned();
            Ok(Intercepted::Unchanged)
        }),
        UseOptions::instance(),
    );

    client.get("http://svc", RequestOptions::new()).await.unwrap();

    assert_eq!(recorder.calls()[0].1.get("token"), Some(&json!("t-1")));
    assert_eq!(*token_in_response_chain.lock().unwrap(), Some(json!("t-1")));
}

#[tokio::test]
async fn get_response_selects_the_return_shape() {
    let recorder = Arc::new(Recorder::new());
    let client = client_over(&recorder);

    let reply = client.get("http://svc/a", RequestOptions::new()).await.unwrap();
    assert!(matches!(reply, Reply::Data(_)));
    assert_eq!(reply.data()["url"], json!("http://svc/a"));

    let reply = client
        .get("http://svc/b", RequestOptions::new().with("getResponse", true))
        .await
        .unwrap();
    let response = reply.response().expect("full reply");
    assert_eq!(response.status(), 200);
    assert_eq!(response.url(), "http://svc/b");
    assert_eq!(reply.data()["url"], json!("http://svc/b"));
}

#[tokio::test]
async fn response_interceptors_edit_in_place_or_replace() {
    let recorder = Arc::new(Recorder::new());
    let client = client_over(&recorder);
    let responses = client.interceptors().response();

    responses.register(
        response_fn(|response, _| {
            response.headers_mut().append("x-trace", "first")?;
            Ok(Intercepted::Unchanged)
        }),
        UseOptions::instance(),
    );
    responses.register(
        response_fn(|response, _| {
            let replaced = Response::new(http::StatusCode::ACCEPTED, response.url())
                .with_headers(response.headers().as_map().clone())
                .with_body(r#"{"replaced":true}"#);
            Ok(Intercepted::Replace(replaced))
        }),
        UseOptions::instance(),
    );

    let reply = client
        .get("http://svc", RequestOptions::new().with("getResponse", true))
        .await
        .unwrap();

    assert_eq!(reply.data(), &json!({ "replaced": true }));
    let response = reply.response().unwrap();
    assert_eq!(response.status(), 202);
    assert_eq!(response.headers().get("x-trace").as_deref(), Some("first"));
}

// ============================================================================
// FAILURES
// ============================================================================

#[tokio::test]
async fn response_error_aborts_remaining_chain() {
    let recorder = Arc::new(Recorder::new());
    let client = client_over(&recorder);
    let later = Arc::new(AtomicUsize::new(0));
    let responses = client.interceptors().response();

    responses.register(
        response_fn(|_, _| Ok(Intercepted::Unchanged)),
        UseOptions::instance(),
    );
    responses.register(
        response_fn(|response, _| {
            if response.status() == 200 {
                return Err(Rejected { status: 200 }.into());
            }
            Ok(Intercepted::Unchanged)
        }),
        UseOptions::instance(),
    );
    let counter = later.clone();
    responses.register(
        response_fn(move |_, _| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(Intercepted::Unchanged)
        }),
        UseOptions::instance(),
    );

    let err = client.get("http://svc", RequestOptions::new()).await.unwrap_err();

    assert_eq!(err.to_string(), "response rejected: 200");
    assert_eq!(err.chain_position(), Some((Phase::Response, 1)));
    assert_eq!(later.load(Ordering::SeqCst), 0);

    let source = err.into_source().unwrap();
    assert_eq!(source.downcast_ref::<Rejected>().map(|r| r.status), Some(200));
}

#[tokio::test]
async fn request_error_skips_transport() {
    let recorder = Arc::new(Recorder::new());
    let client = client_over(&recorder);

    client.interceptors().request().register(
        request_fn(|_, _| Err("no credentials".into())),
        UseOptions::instance(),
    );

    let err = client.get("http://svc", RequestOptions::new()).await.unwrap_err();
    assert_eq!(err.to_string(), "no credentials");
    assert_eq!(err.chain_position(), Some((Phase::Request, 0)));
    assert_eq!(recorder.call_count(), 0);
}

#[tokio::test]
async fn non_string_url_fails_before_any_chain() {
    let recorder = Arc::new(Recorder::new());
    let client = client_over(&recorder);
    let ran = Arc::new(AtomicUsize::new(0));

    let counter = ran.clone();
    client.interceptors().request().register(
        request_fn(move |_, _| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(Intercepted::Unchanged)
        }),
        UseOptions::instance(),
    );

    let err = client.prepare(json!({ "hello": 1 }), RequestOptions::new()).unwrap_err();
    assert_eq!(err.to_string(), "url MUST be a string");

    let err = client.request(json!(7), RequestOptions::new()).await.unwrap_err();
    assert!(matches!(err, Error::Validation { .. }));

    assert_eq!(ran.load(Ordering::SeqCst), 0);
    assert_eq!(recorder.call_count(), 0);
}

// ============================================================================
// ASYNC INTERCEPTORS AND CONCURRENCY
// ============================================================================

#[tokio::test]
async fn async_request_interceptor_mutation_reaches_transport() {
    let recorder = Arc::new(Recorder::new());
    let client = client_over(&recorder);

    client.interceptors().request().register(
        request_fn_async(|url, mut options| async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            if let Some(Value::Object(data)) = options.data_mut() {
                data.insert("promiseFoo".into(), json!("promiseFoo"));
            }
            Ok(RequestState::new(url, options).into())
        }),
        UseOptions::instance(),
    );

    let reply = client
        .post("http://svc", RequestOptions::new().with_data(json!({ "bar": "bar" })))
        .await
        .unwrap();

    assert_eq!(
        reply.data()["options"]["data"],
        json!({ "bar": "bar", "promiseFoo": "promiseFoo" })
    );
}

#[tokio::test]
async fn concurrent_invocations_do_not_cross_talk() {
    let recorder = Arc::new(Recorder::new());
    let client = client_over(&recorder);

    client.interceptors().request().register(
        request_fn_async(|url, options| async move {
            let id = options.get("id").and_then(Value::as_u64).unwrap_or_default();
            // later ids finish first
            tokio::time::sleep(Duration::from_millis(50 - id * 5)).await;
            let options = options.with("seen", id);
            Ok(RequestState::new(format!("{url}?id={id}"), options).into())
        }),
        UseOptions::instance(),
    );

    let requests = (0..10u64).map(|id| {
        let client = client.clone();
        async move {
            let reply = client
                .get("http://svc", RequestOptions::new().with("id", id))
                .await
                .unwrap();
            (id, reply.into_data())
        }
    });

    for (id, data) in join_all(requests).await {
        assert_eq!(data["url"], json!(format!("http://svc?id={id}")));
        assert_eq!(data["options"]["seen"], json!(id));
        assert_eq!(data["options"]["id"], json!(id));
    }
    assert_eq!(recorder.call_count(), 10);
}

#[tokio::test]
async fn late_registration_does_not_affect_resolved_request() {
    let recorder = Arc::new(Recorder::new());
    let client = client_over(&recorder);

    let pending = client.prepare("http://svc", RequestOptions::new()).unwrap();
    client.interceptors().request().register(
        request_fn(|url, options| {
            Ok(RequestState::new(format!("{url}/late"), options.clone()).into())
        }),
        UseOptions::instance(),
    );

    pending.await.unwrap();
    client.get("http://svc", RequestOptions::new()).await.unwrap();

    let urls: Vec<_> = recorder.calls().into_iter().map(|(url, _)| url).collect();
    assert_eq!(urls, vec!["http://svc", "http://svc/late"]);
}

// ============================================================================
// CANCELLATION AND TIMEOUT
// ============================================================================

#[tokio::test]
async fn cancelled_token_short_circuits_before_transport() {
    let recorder = Arc::new(Recorder::new());
    let client = client_over(&recorder);
    let token = CancellationToken::new();
    token.cancel();

    let err = client
        .get("http://svc", RequestOptions::new().with_cancel_token(token))
        .await
        .unwrap_err();

    assert!(err.is_cancelled());
    assert_eq!(recorder.call_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn cancellation_interrupts_transport() {
    let recorder = Arc::new(Recorder::with_delay(Duration::from_secs(30)));
    let client = client_over(&recorder);
    let token = CancellationToken::new();

    let trigger = token.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(100)).await;
        trigger.cancel();
    });

    let err = client
        .get("http://svc", RequestOptions::new().with_cancel_token(token))
        .await
        .unwrap_err();

    assert!(err.is_cancelled());
    assert_eq!(recorder.call_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn timeout_bounds_transport_stage() {
    let recorder = Arc::new(Recorder::with_delay(Duration::from_secs(5)));
    let client = client_over(&recorder);

    let err = client
        .get("http://svc", RequestOptions::new().with("timeout", 100))
        .await
        .unwrap_err();

    assert!(err.is_timeout());
    assert_eq!(err.to_string(), "timeout of 100ms exceeded");
}

#[tokio::test(start_paused = true)]
async fn timeout_does_not_cover_interceptors() {
    let recorder = Arc::new(Recorder::new());
    let client = client_over(&recorder);

    client.interceptors().request().register(
        request_fn_async(|_, _| async move {
            tokio::time::sleep(Duration::from_secs(2)).await;
            Ok(Intercepted::Unchanged)
        }),
        UseOptions::instance(),
    );

    client
        .get("http://svc", RequestOptions::new().with("timeout", 100))
        .await
        .unwrap();
    assert_eq!(recorder.call_count(), 1);
}

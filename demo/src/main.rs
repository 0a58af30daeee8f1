//! onion-request demo
//!
//! Starts a local echo server, registers interceptors at both scopes and
//! sends a few requests through them. Run with `RUST_LOG=onion_request=debug`
//! to watch each stage of the pipeline.
//!
//! An optional first argument names a client configuration file
//! (TOML/YAML/JSON) used for the `api` client.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use axum::extract::Query;
use axum::http::HeaderMap;
use axum::routing::get;
use axum::{Json, Router};
use onion_request::interceptor::{Intercepted, UseOptions, request_fn, response_fn};
use onion_request::{ClientBuilder, ClientConfig, RequestOptions, RequestState};
use serde_json::{Value, json};
use tracing::info;
use tracing_subscriber::EnvFilter;

async fn echo_query(
    headers: HeaderMap,
    Query(query): Query<BTreeMap<String, String>>,
) -> Json<Value> {
    let request_id = headers
        .get("x-request-id")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    Json(json!({ "query": query, "requestId": request_id }))
}

async fn echo_body(Json(body): Json<Value>) -> Json<Value> {
    Json(body)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let app = Router::new().route("/echo", get(echo_query).post(echo_body));
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
    let base = format!("http://{}", listener.local_addr()?);
    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            tracing::error!(error = %e, "Echo server stopped");
        }
    });
    info!(%base, "Echo server listening");

    // Global: every client tags its requests
    let next_id = Arc::new(AtomicU64::new(1));
    onion_request::interceptors().request().register(
        request_fn(move |url, options| {
            let id = next_id.fetch_add(1, Ordering::Relaxed);
            let options = options.clone().with_header("x-request-id", id.to_string());
            Ok(RequestState::new(url, options).into())
        }),
        UseOptions::global(),
    );

    let config = match std::env::args().nth(1) {
        Some(path) => ClientConfig::from_file(path)?,
        None => ClientConfig::default(),
    };
    let api = ClientBuilder::new()
        .with_config(config)
        .with_prefix(base)
        .build()?;

    // Instance: only `api` gets the extra query parameter and response header
    api.interceptors().request().register(
        request_fn(|url, options| {
            let separator = if url.contains('?') { '&' } else { '?' };
            Ok(RequestState::new(format!("{url}{separator}via=api"), options.clone()).into())
        }),
        UseOptions::instance(),
    );
    api.interceptors().response().register(
        response_fn(|response, _| {
            response.headers_mut().append("x-handled-by", "api")?;
            Ok(Intercepted::Unchanged)
        }),
        UseOptions::instance(),
    );

    let reply = api
        .get(
            "/echo",
            RequestOptions::new()
                .with("params", json!({ "page": 1 }))
                .with("getResponse", true),
        )
        .await?;
    info!(
        data = %reply.data(),
        handled_by = ?reply.response().and_then(|r| r.headers().get("x-handled-by")),
        "GET /echo"
    );

    let reply = api
        .post("/echo", RequestOptions::new().with_data(json!({ "hello": "onion" })))
        .await?;
    info!(data = %reply.data(), "POST /echo");

    match api.request(json!({ "not": "a url" }), RequestOptions::new()).await {
        Ok(_) => info!("Unexpected success"),
        Err(e) => info!(error = %e, "Rejected before any interceptor ran"),
    }

    Ok(())
}

//! HTTP API of a cache node
//!
//! - `POST {base}/:key/:value` set, `?type=internal` for replicated writes;
//!   a missing or empty value is a bad request
//! - `GET {base}/:key` raw value bytes
//! - `DELETE {base}/:key` delete, same marker as set
//! - `GET /health`, `GET /metrics`

use crate::cache::ByteView;
use crate::cluster::peer::PeerClient;
use crate::cluster::Engine;
use crate::common::{Error, Result};
use axum::{
    body::Body,
    extract::{Path, Query, State},
    http::{header, Request, Response, StatusCode, Uri},
    middleware::{self, Next},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use percent_encoding::percent_decode_str;
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};
use uuid::Uuid;

/// Header name for request ID
pub const REQUEST_ID_HEADER: &str = "X-Request-ID";

/// Optional `type` query parameter
#[derive(Debug, Default, Deserialize)]
pub struct Marker {
    #[serde(rename = "type")]
    kind: Option<String>,
}

impl Marker {
    /// Was this request replicated from another node?
    pub fn is_internal(&self) -> bool {
        self.kind.as_deref() == Some("internal")
    }
}

pub fn create_router<C: PeerClient>(engine: Arc<Engine<C>>) -> Router {
    let base = engine.options().base_path.clone();

    Router::new()
        .route(&format!("{}/:key/:value", base), post(set_key::<C>))
        .route(&format!("{}/:key/", base), post(missing_value))
        .route(
            &format!("{}/:key", base),
            get(get_key::<C>)
                .delete(delete_key::<C>)
                .post(missing_value),
        )
        .route("/health", get(health::<C>))
        .route("/metrics", get(metrics::<C>))
        .layer(middleware::from_fn(request_tracing_middleware))
        .with_state(engine)
}

/// Record failed operations before they become responses
fn observe<C: PeerClient, T>(engine: &Engine<C>, res: Result<T>) -> Result<T> {
    if res.is_err() {
        engine.metrics().errors_total.inc();
    }
    res
}

/// Decode the trailing `/:key/:value` of a set path
///
/// Values are opaque bytes and need not be UTF-8.
fn key_value_segments(path: &str) -> (String, ByteView) {
    let mut parts = path.rsplitn(3, '/');
    let value = parts.next().unwrap_or_default();
    let key = parts.next().unwrap_or_default();

    let key = percent_decode_str(key).decode_utf8_lossy().into_owned();
    let value: Vec<u8> = percent_decode_str(value).collect();
    (key, ByteView::from(value))
}

async fn set_key<C: PeerClient>(
    State(engine): State<Arc<Engine<C>>>,
    Query(marker): Query<Marker>,
    uri: Uri,
) -> Result<StatusCode> {
    let (key, value) = key_value_segments(uri.path());
    let res = engine.set(&key, value, marker.is_internal()).await;
    observe(&*engine, res)?;
    Ok(StatusCode::OK)
}

async fn missing_value() -> Error {
    Error::EmptyParameter
}

async fn get_key<C: PeerClient>(
    State(engine): State<Arc<Engine<C>>>,
    Path(key): Path<String>,
) -> Result<impl IntoResponse> {
    let value = observe(&*engine, engine.get(&key).await)?;
    Ok((
        [(header::CONTENT_TYPE, "application/octet-stream")],
        value.to_bytes(),
    ))
}

async fn delete_key<C: PeerClient>(
    State(engine): State<Arc<Engine<C>>>,
    Path(key): Path<String>,
    Query(marker): Query<Marker>,
) -> Result<StatusCode> {
    let res = engine.delete(&key, marker.is_internal()).await;
    observe(&*engine, res)?;
    Ok(StatusCode::OK)
}

async fn health<C: PeerClient>(State(engine): State<Arc<Engine<C>>>) -> impl IntoResponse {
    Json(json!({
        "status": "healthy",
        "addr": engine.options().addr,
        "nodes": engine.nodes(),
        "keys": engine.store().len(),
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

async fn metrics<C: PeerClient>(State(engine): State<Arc<Engine<C>>>) -> impl IntoResponse {
    let out = engine
        .metrics()
        .to_prometheus(engine.store().len(), engine.nodes().len());
    (StatusCode::OK, out)
}

/// Generate a new unique request ID
pub fn generate_request_id() -> String {
    Uuid::new_v4().to_string()
}

/// Tags each request with an ID and logs its outcome
pub async fn request_tracing_middleware(request: Request<Body>, next: Next) -> Response<Body> {
    let start = Instant::now();

    let request_id = request
        .headers()
        .get(REQUEST_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(|s| s.to_string())
        .unwrap_or_else(generate_request_id);

    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let internal = request
        .uri()
        .query()
        .is_some_and(|q| q.split('&').any(|p| p == "type=internal"));

    let mut response = next.run(request).await;

    let duration = start.elapsed();
    let status = response.status();

    if let Ok(value) = request_id.parse() {
        response.headers_mut().insert(REQUEST_ID_HEADER, value);
    }

    if status.is_success() {
        info!(
            request_id = %request_id,
            method = %method,
            path = %path,
            internal,
            status = %status.as_u16(),
            duration_ms = %duration.as_millis(),
            "Request completed"
        );
    } else {
        warn!(
            request_id = %request_id,
            method = %method,
            path = %path,
            internal,
            status = %status.as_u16(),
            duration_ms = %duration.as_millis(),
            "Request failed"
        );
    }

    response
}

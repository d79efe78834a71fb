//! Outbound peer transport
//!
//! The engine talks to peers through `PeerClient`, a plain request/response
//! seam: a method, a URL, a byte body and an optional deadline. The default
//! implementation is `HttpPeerClient` over reqwest.

use crate::common::{Error, Result};
use axum::http::{Method, StatusCode};
use bytes::Bytes;
use std::future::Future;
use std::time::Duration;

/// Query marker on replicated writes
pub const INTERNAL_QUERY: &str = "type=internal";

/// One outbound call to a peer
#[derive(Debug, Clone)]
pub struct PeerRequest {
    pub method: Method,
    pub url: String,
    pub body: Bytes,
    /// `None` waits for as long as the peer takes
    pub timeout: Option<Duration>,
}

impl PeerRequest {
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            body: Bytes::new(),
            timeout: None,
        }
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Response whose body is read on demand
pub trait PeerResponse: Send {
    fn status(&self) -> StatusCode;

    /// Read the whole body; failures are `Error::ReadBodyFailed`
    fn bytes(self) -> impl Future<Output = Result<Bytes>> + Send;
}

/// Request/response transport to other nodes
pub trait PeerClient: Send + Sync + 'static {
    type Response: PeerResponse;

    /// Send a request; failing to build or transmit it is
    /// `Error::RequestFormationFailed`
    fn send(&self, request: PeerRequest) -> impl Future<Output = Result<Self::Response>> + Send;
}

/// reqwest-backed peer client
#[derive(Debug, Clone, Default)]
pub struct HttpPeerClient {
    client: reqwest::Client,
}

impl HttpPeerClient {
    pub fn new() -> Self {
        Self::default()
    }
}

impl PeerClient for HttpPeerClient {
    type Response = reqwest::Response;

    async fn send(&self, request: PeerRequest) -> Result<reqwest::Response> {
        let mut builder = self
            .client
            .request(request.method, &request.url)
            .body(request.body);
        if let Some(timeout) = request.timeout {
            builder = builder.timeout(timeout);
        }

        builder
            .send()
            .await
            .map_err(|e| Error::RequestFormationFailed(e.to_string()))
    }
}

impl PeerResponse for reqwest::Response {
    fn status(&self) -> StatusCode {
        reqwest::Response::status(self)
    }

    async fn bytes(self) -> Result<Bytes> {
        reqwest::Response::bytes(self)
            .await
            .map_err(|e| Error::ReadBodyFailed(e.to_string()))
    }
}

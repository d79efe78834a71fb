//! Cluster engine
//!
//! Every node keeps a full copy of the data set:
//! - writes are applied locally, then replayed on every other node with the
//!   `type=internal` marker so the receivers do not broadcast again
//! - reads are served locally; on a miss the hash ring names an owner and the
//!   value is fetched from it (with bounded retries) and cached locally

use crate::cache::{ByteView, LocalStore};
use crate::cluster::peer::{
    HttpPeerClient, PeerClient, PeerRequest, PeerResponse, INTERNAL_QUERY,
};
use crate::common::{peer_url, EngineMetrics, Error, HashRing, Options, Result};
use axum::http::Method;
use parking_lot::RwLock;
use tracing::{debug, info, warn};

/// Ring and address list, changed together
struct Membership {
    ring: HashRing,
    /// Registration order; the first entry is this node
    addrs: Vec<String>,
}

pub struct Engine<C = HttpPeerClient> {
    options: Options,
    membership: RwLock<Membership>,
    store: LocalStore,
    client: C,
    metrics: EngineMetrics,
}

impl Engine<HttpPeerClient> {
    pub fn new(options: Options) -> Self {
        Self::with_client(options, HttpPeerClient::new())
    }
}

impl<C: PeerClient> Engine<C> {
    pub fn with_client(options: Options, client: C) -> Self {
        let ring = HashRing::new(options.replicas, options.hash_fn.clone());
        Self {
            options,
            membership: RwLock::new(Membership {
                ring,
                addrs: Vec::new(),
            }),
            store: LocalStore::new(),
            client,
            metrics: EngineMetrics::new(),
        }
    }

    pub fn options(&self) -> &Options {
        &self.options
    }

    pub fn store(&self) -> &LocalStore {
        &self.store
    }

    pub fn metrics(&self) -> &EngineMetrics {
        &self.metrics
    }

    /// Registered addresses, in registration order
    pub fn nodes(&self) -> Vec<String> {
        self.membership.read().addrs.clone()
    }

    /// Add nodes to the ring and the broadcast list
    pub fn register_nodes<I, S>(&self, addrs: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let addrs: Vec<String> = addrs.into_iter().map(Into::into).collect();
        if addrs.is_empty() {
            return;
        }

        let mut membership = self.membership.write();
        membership.ring.add(&addrs);
        membership.addrs.extend(addrs);
        info!(nodes = ?membership.addrs, "Registered cluster nodes");
    }

    /// Drop a node from the ring and the broadcast list
    pub fn deregister_node(&self, addr: &str) {
        let mut membership = self.membership.write();
        membership.ring.remove(addr);
        membership.addrs.retain(|a| a != addr);
        info!(node = %addr, "Deregistered node");
    }

    /// Registered peers other than this node
    fn peers(&self) -> Vec<String> {
        self.membership
            .read()
            .addrs
            .iter()
            .filter(|a| !self.options.is_self(a))
            .cloned()
            .collect()
    }

    fn pick_node(&self, key: &str) -> Option<String> {
        self.membership.read().ring.get(key).map(str::to_string)
    }

    /// Store a value locally and, unless `forwarded`, on every peer
    ///
    /// A failed send stops the broadcast; nodes already updated keep the value.
    pub async fn set(&self, key: &str, value: ByteView, forwarded: bool) -> Result<()> {
        if key.is_empty() || value.is_empty() {
            return Err(Error::EmptyParameter);
        }

        self.store.set(key, value.clone());
        self.metrics.sets_total.inc();
        debug!(key = %key, forwarded, "Set locally");

        if forwarded {
            return Ok(());
        }

        self.broadcast(Method::POST, &[key.as_bytes(), value.as_slice()])
            .await
    }

    /// Remove a key locally and, unless `forwarded`, on every peer
    pub async fn delete(&self, key: &str, forwarded: bool) -> Result<()> {
        if key.is_empty() {
            return Err(Error::EmptyParameter);
        }

        self.store.delete(key);
        self.metrics.deletes_total.inc();
        debug!(key = %key, forwarded, "Deleted locally");

        if forwarded {
            return Ok(());
        }

        self.broadcast(Method::DELETE, &[key.as_bytes()]).await
    }

    /// Replay a write on every other node, one at a time
    async fn broadcast(&self, method: Method, segments: &[&[u8]]) -> Result<()> {
        for peer in self.peers() {
            let url = format!(
                "{}?{}",
                peer_url(&peer, &self.options.base_path, segments),
                INTERNAL_QUERY
            );
            let request =
                PeerRequest::new(method.clone(), url).with_timeout(self.options.peer_timeout);

            self.metrics.broadcasts_total.inc();
            if let Err(e) = self.client.send(request).await {
                self.metrics.broadcast_failures.inc();
                warn!(peer = %peer, method = %method, error = %e, "Replication aborted");
                return Err(e);
            }
            debug!(peer = %peer, method = %method, "Replicated write");
        }
        Ok(())
    }

    /// Read a value, fetching it from the owning node on a local miss
    pub async fn get(&self, key: &str) -> Result<ByteView> {
        if key.is_empty() {
            return Err(Error::EmptyParameter);
        }

        if let Some(value) = self.store.get(key) {
            self.metrics.local_hits.inc();
            return Ok(value);
        }
        self.metrics.local_misses.inc();

        let mut attempts = 0;
        loop {
            if attempts >= self.options.retry_times {
                warn!(key = %key, attempts, "Giving up on remote fetch");
                return Err(Error::RetryLimitExceeded { attempts });
            }
            attempts += 1;

            let owner = self.pick_node(key).ok_or(Error::PickNodeFailed)?;

            if self.options.is_self(&owner) {
                // Missing locally yet owned here: nothing to fetch on this attempt.
                debug!(key = %key, attempt = attempts, "Ring picked this node after a local miss");
                self.metrics.peer_fetch_retries.inc();
                continue;
            }

            let url = peer_url(&owner, &self.options.base_path, &[key.as_bytes()]);
            let request = PeerRequest::new(Method::GET, url).with_timeout(self.options.peer_timeout);

            self.metrics.peer_fetches.inc();
            let response = self.client.send(request).await?;

            let status = response.status();
            if !status.is_success() {
                debug!(key = %key, owner = %owner, status = %status, attempt = attempts, "Peer fetch not successful");
                self.metrics.peer_fetch_retries.inc();
                continue;
            }

            let body = response.bytes().await?;
            let value = ByteView::copy_from_slice(&body);
            self.store.set(key, value.clone());
            self.metrics.read_through_fills.inc();
            debug!(key = %key, owner = %owner, "Cached value fetched from peer");
            return Ok(value);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::HashFn;
    use axum::http::StatusCode;
    use bytes::Bytes;
    use parking_lot::Mutex;
    use std::collections::VecDeque;
    use std::sync::Arc;

    const A: &str = "http://node-a:7246";
    const B: &str = "http://node-b:7247";
    const C: &str = "http://node-c:7248";

    enum Reply {
        Ok(StatusCode, &'static [u8]),
        SendFails,
        BodyFails,
    }

    struct MockResponse {
        status: StatusCode,
        body: Option<Bytes>,
    }

    impl PeerResponse for MockResponse {
        fn status(&self) -> StatusCode {
            self.status
        }

        async fn bytes(self) -> Result<Bytes> {
            self.body
                .ok_or_else(|| Error::ReadBodyFailed("connection reset".into()))
        }
    }

    /// Records requests and answers from a script; `default` once it runs out
    struct MockClient {
        sent: Mutex<Vec<PeerRequest>>,
        script: Mutex<VecDeque<Reply>>,
        default: StatusCode,
    }

    impl MockClient {
        fn new(default: StatusCode) -> Self {
            Self {
                sent: Mutex::new(Vec::new()),
                script: Mutex::new(VecDeque::new()),
                default,
            }
        }

        fn scripted(replies: Vec<Reply>) -> Self {
            let client = Self::new(StatusCode::OK);
            *client.script.lock() = replies.into();
            client
        }

        fn urls(&self) -> Vec<String> {
            self.sent.lock().iter().map(|r| r.url.clone()).collect()
        }
    }

    impl PeerClient for MockClient {
        type Response = MockResponse;

        async fn send(&self, request: PeerRequest) -> Result<MockResponse> {
            self.sent.lock().push(request);
            let reply = self.script.lock().pop_front();
            match reply {
                Some(Reply::Ok(status, body)) => Ok(MockResponse {
                    status,
                    body: Some(Bytes::from_static(body)),
                }),
                Some(Reply::SendFails) => {
                    Err(Error::RequestFormationFailed("connection refused".into()))
                }
                Some(Reply::BodyFails) => Ok(MockResponse {
                    status: StatusCode::OK,
                    body: None,
                }),
                None => Ok(MockResponse {
                    status: self.default,
                    body: Some(Bytes::new()),
                }),
            }
        }
    }

    /// Every key hashes to 0, so the owner is whichever node holds the
    /// smallest position; node positions come from the first byte.
    fn first_byte_hash() -> HashFn {
        Arc::new(|data: &[u8]| {
            let s = std::str::from_utf8(data).unwrap();
            if s.starts_with("http://") {
                // "http://node-b:7247" + index -> 'b'
                s.as_bytes()[12] as u32 * 100 + s.as_bytes().last().map_or(0, |b| *b as u32)
            } else {
                0
            }
        })
    }

    fn engine_with(self_addr: &str, client: MockClient, retry_times: usize) -> Engine<MockClient> {
        let opts = Options::new()
            .with_addr(self_addr)
            .with_retry_times(retry_times)
            .with_replicas(3)
            .with_hash_fn(first_byte_hash());
        Engine::with_client(opts, client)
    }

    #[tokio::test]
    async fn test_local_round_trip() {
        let engine = engine_with(A, MockClient::new(StatusCode::OK), 3);
        engine.register_nodes([A]);

        engine.set("foo", ByteView::from("bar"), false).await.unwrap();
        assert_eq!(engine.get("foo").await.unwrap().as_slice(), b"bar");
        assert!(engine.client.urls().is_empty());

        engine.delete("foo", false).await.unwrap();
        assert!(engine.store().get("foo").is_none());
    }

    #[tokio::test]
    async fn test_set_broadcasts_to_other_peers() {
        let engine = engine_with(A, MockClient::new(StatusCode::OK), 3);
        engine.register_nodes([A, B, C]);

        engine.set("k", ByteView::from("v"), false).await.unwrap();

        assert_eq!(engine.store().get("k").unwrap().as_slice(), b"v");
        let sent = engine.client.sent.lock();
        assert_eq!(sent.len(), 2);
        assert!(sent.iter().all(|r| r.method == Method::POST));
        assert_eq!(sent[0].url, "http://node-b:7247/_ezcache/k/v?type=internal");
        assert_eq!(sent[1].url, "http://node-c:7248/_ezcache/k/v?type=internal");
    }

    #[tokio::test]
    async fn test_broadcast_keeps_value_bytes_intact() {
        let engine = engine_with(A, MockClient::new(StatusCode::OK), 3);
        engine.register_nodes([A, B]);

        let raw = ByteView::copy_from_slice(b"a\\b\xff\x00");
        engine.set("dir\\k", raw, false).await.unwrap();

        assert_eq!(
            engine.client.urls(),
            vec!["http://node-b:7247/_ezcache/dir%5Ck/a%5Cb%FF%00?type=internal"]
        );
    }

    #[tokio::test]
    async fn test_forwarded_set_is_not_rebroadcast() {
        let engine = engine_with(B, MockClient::new(StatusCode::OK), 3);
        engine.register_nodes([B, A, C]);

        engine.set("k", ByteView::from("v"), true).await.unwrap();

        assert_eq!(engine.store().get("k").unwrap().as_slice(), b"v");
        assert!(engine.client.urls().is_empty());
    }

    #[tokio::test]
    async fn test_broadcast_aborts_on_first_failure() {
        let client = MockClient::scripted(vec![Reply::SendFails]);
        let engine = engine_with(A, client, 3);
        engine.register_nodes([A, B, C]);

        let err = engine.set("k", ByteView::from("v"), false).await.unwrap_err();
        assert!(matches!(err, Error::RequestFormationFailed(_)));

        // Local write stays, C was never contacted
        assert!(engine.store().get("k").is_some());
        assert_eq!(engine.client.urls(), vec!["http://node-b:7247/_ezcache/k/v?type=internal"]);
        assert_eq!(engine.metrics().broadcast_failures.get(), 1);
    }

    #[tokio::test]
    async fn test_delete_broadcasts_unless_forwarded() {
        let engine = engine_with(A, MockClient::new(StatusCode::OK), 3);
        engine.register_nodes([A, B, C]);
        engine.set("k", ByteView::from("v"), true).await.unwrap();

        engine.delete("k", true).await.unwrap();
        assert!(engine.client.urls().is_empty());

        engine.delete("k", false).await.unwrap();
        let sent = engine.client.sent.lock();
        assert_eq!(sent.len(), 2);
        assert!(sent.iter().all(|r| r.method == Method::DELETE));
        assert_eq!(sent[1].url, "http://node-c:7248/_ezcache/k?type=internal");
    }

    #[tokio::test]
    async fn test_empty_parameters_rejected() {
        let engine = engine_with(A, MockClient::new(StatusCode::OK), 3);
        engine.register_nodes([A, B]);

        let cases = [
            engine.set("", ByteView::from("v"), false).await,
            engine.set("k", ByteView::from(""), false).await,
            engine.delete("", false).await,
        ];
        for res in cases {
            assert!(matches!(res, Err(Error::EmptyParameter)));
        }
        assert!(matches!(engine.get("").await, Err(Error::EmptyParameter)));
        assert!(engine.store().is_empty());
        assert!(engine.client.urls().is_empty());
    }

    #[tokio::test]
    async fn test_get_without_nodes_fails_to_pick() {
        let engine = engine_with(A, MockClient::new(StatusCode::OK), 3);
        assert!(matches!(engine.get("k").await, Err(Error::PickNodeFailed)));
    }

    #[tokio::test]
    async fn test_get_fetches_from_owner_and_caches() {
        // "b" positions sort before "c", and keys hash to 0, so B owns every key
        let client = MockClient::scripted(vec![Reply::Ok(StatusCode::OK, b"remote")]);
        let engine = engine_with(C, client, 3);
        engine.register_nodes([C, B]);

        let value = engine.get("k").await.unwrap();
        assert_eq!(value.as_slice(), b"remote");
        assert_eq!(engine.client.urls(), vec!["http://node-b:7247/_ezcache/k"]);

        // Second read is local
        assert_eq!(engine.get("k").await.unwrap().as_slice(), b"remote");
        assert_eq!(engine.client.urls().len(), 1);
        assert_eq!(engine.metrics().read_through_fills.get(), 1);
    }

    #[tokio::test]
    async fn test_get_retries_non_success_then_succeeds() {
        let client = MockClient::scripted(vec![
            Reply::Ok(StatusCode::INTERNAL_SERVER_ERROR, b""),
            Reply::Ok(StatusCode::OK, b"late"),
        ]);
        let engine = engine_with(C, client, 3);
        engine.register_nodes([C, B]);

        assert_eq!(engine.get("k").await.unwrap().as_slice(), b"late");
        assert_eq!(engine.client.urls().len(), 2);
    }

    #[tokio::test]
    async fn test_get_retry_exhaustion() {
        let engine = engine_with(C, MockClient::new(StatusCode::INTERNAL_SERVER_ERROR), 2);
        engine.register_nodes([C, B]);

        let err = engine.get("k").await.unwrap_err();
        assert!(matches!(err, Error::RetryLimitExceeded { attempts: 2 }));
        assert_eq!(engine.client.urls().len(), 2);
        assert!(engine.store().get("k").is_none());
    }

    #[tokio::test]
    async fn test_get_transport_failure_is_fatal() {
        let client = MockClient::scripted(vec![Reply::SendFails]);
        let engine = engine_with(C, client, 5);
        engine.register_nodes([C, B]);

        let err = engine.get("k").await.unwrap_err();
        assert!(matches!(err, Error::RequestFormationFailed(_)));
        assert_eq!(engine.client.urls().len(), 1);
    }

    #[tokio::test]
    async fn test_get_body_failure_is_fatal() {
        let client = MockClient::scripted(vec![Reply::BodyFails]);
        let engine = engine_with(C, client, 5);
        engine.register_nodes([C, B]);

        let err = engine.get("k").await.unwrap_err();
        assert!(matches!(err, Error::ReadBodyFailed(_)));
        assert_eq!(engine.client.urls().len(), 1);
        assert!(engine.store().get("k").is_none());
    }

    #[tokio::test]
    async fn test_get_owned_by_self_retries_until_limit() {
        // A sorts first, so this node owns every key
        let engine = engine_with(A, MockClient::new(StatusCode::OK), 3);
        engine.register_nodes([A, B]);

        let err = engine.get("k").await.unwrap_err();
        assert!(matches!(err, Error::RetryLimitExceeded { attempts: 3 }));
        assert!(engine.client.urls().is_empty());
    }

    #[tokio::test]
    async fn test_peer_timeout_is_threaded_through() {
        let opts = Options::new()
            .with_addr(A)
            .with_replicas(3)
            .with_hash_fn(first_byte_hash())
            .with_peer_timeout(Some(std::time::Duration::from_millis(250)));
        let engine = Engine::with_client(opts, MockClient::new(StatusCode::OK));
        engine.register_nodes([A, B]);

        engine.set("k", ByteView::from("v"), false).await.unwrap();
        let sent = engine.client.sent.lock();
        assert_eq!(sent[0].timeout, Some(std::time::Duration::from_millis(250)));
    }

    #[tokio::test]
    async fn test_deregister_node_stops_broadcast() {
        let engine = engine_with(A, MockClient::new(StatusCode::OK), 3);
        engine.register_nodes([A, B, C]);
        engine.deregister_node(B);

        assert_eq!(engine.nodes(), vec![A.to_string(), C.to_string()]);
        engine.set("k", ByteView::from("v"), false).await.unwrap();
        assert_eq!(engine.client.urls(), vec!["http://node-c:7248/_ezcache/k/v?type=internal"]);
    }
}

//! Node server

use crate::cluster::http::create_router;
use crate::cluster::Engine;
use crate::common::{bind_addr, Options, Result};
use std::future::Future;
use std::sync::Arc;
use tokio::net::TcpListener;

pub struct NodeServer {
    engine: Arc<Engine>,
}

impl NodeServer {
    /// Build the engine and register the cluster; `addrs[0]` is this node
    pub fn new(options: Options, addrs: Vec<String>) -> Self {
        let engine = Arc::new(Engine::new(options));
        engine.register_nodes(addrs);
        Self { engine }
    }

    pub fn engine(&self) -> Arc<Engine> {
        self.engine.clone()
    }

    /// Bind the configured address and serve until Ctrl-C
    pub async fn serve(self) -> Result<()> {
        let addr = bind_addr(&self.engine.options().addr);
        let listener = TcpListener::bind(&addr).await?;
        self.serve_with_shutdown(listener, shutdown_signal()).await
    }

    /// Serve on an already bound listener until `shutdown` resolves
    pub async fn serve_with_shutdown<F>(self, listener: TcpListener, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let options = self.engine.options();
        tracing::info!("Starting cache node: {}", options.addr);
        tracing::info!("  Listening on: {}", listener.local_addr()?);
        tracing::info!("  Base path: {}", options.base_path);
        tracing::info!("  Retry times: {}", options.retry_times);
        tracing::info!("  Ring replicas: {}", options.replicas);
        match options.peer_timeout {
            Some(t) => tracing::info!("  Peer timeout: {:?}", t),
            None => tracing::info!("  Peer timeout: none"),
        }
        tracing::info!("  Nodes: {:?}", self.engine.nodes());

        let router = create_router(self.engine.clone());

        tracing::info!("✓ Cache node ready");
        axum::serve(listener, router)
            .with_graceful_shutdown(shutdown)
            .await?;

        tracing::info!("Cache node stopped");
        Ok(())
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
}

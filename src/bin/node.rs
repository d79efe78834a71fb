//! Cache node binary

use clap::Parser;
use ringcache::{NodeConfig, NodeServer};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "ringcache-node")]
#[command(about = "ringcache node - peer-coordinated in-memory cache")]
#[command(version)]
struct Args {
    /// Cluster addresses (comma-separated); the first one is this node
    #[arg(long, value_delimiter = ',')]
    addrs: Vec<String>,

    /// TOML config file (defaults to $RINGCACHE_CONFIG)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Path prefix for cache routes
    #[arg(long)]
    base_path: Option<String>,

    /// Fetch attempts on a local miss
    #[arg(long)]
    retry_times: Option<usize>,

    /// Virtual replicas per node on the hash ring
    #[arg(long)]
    replicas: Option<usize>,

    /// Deadline for each peer call (e.g. 500ms, 2s); none by default
    #[arg(long)]
    peer_timeout: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long)]
    log_level: Option<String>,
}

impl Args {
    /// CLI flags take priority over file and environment
    fn merge_into(self, mut conf: NodeConfig) -> NodeConfig {
        if !self.addrs.is_empty() {
            conf.addrs = self.addrs;
        }
        if let Some(base_path) = self.base_path {
            conf.base_path = base_path;
        }
        if let Some(retry_times) = self.retry_times {
            conf.retry_times = retry_times;
        }
        if let Some(replicas) = self.replicas {
            conf.replicas = replicas;
        }
        if self.peer_timeout.is_some() {
            conf.peer_timeout = self.peer_timeout;
        }
        if let Some(log_level) = self.log_level {
            conf.log_level = log_level;
        }
        conf
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let file_conf = NodeConfig::load(args.config.as_deref())?;
    let conf = args.merge_into(file_conf);

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| conf.log_level.clone().into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let options = conf.to_options()?;
    let server = NodeServer::new(options, conf.addrs.clone());
    server.serve().await?;

    Ok(())
}

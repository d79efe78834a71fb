//! CLI for talking to a cache node

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use ringcache::common::config::{normalize_base_path, DEFAULT_BASE_PATH};
use ringcache::common::peer_url;

#[derive(Parser)]
#[command(name = "ringcache")]
#[command(about = "ringcache client CLI")]
#[command(version)]
struct Cli {
    /// Node URL
    #[arg(long, default_value = "http://localhost:8080")]
    node: String,

    /// Path prefix for cache routes
    #[arg(long, default_value = DEFAULT_BASE_PATH)]
    base_path: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Store a value on every node
    Set {
        /// Key
        key: String,
        /// Value
        value: String,
    },

    /// Read a value
    Get {
        /// Key
        key: String,
    },

    /// Delete a key on every node
    Delete {
        /// Key
        key: String,
    },

    /// Show node health
    Health,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    let client = reqwest::Client::new();
    let base = normalize_base_path(&cli.base_path);

    let resp = match &cli.command {
        Commands::Set { key, value } => {
            client
                .post(peer_url(&cli.node, &base, &[key.as_bytes(), value.as_bytes()]))
                .send()
                .await
        }
        Commands::Get { key } => client.get(peer_url(&cli.node, &base, &[key.as_bytes()])).send().await,
        Commands::Delete { key } => {
            client
                .delete(peer_url(&cli.node, &base, &[key.as_bytes()]))
                .send()
                .await
        }
        Commands::Health => client.get(peer_url(&cli.node, "/health", &[])).send().await,
    }
    .with_context(|| format!("request to {} failed", cli.node))?;

    let status = resp.status();
    let body = resp.bytes().await.context("failed to read response body")?;
    if !status.is_success() {
        bail!("{}: {}", status, String::from_utf8_lossy(&body).trim());
    }

    match cli.command {
        Commands::Set { key, .. } => println!("OK set {}", key),
        Commands::Delete { key } => println!("OK delete {}", key),
        Commands::Get { .. } | Commands::Health => {
            println!("{}", String::from_utf8_lossy(&body))
        }
    }

    Ok(())
}

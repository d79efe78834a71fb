//! Configuration for ringcache nodes
//!
//! `Options` is what the engine runs with. It starts from defaults and each
//! `with_*` call overrides one field, so later overrides win. `NodeConfig` is
//! the serializable form read from a TOML file and the environment, and is
//! turned into `Options` once at startup.

use crate::common::hash::{default_hash_fn, HashFn};
use crate::common::utils::parse_duration;
use crate::common::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::time::Duration;

pub const DEFAULT_BASE_PATH: &str = "/_ezcache";
pub const DEFAULT_ADDR: &str = ":8080";
pub const DEFAULT_RETRY_TIMES: usize = 3;
pub const DEFAULT_REPLICAS: usize = 10;

/// Environment variable naming the config file
pub const CONFIG_ENV: &str = "RINGCACHE_CONFIG";
/// Prefix for per-field environment overrides (`RINGCACHE_RETRY_TIMES=5`)
pub const ENV_PREFIX: &str = "RINGCACHE";

/// Engine options, immutable once the engine is built
#[derive(Clone)]
pub struct Options {
    /// Path prefix of every cache route
    pub base_path: String,
    /// This node's own address, scheme stripped
    pub addr: String,
    /// Maximum number of fetch attempts on a local miss
    pub retry_times: usize,
    /// Virtual replicas per node on the hash ring
    pub replicas: usize,
    /// Ring hash
    pub hash_fn: HashFn,
    /// Deadline applied to each outbound peer call, `None` waits forever
    pub peer_timeout: Option<Duration>,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            base_path: DEFAULT_BASE_PATH.to_string(),
            addr: DEFAULT_ADDR.to_string(),
            retry_times: DEFAULT_RETRY_TIMES,
            replicas: DEFAULT_REPLICAS,
            hash_fn: default_hash_fn(),
            peer_timeout: None,
        }
    }
}

impl Options {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_base_path(mut self, path: impl Into<String>) -> Self {
        self.base_path = normalize_base_path(&path.into());
        self
    }

    pub fn with_addr(mut self, addr: impl AsRef<str>) -> Self {
        self.addr = standardize_addr(addr.as_ref()).to_string();
        self
    }

    pub fn with_retry_times(mut self, times: usize) -> Self {
        self.retry_times = times;
        self
    }

    pub fn with_replicas(mut self, replicas: usize) -> Self {
        self.replicas = replicas;
        self
    }

    pub fn with_hash_fn(mut self, hash_fn: HashFn) -> Self {
        self.hash_fn = hash_fn;
        self
    }

    pub fn with_peer_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.peer_timeout = timeout;
        self
    }

    /// Is `addr` this node, once both sides drop their scheme?
    ///
    /// A port-only own address (":8080") matches any host on that port.
    pub fn is_self(&self, addr: &str) -> bool {
        let other = standardize_addr(addr);
        if self.addr.starts_with(':') {
            return other.ends_with(self.addr.as_str());
        }
        other == self.addr
    }
}

impl fmt::Debug for Options {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Options")
            .field("base_path", &self.base_path)
            .field("addr", &self.addr)
            .field("retry_times", &self.retry_times)
            .field("replicas", &self.replicas)
            .field("peer_timeout", &self.peer_timeout)
            .finish_non_exhaustive()
    }
}

/// Strip a `scheme://` prefix from an address
///
/// An address with more than one separator is not usable and becomes empty.
pub fn standardize_addr(addr: &str) -> &str {
    let mut segments = addr.split("://");
    match (segments.next(), segments.next(), segments.next()) {
        (Some(host), None, None) => host,
        (Some(_), Some(host), None) => host,
        _ => "",
    }
}

/// Leading slash, no trailing slash; "/" and "" both mean no prefix
pub fn normalize_base_path(path: &str) -> String {
    let cleaned = path.trim().trim_end_matches('/');
    if cleaned.is_empty() {
        String::new()
    } else if cleaned.starts_with('/') {
        cleaned.to_string()
    } else {
        format!("/{}", cleaned)
    }
}

/// Node configuration as read from file and environment
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NodeConfig {
    /// Cluster addresses; the first one is this node
    #[serde(default)]
    pub addrs: Vec<String>,

    #[serde(default = "default_base_path")]
    pub base_path: String,

    #[serde(default = "default_retry_times")]
    pub retry_times: usize,

    #[serde(default = "default_replicas")]
    pub replicas: usize,

    /// Per-call peer deadline, e.g. "500ms" or "2s"
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub peer_timeout: Option<String>,

    /// Logging level
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_base_path() -> String {
    DEFAULT_BASE_PATH.to_string()
}
fn default_retry_times() -> usize {
    DEFAULT_RETRY_TIMES
}
fn default_replicas() -> usize {
    DEFAULT_REPLICAS
}
fn default_log_level() -> String {
    "info".to_string()
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            addrs: Vec::new(),
            base_path: default_base_path(),
            retry_times: default_retry_times(),
            replicas: default_replicas(),
            peer_timeout: None,
            log_level: default_log_level(),
        }
    }
}

impl NodeConfig {
    /// Load from an optional TOML file, then `RINGCACHE_*` variables
    ///
    /// When `path` is `None` the file named by `RINGCACHE_CONFIG` is used, if
    /// that variable is set.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder = config::Config::builder();

        let env_path = std::env::var(CONFIG_ENV).ok();
        let file = path
            .map(|p| p.to_string_lossy().into_owned())
            .or(env_path);
        if let Some(file) = file {
            builder = builder.add_source(
                config::File::new(&file, config::FileFormat::Toml).required(true),
            );
        }

        builder = builder.add_source(
            config::Environment::with_prefix(ENV_PREFIX)
                .try_parsing(true)
                .list_separator(",")
                .with_list_parse_key("addrs"),
        );

        let conf: NodeConfig = builder.build()?.try_deserialize()?;
        Ok(conf)
    }

    /// This node's address (the first entry)
    pub fn self_addr(&self) -> Result<&str> {
        self.addrs
            .first()
            .map(String::as_str)
            .filter(|a| !a.is_empty())
            .ok_or_else(|| Error::InvalidConfig("at least one address is required".into()))
    }

    /// Build engine options
    pub fn to_options(&self) -> Result<Options> {
        let addr = self.self_addr()?;
        if standardize_addr(addr).is_empty() {
            return Err(Error::InvalidConfig(format!("invalid address: {}", addr)));
        }

        let peer_timeout = self
            .peer_timeout
            .as_deref()
            .map(parse_duration)
            .transpose()?;

        Ok(Options::new()
            .with_base_path(self.base_path.as_str())
            .with_addr(addr)
            .with_retry_times(self.retry_times)
            .with_replicas(self.replicas)
            .with_peer_timeout(peer_timeout))
    }
}

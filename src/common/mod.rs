//! Common utilities and types shared across ringcache

pub mod config;
pub mod error;
pub mod hash;
pub mod metrics;
pub mod utils;

pub use config::{standardize_addr, NodeConfig, Options};
pub use error::{Error, Result};
pub use hash::{crc32, default_hash_fn, HashFn, HashRing};
pub use metrics::{Counter, EngineMetrics};
pub use utils::{bind_addr, encode_segment, parse_duration, peer_url};

//! # ringcache
//!
//! A peer-coordinated in-memory cache:
//! - Every node keeps a full local copy of the data set
//! - Client writes are applied locally and replayed on every other node
//! - Reads are local first; misses go to the ring owner and are cached
//! - Consistent hashing with virtual replicas picks the owner of a key
//!
//! ## Architecture
//!
//! ```text
//!            client: POST /_ezcache/k/v
//!                      │
//!               ┌──────▼──────┐
//!               │   Node A    │  store k=v locally
//!               └──┬───────┬──┘
//!   POST ...?type=internal │  POST ...?type=internal
//!         ┌────────▼┐    ┌─▼────────┐
//!         │ Node B  │    │  Node C  │  store, no re-broadcast
//!         └─────────┘    └──────────┘
//! ```
//!
//! ## Usage
//!
//! ### Start three nodes
//! ```bash
//! ringcache-node --addrs http://localhost:7246,http://localhost:7247,http://localhost:7248
//! ringcache-node --addrs http://localhost:7247,http://localhost:7248,http://localhost:7246
//! ringcache-node --addrs http://localhost:7248,http://localhost:7246,http://localhost:7247
//! ```
//!
//! ### Use the CLI
//! ```bash
//! ringcache --node http://localhost:7246 set foo bar
//! ringcache --node http://localhost:7247 get foo
//! ringcache --node http://localhost:7248 delete foo
//! ```

pub mod cache;
pub mod cluster;
pub mod common;

// Re-export commonly used types
pub use cache::{ByteView, LocalStore};
pub use cluster::{Engine, NodeServer};
pub use common::{Error, HashRing, NodeConfig, Options, Result};

/// Current version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

//! Cluster node: engine, peer transport and HTTP surface
//!
//! The engine is responsible for:
//! - Local storage of every key it sees (full replication)
//! - Broadcasting client writes to the other nodes
//! - Ring-based owner lookup and read-through on local misses

pub mod engine;
pub mod http;
pub mod peer;
pub mod server;

pub use engine::Engine;
pub use peer::{HttpPeerClient, PeerClient, PeerRequest, PeerResponse};
pub use server::NodeServer;

//! Hashing utilities for ringcache
//!
//! - CRC-32 as the default placement hash
//! - `HashRing`: consistent hashing with virtual replicas per node

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Pluggable 32-bit hash used for ring positions and key lookups.
pub type HashFn = Arc<dyn Fn(&[u8]) -> u32 + Send + Sync>;

/// CRC-32 (IEEE) over the raw bytes
pub fn crc32(data: &[u8]) -> u32 {
    crc32fast::hash(data)
}

/// Default placement hash
pub fn default_hash_fn() -> HashFn {
    Arc::new(crc32)
}

/// Consistent hash ring
///
/// Every registered node owns `replicas` virtual positions on a 32-bit ring.
/// A key belongs to the node owning the first position at or after the key's
/// hash, wrapping around to the smallest position.
pub struct HashRing {
    /// Sorted ring positions
    positions: Vec<u32>,
    /// Position -> owning node address
    owners: HashMap<u32, String>,
    replicas: usize,
    hash_fn: HashFn,
}

impl HashRing {
    pub fn new(replicas: usize, hash_fn: HashFn) -> Self {
        Self {
            positions: Vec::new(),
            owners: HashMap::new(),
            replicas,
            hash_fn,
        }
    }

    fn replica_position(&self, node: &str, index: usize) -> u32 {
        (self.hash_fn)(format!("{}{}", node, index).as_bytes())
    }

    /// Add nodes with `replicas` virtual positions each
    pub fn add<I, S>(&mut self, nodes: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for node in nodes {
            let node = node.as_ref();
            for i in 0..self.replicas {
                let pos = self.replica_position(node, i);
                // A colliding position is handed to the later node.
                if self.owners.insert(pos, node.to_string()).is_none() {
                    self.positions.push(pos);
                }
            }
        }
        self.positions.sort_unstable();
    }

    /// Get the node owning a key, `None` when the ring is empty
    pub fn get(&self, key: &str) -> Option<&str> {
        if self.positions.is_empty() {
            return None;
        }

        let hash = (self.hash_fn)(key.as_bytes());
        let mut idx = self.positions.partition_point(|&pos| pos < hash);
        if idx == self.positions.len() {
            idx = 0;
        }

        self.owners.get(&self.positions[idx]).map(String::as_str)
    }

    /// Remove a node's virtual positions
    ///
    /// Stops at the first position that is not on the ring.
    pub fn remove(&mut self, node: &str) {
        if node.is_empty() {
            return;
        }

        for i in 0..self.replicas {
            let pos = self.replica_position(node, i);
            self.owners.remove(&pos);
            match self.positions.binary_search(&pos) {
                Ok(idx) => {
                    self.positions.remove(idx);
                }
                Err(_) => return,
            }
        }
    }

    /// Number of virtual positions on the ring
    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    /// Sorted ring positions
    pub fn positions(&self) -> &[u32] {
        &self.positions
    }

    /// Owner of an exact ring position
    pub fn owner_of(&self, position: u32) -> Option<&str> {
        self.owners.get(&position).map(String::as_str)
    }

    /// Distinct nodes holding at least one position, sorted
    pub fn nodes(&self) -> Vec<&str> {
        let mut nodes: Vec<&str> = self.owners.values().map(String::as_str).collect();
        nodes.sort_unstable();
        nodes.dedup();
        nodes
    }
}

impl fmt::Debug for HashRing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HashRing")
            .field("positions", &self.positions.len())
            .field("replicas", &self.replicas)
            .finish()
    }
}

//! Engine metrics
//!
//! Lock-free counters owned by each engine, rendered in the Prometheus text
//! format on `/metrics`.

use std::fmt::Write;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

/// Monotonic counter
#[derive(Debug, Default)]
pub struct Counter {
    value: AtomicU64,
}

impl Counter {
    pub fn new() -> Self {
        Self {
            value: AtomicU64::new(0),
        }
    }

    pub fn inc(&self) {
        self.value.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add(&self, n: u64) {
        self.value.fetch_add(n, Ordering::Relaxed);
    }

    pub fn get(&self) -> u64 {
        self.value.load(Ordering::Relaxed)
    }
}

/// Counters for one engine
#[derive(Debug)]
pub struct EngineMetrics {
    pub sets_total: Counter,
    pub deletes_total: Counter,
    pub local_hits: Counter,
    pub local_misses: Counter,
    /// Outbound replication calls (forwarded set/delete)
    pub broadcasts_total: Counter,
    pub broadcast_failures: Counter,
    /// Outbound point-to-point fetches on a local miss
    pub peer_fetches: Counter,
    /// Fetch attempts that ended in a retry
    pub peer_fetch_retries: Counter,
    pub read_through_fills: Counter,
    pub errors_total: Counter,

    start_time: Instant,
}

impl EngineMetrics {
    pub fn new() -> Self {
        Self {
            sets_total: Counter::new(),
            deletes_total: Counter::new(),
            local_hits: Counter::new(),
            local_misses: Counter::new(),
            broadcasts_total: Counter::new(),
            broadcast_failures: Counter::new(),
            peer_fetches: Counter::new(),
            peer_fetch_retries: Counter::new(),
            read_through_fills: Counter::new(),
            errors_total: Counter::new(),
            start_time: Instant::now(),
        }
    }

    /// Get uptime in seconds
    pub fn uptime_seconds(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }

    /// Generate Prometheus-compatible metrics output
    ///
    /// `keys` and `nodes` are gauges sampled by the caller.
    pub fn to_prometheus(&self, keys: usize, nodes: usize) -> String {
        let counters: [(&str, &str, &Counter); 10] = [
            ("ringcache_sets_total", "Set operations applied", &self.sets_total),
            ("ringcache_deletes_total", "Delete operations applied", &self.deletes_total),
            ("ringcache_local_hits_total", "Reads served from the local store", &self.local_hits),
            ("ringcache_local_misses_total", "Reads that missed the local store", &self.local_misses),
            ("ringcache_broadcasts_total", "Forwarded writes sent to peers", &self.broadcasts_total),
            ("ringcache_broadcast_failures_total", "Forwarded writes that failed to send", &self.broadcast_failures),
            ("ringcache_peer_fetches_total", "Fetches sent to owning peers", &self.peer_fetches),
            ("ringcache_peer_fetch_retries_total", "Read attempts that were retried", &self.peer_fetch_retries),
            ("ringcache_read_through_fills_total", "Values copied in from peers", &self.read_through_fills),
            ("ringcache_errors_total", "Operations that returned an error", &self.errors_total),
        ];

        let mut out = String::new();
        for (name, help, counter) in counters {
            let _ = writeln!(out, "# HELP {} {}", name, help);
            let _ = writeln!(out, "# TYPE {} counter", name);
            let _ = writeln!(out, "{} {}", name, counter.get());
        }

        let gauges = [
            ("ringcache_keys", "Entries in the local store", keys as u64),
            ("ringcache_nodes", "Registered cluster nodes", nodes as u64),
            ("ringcache_uptime_seconds", "Engine uptime in seconds", self.uptime_seconds()),
        ];
        for (name, help, value) in gauges {
            let _ = writeln!(out, "# HELP {} {}", name, help);
            let _ = writeln!(out, "# TYPE {} gauge", name);
            let _ = writeln!(out, "{} {}", name, value);
        }

        out
    }
}

impl Default for EngineMetrics {
    fn default() -> Self {
        Self::new()
    }
}

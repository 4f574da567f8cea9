//! Cumulus store: a bounded, time-expiring cache for provider listings.
//!
//! Expiry is checked lazily on read; there is no background sweep. When full, the single
//! oldest-inserted entry is evicted before a new key goes in.

#![forbid(unsafe_code)]

use std::collections::BTreeMap;
use std::time::{Duration, Instant};

use metrics::counter;
use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

pub const DEFAULT_TTL: Duration = Duration::from_secs(5);
pub const DEFAULT_MAX_ENTRIES: usize = 1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Time budget before an entry is considered stale.
    pub default_ttl: Duration,
    /// Hard cap on resident entries.
    pub max_entries: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self { default_ttl: DEFAULT_TTL, max_entries: DEFAULT_MAX_ENTRIES }
    }
}

impl CacheConfig {
    /// Zero values fall back to the defaults.
    pub fn normalized(self) -> Self {
        Self {
            default_ttl: if self.default_ttl.is_zero() { DEFAULT_TTL } else { self.default_ttl },
            max_entries: if self.max_entries == 0 { DEFAULT_MAX_ENTRIES } else { self.max_entries },
        }
    }

    /// Defaults overridden by `CUMULUS_CACHE_TTL_SECS` and `CUMULUS_CACHE_MAX_ENTRIES`.
    pub fn from_env() -> Self {
        let mut cfg = Self::default();
        if let Some(secs) = env_parse::<f64>("CUMULUS_CACHE_TTL_SECS") {
            if let Ok(ttl) = Duration::try_from_secs_f64(secs) {
                cfg.default_ttl = ttl;
            }
        }
        if let Some(n) = env_parse::<usize>("CUMULUS_CACHE_MAX_ENTRIES") {
            cfg.max_entries = n;
        }
        cfg.normalized()
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    let raw = std::env::var(key).ok()?;
    match raw.trim().parse::<T>() {
        Ok(v) => Some(v),
        Err(_) => {
            warn!(key, value = %raw, "ignoring unparseable environment value");
            None
        }
    }
}

#[derive(Debug, Clone)]
struct CacheEntry<V> {
    value: V,
    seq: u64,
    expires_at: Instant,
}

#[derive(Debug)]
struct Inner<V> {
    entries: FxHashMap<String, CacheEntry<V>>,
    /// Insertion sequence -> key; the first entry is the oldest insertion.
    order: BTreeMap<u64, String>,
    next_seq: u64,
    evicted: u64,
}

impl<V> Inner<V> {
    fn remove(&mut self, key: &str) -> Option<CacheEntry<V>> {
        let entry = self.entries.remove(key)?;
        self.order.remove(&entry.seq);
        Some(entry)
    }

    fn evict_oldest(&mut self) -> Option<String> {
        let (_, key) = self.order.pop_first()?;
        self.entries.remove(&key);
        self.evicted += 1;
        Some(key)
    }
}

/// Shared TTL cache. Reads take a shared lock; every write (including evict-then-insert)
/// happens under one exclusive lock, so readers never observe a partial update.
#[derive(Debug)]
pub struct TtlCache<V> {
    inner: RwLock<Inner<V>>,
    cfg: CacheConfig,
}

impl<V: Clone> Default for TtlCache<V> {
    fn default() -> Self {
        Self::new(CacheConfig::default())
    }
}

impl<V: Clone> TtlCache<V> {
    pub fn new(cfg: CacheConfig) -> Self {
        Self {
            inner: RwLock::new(Inner {
                entries: FxHashMap::default(),
                order: BTreeMap::new(),
                next_seq: 0,
                evicted: 0,
            }),
            cfg: cfg.normalized(),
        }
    }

    pub fn config(&self) -> CacheConfig {
        self.cfg
    }

    /// Fresh value for `key`, or `None` when absent or expired.
    pub fn get(&self, key: &str) -> Option<V> {
        let inner = self.inner.read();
        let hit = inner
            .entries
            .get(key)
            .filter(|e| e.expires_at > Instant::now())
            .map(|e| e.value.clone());
        if hit.is_some() {
            counter!("cache_hits_total", 1u64);
        } else {
            counter!("cache_misses_total", 1u64);
        }
        hit
    }

    pub fn set(&self, key: impl Into<String>, value: V) {
        self.set_with_ttl(key, value, self.cfg.default_ttl);
    }

    /// Insert or overwrite. A new key arriving at capacity first evicts the oldest insertion.
    /// Overwriting refreshes the entry's insertion time.
    pub fn set_with_ttl(&self, key: impl Into<String>, value: V, ttl: Duration) {
        let key = key.into();
        let now = Instant::now();
        let mut inner = self.inner.write();
        if inner.remove(&key).is_none() && inner.entries.len() >= self.cfg.max_entries {
            if let Some(victim) = inner.evict_oldest() {
                counter!("cache_evictions_total", 1u64);
                debug!(victim = %victim, incoming = %key, "cache full; evicted oldest entry");
            }
        }
        let seq = inner.next_seq;
        inner.next_seq += 1;
        inner.order.insert(seq, key.clone());
        let expires_at = now.checked_add(ttl).unwrap_or(now + Duration::from_secs(u32::MAX as u64));
        inner.entries.insert(key, CacheEntry { value, seq, expires_at });
    }

    /// Remove `key`; returns whether it was resident.
    pub fn delete(&self, key: &str) -> bool {
        self.inner.write().remove(key).is_some()
    }

    /// Remove every key starting with `prefix` and return how many went. An empty prefix
    /// removes nothing; use [`clear`](Self::clear) for that.
    pub fn delete_prefix(&self, prefix: &str) -> usize {
        if prefix.is_empty() {
            return 0;
        }
        let mut inner = self.inner.write();
        let victims: Vec<String> = inner.entries.keys().filter(|k| k.starts_with(prefix)).cloned().collect();
        for k in &victims {
            inner.remove(k);
        }
        debug!(prefix, removed = victims.len(), "cache prefix invalidated");
        victims.len()
    }

    /// Drop every entry.
    pub fn invalidate(&self) {
        let mut inner = self.inner.write();
        inner.entries.clear();
        inner.order.clear();
    }

    pub fn clear(&self) {
        self.invalidate();
    }

    /// Resident entries, expired ones included until they are overwritten or evicted.
    pub fn len(&self) -> usize {
        self.inner.read().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Total evictions under capacity pressure since creation.
    pub fn evicted(&self) -> u64 {
        self.inner.read().evicted
    }
}

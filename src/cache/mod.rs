//! Bounded, time-limited caches: guideline lookups and finished reports.
//!
//! One cache of each kind is created per process and shared by reference.
//! Guideline keys are derived from a normalised query so that casing and
//! whitespace differences hit the same entry. Report keys cover the exact
//! document text plus the request's worker and section selection.
//!
//! Reads are concurrent. Entries are write-once: a second insert for a
//! key that is already fresh is ignored, so concurrent misses on the same
//! key do redundant work but never fight over the stored value.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;

use indexmap::IndexMap;
use serde::Serialize;
use sha2::{Digest, Sha256};
use tokio::time::Instant;
use tracing::debug;

use crate::config::{GuidelinesConfig, ReviewConfig};
use crate::models::{GuidelineSnippet, Report, WorkerKind};

/// Lowercase and collapse runs of whitespace.
pub fn normalize_query(query: &str) -> String {
    query
        .split_whitespace()
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Compute a cache key from the collection, result count, and normalised query.
pub fn cache_key(collection: &str, top_k: usize, query: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(collection.as_bytes());
    hasher.update([0]);
    hasher.update(top_k.to_le_bytes());
    hasher.update(normalize_query(query).as_bytes());
    hex::encode(hasher.finalize())
}

/// Key for a finished report: the document text, the worker kinds that
/// ran, and the section filter. Worker and section order does not matter.
pub fn report_key(text: &str, workers: &[WorkerKind], sections: &[String]) -> String {
    let mut workers: Vec<&str> = workers.iter().map(WorkerKind::as_str).collect();
    workers.sort_unstable();
    workers.dedup();
    let mut sections: Vec<String> = sections.iter().map(|s| s.trim().to_lowercase()).collect();
    sections.sort_unstable();
    sections.dedup();

    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    hasher.update([0]);
    for worker in workers {
        hasher.update(worker.as_bytes());
        hasher.update([0x1f]);
    }
    hasher.update([0]);
    for section in &sections {
        hasher.update(section.as_bytes());
        hasher.update([0x1f]);
    }
    hex::encode(hasher.finalize())
}

struct Entry<V> {
    value: V,
    inserted_at: Instant,
}

/// Point-in-time counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub entries: usize,
    pub hits: u64,
    pub misses: u64,
    pub insertions: u64,
    pub evictions: u64,
}

impl CacheStats {
    /// Fraction of lookups served from the cache.
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

/// Insertion-ordered map with per-entry expiry and a size bound.
struct TtlMap<V> {
    name: &'static str,
    entries: RwLock<IndexMap<String, Entry<V>>>,
    capacity: usize,
    ttl: Duration,
    hits: AtomicU64,
    misses: AtomicU64,
    insertions: AtomicU64,
    evictions: AtomicU64,
}

impl<V: Clone> TtlMap<V> {
    fn new(name: &'static str, capacity: usize, ttl: Duration) -> Self {
        Self {
            name,
            entries: RwLock::new(IndexMap::new()),
            capacity: capacity.max(1),
            ttl,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            insertions: AtomicU64::new(0),
            evictions: AtomicU64::new(0),
        }
    }

    fn get(&self, key: &str) -> Option<V> {
        let found = {
            let entries = self.read();
            entries
                .get(key)
                .filter(|e| e.inserted_at.elapsed() < self.ttl)
                .map(|e| e.value.clone())
        };
        let counter = if found.is_some() { &self.hits } else { &self.misses };
        counter.fetch_add(1, Ordering::Relaxed);
        found
    }

    /// Returns `false` when a fresh entry already exists; the existing
    /// value is kept. Expired entries are purged first, then the oldest
    /// entry is evicted if the map is still full.
    fn insert(&self, key: &str, value: V) -> bool {
        let mut entries = self.write();

        if entries
            .get(key)
            .is_some_and(|e| e.inserted_at.elapsed() < self.ttl)
        {
            return false;
        }

        let before = entries.len();
        entries.retain(|_, e| e.inserted_at.elapsed() < self.ttl);
        let mut evicted = (before - entries.len()) as u64;

        while entries.len() >= self.capacity {
            entries.shift_remove_index(0);
            evicted += 1;
        }
        if evicted > 0 {
            debug!(cache = self.name, evicted, "cache eviction");
            self.evictions.fetch_add(evicted, Ordering::Relaxed);
        }

        entries.insert(
            key.to_string(),
            Entry {
                value,
                inserted_at: Instant::now(),
            },
        );
        self.insertions.fetch_add(1, Ordering::Relaxed);
        true
    }

    fn len(&self) -> usize {
        self.read().len()
    }

    fn stats(&self) -> CacheStats {
        CacheStats {
            entries: self.len(),
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            insertions: self.insertions.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, IndexMap<String, Entry<V>>> {
        self.entries.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, IndexMap<String, Entry<V>>> {
        self.entries.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// The guideline cache.
pub struct GuidelineCache {
    map: TtlMap<Arc<[GuidelineSnippet]>>,
}

impl GuidelineCache {
    /// Create a cache holding at most `capacity` entries for `ttl` each.
    pub fn new(capacity: usize, ttl: Duration) -> Self {
        Self {
            map: TtlMap::new("guidelines", capacity, ttl),
        }
    }

    pub fn from_config(config: &GuidelinesConfig) -> Self {
        Self::new(config.cache_capacity, Duration::from_secs(config.cache_ttl_secs))
    }

    /// Look up a fresh entry.
    pub fn get(&self, key: &str) -> Option<Arc<[GuidelineSnippet]>> {
        self.map.get(key)
    }

    /// Store a lookup result. Returns `false` when a fresh entry already exists.
    pub fn insert(&self, key: &str, snippets: Vec<GuidelineSnippet>) -> bool {
        self.map.insert(key, snippets.into())
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stats(&self) -> CacheStats {
        self.map.stats()
    }
}

/// Finished reports, keyed by [`report_key`].
///
/// Stored reports keep the request id of the run that produced them; the
/// controller re-stamps it on every hit.
pub struct ReportCache {
    map: TtlMap<Arc<Report>>,
}

impl ReportCache {
    pub fn new(capacity: usize, ttl: Duration) -> Self {
        Self {
            map: TtlMap::new("reports", capacity, ttl),
        }
    }

    /// `None` when `review.report_cache_capacity` is zero.
    pub fn from_config(config: &ReviewConfig) -> Option<Self> {
        (config.report_cache_capacity > 0)
            .then(|| Self::new(config.report_cache_capacity, config.report_cache_ttl()))
    }

    pub fn get(&self, key: &str) -> Option<Arc<Report>> {
        self.map.get(key)
    }

    pub fn insert(&self, key: &str, report: Report) -> bool {
        self.map.insert(key, Arc::new(report))
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stats(&self) -> CacheStats {
        self.map.stats()
    }
}

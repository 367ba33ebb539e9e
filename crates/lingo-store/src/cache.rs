//! Export slice cache backed by [`moka`].
//!
//! [`SliceCache`] is the seam the export path talks to. Backends report
//! [`CacheError`] and the caller treats any error as a miss, so an
//! unavailable cache slows exports down but never fails them.
//! [`MokaSliceCache`] is the in-process implementation.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use moka::future::Cache;
use thiserror::Error;
use tracing::debug;

use crate::model::{ExportMap, SliceKey};

/// Default lifetime of a cached slice.
pub const DEFAULT_TTL: Duration = Duration::from_secs(3600);

/// Default upper bound on cached slices.
pub const DEFAULT_MAX_CAPACITY: u64 = 10_000;

/// Failure reported by a cache backend.
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache unavailable: {0}")]
    Unavailable(String),
}

// ── cache stats ──────────────────────────────────────────────────────

/// Counters tracking cache effectiveness.
#[derive(Debug, Default)]
pub struct CacheStats {
    hits: AtomicU64,
    misses: AtomicU64,
}

impl CacheStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record_hit(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    /// Total cache hits since creation.
    pub fn hits(&self) -> u64 {
        self.hits.load(Ordering::Relaxed)
    }

    /// Total cache misses since creation, cache errors included.
    pub fn misses(&self) -> u64 {
        self.misses.load(Ordering::Relaxed)
    }

    /// Total lookups (hits + misses).
    pub fn total(&self) -> u64 {
        self.hits() + self.misses()
    }

    /// Hit rate as a value between 0.0 and 1.0 (returns 0.0 if no lookups).
    pub fn hit_rate(&self) -> f64 {
        let total = self.total();
        if total == 0 {
            return 0.0;
        }
        self.hits() as f64 / total as f64
    }
}

impl fmt::Display for CacheStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "hits={} misses={} total={} rate={:.2}%",
            self.hits(),
            self.misses(),
            self.total(),
            self.hit_rate() * 100.0,
        )
    }
}

// ── seam ─────────────────────────────────────────────────────────────

/// Storage for exported slices keyed by [`SliceKey`].
#[async_trait]
pub trait SliceCache: Send + Sync {
    async fn get(&self, key: &SliceKey) -> Result<Option<Arc<ExportMap>>, CacheError>;

    async fn put(&self, key: SliceKey, value: Arc<ExportMap>) -> Result<(), CacheError>;

    /// Drop every entry of `(locale, namespace)` regardless of its tag set.
    /// Returns the number of entries removed.
    async fn invalidate_slice(&self, locale: &str, namespace: &str) -> Result<u64, CacheError>;

    /// Approximate number of live entries.
    fn entry_count(&self) -> u64;
}

// ── moka backend ─────────────────────────────────────────────────────

/// In-process [`SliceCache`] with a fixed time-to-live per entry.
#[derive(Clone)]
pub struct MokaSliceCache {
    inner: Cache<SliceKey, Arc<ExportMap>>,
}

impl MokaSliceCache {
    pub fn builder() -> MokaSliceCacheBuilder {
        MokaSliceCacheBuilder {
            max_capacity: DEFAULT_MAX_CAPACITY,
            ttl: DEFAULT_TTL,
        }
    }

    /// Flush moka's pending maintenance so `entry_count` is exact.
    pub async fn sync(&self) {
        self.inner.run_pending_tasks().await;
    }
}

impl Default for MokaSliceCache {
    fn default() -> Self {
        Self::builder().build()
    }
}

#[async_trait]
impl SliceCache for MokaSliceCache {
    async fn get(&self, key: &SliceKey) -> Result<Option<Arc<ExportMap>>, CacheError> {
        Ok(self.inner.get(key).await)
    }

    async fn put(&self, key: SliceKey, value: Arc<ExportMap>) -> Result<(), CacheError> {
        debug!(slice = %key, entries = value.len(), "cache insert");
        self.inner.insert(key, value).await;
        Ok(())
    }

    async fn invalidate_slice(&self, locale: &str, namespace: &str) -> Result<u64, CacheError> {
        let stale: Vec<Arc<SliceKey>> = self
            .inner
            .iter()
            .filter(|(key, _)| key.locale() == locale && key.namespace() == namespace)
            .map(|(key, _)| key)
            .collect();

        let removed = stale.len() as u64;
        for key in stale {
            self.inner.invalidate(key.as_ref()).await;
        }
        debug!(locale, namespace, removed, "cache invalidate slice");
        Ok(removed)
    }

    fn entry_count(&self) -> u64 {
        self.inner.entry_count()
    }
}

// ── builder ──────────────────────────────────────────────────────────

/// Builder for [`MokaSliceCache`].
pub struct MokaSliceCacheBuilder {
    max_capacity: u64,
    ttl: Duration,
}

impl MokaSliceCacheBuilder {
    /// Maximum number of slices the cache will hold.
    pub fn max_capacity(mut self, cap: u64) -> Self {
        self.max_capacity = cap;
        self
    }

    /// Time-to-live for each entry.
    pub fn ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    pub fn build(self) -> MokaSliceCache {
        let inner = Cache::builder()
            .max_capacity(self.max_capacity)
            .time_to_live(self.ttl)
            .build();

        debug!(
            max_capacity = self.max_capacity,
            ttl_ms = self.ttl.as_millis() as u64,
            "slice cache created"
        );

        MokaSliceCache { inner }
    }
}

// ── tests ────────────────────────────────────────────────────────────

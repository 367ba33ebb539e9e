//! Read-through cache for slice exports.
//!
//! A hit returns the stored mapping without touching the repository. A
//! miss (or any cache error) reads the repository and, when the cache is
//! reachable, stores the result for the backend's TTL.
//!
//! Each slice carries a generation that [`ExportCache::invalidate`] bumps.
//! A miss that read the store under an older generation never leaves its
//! result in the cache, so a write that completes while an export is in
//! flight is visible to the next export.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use tracing::{debug, instrument, warn};

use crate::cache::{CacheStats, SliceCache};
use crate::error::StoreResult;
use crate::model::{ExportMap, SliceId, SliceKey};
use crate::traits::TranslationRepository;

#[derive(Clone)]
pub struct ExportCache {
    repo: Arc<dyn TranslationRepository>,
    cache: Arc<dyn SliceCache>,
    stats: Arc<CacheStats>,
    generations: Arc<Mutex<HashMap<SliceId, u64>>>,
}

impl ExportCache {
    pub fn new(repo: Arc<dyn TranslationRepository>, cache: Arc<dyn SliceCache>) -> Self {
        Self {
            repo,
            cache,
            stats: Arc::new(CacheStats::new()),
            generations: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Active `key → content` pairs of the slice described by `key`.
    #[instrument(skip(self), fields(slice = %key))]
    pub async fn export(&self, key: &SliceKey) -> StoreResult<Arc<ExportMap>> {
        match self.cache.get(key).await {
            Ok(Some(hit)) => {
                self.stats.record_hit();
                debug!(count = hit.len(), "export cache hit");
                return Ok(hit);
            }
            Ok(None) => debug!("export cache miss"),
            Err(err) => warn!(%err, "export cache lookup failed, reading store"),
        }
        self.stats.record_miss();

        let slice = key.slice();
        let generation = self.generation(slice);
        let fresh = Arc::new(self.repo.export(key).await?);

        if self.generation(slice) != generation {
            debug!("slice written during export, result not cached");
            return Ok(fresh);
        }
        if let Err(err) = self.cache.put(key.clone(), Arc::clone(&fresh)).await {
            warn!(%err, "export cache insert failed");
            return Ok(fresh);
        }
        // A write that landed between the check and the insert.
        if self.generation(slice) != generation {
            debug!("slice written during cache insert, dropping entry");
            self.drop_cached(slice).await;
        }
        Ok(fresh)
    }

    /// Drop every cached variant of `slice`. Cache errors are logged only.
    ///
    /// Call after the write has committed.
    pub async fn invalidate(&self, slice: &SliceId) {
        {
            let mut generations = self.generations.lock().unwrap_or_else(PoisonError::into_inner);
            *generations.entry(slice.clone()).or_default() += 1;
        }
        self.drop_cached(slice).await;
    }

    pub fn stats(&self) -> &CacheStats {
        &self.stats
    }

    pub fn entry_count(&self) -> u64 {
        self.cache.entry_count()
    }

    fn generation(&self, slice: &SliceId) -> u64 {
        let generations = self.generations.lock().unwrap_or_else(PoisonError::into_inner);
        generations.get(slice).copied().unwrap_or(0)
    }

    async fn drop_cached(&self, slice: &SliceId) {
        match self.cache.invalidate_slice(&slice.locale, &slice.namespace).await {
            Ok(removed) => debug!(%slice, removed, "export cache invalidated"),
            Err(err) => warn!(%slice, %err, "export cache invalidation failed"),
        }
    }
}

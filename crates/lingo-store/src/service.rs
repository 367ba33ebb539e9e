//! Write coordinator over the repository, query engine and export cache.
//!
//! Every mutation commits in the repository first and only then drops the
//! cached exports of the slices it touched. A failed write leaves the
//! cache alone.

use std::sync::Arc;
use std::time::Duration;

use tracing::{info, instrument};

use crate::cache::{MokaSliceCache, SliceCache};
use crate::db::Database;
use crate::error::{StoreError, StoreResult};
use crate::export::ExportCache;
use crate::model::{ExportMap, NewTranslation, SliceKey, Tag, Translation, TranslationPatch};
use crate::query::{Page, QueryEngine, TranslationFilter};
use crate::traits::TranslationRepository;
use crate::translation_store::SqliteTranslationStore;

#[derive(Clone)]
pub struct TranslationService {
    repo: Arc<dyn TranslationRepository>,
    query: QueryEngine,
    exports: ExportCache,
}

impl TranslationService {
    pub fn new(repo: Arc<dyn TranslationRepository>, cache: Arc<dyn SliceCache>) -> Self {
        Self {
            query: QueryEngine::new(Arc::clone(&repo)),
            exports: ExportCache::new(Arc::clone(&repo), cache),
            repo,
        }
    }

    /// SQLite repository plus an in-process moka cache.
    pub fn sqlite(db: Database, ttl: Duration, max_capacity: u64) -> Self {
        let cache = MokaSliceCache::builder()
            .ttl(ttl)
            .max_capacity(max_capacity)
            .build();
        Self::new(
            Arc::new(SqliteTranslationStore::new(db)),
            Arc::new(cache),
        )
    }

    #[instrument(skip(self, new), fields(key = %new.key))]
    pub async fn create(&self, new: NewTranslation) -> StoreResult<Translation> {
        let created = self.repo.create(new).await?;
        self.exports.invalidate(&created.slice()).await;
        info!(id = created.id, slice = %created.slice(), "translation created");
        Ok(created)
    }

    pub async fn get(&self, id: i64) -> StoreResult<Translation> {
        self.repo
            .find(id)
            .await?
            .ok_or_else(|| StoreError::translation_not_found(id))
    }

    #[instrument(skip(self, patch))]
    pub async fn update(&self, id: i64, patch: TranslationPatch) -> StoreResult<Translation> {
        let outcome = self.repo.update(id, patch).await?;
        let current = outcome.translation.slice();

        self.exports.invalidate(&outcome.previous).await;
        if current != outcome.previous {
            self.exports.invalidate(&current).await;
        }
        info!(id, slice = %current, "translation updated");
        Ok(outcome.translation)
    }

    #[instrument(skip(self))]
    pub async fn delete(&self, id: i64) -> StoreResult<Translation> {
        let removed = self.repo.delete(id).await?;
        self.exports.invalidate(&removed.slice()).await;
        info!(id, slice = %removed.slice(), "translation deleted");
        Ok(removed)
    }

    pub async fn list(&self, filter: TranslationFilter) -> StoreResult<Page<Translation>> {
        self.query.search(filter).await
    }

    pub async fn export(&self, key: &SliceKey) -> StoreResult<Arc<ExportMap>> {
        self.exports.export(key).await
    }

    pub async fn tags(&self) -> StoreResult<Vec<Tag>> {
        self.repo.list_tags().await
    }

    pub async fn ensure_tag(&self, name: &str, description: Option<&str>) -> StoreResult<Tag> {
        self.repo.ensure_tag(name, description).await
    }

    pub async fn count(&self) -> StoreResult<u64> {
        self.repo.count().await
    }

    pub fn export_cache(&self) -> &ExportCache {
        &self.exports
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn service() -> TranslationService {
        let db = Database::open_in_memory().unwrap();
        db.run_migrations().await.unwrap();
        TranslationService::sqlite(db, Duration::from_secs(60), 100)
    }

    #[tokio::test]
    async fn create_invalidates_slice() {
        let svc = service().await;
        let key = SliceKey::untagged("en", "general");
        assert!(svc.export(&key).await.unwrap().is_empty());

        svc.create(NewTranslation::new("a", "en", "A")).await.unwrap();
        assert_eq!(svc.export(&key).await.unwrap()["a"], "A");
    }

    #[tokio::test]
    async fn moving_slices_invalidates_both() {
        let svc = service().await;
        let t = svc.create(NewTranslation::new("a", "en", "A")).await.unwrap();

        let en = SliceKey::untagged("en", "general");
        let fr = SliceKey::untagged("fr", "general");
        assert_eq!(svc.export(&en).await.unwrap().len(), 1);
        assert!(svc.export(&fr).await.unwrap().is_empty());

        svc.update(
            t.id,
            TranslationPatch {
                locale: Some("fr".into()),
                ..Default::default()
            },
        )
        .await
        .unwrap();

        assert!(svc.export(&en).await.unwrap().is_empty());
        assert_eq!(svc.export(&fr).await.unwrap()["a"], "A");
    }

    #[tokio::test]
    async fn delete_invalidates_slice() {
        let svc = service().await;
        let t = svc.create(NewTranslation::new("a", "en", "A")).await.unwrap();
        let key = SliceKey::untagged("en", "general");
        assert_eq!(svc.export(&key).await.unwrap().len(), 1);

        svc.delete(t.id).await.unwrap();
        assert!(svc.export(&key).await.unwrap().is_empty());
        assert!(matches!(
            svc.get(t.id).await.unwrap_err(),
            StoreError::NotFound { .. }
        ));
    }
}

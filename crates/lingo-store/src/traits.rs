//! Storage seam for the query engine, export cache and service.
//!
//! Every consumer receives an `Arc<dyn TranslationRepository>` at
//! construction time. [`SqliteTranslationStore`](crate::SqliteTranslationStore)
//! is the production implementation; tests wrap it to observe traffic.

use async_trait::async_trait;

use crate::error::StoreResult;
use crate::model::{ExportMap, NewTranslation, SliceKey, Tag, Translation, TranslationPatch, UpdateOutcome};
use crate::query::{Page, TranslationFilter};

/// Record store plus tag index.
///
/// Each write method runs as one atomic transaction covering the row and
/// its tag associations.
#[async_trait]
pub trait TranslationRepository: Send + Sync {
    /// Insert a translation and attach its tags, creating unknown tags.
    ///
    /// A duplicate key fails with `StoreError::Validation` and writes nothing.
    async fn create(&self, new: NewTranslation) -> StoreResult<Translation>;

    /// Fetch one translation with its tags.
    async fn find(&self, id: i64) -> StoreResult<Option<Translation>>;

    /// Apply a partial update. `patch.tags`, when present, replaces the
    /// association set.
    async fn update(&self, id: i64, patch: TranslationPatch) -> StoreResult<UpdateOutcome>;

    /// Delete a translation and its associations, returning the removed row.
    async fn delete(&self, id: i64) -> StoreResult<Translation>;

    /// One page of matches for an already normalized filter.
    async fn search(&self, filter: &TranslationFilter) -> StoreResult<Page<Translation>>;

    /// Active `key → content` pairs of a slice.
    async fn export(&self, key: &SliceKey) -> StoreResult<ExportMap>;

    /// All tags ordered by name.
    async fn list_tags(&self) -> StoreResult<Vec<Tag>>;

    /// Return the tag called `name`, creating it if absent. An existing
    /// tag's description is left as is.
    async fn ensure_tag(&self, name: &str, description: Option<&str>) -> StoreResult<Tag>;

    /// Total number of stored translations.
    async fn count(&self) -> StoreResult<u64>;
}

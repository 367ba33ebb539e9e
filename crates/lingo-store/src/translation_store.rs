//! SQLite implementation of [`TranslationRepository`].
//!
//! Translations live in `translations`, tags in `tags`, and the
//! many-to-many association in `translation_tags`. Writes go through
//! [`Database::transaction`] so the row and its associations commit or
//! roll back together.

use std::collections::{BTreeSet, HashMap};

use async_trait::async_trait;
use chrono::Utc;
use rusqlite::types::Value as SqlValue;
use rusqlite::{Connection, OptionalExtension, Row, params, params_from_iter};
use tracing::{debug, instrument};

use crate::db::Database;
use crate::error::{StoreError, StoreResult};
use crate::model::{
    ExportMap, Metadata, NewTranslation, SliceKey, Tag, Translation, TranslationPatch,
    UpdateOutcome,
};
use crate::query::{Page, PageMeta, TranslationFilter, compose, placeholders};
use crate::traits::TranslationRepository;
use crate::validate::ValidationErrors;

const COLUMNS: &str = "t.id, t.key, t.locale, t.content, t.namespace, t.is_active, t.metadata, \
                       t.created_at, t.updated_at";

/// Translation repository backed by the shared [`Database`].
#[derive(Clone)]
pub struct SqliteTranslationStore {
    db: Database,
}

impl SqliteTranslationStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    pub fn database(&self) -> &Database {
        &self.db
    }
}

#[async_trait]
impl TranslationRepository for SqliteTranslationStore {
    #[instrument(skip(self, new), fields(key = %new.key))]
    async fn create(&self, new: NewTranslation) -> StoreResult<Translation> {
        let translation = self
            .db
            .transaction(move |tx| {
                if key_taken(tx, &new.key, None)? {
                    return Err(ValidationErrors::key_taken().into());
                }

                let now = Utc::now().timestamp();
                tx.execute(
                    "INSERT INTO translations \
                     (key, locale, content, namespace, is_active, metadata, created_at, updated_at) \
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?7)",
                    params![
                        new.key,
                        new.locale,
                        new.content,
                        new.namespace,
                        new.is_active,
                        encode_metadata(new.metadata.as_ref())?,
                        now
                    ],
                )
                .map_err(map_key_conflict)?;

                let id = tx.last_insert_rowid();
                attach_tags(tx, id, &new.tags, now)?;
                load(tx, id)?.ok_or_else(|| StoreError::translation_not_found(id))
            })
            .await?;

        debug!(id = translation.id, slice = %translation.slice(), "translation created");
        Ok(translation)
    }

    #[instrument(skip(self))]
    async fn find(&self, id: i64) -> StoreResult<Option<Translation>> {
        self.db.execute(move |conn| load(conn, id)).await
    }

    #[instrument(skip(self, patch))]
    async fn update(&self, id: i64, patch: TranslationPatch) -> StoreResult<UpdateOutcome> {
        let outcome = self
            .db
            .transaction(move |tx| {
                let current = load(tx, id)?.ok_or_else(|| StoreError::translation_not_found(id))?;
                let previous = current.slice();

                if let Some(key) = &patch.key
                    && *key != current.key
                    && key_taken(tx, key, Some(id))?
                {
                    return Err(ValidationErrors::key_taken().into());
                }

                let TranslationPatch {
                    key,
                    locale,
                    content,
                    namespace,
                    is_active,
                    metadata,
                    tags,
                } = patch;
                let metadata = metadata.or(current.metadata);
                let now = Utc::now().timestamp();

                tx.execute(
                    "UPDATE translations SET key = ?2, locale = ?3, content = ?4, namespace = ?5, \
                     is_active = ?6, metadata = ?7, updated_at = ?8 WHERE id = ?1",
                    params![
                        id,
                        key.unwrap_or(current.key),
                        locale.unwrap_or(current.locale),
                        content.unwrap_or(current.content),
                        namespace.unwrap_or(current.namespace),
                        is_active.unwrap_or(current.is_active),
                        encode_metadata(metadata.as_ref())?,
                        now
                    ],
                )
                .map_err(map_key_conflict)?;

                if let Some(tags) = tags {
                    sync_tags(tx, id, &tags, now)?;
                }

                let translation =
                    load(tx, id)?.ok_or_else(|| StoreError::translation_not_found(id))?;
                Ok(UpdateOutcome {
                    previous,
                    translation,
                })
            })
            .await?;

        debug!(
            id,
            from = %outcome.previous,
            to = %outcome.translation.slice(),
            "translation updated"
        );
        Ok(outcome)
    }

    #[instrument(skip(self))]
    async fn delete(&self, id: i64) -> StoreResult<Translation> {
        let removed = self
            .db
            .transaction(move |tx| {
                let current = load(tx, id)?.ok_or_else(|| StoreError::translation_not_found(id))?;
                // translation_tags rows go with it (ON DELETE CASCADE).
                tx.execute("DELETE FROM translations WHERE id = ?1", [id])?;
                Ok(current)
            })
            .await?;

        debug!(id, slice = %removed.slice(), "translation deleted");
        Ok(removed)
    }

    #[instrument(skip(self))]
    async fn search(&self, filter: &TranslationFilter) -> StoreResult<Page<Translation>> {
        let filter = filter.clone();
        self.db
            .execute(move |conn| {
                let composed = compose(&filter);

                let total: i64 = conn.query_row(
                    &format!("SELECT count(*) FROM translations t{}", composed.where_sql),
                    params_from_iter(composed.params.iter()),
                    |row| row.get(0),
                )?;

                let mut params = composed.params;
                params.push(SqlValue::Integer(i64::from(filter.per_page)));
                params.push(SqlValue::Integer(
                    i64::try_from(filter.offset()).unwrap_or(i64::MAX),
                ));

                let mut stmt = conn.prepare(&format!(
                    "SELECT {COLUMNS} FROM translations t{} ORDER BY t.id LIMIT ? OFFSET ?",
                    composed.where_sql
                ))?;
                let rows = stmt
                    .query_map(params_from_iter(params.iter()), TranslationRow::from_row)?
                    .collect::<Result<Vec<_>, _>>()?;

                let ids: Vec<i64> = rows.iter().map(|r| r.id).collect();
                let mut tags = tags_for(conn, &ids)?;
                let data = rows
                    .into_iter()
                    .map(|row| {
                        let row_tags = tags.remove(&row.id).unwrap_or_default();
                        row.into_translation(row_tags)
                    })
                    .collect::<StoreResult<Vec<_>>>()?;

                Ok(Page {
                    data,
                    meta: PageMeta::new(filter.page, filter.per_page, total.max(0) as u64),
                })
            })
            .await
    }

    #[instrument(skip(self), fields(slice = %key))]
    async fn export(&self, key: &SliceKey) -> StoreResult<ExportMap> {
        let filter = TranslationFilter::from(key);
        let map = self
            .db
            .execute(move |conn| {
                let composed = compose(&filter);
                let mut stmt = conn.prepare(&format!(
                    "SELECT t.key, t.content FROM translations t{}",
                    composed.where_sql
                ))?;
                let map = stmt
                    .query_map(params_from_iter(composed.params.iter()), |row| {
                        Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
                    })?
                    .collect::<Result<ExportMap, _>>()?;
                Ok(map)
            })
            .await?;

        debug!(count = map.len(), "slice exported from store");
        Ok(map)
    }

    #[instrument(skip(self))]
    async fn list_tags(&self) -> StoreResult<Vec<Tag>> {
        self.db
            .execute(|conn| {
                let mut stmt = conn.prepare(
                    "SELECT id, name, description, created_at, updated_at FROM tags ORDER BY name",
                )?;
                let tags = stmt
                    .query_map([], |row| tag_from_row(row, 0))?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(tags)
            })
            .await
    }

    #[instrument(skip(self))]
    async fn ensure_tag(&self, name: &str, description: Option<&str>) -> StoreResult<Tag> {
        let name = name.trim().to_owned();
        if name.is_empty() {
            let mut errors = ValidationErrors::new();
            errors.add("name", "The name field is required.");
            return Err(errors.into());
        }
        let description = description.map(str::to_owned);

        self.db
            .transaction(move |tx| {
                let now = Utc::now().timestamp();
                tx.execute(
                    "INSERT OR IGNORE INTO tags (name, description, created_at, updated_at) \
                     VALUES (?1, ?2, ?3, ?3)",
                    params![name, description, now],
                )?;
                let tag = tx.query_row(
                    "SELECT id, name, description, created_at, updated_at FROM tags WHERE name = ?1",
                    [&name],
                    |row| tag_from_row(row, 0),
                )?;
                Ok(tag)
            })
            .await
    }

    async fn count(&self) -> StoreResult<u64> {
        self.db
            .execute(|conn| {
                let n: i64 = conn.query_row("SELECT count(*) FROM translations", [], |row| row.get(0))?;
                Ok(n.max(0) as u64)
            })
            .await
    }
}

// ═══════════════════════════════════════════════════════════════════════
//  Row helpers (synchronous, run inside `execute`/`transaction`)
// ═══════════════════════════════════════════════════════════════════════

fn load(conn: &Connection, id: i64) -> StoreResult<Option<Translation>> {
    let row = conn
        .query_row(
            &format!("SELECT {COLUMNS} FROM translations t WHERE t.id = ?1"),
            [id],
            TranslationRow::from_row,
        )
        .optional()?;

    let Some(row) = row else {
        return Ok(None);
    };
    let tags = tags_for(conn, &[id])?.remove(&id).unwrap_or_default();
    row.into_translation(tags).map(Some)
}

/// Tags for each of `ids`, ordered by name.
fn tags_for(conn: &Connection, ids: &[i64]) -> StoreResult<HashMap<i64, Vec<Tag>>> {
    let mut by_translation: HashMap<i64, Vec<Tag>> = HashMap::new();
    if ids.is_empty() {
        return Ok(by_translation);
    }

    let mut stmt = conn.prepare(&format!(
        "SELECT tt.translation_id, g.id, g.name, g.description, g.created_at, g.updated_at \
         FROM translation_tags tt JOIN tags g ON g.id = tt.tag_id \
         WHERE tt.translation_id IN ({}) ORDER BY g.name",
        placeholders(ids.len())
    ))?;
    let rows = stmt.query_map(params_from_iter(ids.iter()), |row| {
        Ok((row.get::<_, i64>(0)?, tag_from_row(row, 1)?))
    })?;
    for row in rows {
        let (translation_id, tag) = row?;
        by_translation.entry(translation_id).or_default().push(tag);
    }
    Ok(by_translation)
}

fn key_taken(conn: &Connection, key: &str, except: Option<i64>) -> StoreResult<bool> {
    let taken: bool = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM translations WHERE key = ?1 AND (?2 IS NULL OR id != ?2))",
        params![key, except],
        |row| row.get(0),
    )?;
    Ok(taken)
}

/// Ids for `names`, creating tags that do not exist yet.
fn resolve_tags(conn: &Connection, names: &[String], now: i64) -> StoreResult<Vec<i64>> {
    let names: BTreeSet<&str> = names.iter().map(String::as_str).collect();
    let mut ids = Vec::with_capacity(names.len());
    for name in names {
        conn.execute(
            "INSERT OR IGNORE INTO tags (name, created_at, updated_at) VALUES (?1, ?2, ?2)",
            params![name, now],
        )?;
        let id: i64 = conn.query_row("SELECT id FROM tags WHERE name = ?1", [name], |row| row.get(0))?;
        ids.push(id);
    }
    Ok(ids)
}

fn attach_tags(conn: &Connection, translation_id: i64, names: &[String], now: i64) -> StoreResult<()> {
    for tag_id in resolve_tags(conn, names, now)? {
        conn.execute(
            "INSERT OR IGNORE INTO translation_tags (translation_id, tag_id, created_at) \
             VALUES (?1, ?2, ?3)",
            params![translation_id, tag_id, now],
        )?;
    }
    Ok(())
}

/// Make the association set of `translation_id` exactly `names`.
fn sync_tags(conn: &Connection, translation_id: i64, names: &[String], now: i64) -> StoreResult<()> {
    let keep = resolve_tags(conn, names, now)?;

    let mut params: Vec<SqlValue> = vec![SqlValue::Integer(translation_id)];
    let sql = if keep.is_empty() {
        "DELETE FROM translation_tags WHERE translation_id = ?".to_owned()
    } else {
        params.extend(keep.iter().copied().map(SqlValue::Integer));
        format!(
            "DELETE FROM translation_tags WHERE translation_id = ? AND tag_id NOT IN ({})",
            placeholders(keep.len())
        )
    };
    conn.execute(&sql, params_from_iter(params.iter()))?;

    for tag_id in keep {
        conn.execute(
            "INSERT OR IGNORE INTO translation_tags (translation_id, tag_id, created_at) \
             VALUES (?1, ?2, ?3)",
            params![translation_id, tag_id, now],
        )?;
    }
    Ok(())
}

fn encode_metadata(metadata: Option<&Metadata>) -> StoreResult<Option<String>> {
    Ok(metadata.map(serde_json::to_string).transpose()?)
}

/// A unique-index race on `translations.key` is still a validation error.
fn map_key_conflict(err: rusqlite::Error) -> StoreError {
    if let rusqlite::Error::SqliteFailure(ref failure, Some(ref message)) = err
        && failure.code == rusqlite::ErrorCode::ConstraintViolation
        && message.contains("translations.key")
    {
        return ValidationErrors::key_taken().into();
    }
    StoreError::Sqlite(err)
}

fn tag_from_row(row: &Row<'_>, offset: usize) -> rusqlite::Result<Tag> {
    Ok(Tag {
        id: row.get(offset)?,
        name: row.get(offset + 1)?,
        description: row.get(offset + 2)?,
        created_at: row.get(offset + 3)?,
        updated_at: row.get(offset + 4)?,
    })
}

/// Raw `translations` row before metadata decoding.
struct TranslationRow {
    id: i64,
    key: String,
    locale: String,
    content: String,
    namespace: String,
    is_active: bool,
    metadata: Option<String>,
    created_at: i64,
    updated_at: i64,
}

impl TranslationRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            key: row.get(1)?,
            locale: row.get(2)?,
            content: row.get(3)?,
            namespace: row.get(4)?,
            is_active: row.get(5)?,
            metadata: row.get(6)?,
            created_at: row.get(7)?,
            updated_at: row.get(8)?,
        })
    }

    fn into_translation(self, tags: Vec<Tag>) -> StoreResult<Translation> {
        let metadata = self
            .metadata
            .map(|raw| serde_json::from_str::<Metadata>(&raw))
            .transpose()?;
        Ok(Translation {
            id: self.id,
            key: self.key,
            locale: self.locale,
            content: self.content,
            namespace: self.namespace,
            is_active: self.is_active,
            metadata,
            created_at: self.created_at,
            updated_at: self.updated_at,
            tags,
        })
    }
}

// ── tests ────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    async fn setup_store() -> SqliteTranslationStore {
        let db = Database::open_in_memory().unwrap();
        db.run_migrations().await.unwrap();
        SqliteTranslationStore::new(db)
    }

    fn metadata(value: serde_json::Value) -> Metadata {
        value.as_object().unwrap().clone()
    }

    #[tokio::test]
    async fn create_and_find_round_trip() {
        let store = setup_store().await;
        let created = store
            .create(
                NewTranslation::new("home.title", "en", "Welcome")
                    .namespace("web")
                    .metadata(metadata(json!({"source": "import"})))
                    .tags(["web", "admin"]),
            )
            .await
            .unwrap();

        assert!(created.id > 0);
        assert_eq!(created.tag_names(), ["admin", "web"]);
        assert_eq!(created.created_at, created.updated_at);

        let found = store.find(created.id).await.unwrap().unwrap();
        assert_eq!(found, created);
        assert_eq!(found.metadata.unwrap()["source"], "import");
    }

    #[tokio::test]
    async fn find_missing_returns_none() {
        let store = setup_store().await;
        assert!(store.find(999_999).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn duplicate_key_is_validation_error_and_writes_nothing() {
        let store = setup_store().await;
        store.create(NewTranslation::new("dup", "en", "One")).await.unwrap();

        let err = store
            .create(NewTranslation::new("dup", "fr", "Un").tags(["fresh-tag"]))
            .await
            .unwrap_err();
        match err {
            StoreError::Validation(errors) => assert!(errors.contains("key")),
            other => panic!("expected validation error, got {other:?}"),
        }
        assert_eq!(store.count().await.unwrap(), 1);
        // The tag of the rejected write was rolled back too.
        assert!(store.list_tags().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn update_replaces_tag_set() {
        let store = setup_store().await;
        let t = store
            .create(NewTranslation::new("k", "en", "v").tags(["a", "b"]))
            .await
            .unwrap();

        let outcome = store
            .update(
                t.id,
                TranslationPatch {
                    tags: Some(vec!["b".into(), "c".into()]),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(outcome.translation.tag_names(), ["b", "c"]);

        let cleared = store
            .update(
                t.id,
                TranslationPatch {
                    tags: Some(vec![]),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert!(cleared.translation.tags.is_empty());
        // Detached tags still exist.
        assert_eq!(store.list_tags().await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn update_without_tags_keeps_associations() {
        let store = setup_store().await;
        let t = store
            .create(NewTranslation::new("k", "en", "v").tags(["a"]))
            .await
            .unwrap();

        let outcome = store
            .update(
                t.id,
                TranslationPatch {
                    locale: Some("fr".into()),
                    content: Some("w".into()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(outcome.previous.locale, "en");
        assert_eq!(outcome.translation.locale, "fr");
        assert_eq!(outcome.translation.content, "w");
        assert_eq!(outcome.translation.key, "k");
        assert_eq!(outcome.translation.tag_names(), ["a"]);
    }

    #[tokio::test]
    async fn update_may_keep_own_key_but_not_steal_another() {
        let store = setup_store().await;
        let a = store.create(NewTranslation::new("a", "en", "A").tags(["x"])).await.unwrap();
        store.create(NewTranslation::new("b", "en", "B")).await.unwrap();

        store
            .update(
                a.id,
                TranslationPatch {
                    key: Some("a".into()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        let err = store
            .update(
                a.id,
                TranslationPatch {
                    key: Some("b".into()),
                    content: Some("changed".into()),
                    tags: Some(vec!["y".into()]),
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Validation(_)));

        let unchanged = store.find(a.id).await.unwrap().unwrap();
        assert_eq!(unchanged.content, "A");
        assert_eq!(unchanged.tag_names(), ["x"]);
    }

    #[tokio::test]
    async fn update_missing_is_not_found() {
        let store = setup_store().await;
        let err = store.update(42, TranslationPatch::default()).await.unwrap_err();
        assert!(matches!(err, StoreError::NotFound { entity: "translation", .. }));
    }

    #[tokio::test]
    async fn delete_cascades_associations() {
        let store = setup_store().await;
        let t = store
            .create(NewTranslation::new("k", "en", "v").tags(["a", "b"]))
            .await
            .unwrap();

        let removed = store.delete(t.id).await.unwrap();
        assert_eq!(removed.id, t.id);
        assert!(store.find(t.id).await.unwrap().is_none());

        let links: i64 = store
            .database()
            .execute(|conn| Ok(conn.query_row("SELECT count(*) FROM translation_tags", [], |r| r.get(0))?))
            .await
            .unwrap();
        assert_eq!(links, 0);

        assert!(matches!(
            store.delete(t.id).await.unwrap_err(),
            StoreError::NotFound { .. }
        ));
    }

    #[tokio::test]
    async fn export_returns_active_rows_of_slice() {
        let store = setup_store().await;
        store.create(NewTranslation::new("a", "en", "A").tags(["web"])).await.unwrap();
        store.create(NewTranslation::new("b", "en", "B")).await.unwrap();
        store.create(NewTranslation::new("c", "en", "C").active(false)).await.unwrap();
        store.create(NewTranslation::new("d", "fr", "D")).await.unwrap();
        store.create(NewTranslation::new("e", "en", "E").namespace("admin")).await.unwrap();

        let all = store.export(&SliceKey::untagged("en", "general")).await.unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all["a"], "A");
        assert_eq!(all["b"], "B");

        let tagged = store.export(&SliceKey::new("en", "general", ["web"])).await.unwrap();
        assert_eq!(tagged.keys().collect::<Vec<_>>(), ["a"]);

        let unknown = store.export(&SliceKey::untagged("xx", "general")).await.unwrap();
        assert!(unknown.is_empty());
    }

    #[tokio::test]
    async fn ensure_tag_is_idempotent() {
        let store = setup_store().await;
        let first = store.ensure_tag("button", Some("UI buttons")).await.unwrap();
        let second = store.ensure_tag("button", Some("ignored")).await.unwrap();
        assert_eq!(first.id, second.id);
        assert_eq!(second.description.as_deref(), Some("UI buttons"));

        assert!(matches!(
            store.ensure_tag("  ", None).await.unwrap_err(),
            StoreError::Validation(_)
        ));
    }
}

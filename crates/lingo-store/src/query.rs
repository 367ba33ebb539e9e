//! Query engine: filter specification, clause composition and pagination.
//!
//! A [`TranslationFilter`] is normalized (page bounds clamped, tag names
//! cleaned) and then turned into exactly one `WHERE` clause by
//! [`compose`]. Clauses are always emitted in the same order: locale,
//! namespace, search, tags, active.

use std::sync::Arc;

use rusqlite::types::Value as SqlValue;
use serde::Serialize;
use tracing::{debug, instrument};

use crate::error::StoreResult;
use crate::model::{SliceKey, Translation};
use crate::traits::TranslationRepository;

pub const DEFAULT_PER_PAGE: u32 = 15;
pub const MAX_PER_PAGE: u32 = 100;

// ═══════════════════════════════════════════════════════════════════════
//  Filter
// ═══════════════════════════════════════════════════════════════════════

/// What to list. Every populated predicate must hold (AND); the tag
/// predicate matches translations holding ANY of the named tags.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranslationFilter {
    pub locale: Option<String>,
    pub namespace: Option<String>,
    /// Case-insensitive substring of key or content.
    pub search: Option<String>,
    /// `Some(empty)` matches nothing.
    pub tags: Option<Vec<String>>,
    pub active_only: bool,
    pub page: u32,
    pub per_page: u32,
}

impl Default for TranslationFilter {
    fn default() -> Self {
        Self {
            locale: None,
            namespace: None,
            search: None,
            tags: None,
            active_only: true,
            page: 1,
            per_page: DEFAULT_PER_PAGE,
        }
    }
}

impl TranslationFilter {
    /// Clamp paging into range and drop blank tag names.
    pub fn normalized(mut self) -> Self {
        self.per_page = self.per_page.clamp(1, MAX_PER_PAGE);
        self.page = self.page.max(1);
        self.search = self.search.filter(|s| !s.is_empty());
        if let Some(tags) = self.tags.as_mut() {
            for tag in tags.iter_mut() {
                *tag = tag.trim().to_owned();
            }
            tags.retain(|t| !t.is_empty());
            tags.sort();
            tags.dedup();
        }
        self
    }

    pub fn offset(&self) -> u64 {
        u64::from(self.page.saturating_sub(1)) * u64::from(self.per_page)
    }
}

impl From<&SliceKey> for TranslationFilter {
    /// Export filter: active rows of one slice, tags only when named.
    fn from(key: &SliceKey) -> Self {
        Self {
            locale: Some(key.locale().to_owned()),
            namespace: Some(key.namespace().to_owned()),
            tags: (!key.tags().is_empty()).then(|| key.tags().to_vec()),
            active_only: true,
            ..Self::default()
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════
//  Page
// ═══════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PageMeta {
    pub current_page: u32,
    pub last_page: u32,
    pub per_page: u32,
    /// Matching rows across all pages.
    pub total: u64,
}

impl PageMeta {
    pub fn new(current_page: u32, per_page: u32, total: u64) -> Self {
        let per = u64::from(per_page.max(1));
        let last = total.div_ceil(per).max(1);
        Self {
            current_page,
            last_page: u32::try_from(last).unwrap_or(u32::MAX),
            per_page,
            total,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Page<T> {
    pub data: Vec<T>,
    pub meta: PageMeta,
}

// ═══════════════════════════════════════════════════════════════════════
//  Composition
// ═══════════════════════════════════════════════════════════════════════

/// A `WHERE` clause over `translations t` and its positional parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct Composed {
    /// Empty, or ` WHERE ...` with a leading space.
    pub where_sql: String,
    pub params: Vec<SqlValue>,
}

/// Build the single `WHERE` clause for `filter`.
pub fn compose(filter: &TranslationFilter) -> Composed {
    let mut clauses: Vec<String> = Vec::new();
    let mut params: Vec<SqlValue> = Vec::new();

    if let Some(locale) = &filter.locale {
        clauses.push("t.locale = ?".into());
        params.push(SqlValue::Text(locale.clone()));
    }
    if let Some(namespace) = &filter.namespace {
        clauses.push("t.namespace = ?".into());
        params.push(SqlValue::Text(namespace.clone()));
    }
    if let Some(search) = &filter.search {
        clauses.push(format!(
            "(instr({FOLD_FUNCTION}(t.key), ?) > 0 OR instr({FOLD_FUNCTION}(t.content), ?) > 0)"
        ));
        let needle = fold_case(search);
        params.push(SqlValue::Text(needle.clone()));
        params.push(SqlValue::Text(needle));
    }
    if let Some(tags) = &filter.tags {
        if tags.is_empty() {
            clauses.push("0".into());
        } else {
            clauses.push(format!(
                "EXISTS (SELECT 1 FROM translation_tags tt JOIN tags g ON g.id = tt.tag_id \
                 WHERE tt.translation_id = t.id AND g.name IN ({}))",
                placeholders(tags.len())
            ));
            params.extend(tags.iter().cloned().map(SqlValue::Text));
        }
    }
    if filter.active_only {
        clauses.push("t.is_active = 1".into());
    }

    let where_sql = if clauses.is_empty() {
        String::new()
    } else {
        format!(" WHERE {}", clauses.join(" AND "))
    };
    Composed { where_sql, params }
}

/// `?, ?, ?` with `n` placeholders.
pub(crate) fn placeholders(n: usize) -> String {
    vec!["?"; n].join(", ")
}

/// SQL name of the case-folding scalar registered on every connection.
pub(crate) const FOLD_FUNCTION: &str = "lingo_fold";

/// Unicode lowercase, applied to both the needle and the searched columns.
pub(crate) fn fold_case(s: &str) -> String {
    s.to_lowercase()
}

// ═══════════════════════════════════════════════════════════════════════
//  Engine
// ═══════════════════════════════════════════════════════════════════════

/// Resolves list requests against an injected repository.
#[derive(Clone)]
pub struct QueryEngine {
    repo: Arc<dyn TranslationRepository>,
}

impl QueryEngine {
    pub fn new(repo: Arc<dyn TranslationRepository>) -> Self {
        Self { repo }
    }

    /// Return one page of matching translations with their tags.
    #[instrument(skip(self))]
    pub async fn search(&self, filter: TranslationFilter) -> StoreResult<Page<Translation>> {
        let filter = filter.normalized();
        let page = self.repo.search(&filter).await?;
        debug!(
            total = page.meta.total,
            returned = page.data.len(),
            "translation search"
        );
        Ok(page)
    }
}

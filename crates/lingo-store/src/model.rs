//! Typed records for translations, tags and export slices.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Namespace assigned when a write does not name one.
pub const DEFAULT_NAMESPACE: &str = "general";

/// Free-form metadata attached to a translation.
pub type Metadata = Map<String, Value>;

/// Export payload: translation key → content, ordered by key.
pub type ExportMap = BTreeMap<String, String>;

// ═══════════════════════════════════════════════════════════════════════
//  Records
// ═══════════════════════════════════════════════════════════════════════

/// A categorical label attached to translations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tag {
    pub id: i64,
    /// Unique tag name.
    pub name: String,
    pub description: Option<String>,
    pub created_at: i64,
    pub updated_at: i64,
}

/// One localized string.
///
/// `key` is unique across the whole store, independent of `locale`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Translation {
    pub id: i64,
    pub key: String,
    pub locale: String,
    pub content: String,
    pub namespace: String,
    pub is_active: bool,
    pub metadata: Option<Metadata>,
    pub created_at: i64,
    pub updated_at: i64,
    /// Attached tags, ordered by name.
    pub tags: Vec<Tag>,
}

impl Translation {
    /// The (locale, namespace) slice this translation belongs to.
    pub fn slice(&self) -> SliceId {
        SliceId::new(&self.locale, &self.namespace)
    }

    /// Names of the attached tags.
    pub fn tag_names(&self) -> Vec<&str> {
        self.tags.iter().map(|t| t.name.as_str()).collect()
    }
}

// ═══════════════════════════════════════════════════════════════════════
//  Write inputs
// ═══════════════════════════════════════════════════════════════════════

/// A validated translation ready to insert.
#[derive(Debug, Clone, PartialEq)]
pub struct NewTranslation {
    pub key: String,
    pub locale: String,
    pub content: String,
    pub namespace: String,
    pub is_active: bool,
    pub metadata: Option<Metadata>,
    /// Tag names to attach; unknown names are created.
    pub tags: Vec<String>,
}

impl NewTranslation {
    /// An active translation in the default namespace with no tags.
    pub fn new(key: impl Into<String>, locale: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            locale: locale.into(),
            content: content.into(),
            namespace: DEFAULT_NAMESPACE.to_owned(),
            is_active: true,
            metadata: None,
            tags: Vec::new(),
        }
    }

    pub fn namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = namespace.into();
        self
    }

    pub fn active(mut self, is_active: bool) -> Self {
        self.is_active = is_active;
        self
    }

    pub fn metadata(mut self, metadata: Metadata) -> Self {
        self.metadata = Some(metadata);
        self
    }

    pub fn tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }
}

/// A partial update. `None` leaves the field untouched.
///
/// `tags: Some(..)` replaces the whole association set, so `Some(vec![])`
/// detaches every tag.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TranslationPatch {
    pub key: Option<String>,
    pub locale: Option<String>,
    pub content: Option<String>,
    pub namespace: Option<String>,
    pub is_active: Option<bool>,
    pub metadata: Option<Metadata>,
    pub tags: Option<Vec<String>>,
}

/// Result of a successful update.
#[derive(Debug, Clone, PartialEq)]
pub struct UpdateOutcome {
    /// Slice the row belonged to before the update.
    pub previous: SliceId,
    pub translation: Translation,
}

// ═══════════════════════════════════════════════════════════════════════
//  Slices
// ═══════════════════════════════════════════════════════════════════════

/// A (locale, namespace) pair: the unit of export-cache invalidation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SliceId {
    pub locale: String,
    pub namespace: String,
}

impl SliceId {
    pub fn new(locale: impl Into<String>, namespace: impl Into<String>) -> Self {
        Self {
            locale: locale.into(),
            namespace: namespace.into(),
        }
    }
}

impl fmt::Display for SliceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.locale, self.namespace)
    }
}

/// An export request and its cache key: (locale, namespace, tag set).
///
/// The tag set is deduplicated and sorted on construction so requests that
/// name the same tags in a different order are equal.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SliceKey {
    slice: SliceId,
    tags: Vec<String>,
}

impl SliceKey {
    pub fn new<I, S>(locale: impl Into<String>, namespace: impl Into<String>, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let tags: BTreeSet<String> = tags.into_iter().map(Into::into).collect();
        Self {
            slice: SliceId::new(locale, namespace),
            tags: tags.into_iter().collect(),
        }
    }

    /// Whole-slice key with no tag filter.
    pub fn untagged(locale: impl Into<String>, namespace: impl Into<String>) -> Self {
        Self::new(locale, namespace, Vec::<String>::new())
    }

    pub fn slice(&self) -> &SliceId {
        &self.slice
    }

    pub fn locale(&self) -> &str {
        &self.slice.locale
    }

    pub fn namespace(&self) -> &str {
        &self.slice.namespace
    }

    /// Sorted, deduplicated tag names. Empty means "no tag filter".
    pub fn tags(&self) -> &[String] {
        &self.tags
    }
}

impl fmt::Display for SliceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}[{}]", self.slice, self.tags.join(","))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slice_key_ignores_tag_order_and_duplicates() {
        let a = SliceKey::new("en", "general", ["web", "admin"]);
        let b = SliceKey::new("en", "general", ["admin", "web", "admin"]);
        assert_eq!(a, b);
        assert_eq!(a.tags(), ["admin", "web"]);
        assert_eq!(a.to_string(), "en/general[admin,web]");
    }

    #[test]
    fn slice_key_distinguishes_tag_sets() {
        let untagged = SliceKey::untagged("en", "general");
        let tagged = SliceKey::new("en", "general", ["web"]);
        assert_ne!(untagged, tagged);
        assert_eq!(tagged.slice(), untagged.slice());
    }

    #[test]
    fn new_translation_defaults() {
        let t = NewTranslation::new("t.key", "en", "Hi");
        assert_eq!(t.namespace, DEFAULT_NAMESPACE);
        assert!(t.is_active);
        assert!(t.tags.is_empty());
    }
}

//! Field-level validation of write and export requests.
//!
//! Request bodies arrive as untyped JSON. The functions here check every
//! field, collect all problems per field, and only then build the typed
//! record, so a rejected request never reaches the store.

use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;
use serde_json::{Map, Value};

use crate::model::{DEFAULT_NAMESPACE, Metadata, NewTranslation, SliceKey, TranslationPatch};

pub const MAX_KEY_LEN: usize = 255;
pub const MAX_LOCALE_LEN: usize = 10;
pub const MAX_NAMESPACE_LEN: usize = 255;

/// Validation messages grouped by field name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ValidationErrors(BTreeMap<String, Vec<String>>);

impl ValidationErrors {
    pub fn new() -> Self {
        Self::default()
    }

    /// Error reported when a key collides with an existing translation.
    pub fn key_taken() -> Self {
        let mut errors = Self::new();
        errors.add("key", "The key has already been taken.");
        errors
    }

    pub fn add(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.0.entry(field.into()).or_default().push(message.into());
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn contains(&self, field: &str) -> bool {
        self.0.contains_key(field)
    }

    fn finish<T>(self, value: T) -> Result<T, Self> {
        if self.is_empty() { Ok(value) } else { Err(self) }
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for (field, messages) in &self.0 {
            for message in messages {
                if !first {
                    f.write_str("; ")?;
                }
                write!(f, "{field}: {message}")?;
                first = false;
            }
        }
        Ok(())
    }
}

// ═══════════════════════════════════════════════════════════════════════
//  Entry points
// ═══════════════════════════════════════════════════════════════════════

/// Validate a create body.
pub fn new_translation(body: &Value) -> Result<NewTranslation, ValidationErrors> {
    let empty = Map::new();
    let obj = body.as_object().unwrap_or(&empty);
    let mut errors = ValidationErrors::new();

    let key = string_field(obj, "key", Some(MAX_KEY_LEN), true, &mut errors);
    let locale = string_field(obj, "locale", Some(MAX_LOCALE_LEN), true, &mut errors);
    let content = content_field(obj, true, &mut errors);
    let namespace = string_field(obj, "namespace", Some(MAX_NAMESPACE_LEN), false, &mut errors);
    let is_active = bool_field(obj, "is_active", &mut errors);
    let metadata = metadata_field(obj, &mut errors);
    let tags = tags_field(obj, &mut errors);

    match (key, locale, content) {
        (Some(key), Some(locale), Some(content)) => errors.finish(NewTranslation {
            key,
            locale,
            content,
            namespace: namespace.unwrap_or_else(|| DEFAULT_NAMESPACE.to_owned()),
            is_active: is_active.unwrap_or(true),
            metadata,
            tags: tags.unwrap_or_default(),
        }),
        _ => Err(errors),
    }
}

/// Validate an update body. Every field is optional.
pub fn translation_patch(body: &Value) -> Result<TranslationPatch, ValidationErrors> {
    let empty = Map::new();
    let obj = body.as_object().unwrap_or(&empty);
    let mut errors = ValidationErrors::new();

    let patch = TranslationPatch {
        key: string_field(obj, "key", Some(MAX_KEY_LEN), false, &mut errors),
        locale: string_field(obj, "locale", Some(MAX_LOCALE_LEN), false, &mut errors),
        content: content_field(obj, false, &mut errors),
        namespace: string_field(obj, "namespace", Some(MAX_NAMESPACE_LEN), false, &mut errors),
        is_active: bool_field(obj, "is_active", &mut errors),
        metadata: metadata_field(obj, &mut errors),
        tags: tags_field(obj, &mut errors),
    };
    errors.finish(patch)
}

/// Validate export parameters. `namespace` defaults to `general`.
pub fn export_request(
    locale: Option<&str>,
    namespace: Option<&str>,
    tags: Vec<String>,
) -> Result<SliceKey, ValidationErrors> {
    let mut errors = ValidationErrors::new();

    let locale = locale.map(str::trim).unwrap_or_default();
    if locale.is_empty() {
        errors.add("locale", "The locale field is required.");
    } else {
        check_len("locale", locale, MAX_LOCALE_LEN, &mut errors);
    }

    let namespace = match namespace.map(str::trim) {
        Some(ns) if !ns.is_empty() => ns,
        _ => DEFAULT_NAMESPACE,
    };
    check_len("namespace", namespace, MAX_NAMESPACE_LEN, &mut errors);

    let tags = tags
        .into_iter()
        .map(|t| t.trim().to_owned())
        .filter(|t| !t.is_empty());

    let key = SliceKey::new(locale, namespace, tags);
    errors.finish(key)
}

// ═══════════════════════════════════════════════════════════════════════
//  Field helpers
// ═══════════════════════════════════════════════════════════════════════

/// A trimmed, non-empty string of at most `max` characters.
fn string_field(
    obj: &Map<String, Value>,
    field: &str,
    max: Option<usize>,
    required: bool,
    errors: &mut ValidationErrors,
) -> Option<String> {
    match obj.get(field) {
        None if required => {
            errors.add(field, format!("The {field} field is required."));
            None
        }
        None => None,
        Some(Value::String(s)) => {
            let s = s.trim();
            if s.is_empty() {
                errors.add(field, format!("The {field} field is required."));
                return None;
            }
            if let Some(max) = max
                && !check_len(field, s, max, errors)
            {
                return None;
            }
            Some(s.to_owned())
        }
        Some(Value::Null) if required => {
            errors.add(field, format!("The {field} field is required."));
            None
        }
        Some(_) => {
            errors.add(field, format!("The {field} field must be a string."));
            None
        }
    }
}

/// Content keeps its surrounding whitespace but may not be blank.
fn content_field(
    obj: &Map<String, Value>,
    required: bool,
    errors: &mut ValidationErrors,
) -> Option<String> {
    match obj.get("content") {
        Some(Value::String(s)) if !s.trim().is_empty() => Some(s.clone()),
        Some(Value::String(_)) => {
            errors.add("content", "The content field is required.");
            None
        }
        None | Some(Value::Null) if required => {
            errors.add("content", "The content field is required.");
            None
        }
        None => None,
        Some(_) => {
            errors.add("content", "The content field must be a string.");
            None
        }
    }
}

fn bool_field(obj: &Map<String, Value>, field: &str, errors: &mut ValidationErrors) -> Option<bool> {
    match obj.get(field)? {
        Value::Bool(b) => Some(*b),
        // Accept 0/1 as form-encoded clients send them.
        Value::Number(n) if n.as_i64() == Some(0) => Some(false),
        Value::Number(n) if n.as_i64() == Some(1) => Some(true),
        _ => {
            errors.add(field, format!("The {field} field must be true or false."));
            None
        }
    }
}

fn metadata_field(obj: &Map<String, Value>, errors: &mut ValidationErrors) -> Option<Metadata> {
    match obj.get("metadata")? {
        Value::Object(map) => Some(map.clone()),
        _ => {
            errors.add("metadata", "The metadata field must be an object.");
            None
        }
    }
}

fn tags_field(obj: &Map<String, Value>, errors: &mut ValidationErrors) -> Option<Vec<String>> {
    let Value::Array(items) = obj.get("tags")? else {
        errors.add("tags", "The tags field must be an array.");
        return None;
    };

    let mut tags = Vec::with_capacity(items.len());
    for (i, item) in items.iter().enumerate() {
        match item.as_str().map(str::trim) {
            Some(name) if !name.is_empty() => {
                if check_len(&format!("tags.{i}"), name, MAX_KEY_LEN, errors) {
                    tags.push(name.to_owned());
                }
            }
            _ => errors.add(format!("tags.{i}"), format!("The tags.{i} field must be a non-empty string.")),
        }
    }
    Some(tags)
}

fn check_len(field: &str, value: &str, max: usize, errors: &mut ValidationErrors) -> bool {
    if value.chars().count() > max {
        errors.add(
            field,
            format!("The {field} field must not be greater than {max} characters."),
        );
        return false;
    }
    true
}

//! Error types for the lingo-store crate.
//!
//! All store operations return [`StoreError`] via [`StoreResult`]. Cache
//! backends report [`CacheError`](crate::cache::CacheError) instead, which
//! never escapes the export path.

use thiserror::Error;

use crate::validate::ValidationErrors;

/// Alias for `Result<T, StoreError>`.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors that can occur in the storage engine.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Input was malformed, missing or violated a uniqueness rule.
    #[error("validation failed: {0}")]
    Validation(ValidationErrors),

    /// The requested record was not found.
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// SQLite operation failed.
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// JSON serialization or deserialization failed.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// A schema migration failed.
    #[error("migration v{version} failed: {message}")]
    Migration { version: u32, message: String },

    /// A blocking task was cancelled or panicked.
    #[error("background task failed: {0}")]
    TaskJoin(String),
}

impl StoreError {
    /// Shorthand for a missing translation.
    pub fn translation_not_found(id: i64) -> Self {
        Self::NotFound {
            entity: "translation",
            id: id.to_string(),
        }
    }

    /// `true` for transaction, connection and encoding failures, i.e. the
    /// class reported to API clients as a server error.
    pub fn is_storage(&self) -> bool {
        !matches!(self, Self::Validation(_) | Self::NotFound { .. })
    }
}

impl From<ValidationErrors> for StoreError {
    fn from(errors: ValidationErrors) -> Self {
        Self::Validation(errors)
    }
}

impl From<tokio::task::JoinError> for StoreError {
    fn from(err: tokio::task::JoinError) -> Self {
        Self::TaskJoin(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_storage_errors() {
        let not_found = StoreError::translation_not_found(7);
        assert!(!not_found.is_storage());
        assert_eq!(not_found.to_string(), "translation not found: 7");

        let mut errors = ValidationErrors::new();
        errors.add("key", "The key field is required.");
        assert!(!StoreError::from(errors).is_storage());

        assert!(StoreError::TaskJoin("boom".into()).is_storage());
        assert!(StoreError::Sqlite(rusqlite::Error::QueryReturnedNoRows).is_storage());
    }
}

//! # lingo-store
//!
//! Storage engine for Lingo translations.
//!
//! Provides SQLite-backed persistence for translations and their tags, a
//! query engine for filtered, paginated listing, and a read-through export
//! cache via `moka` that is invalidated per (locale, namespace) slice on
//! every write.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │  TranslationService (write → invalidate)     │
//! ├──────────────────────┬───────────────────────┤
//! │  QueryEngine         │  ExportCache          │
//! │  (filter → WHERE)    │  (SliceCache, moka)   │
//! ├──────────────────────┴───────────────────────┤
//! │  TranslationRepository                       │
//! │  SqliteTranslationStore (records + tags)     │
//! ├──────────────────────────────────────────────┤
//! │  Database (rusqlite WAL + mmap)              │
//! │  Migrations (versioned, transactional)       │
//! └──────────────────────────────────────────────┘
//! ```
//!
//! ## Quick start
//!
//! ```ignore
//! use std::time::Duration;
//! use lingo_store::{Database, NewTranslation, SliceKey, TranslationService};
//!
//! let db = Database::open_and_migrate("data/lingo.db").await?;
//! let service = TranslationService::sqlite(db, Duration::from_secs(3600), 10_000);
//! service.create(NewTranslation::new("home.title", "en", "Welcome")).await?;
//! let slice = service.export(&SliceKey::untagged("en", "general")).await?;
//! ```

pub mod cache;
pub mod db;
pub mod error;
pub mod export;
pub mod migration;
pub mod model;
pub mod query;
pub mod service;
pub mod traits;
pub mod translation_store;
pub mod validate;

// ── re-exports ───────────────────────────────────────────────────────

pub use cache::{CacheError, CacheStats, MokaSliceCache, MokaSliceCacheBuilder, SliceCache};
pub use db::Database;
pub use error::{StoreError, StoreResult};
pub use export::ExportCache;
pub use model::{
    DEFAULT_NAMESPACE, ExportMap, Metadata, NewTranslation, SliceId, SliceKey, Tag, Translation,
    TranslationPatch, UpdateOutcome,
};
pub use query::{Page, PageMeta, QueryEngine, TranslationFilter};
pub use service::TranslationService;
pub use traits::TranslationRepository;
pub use translation_store::SqliteTranslationStore;
pub use validate::ValidationErrors;

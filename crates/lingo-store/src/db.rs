//! SQLite handle shared by every store in the crate.
//!
//! [`Database`] owns a single `rusqlite::Connection` behind
//! `Arc<Mutex<>>`. Every call is dispatched onto the blocking pool with
//! `tokio::task::spawn_blocking` so request handlers never block the
//! runtime, and writes that touch several tables go through
//! [`Database::transaction`].

use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

use rusqlite::functions::FunctionFlags;
use rusqlite::{Connection, Transaction};
use tracing::{debug, info, warn};

use crate::error::{StoreError, StoreResult};
use crate::migration;
use crate::query::{FOLD_FUNCTION, fold_case};

/// Thread-safe handle to the translation database.
#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

impl Database {
    /// Open (or create) a database file and apply the connection pragmas.
    ///
    /// Blocks on file I/O; call it during startup or from `spawn_blocking`.
    pub fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        let path = path.as_ref();
        info!(path = %path.display(), "opening translation database");

        let conn = Connection::open(path)?;
        Self::apply_pragmas(&conn)?;
        Self::register_functions(&conn)?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Create an in-memory database. Used by tests and `--database :memory:`.
    pub fn open_in_memory() -> StoreResult<Self> {
        debug!("opening in-memory translation database");

        let conn = Connection::open_in_memory()?;
        Self::apply_pragmas(&conn)?;
        Self::register_functions(&conn)?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Open the database and bring the schema up to date.
    pub async fn open_and_migrate(path: impl AsRef<Path> + Send + 'static) -> StoreResult<Self> {
        let path = path.as_ref().to_path_buf();
        let db = tokio::task::spawn_blocking(move || {
            if path.as_os_str() == ":memory:" {
                Self::open_in_memory()
            } else {
                Self::open(&path)
            }
        })
        .await??;
        db.run_migrations().await?;
        Ok(db)
    }

    /// Run all pending schema migrations.
    pub async fn run_migrations(&self) -> StoreResult<()> {
        self.execute(|conn| migration::run_all(conn)).await
    }

    /// Run a read-only or single-statement closure on the blocking pool.
    pub async fn execute<F, T>(&self, f: F) -> StoreResult<T>
    where
        F: FnOnce(&Connection) -> StoreResult<T> + Send + 'static,
        T: Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let conn = lock(&conn)?;
            f(&conn)
        })
        .await?
    }

    /// Run `f` inside a single transaction on the blocking pool.
    ///
    /// The transaction commits only when `f` returns `Ok`. Any error rolls
    /// every statement back and is returned unchanged.
    pub async fn transaction<F, T>(&self, f: F) -> StoreResult<T>
    where
        F: FnOnce(&Transaction<'_>) -> StoreResult<T> + Send + 'static,
        T: Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let mut conn = lock(&conn)?;
            let tx = conn.transaction()?;
            match f(&tx) {
                Ok(value) => {
                    tx.commit()?;
                    Ok(value)
                }
                Err(err) => {
                    // Dropping `tx` rolls back.
                    warn!(%err, "write failed, rolling back transaction");
                    Err(err)
                }
            }
        })
        .await?
    }

    /// Cheap liveness probe used by the status endpoint.
    pub async fn ping(&self) -> StoreResult<()> {
        self.execute(|conn| {
            conn.query_row("SELECT 1", [], |row| row.get::<_, i64>(0))?;
            Ok(())
        })
        .await
    }

    // ── pragmas ──────────────────────────────────────────────────────

    fn apply_pragmas(conn: &Connection) -> StoreResult<()> {
        // WAL: readers are not blocked by the writer.
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "synchronous", "NORMAL")?;

        // 256 MiB mmap, ~62 MiB page cache. Export scans stay in memory.
        conn.pragma_update(None, "mmap_size", 268_435_456_i64)?;
        conn.pragma_update(None, "cache_size", -64_000_i32)?;
        conn.pragma_update(None, "temp_store", "MEMORY")?;

        // Association rows cascade with their parents.
        conn.pragma_update(None, "foreign_keys", "ON")?;

        // Storage-layer timeout for contended writes.
        conn.pragma_update(None, "busy_timeout", 5_000_i32)?;

        debug!("database pragmas applied");
        Ok(())
    }

    /// SQLite's `lower()` and `LIKE` fold ASCII only; search needs full
    /// Unicode case folding.
    fn register_functions(conn: &Connection) -> StoreResult<()> {
        conn.create_scalar_function(
            FOLD_FUNCTION,
            1,
            FunctionFlags::SQLITE_UTF8 | FunctionFlags::SQLITE_DETERMINISTIC,
            |ctx| {
                let text: Option<String> = ctx.get(0)?;
                Ok(text.map(|s| fold_case(&s)))
            },
        )?;
        Ok(())
    }
}

fn lock(conn: &Mutex<Connection>) -> StoreResult<MutexGuard<'_, Connection>> {
    conn.lock()
        .map_err(|e| StoreError::TaskJoin(format!("mutex poisoned: {e}")))
}

// ── tests ────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn ping_in_memory() {
        let db = Database::open_in_memory().unwrap();
        db.ping().await.unwrap();
    }

    #[tokio::test]
    async fn foreign_keys_enabled() {
        let db = Database::open_in_memory().unwrap();
        let on: i64 = db
            .execute(|conn| Ok(conn.query_row("PRAGMA foreign_keys", [], |row| row.get(0))?))
            .await
            .unwrap();
        assert_eq!(on, 1);
    }

    #[tokio::test]
    async fn fold_function_lowercases_unicode() {
        let db = Database::open_in_memory().unwrap();
        let folded: String = db
            .execute(|conn| {
                Ok(conn.query_row("SELECT lingo_fold('ÉCOLE Ärger')", [], |row| {
                    row.get(0)
                })?)
            })
            .await
            .unwrap();
        assert_eq!(folded, "école ärger");

        let null: Option<String> = db
            .execute(|conn| Ok(conn.query_row("SELECT lingo_fold(NULL)", [], |row| row.get(0))?))
            .await
            .unwrap();
        assert!(null.is_none());
    }

    #[tokio::test]
    async fn transaction_rolls_back_on_error() {
        let db = Database::open_in_memory().unwrap();
        db.execute(|conn| {
            conn.execute_batch("CREATE TABLE t (v INTEGER NOT NULL)")?;
            Ok(())
        })
        .await
        .unwrap();

        let result: StoreResult<()> = db
            .transaction(|tx| {
                tx.execute("INSERT INTO t (v) VALUES (1)", [])?;
                Err(StoreError::TaskJoin("forced".into()))
            })
            .await;
        assert!(matches!(result, Err(StoreError::TaskJoin(_))));

        let count: i64 = db
            .execute(|conn| Ok(conn.query_row("SELECT count(*) FROM t", [], |row| row.get(0))?))
            .await
            .unwrap();
        assert_eq!(count, 0);
    }

    #[tokio::test]
    async fn transaction_commits_on_success() {
        let db = Database::open_in_memory().unwrap();
        db.execute(|conn| {
            conn.execute_batch("CREATE TABLE t (v INTEGER NOT NULL)")?;
            Ok(())
        })
        .await
        .unwrap();

        db.transaction(|tx| {
            tx.execute("INSERT INTO t (v) VALUES (1)", [])?;
            tx.execute("INSERT INTO t (v) VALUES (2)", [])?;
            Ok(())
        })
        .await
        .unwrap();

        let sum: i64 = db
            .execute(|conn| Ok(conn.query_row("SELECT sum(v) FROM t", [], |row| row.get(0))?))
            .await
            .unwrap();
        assert_eq!(sum, 3);
    }
}

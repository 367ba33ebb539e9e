//! Versioned schema migrations.
//!
//! Each migration is a static SQL batch keyed by version. Applied versions
//! are recorded in `_migrations`, so running the set twice is a no-op.

use rusqlite::Connection;
use tracing::{debug, info, warn};

use crate::error::{StoreError, StoreResult};

struct Migration {
    version: u32,
    description: &'static str,
    sql: &'static str,
}

/// Append new migrations to the end; never edit an applied one.
static MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        description: "translations table",
        sql: r#"
            CREATE TABLE translations (
                id         INTEGER PRIMARY KEY AUTOINCREMENT,
                key        TEXT NOT NULL UNIQUE,
                locale     TEXT NOT NULL,
                content    TEXT NOT NULL,
                namespace  TEXT NOT NULL DEFAULT 'general',
                is_active  BOOLEAN NOT NULL DEFAULT 1,
                metadata   TEXT,
                created_at INTEGER NOT NULL,
                updated_at INTEGER NOT NULL
            );
            CREATE INDEX idx_translations_locale ON translations(locale);
            CREATE INDEX idx_translations_namespace ON translations(namespace);
            CREATE INDEX idx_translations_active ON translations(is_active);
            CREATE INDEX idx_translations_locale_namespace ON translations(locale, namespace);
            CREATE INDEX idx_translations_key_locale ON translations(key, locale);
        "#,
    },
    Migration {
        version: 2,
        description: "tags and translation_tags association",
        sql: r#"
            CREATE TABLE tags (
                id          INTEGER PRIMARY KEY AUTOINCREMENT,
                name        TEXT NOT NULL UNIQUE,
                description TEXT,
                created_at  INTEGER NOT NULL,
                updated_at  INTEGER NOT NULL
            );

            CREATE TABLE translation_tags (
                id             INTEGER PRIMARY KEY AUTOINCREMENT,
                translation_id INTEGER NOT NULL REFERENCES translations(id) ON DELETE CASCADE,
                tag_id         INTEGER NOT NULL REFERENCES tags(id) ON DELETE CASCADE,
                created_at     INTEGER NOT NULL,
                UNIQUE (translation_id, tag_id)
            );
            CREATE INDEX idx_translation_tags_translation ON translation_tags(translation_id);
            CREATE INDEX idx_translation_tags_tag ON translation_tags(tag_id);
        "#,
    },
];

// ── public API ───────────────────────────────────────────────────────

/// Run all pending migrations against `conn`. Synchronous.
pub fn run_all(conn: &Connection) -> StoreResult<()> {
    ensure_migrations_table(conn)?;

    let current = current_version(conn)?;
    let pending: Vec<&Migration> = MIGRATIONS.iter().filter(|m| m.version > current).collect();

    if pending.is_empty() {
        debug!(current_version = current, "schema is up to date");
        return Ok(());
    }

    info!(
        current_version = current,
        pending = pending.len(),
        "running pending migrations"
    );

    for migration in pending {
        apply(conn, migration)?;
    }

    Ok(())
}

/// Latest applied migration version, or 0 on a fresh database.
///
/// Never writes, so it is safe for read-only status reports.
pub fn current_version(conn: &Connection) -> StoreResult<u32> {
    let read = |e: rusqlite::Error| StoreError::Migration {
        version: 0,
        message: format!("failed to read current version: {e}"),
    };

    let tracked: bool = conn
        .query_row(
            "SELECT EXISTS (SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = '_migrations')",
            [],
            |row| row.get(0),
        )
        .map_err(read)?;
    if !tracked {
        return Ok(0);
    }

    conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM _migrations",
        [],
        |row| row.get(0),
    )
    .map_err(read)
}

/// Version of the newest migration compiled into this binary.
pub fn latest_version() -> u32 {
    MIGRATIONS.last().map(|m| m.version).unwrap_or(0)
}

// ── internals ────────────────────────────────────────────────────────

fn ensure_migrations_table(conn: &Connection) -> StoreResult<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS _migrations (
            version     INTEGER PRIMARY KEY,
            description TEXT NOT NULL,
            applied_at  INTEGER NOT NULL
        );",
    )
    .map_err(|e| StoreError::Migration {
        version: 0,
        message: format!("failed to create _migrations table: {e}"),
    })
}

fn apply(conn: &Connection, migration: &Migration) -> StoreResult<()> {
    let fail = |stage: &str, e: rusqlite::Error| StoreError::Migration {
        version: migration.version,
        message: format!("{stage}: {e}"),
    };

    info!(
        version = migration.version,
        description = migration.description,
        "applying migration"
    );

    // `&Connection` cannot open a rusqlite Transaction, so manage it by hand.
    conn.execute_batch("BEGIN IMMEDIATE;")
        .map_err(|e| fail("begin", e))?;

    let result = conn
        .execute_batch(migration.sql)
        .map_err(|e| fail("sql", e))
        .and_then(|()| {
            conn.execute(
                "INSERT INTO _migrations (version, description, applied_at) VALUES (?1, ?2, ?3)",
                rusqlite::params![
                    migration.version,
                    migration.description,
                    chrono::Utc::now().timestamp()
                ],
            )
            .map(|_| ())
            .map_err(|e| fail("record", e))
        });

    match result {
        Ok(()) => {
            conn.execute_batch("COMMIT;").map_err(|e| fail("commit", e))?;
            Ok(())
        }
        Err(err) => {
            warn!(version = migration.version, %err, "migration failed, rolling back");
            let _ = conn.execute_batch("ROLLBACK;");
            Err(err)
        }
    }
}

// ── tests ────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn setup_conn() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        conn.pragma_update(None, "foreign_keys", "ON").unwrap();
        conn
    }

    #[test]
    fn migrations_are_ordered() {
        for window in MIGRATIONS.windows(2) {
            assert!(window[1].version > window[0].version);
        }
    }

    #[test]
    fn current_version_of_untracked_database_is_zero() {
        let conn = setup_conn();
        assert_eq!(current_version(&conn).unwrap(), 0);

        let tables: i64 = conn
            .query_row("SELECT count(*) FROM sqlite_master", [], |row| row.get(0))
            .unwrap();
        assert_eq!(tables, 0);
    }

    #[test]
    fn run_all_is_idempotent() {
        let conn = setup_conn();
        run_all(&conn).unwrap();
        run_all(&conn).unwrap();
        assert_eq!(current_version(&conn).unwrap(), latest_version());
        assert_eq!(latest_version(), 2);
    }

    #[test]
    fn key_is_unique() {
        let conn = setup_conn();
        run_all(&conn).unwrap();

        let insert = "INSERT INTO translations (key, locale, content, created_at, updated_at) \
                      VALUES ('home.title', ?1, 'x', 0, 0)";
        conn.execute(insert, ["en"]).unwrap();
        // Same key in another locale is still a duplicate.
        assert!(conn.execute(insert, ["fr"]).is_err());

        let namespace: String = conn
            .query_row("SELECT namespace FROM translations", [], |row| row.get(0))
            .unwrap();
        assert_eq!(namespace, "general");
    }

    #[test]
    fn association_is_unique_and_cascades() {
        let conn = setup_conn();
        run_all(&conn).unwrap();

        conn.execute_batch(
            "INSERT INTO translations (id, key, locale, content, created_at, updated_at) \
                 VALUES (1, 'a', 'en', 'A', 0, 0);
             INSERT INTO tags (id, name, created_at, updated_at) VALUES (1, 'web', 0, 0);
             INSERT INTO translation_tags (translation_id, tag_id, created_at) VALUES (1, 1, 0);",
        )
        .unwrap();

        let dup = conn.execute(
            "INSERT INTO translation_tags (translation_id, tag_id, created_at) VALUES (1, 1, 0)",
            [],
        );
        assert!(dup.is_err());

        conn.execute("DELETE FROM translations WHERE id = 1", []).unwrap();
        let left: i64 = conn
            .query_row("SELECT count(*) FROM translation_tags", [], |row| row.get(0))
            .unwrap();
        assert_eq!(left, 0);
    }
}

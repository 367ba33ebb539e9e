//! CLI entry point for Lingo.
//!
//! This binary provides the `lingo` command with subcommands for serving
//! the HTTP API, migrating the database, and inspecting its state.

mod cli;
mod config;

use std::path::Path;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use lingo_store::{Database, TranslationService, migration};
use lingo_web::{WebConfig, WebServer};

use crate::cli::{Cli, Commands};
use crate::config::{Config, LogConfig, LogFormat};

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

#[tokio::main]
async fn main() -> Result<()> {
    // A missing .env is fine.
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    let loaded = Config::load(cli.config.as_deref())?;
    let mut config = loaded.config;

    init_tracing(&config.log);
    match &loaded.source {
        Some(path) => info!(path = %path.display(), "configuration loaded"),
        None => info!("no config file found, using defaults"),
    }

    match cli.command {
        Commands::Serve { bind, port } => {
            if let Some(bind) = bind {
                config.server.bind = bind;
            }
            if let Some(port) = port {
                config.server.port = port;
            }
            cmd_serve(config).await
        }
        Commands::Migrate => cmd_migrate(&config).await,
        Commands::Status => cmd_status(&config, loaded.source.as_deref()).await,
        Commands::Tags => cmd_tags(&config).await,
    }
}

// ---------------------------------------------------------------------------
// Subcommand: serve
// ---------------------------------------------------------------------------

async fn cmd_serve(config: Config) -> Result<()> {
    let db = open_database(&config).await?;
    let service = TranslationService::sqlite(
        db.clone(),
        config.cache.ttl(),
        config.cache.max_capacity,
    );
    info!(
        ttl_seconds = config.cache.ttl_seconds,
        max_capacity = config.cache.max_capacity,
        "export cache ready"
    );

    let server = WebServer::new(
        WebConfig {
            bind_addr: config.server.bind.clone(),
            port: config.server.port,
        },
        service,
        db,
    );

    println!();
    println!("  Lingo v{}", env!("CARGO_PKG_VERSION"));
    println!("  Listening on http://{}", server.addr());
    println!();

    server
        .start()
        .await
        .map_err(|e| anyhow::anyhow!(e))
        .context("web server failed")
}

// ---------------------------------------------------------------------------
// Subcommand: migrate
// ---------------------------------------------------------------------------

async fn cmd_migrate(config: &Config) -> Result<()> {
    let db = open_database(config).await?;
    let version = db
        .execute(|conn| migration::current_version(conn))
        .await
        .context("failed to read schema version")?;

    println!("  Database:  {}", config.database.path.display());
    println!("  Schema:    v{version} (latest v{})", migration::latest_version());
    Ok(())
}

// ---------------------------------------------------------------------------
// Subcommand: status
// ---------------------------------------------------------------------------

async fn cmd_status(config: &Config, source: Option<&Path>) -> Result<()> {
    println!();
    println!("  Lingo Status");
    println!("  ============");
    println!();

    match source {
        Some(path) => println!("  Config:        OK ({})", path.display()),
        None => println!("  Config:        defaults (no config file)"),
    }
    println!(
        "  Server:        {}:{}",
        config.server.bind, config.server.port
    );
    println!(
        "  Export cache:  ttl {}s, capacity {}",
        config.cache.ttl_seconds, config.cache.max_capacity
    );

    let path = &config.database.path;
    if path != Path::new(":memory:") && !path.exists() {
        println!(
            "  Database:      NOT INITIALIZED (run `lingo migrate`) ({})",
            path.display()
        );
        println!();
        return Ok(());
    }

    // Read-only report: open without migrating.
    let db = Database::open(path).context("failed to open database")?;
    let version = db
        .execute(|conn| migration::current_version(conn))
        .await
        .context("failed to read schema version")?;
    let latest = migration::latest_version();

    println!("  Database:      OK ({})", path.display());
    if version < latest {
        println!("  Schema:        v{version}, OUT OF DATE (latest v{latest}, run `lingo migrate`)");
        println!();
        return Ok(());
    }
    println!("  Schema:        v{version}");

    let (translations, tags) = db
        .execute(|conn| {
            let translations: i64 =
                conn.query_row("SELECT count(*) FROM translations", [], |row| row.get(0))?;
            let tags: i64 = conn.query_row("SELECT count(*) FROM tags", [], |row| row.get(0))?;
            Ok((translations, tags))
        })
        .await
        .context("failed to query database")?;

    println!("  Translations:  {translations}");
    println!("  Tags:          {tags}");
    println!();

    Ok(())
}

// ---------------------------------------------------------------------------
// Subcommand: tags
// ---------------------------------------------------------------------------

async fn cmd_tags(config: &Config) -> Result<()> {
    let db = open_database(config).await?;
    let service = TranslationService::sqlite(db, config.cache.ttl(), config.cache.max_capacity);
    let tags = service.tags().await.context("failed to list tags")?;

    if tags.is_empty() {
        println!("  No tags.");
        return Ok(());
    }
    for tag in tags {
        match tag.description {
            Some(description) => println!("  {:<24} {description}", tag.name),
            None => println!("  {}", tag.name),
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Open the configured database, creating its directory, and migrate it.
async fn open_database(config: &Config) -> Result<Database> {
    let path = config.database.path.clone();
    if path != Path::new(":memory:")
        && let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
        && !parent.exists()
    {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create data directory {}", parent.display()))?;
    }

    let db = Database::open_and_migrate(path.clone())
        .await
        .with_context(|| format!("failed to open database {}", path.display()))?;
    info!(path = %path.display(), "store initialized");
    Ok(db)
}

/// Initialize the tracing subscriber. `RUST_LOG` overrides `log.level`.
fn init_tracing(log: &LogConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&log.level));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false);

    match log.format {
        LogFormat::Json => builder.json().init(),
        LogFormat::Compact => builder.compact().init(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn schema_version(path: &Path) -> u32 {
        Database::open(path)
            .unwrap()
            .execute(|conn| migration::current_version(conn))
            .await
            .unwrap()
    }

    fn config_at(path: &Path) -> Config {
        let mut config = Config::default();
        config.database.path = path.to_path_buf();
        config
    }

    #[tokio::test]
    async fn status_leaves_outdated_schema_alone() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("lingo.db");
        Database::open(&path)
            .unwrap()
            .execute(|conn| {
                conn.execute_batch("CREATE TABLE unrelated (v INTEGER)")?;
                Ok(())
            })
            .await
            .unwrap();

        cmd_status(&config_at(&path), None).await.unwrap();
        assert_eq!(schema_version(&path).await, 0);
    }

    #[tokio::test]
    async fn status_reads_migrated_database() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("lingo.db");
        cmd_migrate(&config_at(&path)).await.unwrap();

        cmd_status(&config_at(&path), None).await.unwrap();
        assert_eq!(schema_version(&path).await, migration::latest_version());
    }

    #[tokio::test]
    async fn status_without_database_creates_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing").join("lingo.db");

        cmd_status(&config_at(&path), None).await.unwrap();
        assert!(!path.exists());
    }
}

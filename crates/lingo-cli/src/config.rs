//! Runtime configuration.
//!
//! Settings come from `config/default.toml` (or `--config`), then from
//! `LINGO_*` environment variables (a `.env` file is loaded first), then
//! from command-line flags applied by `main`.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;

pub const DEFAULT_CONFIG_PATH: &str = "config/default.toml";

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub cache: CacheConfig,
    pub log: LogConfig,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1".into(),
            port: 8080,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub path: PathBuf,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("data/lingo.db"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub ttl_seconds: u64,
    pub max_capacity: u64,
}

impl CacheConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_seconds)
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl_seconds: 3600,
            max_capacity: 10_000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// `EnvFilter` directive used when `RUST_LOG` is unset.
    pub level: String,
    pub format: LogFormat,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".into(),
            format: LogFormat::Compact,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Compact,
    Json,
}

/// A parsed configuration and the file it came from, if any.
#[derive(Debug)]
pub struct Loaded {
    pub config: Config,
    pub source: Option<PathBuf>,
}

impl Config {
    /// Load the config file and apply environment overrides.
    ///
    /// An explicitly named file must exist; the default path may be absent,
    /// in which case built-in defaults are used.
    pub fn load(explicit: Option<&Path>) -> Result<Loaded> {
        let (path, required) = match explicit {
            Some(path) => (path.to_path_buf(), true),
            None => (PathBuf::from(DEFAULT_CONFIG_PATH), false),
        };

        let (mut config, source) = if path.exists() {
            let content = std::fs::read_to_string(&path)
                .with_context(|| format!("failed to read config file {}", path.display()))?;
            let config = Self::from_toml(&content)
                .with_context(|| format!("failed to parse config file {}", path.display()))?;
            (config, Some(path))
        } else if required {
            anyhow::bail!("config file {} does not exist", path.display());
        } else {
            (Self::default(), None)
        };

        config.apply_env(|name| std::env::var(name).ok())?;
        Ok(Loaded { config, source })
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Apply `LINGO_*` overrides read through `lookup`.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(path) = lookup("LINGO_DATABASE_PATH") {
            self.database.path = PathBuf::from(path);
        }
        if let Some(bind) = lookup("LINGO_BIND") {
            self.server.bind = bind;
        }
        if let Some(port) = lookup("LINGO_PORT") {
            self.server.port = port
                .trim()
                .parse()
                .with_context(|| format!("LINGO_PORT is not a valid port: {port}"))?;
        }
        if let Some(ttl) = lookup("LINGO_CACHE_TTL_SECONDS") {
            self.cache.ttl_seconds = ttl
                .trim()
                .parse()
                .with_context(|| format!("LINGO_CACHE_TTL_SECONDS is not a number: {ttl}"))?;
        }
        if let Some(level) = lookup("LINGO_LOG_LEVEL") {
            self.log.level = level;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn empty_file_gives_defaults() {
        let config = Config::from_toml("").unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.cache.ttl(), Duration::from_secs(3600));
        assert_eq!(config.log.format, LogFormat::Compact);
    }

    #[test]
    fn partial_sections_keep_other_defaults() {
        let config = Config::from_toml(
            r#"
            [server]
            port = 9000

            [log]
            format = "json"
            "#,
        )
        .unwrap();
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.server.bind, "127.0.0.1");
        assert_eq!(config.log.format, LogFormat::Json);
        assert_eq!(config.cache.max_capacity, 10_000);
    }

    #[test]
    fn env_overrides_file() {
        let mut config = Config::default();
        config
            .apply_env(env(&[
                ("LINGO_DATABASE_PATH", ":memory:"),
                ("LINGO_PORT", "7000"),
                ("LINGO_CACHE_TTL_SECONDS", "5"),
                ("LINGO_LOG_LEVEL", "debug"),
            ]))
            .unwrap();
        assert_eq!(config.database.path, PathBuf::from(":memory:"));
        assert_eq!(config.server.port, 7000);
        assert_eq!(config.cache.ttl_seconds, 5);
        assert_eq!(config.log.level, "debug");
    }

    #[test]
    fn bad_env_values_are_errors() {
        let mut config = Config::default();
        assert!(config.apply_env(env(&[("LINGO_PORT", "http")])).is_err());
        assert!(config.apply_env(env(&[("LINGO_CACHE_TTL_SECONDS", "-1")])).is_err());
    }

    #[test]
    fn load_reads_explicit_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("lingo.toml");
        std::fs::write(&path, "[cache]\nttl_seconds = 60\n").unwrap();

        let loaded = Config::load(Some(&path)).unwrap();
        assert_eq!(loaded.source.as_deref(), Some(path.as_path()));
        assert_eq!(loaded.config.cache.ttl_seconds, 60);
    }

    #[test]
    fn load_requires_explicit_file_to_exist() {
        let dir = tempfile::tempdir().unwrap();
        assert!(Config::load(Some(&dir.path().join("missing.toml"))).is_err());
    }
}

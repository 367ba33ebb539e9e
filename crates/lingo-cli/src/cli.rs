//! CLI argument definitions for Lingo.
//!
//! All `clap` structures live here so that `main.rs` stays focused on
//! dispatching subcommands.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Lingo -- multi-locale translation store with cached exports.
#[derive(Parser)]
#[command(
    name = "lingo",
    version,
    about = "Lingo -- translation store and export API",
    long_about = "Stores localized strings keyed by a unique key, tags them, and serves \
                  filtered listings and cached per-locale exports over HTTP."
)]
pub struct Cli {
    /// Path to the TOML configuration file [default: config/default.toml].
    #[arg(long, global = true, env = "LINGO_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the HTTP API server.
    Serve {
        /// Address to bind the HTTP server to (overrides config).
        #[arg(long)]
        bind: Option<String>,

        /// Port to listen on (overrides config).
        #[arg(long, short)]
        port: Option<u16>,
    },

    /// Create or upgrade the database schema and exit.
    Migrate,

    /// Show database, schema and configuration status.
    Status,

    /// List all tags.
    Tags,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serve_flags_are_optional() {
        let cli = Cli::try_parse_from(["lingo", "serve"]).unwrap();
        assert!(cli.config.is_none());
        assert!(matches!(
            cli.command,
            Commands::Serve {
                bind: None,
                port: None
            }
        ));
    }

    #[test]
    fn global_config_after_subcommand() {
        let cli =
            Cli::try_parse_from(["lingo", "serve", "--port", "9000", "--config", "x.toml"]).unwrap();
        assert_eq!(cli.config.as_deref(), Some(std::path::Path::new("x.toml")));
        assert!(matches!(cli.command, Commands::Serve { port: Some(9000), .. }));
    }

    #[test]
    fn unknown_subcommand_fails() {
        assert!(Cli::try_parse_from(["lingo", "dance"]).is_err());
    }
}

// src/cli.rs

//! CLI argument parsing using `clap`.

use clap::{Parser, ValueEnum};

/// Command-line arguments for `assetdag`.
///
/// Running without arguments builds the default pipeline and starts the
/// dev session.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "assetdag",
    version,
    about = "Build front-end assets through a task DAG and serve them with live reload.",
    long_about = None
)]
pub struct CliArgs {
    /// Path to the config file (TOML).
    ///
    /// When omitted, `Assetdag.toml` in the current directory is used if it
    /// exists; otherwise built-in defaults apply.
    #[arg(long, value_name = "PATH")]
    pub config: Option<String>,

    /// Build once and exit; do not start the dev server or watchers.
    #[arg(long)]
    pub once: bool,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `ASSETDAG_LOG` or a default level will be used.
    #[arg(long, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,

    /// Parse + validate, print the pipeline, but don't run any stage.
    #[arg(long)]
    pub dry_run: bool,
}

/// Log level as exposed on the CLI.
#[derive(Debug, Copy, Clone, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// Convenience wrapper around `CliArgs::parse()`.
pub fn parse() -> CliArgs {
    CliArgs::parse()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_arguments_means_default_pipeline() {
        let args = CliArgs::try_parse_from(["assetdag"]).unwrap();
        assert!(args.config.is_none());
        assert!(!args.once);
        assert!(!args.dry_run);
    }

    #[test]
    fn parses_flags() {
        let args = CliArgs::try_parse_from([
            "assetdag",
            "--config",
            "site/Assetdag.toml",
            "--once",
            "--log-level",
            "debug",
        ])
        .unwrap();
        assert_eq!(args.config.as_deref(), Some("site/Assetdag.toml"));
        assert!(args.once);
        assert!(matches!(args.log_level, Some(LogLevel::Debug)));
    }
}

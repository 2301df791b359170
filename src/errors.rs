// src/errors.rs

//! Crate-wide error aliases and helpers.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum AssetdagError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Cycle detected in DAG: {0}")]
    DagCycle(String),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error("Invalid glob pattern: {0}")]
    GlobError(#[from] globset::Error),

    #[error("Source directory does not exist: {}", .0.display())]
    MissingDirectory(PathBuf),

    #[error("Dev server error: {0}")]
    ServeError(String),

    #[error("Pipeline halted; failed stages: {}", .0.join(", "))]
    StageFailed(Vec<String>),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl<T> From<tokio::sync::mpsc::error::SendError<T>> for AssetdagError {
    fn from(err: tokio::sync::mpsc::error::SendError<T>) -> Self {
        AssetdagError::Other(anyhow::anyhow!("runtime channel closed: {err}"))
    }
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, AssetdagError>;

// src/config/mod.rs

//! Configuration loading and validation for assetdag.
//!
//! Responsibilities:
//! - Define the TOML-backed data model (`model.rs`).
//! - Load a config file from disk, or fall back to defaults (`loader.rs`).
//! - Validate globs, names and ports (`validate.rs`).

pub mod loader;
pub mod model;
pub mod validate;

pub use loader::{default_config_path, load_and_validate, load_from_path, resolve_config};
pub use model::{
    AssetsSection, CleanSection, ConfigFile, ConfigSection, PathSetConfig, PathsSection,
    RawConfigFile, ScriptsSection, ServeSection, StylesSection, WatchSection,
};

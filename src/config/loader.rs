// src/config/loader.rs

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::config::model::{ConfigFile, RawConfigFile};
use crate::errors::Result;

/// Load a configuration file from a given path and return the raw `RawConfigFile`.
///
/// This only performs TOML deserialization; it does **not** perform semantic
/// validation. Use [`load_and_validate`] for that.
pub fn load_from_path(path: impl AsRef<Path>) -> Result<RawConfigFile> {
    let path = path.as_ref();
    let contents = fs::read_to_string(path)?;

    let config: RawConfigFile = toml::from_str(&contents)?;

    Ok(config)
}

/// Load a configuration file from path and validate it.
pub fn load_and_validate(path: impl AsRef<Path>) -> Result<ConfigFile> {
    let raw_config = load_from_path(&path)?;
    let config = ConfigFile::try_from(raw_config)?;
    Ok(config)
}

/// Default config location: `Assetdag.toml` in the current directory.
pub fn default_config_path() -> PathBuf {
    PathBuf::from("Assetdag.toml")
}

/// Resolve the configuration and the project root it applies to.
///
/// - An explicit path must exist; the project root is its parent directory.
/// - Without an explicit path, `Assetdag.toml` is used when present and the
///   built-in defaults otherwise; the project root is the current directory.
pub fn resolve_config(explicit: Option<&Path>) -> Result<(ConfigFile, PathBuf)> {
    match explicit {
        Some(path) => {
            let cfg = load_and_validate(path)?;
            info!(config = %path.display(), "loaded config");
            Ok((cfg, config_root_dir(path)))
        }
        None => {
            let root = current_dir();
            let path = root.join(default_config_path());
            if path.is_file() {
                let cfg = load_and_validate(&path)?;
                info!(config = %path.display(), "loaded config");
                Ok((cfg, root))
            } else {
                debug!("no Assetdag.toml found; using built-in defaults");
                Ok((ConfigFile::default(), root))
            }
        }
    }
}

/// Figure out the project root for a config file.
///
/// - If the config path has a non-empty parent (e.g. "site/Assetdag.toml"),
///   we use that directory.
/// - If it's just a bare filename, we fall back to the current directory.
fn config_root_dir(config_path: &Path) -> PathBuf {
    match config_path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => current_dir(),
    }
}

fn current_dir() -> PathBuf {
    std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explicit_config_root_is_parent_directory() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("Assetdag.toml");
        fs::write(&path, "[serve]\nport = 4000\n").unwrap();

        let (cfg, root) = resolve_config(Some(&path)).unwrap();
        assert_eq!(cfg.serve().port, 4000);
        assert_eq!(root, dir.path());
    }

    #[test]
    fn missing_explicit_config_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nope.toml");
        assert!(resolve_config(Some(&path)).is_err());
    }
}

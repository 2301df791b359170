// src/config/validate.rs

use globset::Glob;

use crate::config::model::{ConfigFile, PathSetConfig, RawConfigFile};
use crate::errors::{AssetdagError, Result};

impl TryFrom<RawConfigFile> for ConfigFile {
    type Error = AssetdagError;

    fn try_from(raw: RawConfigFile) -> std::result::Result<Self, Self::Error> {
        validate_raw_config(&raw)?;
        Ok(ConfigFile::new_unchecked(raw))
    }
}

fn validate_raw_config(cfg: &RawConfigFile) -> Result<()> {
    validate_global_config(cfg)?;
    validate_path_sets(cfg)?;
    validate_clean(cfg)?;
    validate_output_names(cfg)?;
    validate_serve(cfg)?;
    validate_globs("watch.reload_on", &cfg.watch.reload_on)?;
    Ok(())
}

fn validate_global_config(cfg: &RawConfigFile) -> Result<()> {
    if cfg.config.queue_length == 0 {
        return Err(AssetdagError::ConfigError(
            "[config].queue_length must be >= 1 (got 0)".to_string(),
        ));
    }
    Ok(())
}

fn validate_path_sets(cfg: &RawConfigFile) -> Result<()> {
    let sets: [(&str, &PathSetConfig); 4] = [
        ("styles", &cfg.paths.styles),
        ("scripts", &cfg.paths.scripts),
        ("assets", &cfg.paths.assets),
        ("html", &cfg.paths.html),
    ];

    for (name, set) in sets {
        if set.src.is_empty() {
            return Err(AssetdagError::ConfigError(format!(
                "[paths.{name}].src must list at least one glob"
            )));
        }
        if set.dest.trim().is_empty() {
            return Err(AssetdagError::ConfigError(format!(
                "[paths.{name}].dest must not be empty"
            )));
        }
        validate_globs(&format!("paths.{name}.src"), &set.src)?;
    }
    Ok(())
}

fn validate_clean(cfg: &RawConfigFile) -> Result<()> {
    if cfg.clean.root.trim().is_empty() {
        return Err(AssetdagError::ConfigError(
            "[clean].root must not be empty".to_string(),
        ));
    }
    validate_globs("clean.preserve", &cfg.clean.preserve)
}

fn validate_output_names(cfg: &RawConfigFile) -> Result<()> {
    let names = [
        ("styles.basename", &cfg.styles.basename),
        ("scripts.bundle", &cfg.scripts.bundle),
    ];
    for (key, value) in names {
        if value.trim().is_empty() || value.contains('/') || value.contains('\\') {
            return Err(AssetdagError::ConfigError(format!(
                "[{key}] must be a plain file name (got {value:?})"
            )));
        }
    }

    if !(1..=100).contains(&cfg.assets.jpeg_quality) {
        return Err(AssetdagError::ConfigError(format!(
            "[assets].jpeg_quality must be within 1..=100 (got {})",
            cfg.assets.jpeg_quality
        )));
    }
    Ok(())
}

/// Port 0 asks the OS for a free port, so two zeros never clash.
fn validate_serve(cfg: &RawConfigFile) -> Result<()> {
    if cfg.serve.port != 0 && cfg.serve.port == cfg.serve.reload_port {
        return Err(AssetdagError::ConfigError(format!(
            "[serve].port and [serve].reload_port must differ (both {})",
            cfg.serve.port
        )));
    }
    Ok(())
}

fn validate_globs(key: &str, patterns: &[String]) -> Result<()> {
    for pattern in patterns {
        Glob::new(pattern).map_err(|err| {
            AssetdagError::ConfigError(format!("[{key}] invalid glob {pattern:?}: {err}"))
        })?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(toml_src: &str) -> Result<ConfigFile> {
        let raw: RawConfigFile = toml::from_str(toml_src)?;
        ConfigFile::try_from(raw)
    }

    #[test]
    fn empty_file_yields_standard_layout() {
        let cfg = parse("").unwrap();
        assert_eq!(cfg.paths().styles.src, vec!["src/styles/**/*.scss"]);
        assert_eq!(cfg.paths().scripts.dest, "dist/scripts");
        assert_eq!(cfg.clean().preserve, vec!["assets"]);
        assert_eq!(cfg.scripts().bundle, "main.min.js");
        assert_eq!(cfg.serve().port, 3000);
    }

    #[test]
    fn partial_path_table_keeps_other_defaults() {
        let cfg = parse(
            r#"
[paths.styles]
src = ["web/css/**/*.scss"]
dest = "public/css"
"#,
        )
        .unwrap();
        assert_eq!(cfg.paths().styles.dest, "public/css");
        assert_eq!(cfg.paths().html.dest, "dist");
    }

    #[test]
    fn zero_queue_length_is_rejected() {
        let err = parse("[config]\nqueue_length = 0\n").unwrap_err();
        assert!(matches!(err, AssetdagError::ConfigError(msg) if msg.contains("queue_length")));
    }

    #[test]
    fn invalid_glob_is_rejected() {
        let err = parse(
            r#"
[paths.assets]
src = ["src/assets/[*"]
dest = "dist/assets"
"#,
        )
        .unwrap_err();
        assert!(matches!(err, AssetdagError::ConfigError(msg) if msg.contains("invalid glob")));
    }

    #[test]
    fn bundle_name_must_not_contain_directories() {
        let err = parse("[scripts]\nbundle = \"js/app.js\"\n").unwrap_err();
        assert!(matches!(err, AssetdagError::ConfigError(msg) if msg.contains("scripts.bundle")));
    }

    #[test]
    fn same_http_and_reload_port_is_rejected() {
        let err = parse("[serve]\nport = 35729\n").unwrap_err();
        assert!(matches!(err, AssetdagError::ConfigError(msg) if msg.contains("reload_port")));
    }

    #[test]
    fn ephemeral_ports_may_both_be_zero() {
        let cfg = parse("[serve]\nport = 0\nreload_port = 0\n").unwrap();
        assert_eq!(cfg.serve().port, 0);
        assert_eq!(cfg.serve().reload_port, 0);
    }

    #[test]
    fn unknown_queue_behaviour_fails_deserialization() {
        let err = parse("[config]\ntriggered_while_running_behaviour = \"drop\"\n").unwrap_err();
        assert!(matches!(err, AssetdagError::TomlError(_)));
    }
}

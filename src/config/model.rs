// src/config/model.rs

use serde::Deserialize;

use crate::types::TriggerWhileRunningBehaviour;

/// Top-level configuration as read from a TOML file.
///
/// ```toml
/// [config]
/// triggered_while_running_behaviour = "queue"
/// queue_length = 1
///
/// [paths.styles]
/// src = ["src/styles/**/*.scss"]
/// dest = "dist/styles"
///
/// [serve]
/// port = 3000
/// ```
///
/// All sections are optional; an empty file (or no file at all) yields the
/// standard `src/` → `dist/` layout.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct RawConfigFile {
    #[serde(default)]
    pub config: ConfigSection,
    #[serde(default)]
    pub paths: PathsSection,
    #[serde(default)]
    pub clean: CleanSection,
    #[serde(default)]
    pub styles: StylesSection,
    #[serde(default)]
    pub scripts: ScriptsSection,
    #[serde(default)]
    pub assets: AssetsSection,
    #[serde(default)]
    pub serve: ServeSection,
    #[serde(default)]
    pub watch: WatchSection,
}

/// Validated configuration.
///
/// Only obtainable through `TryFrom<RawConfigFile>` (or [`Default`]), so
/// every holder can rely on the globs compiling and the ports being
/// distinct.
#[derive(Debug, Clone)]
pub struct ConfigFile {
    raw: RawConfigFile,
}

impl ConfigFile {
    pub(crate) fn new_unchecked(raw: RawConfigFile) -> Self {
        Self { raw }
    }

    pub fn config(&self) -> &ConfigSection {
        &self.raw.config
    }

    pub fn paths(&self) -> &PathsSection {
        &self.raw.paths
    }

    pub fn clean(&self) -> &CleanSection {
        &self.raw.clean
    }

    pub fn styles(&self) -> &StylesSection {
        &self.raw.styles
    }

    pub fn scripts(&self) -> &ScriptsSection {
        &self.raw.scripts
    }

    pub fn assets(&self) -> &AssetsSection {
        &self.raw.assets
    }

    pub fn serve(&self) -> &ServeSection {
        &self.raw.serve
    }

    pub fn watch(&self) -> &WatchSection {
        &self.raw.watch
    }
}

impl Default for ConfigFile {
    fn default() -> Self {
        Self::new_unchecked(RawConfigFile::default())
    }
}

/// `[config]` section: engine behaviour for triggers arriving mid-run.
#[derive(Debug, Clone, Deserialize)]
pub struct ConfigSection {
    #[serde(default)]
    pub triggered_while_running_behaviour: TriggerWhileRunningBehaviour,

    /// Maximum number of queued "runs" to remember.
    #[serde(default = "default_queue_length")]
    pub queue_length: usize,
}

fn default_queue_length() -> usize {
    1
}

impl Default for ConfigSection {
    fn default() -> Self {
        Self {
            triggered_while_running_behaviour: TriggerWhileRunningBehaviour::default(),
            queue_length: default_queue_length(),
        }
    }
}

/// One `[paths.<name>]` table: source globs and destination directory,
/// both relative to the project root.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct PathSetConfig {
    pub src: Vec<String>,
    pub dest: String,
}

impl PathSetConfig {
    fn new(src: &[&str], dest: &str) -> Self {
        Self {
            src: src.iter().map(|s| s.to_string()).collect(),
            dest: dest.to_string(),
        }
    }
}

/// `[paths]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct PathsSection {
    #[serde(default = "default_styles_paths")]
    pub styles: PathSetConfig,
    #[serde(default = "default_scripts_paths")]
    pub scripts: PathSetConfig,
    #[serde(default = "default_assets_paths")]
    pub assets: PathSetConfig,
    #[serde(default = "default_html_paths")]
    pub html: PathSetConfig,
}

fn default_styles_paths() -> PathSetConfig {
    PathSetConfig::new(&["src/styles/**/*.scss"], "dist/styles")
}

fn default_scripts_paths() -> PathSetConfig {
    PathSetConfig::new(&["src/scripts/**/*.js", "src/scripts/**/*.ts"], "dist/scripts")
}

fn default_assets_paths() -> PathSetConfig {
    PathSetConfig::new(&["src/assets/**/*"], "dist/assets")
}

fn default_html_paths() -> PathSetConfig {
    PathSetConfig::new(&["src/**/*.html"], "dist")
}

impl Default for PathsSection {
    fn default() -> Self {
        Self {
            styles: default_styles_paths(),
            scripts: default_scripts_paths(),
            assets: default_assets_paths(),
            html: default_html_paths(),
        }
    }
}

/// `[clean]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct CleanSection {
    /// Build output root whose entries are removed.
    #[serde(default = "default_clean_root")]
    pub root: String,

    /// Top-level entries (names or globs, relative to `root`) that survive.
    #[serde(default = "default_clean_preserve")]
    pub preserve: Vec<String>,
}

fn default_clean_root() -> String {
    "dist".to_string()
}

fn default_clean_preserve() -> Vec<String> {
    vec!["assets".to_string()]
}

impl Default for CleanSection {
    fn default() -> Self {
        Self {
            root: default_clean_root(),
            preserve: default_clean_preserve(),
        }
    }
}

/// `[styles]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct StylesSection {
    /// Output file stem; `.css` is appended.
    #[serde(default = "default_styles_basename")]
    pub basename: String,
}

fn default_styles_basename() -> String {
    "main.min".to_string()
}

impl Default for StylesSection {
    fn default() -> Self {
        Self {
            basename: default_styles_basename(),
        }
    }
}

/// `[scripts]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct ScriptsSection {
    /// File name of the single concatenated bundle.
    #[serde(default = "default_scripts_bundle")]
    pub bundle: String,

    /// Syntax target the sources are downleveled to (e.g. `es2015`).
    #[serde(default = "default_scripts_target")]
    pub target: String,
}

fn default_scripts_bundle() -> String {
    "main.min.js".to_string()
}

fn default_scripts_target() -> String {
    "es2015".to_string()
}

impl Default for ScriptsSection {
    fn default() -> Self {
        Self {
            bundle: default_scripts_bundle(),
            target: default_scripts_target(),
        }
    }
}

/// `[assets]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct AssetsSection {
    #[serde(default = "default_jpeg_quality")]
    pub jpeg_quality: u8,
}

fn default_jpeg_quality() -> u8 {
    85
}

impl Default for AssetsSection {
    fn default() -> Self {
        Self {
            jpeg_quality: default_jpeg_quality(),
        }
    }
}

/// `[serve]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct ServeSection {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Port of the live-reload WebSocket.
    #[serde(default = "default_reload_port")]
    pub reload_port: u16,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    3000
}

fn default_reload_port() -> u16 {
    35729
}

impl Default for ServeSection {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            reload_port: default_reload_port(),
        }
    }
}

/// `[watch]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct WatchSection {
    /// Window in which bursts of filesystem events are collapsed.
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,

    /// Globs (relative to the project root) whose changes only reload the
    /// browser.
    #[serde(default = "default_reload_on")]
    pub reload_on: Vec<String>,
}

fn default_debounce_ms() -> u64 {
    50
}

fn default_reload_on() -> Vec<String> {
    vec!["dist/**/*.html".to_string()]
}

impl Default for WatchSection {
    fn default() -> Self {
        Self {
            debounce_ms: default_debounce_ms(),
            reload_on: default_reload_on(),
        }
    }
}

#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};

use tempfile::TempDir;
use tokio::sync::mpsc;

use assetdag::config::{ConfigFile, load_and_validate};
use assetdag::engine::RuntimeEvent;
use assetdag::serve::ReloadHub;
use assetdag::stage::StageContext;

/// A throwaway project directory laid out like a real site:
/// `src/{styles,scripts,assets}` with an empty `dist/`.
pub struct ProjectFixture {
    dir: TempDir,
}

impl ProjectFixture {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().expect("failed to create tempdir");
        for sub in ["src/styles", "src/scripts", "src/assets", "dist"] {
            fs::create_dir_all(dir.path().join(sub)).expect("failed to create fixture dirs");
        }
        Self { dir }
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    pub fn path(&self, rel: &str) -> PathBuf {
        self.dir.path().join(rel)
    }

    /// Write a file relative to the root, creating parent directories.
    pub fn write(&self, rel: &str, contents: impl AsRef<[u8]>) -> PathBuf {
        let path = self.path(rel);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("failed to create parent dir");
        }
        fs::write(&path, contents).expect("failed to write fixture file");
        path
    }

    pub fn read(&self, rel: &str) -> String {
        fs::read_to_string(self.path(rel))
            .unwrap_or_else(|e| panic!("failed to read {rel}: {e}"))
    }

    pub fn exists(&self, rel: &str) -> bool {
        self.path(rel).exists()
    }

    /// Write `Assetdag.toml` and load it through the regular validation path.
    pub fn config(&self, toml_src: &str) -> ConfigFile {
        let path = self.write("Assetdag.toml", toml_src);
        load_and_validate(&path).expect("fixture config should be valid")
    }

    /// Stage context rooted at the fixture. The receiver is returned so the
    /// channel stays open for the duration of the test.
    pub fn context(&self) -> (StageContext, mpsc::Receiver<RuntimeEvent>, ReloadHub) {
        let (tx, rx) = mpsc::channel(16);
        let hub = ReloadHub::new();
        let ctx = StageContext::new(self.root(), tx, hub.clone());
        (ctx, rx, hub)
    }
}

impl Default for ProjectFixture {
    fn default() -> Self {
        Self::new()
    }
}

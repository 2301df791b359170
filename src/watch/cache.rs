// src/watch/cache.rs

use std::collections::HashMap;
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use blake3::{Hash, Hasher};
use tracing::debug;

/// Hash a file's contents with blake3.
pub fn compute_file_hash(path: &Path) -> Result<Hash> {
    let mut hasher = Hasher::new();
    let mut file = File::open(path).with_context(|| format!("opening file for hashing: {}", path.display()))?;
    let mut buf = [0u8; 8192];
    loop {
        let n = file.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(hasher.finalize())
}

/// Last seen content hash per watched file.
///
/// Editors often emit a modify event on save even when the bytes are
/// unchanged; those events are dropped.
#[derive(Debug, Default)]
pub struct ContentCache {
    hashes: HashMap<PathBuf, Hash>,
}

impl ContentCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the current content of `path` and report whether it differs
    /// from the previous record. Unreadable files count as changed.
    pub fn refresh(&mut self, path: &Path) -> bool {
        let hash = match compute_file_hash(path) {
            Ok(hash) => hash,
            Err(err) => {
                debug!(file = %path.display(), error = %err, "could not hash; treating as changed");
                self.hashes.remove(path);
                return true;
            }
        };

        match self.hashes.insert(path.to_path_buf(), hash) {
            Some(previous) if previous == hash => {
                debug!(file = %path.display(), "content unchanged");
                false
            }
            _ => true,
        }
    }

    pub fn invalidate(&mut self, path: &Path) {
        if self.hashes.remove(path).is_some() {
            debug!(file = %path.display(), "invalidated cached hash");
        }
    }

    pub fn len(&self) -> usize {
        self.hashes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hashes.is_empty()
    }
}

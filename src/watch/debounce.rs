// src/watch/debounce.rs

//! Collapses bursts of notify events into one batch of changed paths.

use std::collections::BTreeMap;
use std::path::PathBuf;

use notify::EventKind;
use notify::event::ModifyKind;

/// Net effect of the events seen for one path within a window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    Created,
    Modified,
    Removed,
}

impl ChangeKind {
    /// Content-relevant kinds only: access and metadata-only events are
    /// noise (mtime/chmod) and would otherwise retrigger stages.
    pub fn from_event_kind(kind: &EventKind) -> Option<Self> {
        match kind {
            EventKind::Create(_) => Some(ChangeKind::Created),
            EventKind::Remove(_) => Some(ChangeKind::Removed),
            EventKind::Modify(ModifyKind::Metadata(_)) => None,
            EventKind::Modify(_) => Some(ChangeKind::Modified),
            _ => None,
        }
    }
}

/// Accumulates paths until the window closes; duplicate paths collapse.
#[derive(Debug, Default)]
pub struct Debouncer {
    changes: BTreeMap<PathBuf, ChangeKind>,
}

impl Debouncer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    /// Returns whether the event contributed anything.
    pub fn add_event(&mut self, event: &notify::Event) -> bool {
        let Some(kind) = ChangeKind::from_event_kind(&event.kind) else {
            return false;
        };

        let mut added = false;
        for path in &event.paths {
            if is_temp_file(path) {
                continue;
            }
            self.add(path.clone(), kind);
            added = true;
        }
        added
    }

    /// Merge rules:
    /// - removed then created/modified: restored, keep the new kind
    /// - modified then removed: removed
    /// - created then removed: nothing happened
    /// - otherwise the first kind wins
    pub fn add(&mut self, path: PathBuf, kind: ChangeKind) {
        match self.changes.get(&path).copied() {
            None => {
                self.changes.insert(path, kind);
            }
            Some(ChangeKind::Removed) if kind != ChangeKind::Removed => {
                self.changes.insert(path, kind);
            }
            Some(ChangeKind::Modified) if kind == ChangeKind::Removed => {
                self.changes.insert(path, ChangeKind::Removed);
            }
            Some(ChangeKind::Created) if kind == ChangeKind::Removed => {
                self.changes.remove(&path);
            }
            Some(_) => {}
        }
    }

    /// Drain the batch, sorted by path.
    pub fn take(&mut self) -> Vec<(PathBuf, ChangeKind)> {
        std::mem::take(&mut self.changes).into_iter().collect()
    }
}

/// Editor swap and backup files.
fn is_temp_file(path: &std::path::Path) -> bool {
    let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
        return false;
    };
    name.ends_with('~')
        || name.ends_with(".swp")
        || name.ends_with(".swx")
        || name.ends_with(".tmp")
        || name.starts_with(".#")
        || name == "4913"
}

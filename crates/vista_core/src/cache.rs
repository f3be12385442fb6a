//! Compiled view cache.
//!
//! Entries are keyed by absolute template path and live for the life of the
//! engine: no eviction, no size bound, and no invalidation when a file changes
//! on disk. A disabled cache never stores anything, so every render compiles
//! from source.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::debug;

use crate::compiler::CompiledView;

/// Shared path -> compiled view map.
pub struct ViewCache {
    enabled: bool,
    entries: RwLock<HashMap<PathBuf, Arc<dyn CompiledView>>>,
}

impl ViewCache {
    pub fn new(enabled: bool) -> Self {
        Self {
            enabled,
            entries: RwLock::new(HashMap::new()),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Look up a compiled view. Always `None` when disabled.
    pub fn get(&self, path: &Path) -> Option<Arc<dyn CompiledView>> {
        if !self.enabled {
            return None;
        }
        let hit = self.entries.read().get(path).cloned();
        debug!(
            "Cache {} for {:?}",
            if hit.is_some() { "hit" } else { "miss" },
            path
        );
        hit
    }

    /// Store a compiled view. Last writer wins; no-op when disabled.
    pub fn put(&self, path: impl Into<PathBuf>, view: Arc<dyn CompiledView>) {
        if !self.enabled {
            return;
        }
        self.entries.write().insert(path.into(), view);
    }

    pub fn contains(&self, path: &Path) -> bool {
        self.entries.read().contains_key(path)
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Cached paths, sorted.
    pub fn paths(&self) -> Vec<PathBuf> {
        let mut paths: Vec<_> = self.entries.read().keys().cloned().collect();
        paths.sort();
        paths
    }
}

impl std::fmt::Debug for ViewCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ViewCache")
            .field("enabled", &self.enabled)
            .field("entries", &self.paths())
            .finish()
    }
}

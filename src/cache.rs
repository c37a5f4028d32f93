use std::collections::HashMap;
use std::path::{Path, PathBuf};

use anyhow::Context as _;
use serde_json::Value;

/// On-disk cache of store metadata lookups, keyed by appid.
///
/// The file spans runs: loaded wholesale at startup, written wholesale on
/// save. Entries are only inserted after a successful fetch, so a failed
/// lookup can never clobber a previously cached blob.
pub struct AppCache {
    path: PathBuf,
    entries: HashMap<String, Value>,
}

impl AppCache {
    /// Load the cache file. Missing or corrupt files degrade to an empty
    /// cache with a warning; loading never fails the run.
    pub fn load(path: impl Into<PathBuf>) -> Self {
        let path = path.into();

        let entries = match std::fs::read_to_string(&path) {
            Ok(raw) => match serde_json::from_str(&raw) {
                Ok(entries) => entries,
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "cache file is corrupt, starting fresh");
                    HashMap::new()
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => HashMap::new(),
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "error loading cache, starting fresh");
                HashMap::new()
            }
        };

        if !entries.is_empty() {
            tracing::debug!(count = entries.len(), "loaded app cache");
        }

        Self { path, entries }
    }

    pub fn save(&self) -> anyhow::Result<()> {
        let raw = serde_json::to_string_pretty(&self.entries)?;
        std::fs::write(&self.path, raw)
            .with_context(|| format!("writing cache to {}", self.path.display()))?;
        tracing::debug!(path = %self.path.display(), count = self.entries.len(), "saved app cache");
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn get(&self, appid: u32) -> Option<&Value> {
        self.entries.get(&appid.to_string())
    }

    pub fn contains(&self, appid: u32) -> bool {
        self.entries.contains_key(&appid.to_string())
    }

    pub fn insert(&mut self, appid: u32, data: Value) {
        self.entries.insert(appid.to_string(), data);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

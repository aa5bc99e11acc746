use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;

use anyhow::{anyhow, Result};
use tracing::warn;

/// Plain key/value contract over whatever the host page persists into.
///
/// Writes are last-write-wins and must be safe to issue redundantly, so the
/// trait is infallible: backends log and swallow their own I/O errors the
/// same way browser-local storage does.
pub trait SettingsBackend {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&mut self, key: &str, value: &str);
    fn remove(&mut self, key: &str);
}

/// In-memory backend, used in tests and as the default.
#[derive(Debug, Clone, Default)]
pub struct MemoryBackend {
    entries: HashMap<String, String>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl SettingsBackend for MemoryBackend {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.get(key).cloned()
    }

    fn set(&mut self, key: &str, value: &str) {
        self.entries.insert(key.to_string(), value.to_string());
    }

    fn remove(&mut self, key: &str) {
        self.entries.remove(key);
    }
}

/// File-backed backend: one JSON file per key under a settings directory.
#[derive(Debug, Clone)]
pub struct FileBackend {
    dir: PathBuf,
}

impl FileBackend {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Default location under the user config dir.
    pub fn default_location() -> Result<Self> {
        let dir = dirs::config_dir()
            .ok_or_else(|| anyhow!("Could not determine config directory"))?
            .join("datagrid-state")
            .join("settings");
        Ok(Self::new(dir))
    }

    fn path_for(&self, key: &str) -> PathBuf {
        // Keys are namespaced identifiers; anything unexpected is flattened
        // into a safe filename.
        let safe: String = key
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || c == '_' || c == '-' {
                    c
                } else {
                    '_'
                }
            })
            .collect();
        self.dir.join(format!("{safe}.json"))
    }
}

impl SettingsBackend for FileBackend {
    fn get(&self, key: &str) -> Option<String> {
        fs::read_to_string(self.path_for(key)).ok()
    }

    fn set(&mut self, key: &str, value: &str) {
        if let Err(e) = fs::create_dir_all(&self.dir) {
            warn!(target: "storage", "Could not create settings dir: {}", e);
            return;
        }
        if let Err(e) = fs::write(self.path_for(key), value) {
            warn!(target: "storage", "Could not persist {}: {}", key, e);
        }
    }

    fn remove(&mut self, key: &str) {
        let _ = fs::remove_file(self.path_for(key));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_backend_round_trip() {
        let mut backend = MemoryBackend::new();
        assert_eq!(backend.get("k"), None);
        backend.set("k", "v1");
        backend.set("k", "v2");
        assert_eq!(backend.get("k"), Some("v2".to_string()));
        backend.remove("k");
        assert_eq!(backend.get("k"), None);
    }

    #[test]
    fn file_backend_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let mut backend = FileBackend::new(dir.path());
        backend.set("dg_settings_v1_trades", "{\"limit\":\"50\"}");
        assert_eq!(
            backend.get("dg_settings_v1_trades"),
            Some("{\"limit\":\"50\"}".to_string())
        );
        backend.remove("dg_settings_v1_trades");
        assert_eq!(backend.get("dg_settings_v1_trades"), None);
    }

    #[test]
    fn file_backend_sanitizes_keys() {
        let dir = tempfile::tempdir().unwrap();
        let mut backend = FileBackend::new(dir.path());
        backend.set("odd/key name", "x");
        assert_eq!(backend.get("odd/key name"), Some("x".to_string()));
    }
}

//! Durable key/value settings.
//!
//! Keys use `section/name` form. The file-backed store keeps them in a TOML
//! document edited with `toml_edit`, so comments and layout written by hand
//! survive every update.

mod enabled;

pub use enabled::{join_enabled, parse_enabled, read_enabled, write_enabled, ENABLED_KEY};

use std::collections::BTreeMap;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};

use parking_lot::Mutex;
use toml_edit::DocumentMut;
use tracing::{debug, warn};

/// Persisted string settings shared by the host and its extensions.
pub trait SettingsStore: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;

    /// Store `value` under `key` and make it durable before returning.
    fn set(&self, key: &str, value: &str) -> io::Result<()>;
}

/// Settings stored in a TOML file, rewritten on every `set`.
pub struct TomlFileSettings {
    path: PathBuf,
    doc: Mutex<DocumentMut>,
}

impl TomlFileSettings {
    /// Open the settings file. A missing or unparsable file starts empty.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let doc = match std::fs::read_to_string(&path) {
            Ok(content) => content.parse::<DocumentMut>().unwrap_or_else(|e| {
                warn!(path = %path.display(), error = %e, "Settings file is not valid TOML, starting empty");
                DocumentMut::new()
            }),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "No settings file yet");
                DocumentMut::new()
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Failed to read settings file, starting empty");
                DocumentMut::new()
            }
        };
        Self {
            path,
            doc: Mutex::new(doc),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

fn split_key(key: &str) -> (Option<&str>, &str) {
    match key.split_once('/') {
        Some((section, name)) => (Some(section), name),
        None => (None, key),
    }
}

impl SettingsStore for TomlFileSettings {
    fn get(&self, key: &str) -> Option<String> {
        let doc = self.doc.lock();
        let item = match split_key(key) {
            (Some(section), name) => doc.get(section)?.get(name)?,
            (None, name) => doc.get(name)?,
        };
        item.as_str().map(String::from)
    }

    fn set(&self, key: &str, value: &str) -> io::Result<()> {
        let mut doc = self.doc.lock();
        match split_key(key) {
            (Some(section), name) => {
                let table = doc
                    .entry(section)
                    .or_insert(toml_edit::table())
                    .as_table_mut()
                    .ok_or_else(|| {
                        io::Error::new(
                            io::ErrorKind::InvalidData,
                            format!("settings entry '{section}' is not a table"),
                        )
                    })?;
                table.insert(name, toml_edit::value(value));
            }
            (None, name) => {
                doc.insert(name, toml_edit::value(value));
            }
        }

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&self.path, doc.to_string())
    }
}

/// In-memory settings that count writes.
#[derive(Default)]
pub struct MemorySettings {
    values: Mutex<BTreeMap<String, String>>,
    writes: AtomicUsize,
}

impl MemorySettings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of successful `set` calls so far.
    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }
}

impl SettingsStore for MemorySettings {
    fn get(&self, key: &str) -> Option<String> {
        self.values.lock().get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) -> io::Result<()> {
        self.values.lock().insert(key.to_string(), value.to_string());
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn toml_store_persists_sections() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/settings.toml");

        let store = TomlFileSettings::open(&path);
        assert_eq!(store.get("plugins/enabled"), None);
        store.set("plugins/enabled", "Alpha,Beta").unwrap();
        store.set("theme", "dark").unwrap();

        let reopened = TomlFileSettings::open(&path);
        assert_eq!(reopened.get("plugins/enabled").as_deref(), Some("Alpha,Beta"));
        assert_eq!(reopened.get("theme").as_deref(), Some("dark"));
    }

    #[test]
    fn toml_store_keeps_comments() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.toml");
        std::fs::write(&path, "# hand-written\n[plugins]\nenabled = \"Old\"\n").unwrap();

        let store = TomlFileSettings::open(&path);
        assert_eq!(store.get("plugins/enabled").as_deref(), Some("Old"));
        store.set("plugins/enabled", "New").unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.starts_with("# hand-written"));
        assert!(content.contains("enabled = \"New\""));
    }

    #[test]
    fn corrupt_file_starts_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.toml");
        std::fs::write(&path, "[[[ not toml").unwrap();

        let store = TomlFileSettings::open(&path);
        assert_eq!(store.get("plugins/enabled"), None);
    }

    #[test]
    fn memory_store_counts_writes() {
        let store = MemorySettings::new();
        store.set("a", "1").unwrap();
        store.set("a", "2").unwrap();
        assert_eq!(store.get("a").as_deref(), Some("2"));
        assert_eq!(store.writes(), 2);
    }
}

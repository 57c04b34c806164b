//! Extensions compiled into the host binary.
//!
//! A manifest with `builtin = "<key>"` resolves through this catalog. Every
//! load gets a fresh instance from the factory, so unload and reload behave
//! exactly like a shared library being closed and reopened.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use videoinsight_sdk::Extension;

use super::bundled;

pub type ExtensionFactory = Arc<dyn Fn() -> Box<dyn Extension> + Send + Sync>;

/// A manifest the host can write into the extensions directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BundledManifest {
    pub file_name: String,
    pub contents: String,
}

struct CatalogEntry {
    factory: ExtensionFactory,
    bundled: Option<BundledManifest>,
}

/// Keyed extension factories.
#[derive(Default)]
pub struct BuiltinCatalog {
    entries: BTreeMap<String, CatalogEntry>,
}

impl BuiltinCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Catalog holding the extensions shipped with the host.
    pub fn with_bundled(ffmpeg: impl Into<PathBuf>, tag_timeout: Duration) -> Self {
        let mut catalog = Self::new();
        bundled::register_all(&mut catalog, ffmpeg.into(), tag_timeout);
        catalog
    }

    /// Register a factory under `key`, replacing any previous one.
    pub fn register<F>(&mut self, key: impl Into<String>, factory: F) -> &mut Self
    where
        F: Fn() -> Box<dyn Extension> + Send + Sync + 'static,
    {
        self.entries.insert(
            key.into(),
            CatalogEntry {
                factory: Arc::new(factory),
                bundled: None,
            },
        );
        self
    }

    /// Register a factory that also ships a manifest.
    pub fn register_bundled<F>(
        &mut self,
        key: impl Into<String>,
        manifest: BundledManifest,
        factory: F,
    ) -> &mut Self
    where
        F: Fn() -> Box<dyn Extension> + Send + Sync + 'static,
    {
        self.entries.insert(
            key.into(),
            CatalogEntry {
                factory: Arc::new(factory),
                bundled: Some(manifest),
            },
        );
        self
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn instantiate(&self, key: &str) -> Option<Box<dyn Extension>> {
        self.entries.get(key).map(|entry| (entry.factory)())
    }

    pub fn bundled_manifests(&self) -> impl Iterator<Item = &BundledManifest> {
        self.entries.values().filter_map(|e| e.bundled.as_ref())
    }
}

//! Loading and unloading extensions against the host.
//!
//! Per name the only states are loaded and not loaded. Everything here runs
//! on the control task; extensions never call back into the manager
//! directly, their lifecycle requests are queued on [`HostCapabilities`].

use std::any::Any;
use std::collections::BTreeMap;
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};
use videoinsight_sdk::{Extension, Host, RegistrationHandle};

use super::catalog::BuiltinCatalog;
use super::error::{Error, Result};
use super::manifest::{ExtensionManifest, ExtensionSource};
use super::native::NativeModule;
use super::registry::{read_leading_comment, ExtensionDescriptor, ExtensionRegistry};
use crate::host::HostCapabilities;
use crate::settings::{read_enabled, write_enabled, SettingsStore};

const LOADED_STATUS_TIMEOUT: Duration = Duration::from_secs(3);

/// A loaded extension. Fields drop in declaration order: the handle and the
/// instance are released before the library that holds their code.
struct LoadedExtension {
    handle: Option<RegistrationHandle>,
    instance: Box<dyn Extension>,
    module: Option<NativeModule>,
    descriptor: ExtensionDescriptor,
}

/// Outcome of a bulk operation over several names.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BulkReport {
    pub ok: usize,
    pub total: usize,
    /// `(name, detail)` for every name that failed.
    pub failures: Vec<(String, String)>,
}

impl BulkReport {
    pub(crate) fn record(&mut self, name: &str, result: Result<()>) {
        self.total += 1;
        match result {
            Ok(()) => self.ok += 1,
            Err(e) => self.failures.push((name.to_string(), e.to_string())),
        }
    }

    pub fn is_complete(&self) -> bool {
        self.ok == self.total
    }
}

impl fmt::Display for BulkReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.ok, self.total)
    }
}

/// One row of the extension listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtensionStatus {
    pub name: String,
    pub source_path: PathBuf,
    pub description: Option<String>,
    pub enabled: bool,
    pub loaded: bool,
}

pub struct ExtensionManager {
    pub(super) registry: ExtensionRegistry,
    catalog: BuiltinCatalog,
    pub(super) settings: Arc<dyn SettingsStore>,
    host: Arc<HostCapabilities>,
    loaded: BTreeMap<String, LoadedExtension>,
}

impl ExtensionManager {
    pub fn new(
        dir: impl Into<PathBuf>,
        catalog: BuiltinCatalog,
        host: Arc<HostCapabilities>,
    ) -> Self {
        let settings = Arc::clone(host.settings());
        Self {
            registry: ExtensionRegistry::new(dir),
            catalog,
            settings,
            host,
            loaded: BTreeMap::new(),
        }
    }

    pub fn registry(&self) -> &ExtensionRegistry {
        &self.registry
    }

    pub fn catalog(&self) -> &BuiltinCatalog {
        &self.catalog
    }

    /// Rescan the extensions directory.
    pub fn refresh(&mut self) -> usize {
        self.registry.scan().len()
    }

    pub fn is_loaded(&self, name: &str) -> bool {
        self.loaded.contains_key(name)
    }

    pub fn loaded_names(&self) -> Vec<String> {
        self.loaded.keys().cloned().collect()
    }

    pub fn enabled(&self) -> std::collections::BTreeSet<String> {
        read_enabled(&*self.settings)
    }

    /// Every scanned extension with its enabled and loaded state.
    pub fn list(&self) -> Vec<ExtensionStatus> {
        let enabled = self.enabled();
        self.registry
            .descriptors()
            .map(|d| ExtensionStatus {
                name: d.name.clone(),
                source_path: d.source_path.clone(),
                description: read_leading_comment(&d.source_path),
                enabled: enabled.contains(&d.name),
                loaded: self.loaded.contains_key(&d.name),
            })
            .collect()
    }

    /// Load `name` from the latest scan. Loading a loaded extension is a no-op.
    ///
    /// Any failure while opening the code or inside `register` leaves no
    /// trace: no module, instance, or command is retained.
    pub fn load(&mut self, name: &str) -> Result<()> {
        if self.loaded.contains_key(name) {
            debug!(name = %name, "Extension already loaded");
            return Ok(());
        }

        let descriptor = self
            .registry
            .get(name)
            .cloned()
            .ok_or_else(|| Error::NotFound(name.to_string()))?;

        let (module, mut instance) = self.instantiate(name, &descriptor)?;

        self.host.set_registering(Some(name));
        let host: &HostCapabilities = &self.host;
        let registered = catch_unwind(AssertUnwindSafe(|| instance.register(host)));
        self.host.set_registering(None);

        let handle = match registered {
            Ok(Ok(handle)) => handle,
            Ok(Err(e)) => {
                self.discard(name, instance, module);
                return Err(Error::load(name, format!("registration failed: {e}")));
            }
            Err(payload) => {
                let detail = format!("registration panicked: {}", panic_message(&*payload));
                drop(payload);
                self.discard(name, instance, module);
                return Err(Error::load(name, detail));
            }
        };

        self.loaded.insert(
            name.to_string(),
            LoadedExtension {
                handle: Some(handle),
                instance,
                module,
                descriptor,
            },
        );

        info!(name = %name, "Extension loaded");
        self.host
            .post_status(&format!("Extension loaded: {name}"), Some(LOADED_STATUS_TIMEOUT));
        Ok(())
    }

    fn instantiate(
        &self,
        name: &str,
        descriptor: &ExtensionDescriptor,
    ) -> Result<(Option<NativeModule>, Box<dyn Extension>)> {
        let manifest = ExtensionManifest::read(&descriptor.source_path)
            .map_err(|e| Error::load(name, e.to_string()))?;
        let source = manifest
            .source(&descriptor.source_path)
            .map_err(|e| Error::load(name, e.to_string()))?;

        match source {
            ExtensionSource::Native(path) => {
                let (module, instance) = NativeModule::open(name, &path)?;
                Ok((Some(module), instance))
            }
            ExtensionSource::Builtin(key) => {
                let created = catch_unwind(AssertUnwindSafe(|| self.catalog.instantiate(&key)))
                    .map_err(|payload| {
                        Error::load(
                            name,
                            format!("constructor panicked: {}", panic_message(&*payload)),
                        )
                    })?;
                let instance = created
                    .ok_or_else(|| Error::load(name, format!("unknown builtin extension `{key}`")))?;
                Ok((None, instance))
            }
        }
    }

    /// Release a half-loaded extension, dropping the instance before its code.
    fn discard(&self, name: &str, instance: Box<dyn Extension>, module: Option<NativeModule>) {
        let purged = self.host.purge_commands(name);
        if purged > 0 {
            warn!(name = %name, purged, "Dropped commands registered by a failed load");
        }
        drop(instance);
        drop(module);
    }

    /// Unload `name` if loaded. Returns whether anything was unloaded.
    ///
    /// Deregistration errors and panics are logged and never block removal.
    pub fn unload(&mut self, name: &str) -> bool {
        let Some(mut ext) = self.loaded.remove(name) else {
            debug!(name = %name, "Extension not loaded");
            return false;
        };

        let handle = ext.handle.take().unwrap_or_default();
        let host: &HostCapabilities = &self.host;
        let instance = &mut ext.instance;
        match catch_unwind(AssertUnwindSafe(|| instance.unregister(host, handle))) {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                let err = Error::Deregistration {
                    name: name.to_string(),
                    detail: e.to_string(),
                };
                warn!(error = %err, "Unregister failed, unloading anyway");
            }
            Err(payload) => {
                let err = Error::Deregistration {
                    name: name.to_string(),
                    detail: format!("panicked: {}", panic_message(&*payload)),
                };
                warn!(error = %err, "Unregister failed, unloading anyway");
            }
        }

        let leftover = self.host.purge_commands(name);
        if leftover > 0 {
            warn!(name = %name, leftover, "Extension left commands registered, removed them");
        }

        debug!(
            name = %name,
            path = %ext.descriptor.source_path.display(),
            native = ext.module.is_some(),
            "Releasing extension"
        );
        drop(ext);
        info!(name = %name, "Extension unloaded");
        true
    }

    pub fn unload_all(&mut self) {
        for name in self.loaded_names() {
            self.unload(&name);
        }
    }

    /// Load every enabled extension present in the latest scan.
    pub fn load_enabled(&mut self) -> BulkReport {
        let enabled = self.enabled();
        let mut report = BulkReport::default();
        let names: Vec<String> = self
            .registry
            .names()
            .filter(|n| enabled.contains(*n))
            .map(String::from)
            .collect();
        for name in names {
            let result = self.load(&name);
            report.record(&name, result);
        }
        report
    }

    /// Scan, then load what is enabled. Used at startup.
    pub fn load_on_start(&mut self) -> BulkReport {
        self.refresh();
        self.load_enabled()
    }

    /// Unload everything, rescan, and load what is enabled and present.
    pub fn reload_all(&mut self) -> BulkReport {
        self.unload_all();
        self.refresh();
        let report = self.load_enabled();
        info!(loaded = %report, "Reloaded extensions");
        report
    }

    /// Add or remove `names` from the enabled-set, then load or unload each.
    ///
    /// The set is persisted once for the whole call. With `on`, names
    /// missing from the latest scan are still recorded and count as failures.
    pub fn set_enabled(&mut self, names: &[String], on: bool) -> BulkReport {
        let mut enabled = self.enabled();
        for name in names {
            if on {
                enabled.insert(name.clone());
            } else {
                enabled.remove(name);
            }
        }
        if let Err(e) = write_enabled(&*self.settings, &enabled) {
            warn!(error = %e, "Failed to persist enabled extensions");
        }

        let mut report = BulkReport::default();
        for name in names {
            let result = if on {
                self.load(name)
            } else {
                self.unload(name);
                Ok(())
            };
            report.record(name, result);
        }
        debug!(on, result = %report, "Updated enabled extensions");
        report
    }
}

impl Drop for ExtensionManager {
    fn drop(&mut self) {
        self.unload_all();
    }
}

pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

//! Shared helpers for integration tests.
//!
//! Provides [`ExtensionHarness`], which wires an [`ExtensionManager`] to an
//! in-memory settings store and a temporary extensions directory, plus fake
//! ffprobe/ffmpeg scripts for the job flow on unix.

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tempfile::TempDir;
use videoinsight::extensions::{BuiltinCatalog, ExtensionManager};
use videoinsight::host::HostCapabilities;
use videoinsight::settings::MemorySettings;
use videoinsight_sdk::{Command, Extension, ExtensionError, Host, RegistrationHandle};

/// Call counters shared between a test and the extensions it creates.
#[derive(Default)]
pub struct Calls {
    pub register: AtomicUsize,
    pub unregister: AtomicUsize,
}

impl Calls {
    pub fn registered(&self) -> usize {
        self.register.load(Ordering::SeqCst)
    }

    pub fn unregistered(&self) -> usize {
        self.unregister.load(Ordering::SeqCst)
    }
}

/// Test extension registering one command named after its key.
pub struct CountingExtension {
    pub command_id: String,
    pub calls: Arc<Calls>,
    pub fail_unregister: bool,
}

impl Extension for CountingExtension {
    fn register(&mut self, host: &dyn Host) -> Result<RegistrationHandle, ExtensionError> {
        self.calls.register.fetch_add(1, Ordering::SeqCst);
        let id = self.command_id.clone();
        host.register_command(Command::new(id.clone(), "Counting", move |_, _| {
            Ok(format!("{id} ran"))
        }));
        Ok(RegistrationHandle::new(self.command_id.clone()))
    }

    fn unregister(&mut self, host: &dyn Host, handle: RegistrationHandle) -> Result<(), ExtensionError> {
        self.calls.unregister.fetch_add(1, Ordering::SeqCst);
        if self.fail_unregister {
            return Err(ExtensionError::failed("refusing to unregister"));
        }
        let id = handle
            .downcast::<String>()
            .map_err(|_| ExtensionError::invalid_argument("bad handle"))?;
        host.unregister_command(&id);
        Ok(())
    }
}

pub struct ExtensionHarness {
    pub dir: TempDir,
    pub settings: Arc<MemorySettings>,
    pub host: Arc<HostCapabilities>,
    pub manager: ExtensionManager,
    pub calls: Arc<Calls>,
}

impl ExtensionHarness {
    /// Catalog keys `counting` and `stubborn` are available to manifests.
    pub fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let calls = Arc::new(Calls::default());

        let mut catalog = BuiltinCatalog::new();
        let c = Arc::clone(&calls);
        catalog.register("counting", move || {
            Box::new(CountingExtension {
                command_id: "counting.run".into(),
                calls: Arc::clone(&c),
                fail_unregister: false,
            })
        });
        let c = Arc::clone(&calls);
        catalog.register("stubborn", move || {
            Box::new(CountingExtension {
                command_id: "stubborn.run".into(),
                calls: Arc::clone(&c),
                fail_unregister: true,
            })
        });

        let settings = Arc::new(MemorySettings::new());
        let host = Arc::new(HostCapabilities::new(settings.clone(), true));
        let manager = ExtensionManager::new(dir.path(), catalog, Arc::clone(&host));

        Self {
            dir,
            settings,
            host,
            manager,
            calls,
        }
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn write(&self, file: &str, content: &str) -> PathBuf {
        let path = self.dir.path().join(file);
        std::fs::write(&path, content).unwrap();
        path
    }
}

/// Write an executable shell script.
#[cfg(unix)]
pub fn write_script(path: &Path, body: &str) {
    use std::os::unix::fs::PermissionsExt;
    std::fs::write(path, format!("#!/bin/sh\n{body}\n")).unwrap();
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o755)).unwrap();
}

/// Encode a small JPEG frame.
pub fn jpeg(width: u32, height: u32) -> Vec<u8> {
    let mut buf = Vec::new();
    image::RgbImage::new(width, height)
        .write_to(&mut std::io::Cursor::new(&mut buf), image::ImageFormat::Jpeg)
        .unwrap();
    buf
}

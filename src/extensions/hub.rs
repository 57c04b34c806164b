//! Installing and removing extensions.
//!
//! Manifests are installed one by one or from a `.zip` archive carrying
//! manifests and their libraries. Files are never deleted: anything replaced
//! or removed is moved into the `__removed__` subdirectory with a timestamp
//! prefix.

use std::collections::BTreeSet;
use std::fs::File;
use std::path::{Path, PathBuf};

use chrono::Local;
use tracing::{debug, info, warn};
use zip::ZipArchive;

use super::error::{Error, Result};
use super::lifecycle::{BulkReport, ExtensionManager};
use super::registry::{describe, is_manifest, REMOVED_DIR};
use crate::settings::write_enabled;

/// Suffix of extension archives.
pub const ARCHIVE_SUFFIX: &str = "zip";

impl ExtensionManager {
    /// Install manifests and archives into the extensions directory, then
    /// (re)load everything installed with a single write of the enabled-set.
    pub fn install(&mut self, files: &[PathBuf]) -> BulkReport {
        let mut report = BulkReport::default();
        let mut installed = BTreeSet::new();

        for file in files {
            match self.install_file(file) {
                Ok(names) => installed.extend(names),
                Err(e) => {
                    warn!(path = %file.display(), error = %e, "Install failed");
                    report.total += 1;
                    report.failures.push((file.display().to_string(), e.to_string()));
                }
            }
        }

        self.refresh();
        if !installed.is_empty() {
            let installed: Vec<String> = installed.into_iter().collect();
            // A replaced manifest takes effect only after a fresh load.
            for name in &installed {
                self.unload(name);
            }
            let enabled = self.set_enabled(&installed, true);
            report.ok += enabled.ok;
            report.total += enabled.total;
            report.failures.extend(enabled.failures);
        }
        info!(result = %report, "Installed extensions");
        report
    }

    /// Returns the declared names of the manifests installed from `file`.
    fn install_file(&self, file: &Path) -> Result<Vec<String>> {
        if is_archive(file) {
            return self.install_archive(file);
        }
        if !is_manifest(file) {
            return Err(Error::manifest(
                file,
                "not an extension manifest (*.ext) or archive (*.zip)",
            ));
        }
        let file_name = file
            .file_name()
            .ok_or_else(|| Error::manifest(file, "no file name"))?;
        let descriptor =
            describe(file).ok_or_else(|| Error::manifest(file, "cannot read manifest"))?;

        let dir = self.registry.dir().to_path_buf();
        std::fs::create_dir_all(&dir)?;
        let target = dir.join(file_name);
        if same_file(file, &target) {
            debug!(path = %target.display(), "Manifest already in place");
            return Ok(vec![descriptor.name]);
        }
        if target.exists() {
            retire(&dir, &target)?;
        }
        std::fs::copy(file, &target)?;
        info!(name = %descriptor.name, path = %target.display(), "Installed extension");
        Ok(vec![descriptor.name])
    }

    /// Extract the manifests and libraries of an archive into the extensions
    /// directory, flattened to their file names. Every entry is checked
    /// before anything is written; an entry escaping the archive root
    /// rejects the whole archive.
    fn install_archive(&self, path: &Path) -> Result<Vec<String>> {
        let mut archive =
            ZipArchive::new(File::open(path)?).map_err(|e| Error::archive(path, e.to_string()))?;

        let mut wanted = Vec::new();
        for index in 0..archive.len() {
            let entry = archive
                .by_index(index)
                .map_err(|e| Error::archive(path, e.to_string()))?;
            let Some(relative) = entry.enclosed_name().map(|p| p.to_path_buf()) else {
                return Err(Error::archive(
                    path,
                    format!("entry `{}` escapes the archive", entry.name()),
                ));
            };
            if entry.is_dir() {
                continue;
            }
            let Some(leaf) = relative.file_name().map(PathBuf::from) else {
                continue;
            };
            if is_manifest(&leaf) || is_library(&leaf) {
                wanted.push((index, leaf));
            } else {
                debug!(entry = %entry.name(), "Skipping archive entry");
            }
        }
        if !wanted.iter().any(|(_, leaf)| is_manifest(leaf)) {
            return Err(Error::archive(path, "no extension manifests (*.ext) inside"));
        }

        let dir = self.registry.dir().to_path_buf();
        std::fs::create_dir_all(&dir)?;
        let mut names = Vec::new();
        for (index, leaf) in wanted {
            let mut entry = archive
                .by_index(index)
                .map_err(|e| Error::archive(path, e.to_string()))?;
            let target = dir.join(&leaf);
            if target.exists() {
                retire(&dir, &target)?;
            }
            let mut out = File::create(&target)?;
            std::io::copy(&mut entry, &mut out)?;

            if is_manifest(&target) {
                if let Some(descriptor) = describe(&target) {
                    info!(name = %descriptor.name, archive = %path.display(), "Installed extension");
                    names.push(descriptor.name);
                }
            }
        }
        Ok(names)
    }

    /// Unload, disable, and retire each named extension.
    pub fn remove(&mut self, names: &[String]) -> BulkReport {
        let mut report = BulkReport::default();

        let mut enabled = self.enabled();
        for name in names {
            enabled.remove(name);
        }
        if let Err(e) = write_enabled(&*self.settings, &enabled) {
            warn!(error = %e, "Failed to persist enabled extensions");
        }

        for name in names {
            self.unload(name);
            let result = match self.registry.get(name).map(|d| d.source_path.clone()) {
                Some(path) => retire(self.registry.dir(), &path).map(|_| ()),
                None => Err(Error::NotFound(name.clone())),
            };
            report.record(name, result);
        }

        self.refresh();
        info!(result = %report, "Removed extensions");
        report
    }

    /// Write manifests for bundled extensions missing from the directory.
    /// Returns the names of the files written.
    pub fn install_bundled(&mut self) -> Result<Vec<String>> {
        let dir = self.registry.dir().to_path_buf();
        std::fs::create_dir_all(&dir)?;

        let mut written = Vec::new();
        for manifest in self.catalog().bundled_manifests() {
            let target = dir.join(&manifest.file_name);
            if target.exists() {
                continue;
            }
            std::fs::write(&target, &manifest.contents)?;
            written.push(manifest.file_name.clone());
        }

        self.refresh();
        info!(count = written.len(), "Installed bundled extensions");
        Ok(written)
    }
}

fn is_archive(path: &Path) -> bool {
    path.extension().and_then(|e| e.to_str()) == Some(ARCHIVE_SUFFIX)
}

fn is_library(path: &Path) -> bool {
    path.extension().and_then(|e| e.to_str()) == Some(std::env::consts::DLL_EXTENSION)
}

fn same_file(a: &Path, b: &Path) -> bool {
    match (std::fs::canonicalize(a), std::fs::canonicalize(b)) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}

/// Move `path` into the removed directory under a timestamped name.
fn retire(dir: &Path, path: &Path) -> Result<PathBuf> {
    let removed = dir.join(REMOVED_DIR);
    std::fs::create_dir_all(&removed)?;

    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let stamp = Local::now().format("%Y%m%d_%H%M%S");
    let mut target = removed.join(format!("{stamp}_{file_name}"));
    let mut n = 1;
    while target.exists() {
        target = removed.join(format!("{stamp}_{n}_{file_name}"));
        n += 1;
    }

    std::fs::rename(path, &target)?;
    info!(from = %path.display(), to = %target.display(), "Moved extension to removed");
    Ok(target)
}

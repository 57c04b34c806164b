//! The `*.ext` manifest format, parsed only when an extension is loaded.
//!
//! ```toml
//! # Batch tag editing for selected videos
//! PLUGIN_NAME = "MetaTool"
//! builtin = "metatool"          # or: library = "libmetatool.so"
//! version = "1.0"
//! ```

use std::ffi::OsStr;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use super::error::{Error, Result};
use super::registry::read_leading_comment;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ExtensionManifest {
    #[serde(rename = "PLUGIN_NAME")]
    pub name: Option<String>,
    pub library: Option<PathBuf>,
    pub builtin: Option<String>,
    pub description: Option<String>,
    pub author: Option<String>,
    pub version: Option<String>,
}

/// Where an extension's code comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExtensionSource {
    /// A shared library opened in its own namespace.
    Native(PathBuf),
    /// A factory compiled into the host, keyed by catalog name.
    Builtin(String),
}

impl ExtensionManifest {
    pub fn parse(path: &Path, text: &str) -> Result<Self> {
        toml::from_str(text).map_err(|e| Error::manifest(path, e.message().to_string()))
    }

    pub fn read(path: &Path) -> Result<Self> {
        let bytes = std::fs::read(path)?;
        let mut manifest = Self::parse(path, &String::from_utf8_lossy(&bytes))?;
        if manifest.description.is_none() {
            manifest.description = read_leading_comment(path);
        }
        Ok(manifest)
    }

    /// Resolve the code source. Exactly one of `library` or `builtin` must
    /// be present. Relative library paths are taken from the manifest's
    /// directory, and a bare name without extension gets the platform's
    /// shared-library prefix and suffix.
    pub fn source(&self, manifest_path: &Path) -> Result<ExtensionSource> {
        match (&self.library, &self.builtin) {
            (Some(_), Some(_)) => Err(Error::manifest(
                manifest_path,
                "declares both `library` and `builtin`",
            )),
            (None, None) => Err(Error::manifest(
                manifest_path,
                "declares neither `library` nor `builtin`",
            )),
            (None, Some(key)) => Ok(ExtensionSource::Builtin(key.trim().to_string())),
            (Some(lib), None) => {
                let base = manifest_path.parent().unwrap_or_else(|| Path::new("."));
                Ok(ExtensionSource::Native(resolve_library(base, lib)))
            }
        }
    }
}

pub fn resolve_library(base: &Path, library: &Path) -> PathBuf {
    let library = if library.extension().is_none() && library.components().count() == 1 {
        PathBuf::from(libloading::library_filename(
            library.file_name().unwrap_or_else(|| OsStr::new("")),
        ))
    } else {
        library.to_path_buf()
    };

    if library.is_absolute() {
        library
    } else {
        base.join(library)
    }
}

//! Shared-library extensions.
//!
//! Each library is opened with its own handle. On unix `libloading` opens
//! with `RTLD_LOCAL`, so two extensions defining the same internal symbols
//! never resolve against each other.

use std::path::{Path, PathBuf};

use libloading::{Library, Symbol};
use tracing::debug;
use videoinsight_sdk::{
    ApiVersionFn, CreateFn, Extension, API_VERSION_SYMBOL, CREATE_SYMBOL, EXTENSION_API_VERSION,
};

use super::error::{Error, Result};

/// An open extension library. Must outlive every object created from it.
pub struct NativeModule {
    path: PathBuf,
    _library: Library,
}

impl NativeModule {
    /// Open the library, check its API version, and construct the instance.
    ///
    /// On any failure the library is closed again before returning.
    pub fn open(name: &str, path: &Path) -> Result<(Self, Box<dyn Extension>)> {
        if !path.is_file() {
            return Err(Error::load(
                name,
                format!("library not found: {}", path.display()),
            ));
        }

        // SAFETY: opening runs the library's initialisers. Extension
        // libraries are installed explicitly by the user and trusted.
        let library = unsafe { Library::new(path) }
            .map_err(|e| Error::load(name, format!("cannot open {}: {e}", path.display())))?;

        // SAFETY: the symbol type matches the signature exported by
        // `declare_extension!`.
        let version = unsafe {
            let version_fn: Symbol<ApiVersionFn> = library
                .get(API_VERSION_SYMBOL)
                .map_err(|e| Error::load(name, format!("missing API version symbol: {e}")))?;
            version_fn()
        };
        if version != EXTENSION_API_VERSION {
            return Err(Error::load(
                name,
                format!(
                    "built against extension API {version}, host provides {EXTENSION_API_VERSION}"
                ),
            ));
        }

        // SAFETY: as above; the returned pointer comes from `Box::into_raw`.
        let raw = unsafe {
            let create: Symbol<CreateFn> = library
                .get(CREATE_SYMBOL)
                .map_err(|e| Error::load(name, format!("missing constructor symbol: {e}")))?;
            create()
        };
        if raw.is_null() {
            return Err(Error::load(name, "extension constructor panicked"));
        }

        // SAFETY: non-null pointer produced by `Box::into_raw` in the
        // library's constructor, ownership is transferred here exactly once.
        let instance = unsafe { Box::from_raw(raw) }.0;

        debug!(name = %name, path = %path.display(), "Opened extension library");
        Ok((
            Self {
                path: path.to_path_buf(),
                _library: library,
            },
            instance,
        ))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn missing_library_is_a_load_error() {
        let err = NativeModule::open("Ghost", Path::new("/nonexistent/libghost.so")).err();
        assert_matches!(err, Some(Error::Load { ref name, ref detail }) if name == "Ghost" && detail.contains("not found"));
    }

    #[test]
    fn non_library_file_is_a_load_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(libloading::library_filename("bogus"));
        std::fs::write(&path, b"not a shared object").unwrap();

        let err = NativeModule::open("Bogus", &path).err();
        assert_matches!(err, Some(Error::Load { ref detail, .. }) if detail.contains("cannot open"));
    }
}

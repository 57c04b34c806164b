//! Extension discovery, loading, and management.
//!
//! An extension is a `*.ext` manifest in the extensions directory. The
//! registry finds manifests by static inspection only; the manager loads
//! the code they point at, either a shared library or a builtin factory,
//! and tracks what is loaded against the persisted enabled-set.

pub mod bundled;
mod catalog;
mod error;
mod hub;
mod lifecycle;
mod manifest;
mod native;
mod registry;

pub use catalog::{BuiltinCatalog, BundledManifest, ExtensionFactory};
pub use error::{Error, Result};
pub use lifecycle::{BulkReport, ExtensionManager, ExtensionStatus};
pub use manifest::{ExtensionManifest, ExtensionSource};
pub use native::NativeModule;
pub(crate) use lifecycle::panic_message;
pub use registry::{
    describe, parse_name_line, read_declared_name, ExtensionDescriptor, ExtensionRegistry,
    MANIFEST_SUFFIX, MAX_NAME_SCAN_LINES, NAME_CONSTANT, REMOVED_DIR,
};

//! # videoinsight-sdk
//!
//! The versioned interface between the videoinsight host and its extensions.
//!
//! An extension implements [`Extension`]. On load the host calls
//! [`Extension::register`] once with a [`Host`] capability reference and keeps
//! the returned [`RegistrationHandle`] without looking inside it. On unload the
//! host passes the same handle back to [`Extension::unregister`].
//!
//! Extensions shipped as shared libraries export their constructor with
//! [`declare_extension!`]:
//!
//! ```ignore
//! use videoinsight_sdk::{declare_extension, Command, Extension, ExtensionError, Host, RegistrationHandle};
//!
//! #[derive(Default)]
//! struct Hello;
//!
//! impl Extension for Hello {
//!     fn register(&mut self, host: &dyn Host) -> Result<RegistrationHandle, ExtensionError> {
//!         host.register_command(Command::new("hello.greet", "Say hello", |host, _args| {
//!             Ok(format!("{} files selected", host.selection().len()))
//!         }));
//!         Ok(RegistrationHandle::new("hello.greet".to_string()))
//!     }
//!
//!     fn unregister(&mut self, host: &dyn Host, handle: RegistrationHandle) -> Result<(), ExtensionError> {
//!         if let Ok(id) = handle.downcast::<String>() {
//!             host.unregister_command(&id);
//!         }
//!         Ok(())
//!     }
//! }
//!
//! declare_extension!(Hello);
//! ```
//!
//! Trait objects cross the library boundary, so host and extension must be
//! built with the same compiler and the same version of this crate. The
//! exported [`EXTENSION_API_VERSION`] is checked before anything else is called.

mod error;
mod extension;
mod host;
mod macros;

pub use error::ExtensionError;
pub use extension::{Extension, ExtensionBox, RegistrationHandle};
pub use host::{Command, CommandAction, CommandArgs, Host};

/// Bumped whenever [`Extension`], [`Host`], or [`ExtensionBox`] change shape.
pub const EXTENSION_API_VERSION: u32 = 1;

/// Exported symbol returning the API version the library was built against.
pub const API_VERSION_SYMBOL: &[u8] = b"videoinsight_extension_api_version\0";

/// Exported symbol constructing the extension instance.
pub const CREATE_SYMBOL: &[u8] = b"videoinsight_extension_create\0";

/// Signature of [`API_VERSION_SYMBOL`].
pub type ApiVersionFn = unsafe extern "C" fn() -> u32;

/// Signature of [`CREATE_SYMBOL`]. Returns null if construction panicked.
pub type CreateFn = unsafe extern "C" fn() -> *mut ExtensionBox;

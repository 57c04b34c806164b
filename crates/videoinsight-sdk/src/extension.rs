//! The extension entry points and the opaque registration handle.

use std::any::Any;
use std::fmt;

use crate::{ExtensionError, Host};

/// Value an extension hands back from `register` and receives again in
/// `unregister`. The host stores it but never inspects it.
#[derive(Default)]
pub struct RegistrationHandle(Option<Box<dyn Any + Send>>);

impl RegistrationHandle {
    /// A handle carrying nothing.
    pub fn none() -> Self {
        Self(None)
    }

    pub fn new<T: Any + Send>(value: T) -> Self {
        Self(Some(Box::new(value)))
    }

    pub fn is_none(&self) -> bool {
        self.0.is_none()
    }

    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.0.as_ref().and_then(|v| v.downcast_ref::<T>())
    }

    /// Take the value back out. Returns the handle unchanged on a type mismatch.
    pub fn downcast<T: Any>(self) -> Result<T, Self> {
        match self.0 {
            Some(value) => value
                .downcast::<T>()
                .map(|v| *v)
                .map_err(|value| Self(Some(value))),
            None => Err(Self(None)),
        }
    }
}

impl fmt::Debug for RegistrationHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            Some(_) => f.write_str("RegistrationHandle(..)"),
            None => f.write_str("RegistrationHandle(none)"),
        }
    }
}

/// A loadable unit contributing commands to the host.
///
/// Both entry points are optional: the defaults register nothing and
/// unregister nothing.
pub trait Extension: Send {
    /// Called exactly once after the extension is loaded.
    fn register(&mut self, host: &dyn Host) -> Result<RegistrationHandle, ExtensionError> {
        let _ = host;
        Ok(RegistrationHandle::none())
    }

    /// Called exactly once before the extension is unloaded, with the handle
    /// returned by [`register`](Self::register). Errors are logged by the
    /// host and never block the unload.
    fn unregister(
        &mut self,
        host: &dyn Host,
        handle: RegistrationHandle,
    ) -> Result<(), ExtensionError> {
        let _ = (host, handle);
        Ok(())
    }
}

/// Thin, FFI-safe pointer target wrapping the boxed trait object produced
/// by an extension library.
pub struct ExtensionBox(pub Box<dyn Extension>);

/// Export an [`Extension`](crate::Extension) type from a `cdylib`.
///
/// The single-argument form constructs the extension with `Default`; the
/// two-argument form takes a constructor expression.
///
/// ```ignore
/// videoinsight_sdk::declare_extension!(MyExtension);
/// videoinsight_sdk::declare_extension!(MyExtension, MyExtension::with_defaults);
/// ```
#[macro_export]
macro_rules! declare_extension {
    ($ty:ty) => {
        $crate::declare_extension!($ty, <$ty as ::core::default::Default>::default);
    };
    ($ty:ty, $ctor:expr) => {
        #[no_mangle]
        pub extern "C" fn videoinsight_extension_api_version() -> u32 {
            $crate::EXTENSION_API_VERSION
        }

        #[no_mangle]
        #[allow(improper_ctypes_definitions)]
        pub extern "C" fn videoinsight_extension_create() -> *mut $crate::ExtensionBox {
            match ::std::panic::catch_unwind(|| -> $ty { ($ctor)() }) {
                Ok(extension) => ::std::boxed::Box::into_raw(::std::boxed::Box::new(
                    $crate::ExtensionBox(::std::boxed::Box::new(extension)),
                )),
                Err(_) => ::std::ptr::null_mut(),
            }
        }
    };
}

#[cfg(test)]
mod tests {
    use crate::{Extension, ExtensionBox, EXTENSION_API_VERSION};

    #[derive(Default)]
    struct Plain;

    impl Extension for Plain {}

    declare_extension!(Plain);

    #[test]
    fn exported_functions_round_trip() {
        assert_eq!(videoinsight_extension_api_version(), EXTENSION_API_VERSION);
        let raw = videoinsight_extension_create();
        assert!(!raw.is_null());
        // SAFETY: `raw` came from `Box::into_raw` in the generated constructor.
        let boxed: Box<ExtensionBox> = unsafe { Box::from_raw(raw) };
        drop(boxed);
    }
}

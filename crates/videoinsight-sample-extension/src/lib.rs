//! A native extension exporting one command, `sample.count`, which reports
//! the size of the current selection.

use videoinsight_sdk::{
    declare_extension, Command, Extension, ExtensionError, Host, RegistrationHandle,
};

pub const COMMAND_ID: &str = "sample.count";

#[derive(Default)]
pub struct Sample;

impl Extension for Sample {
    fn register(&mut self, host: &dyn Host) -> Result<RegistrationHandle, ExtensionError> {
        let registered = host.register_command(Command::new(
            COMMAND_ID,
            "Count selected files",
            |host, _args| Ok(format!("{} files selected", host.selection().len())),
        ));
        if !registered {
            return Err(ExtensionError::failed(format!("{COMMAND_ID} is already taken")));
        }
        host.post_status("Sample ready", None);
        Ok(RegistrationHandle::new(COMMAND_ID.to_string()))
    }

    fn unregister(
        &mut self,
        host: &dyn Host,
        handle: RegistrationHandle,
    ) -> Result<(), ExtensionError> {
        let id = handle
            .downcast::<String>()
            .map_err(|_| ExtensionError::invalid_argument("unexpected registration handle"))?;
        host.unregister_command(&id);
        Ok(())
    }
}

declare_extension!(Sample);

//! Capability surface the host exposes to extensions.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use crate::ExtensionError;

/// Named string arguments passed to a command.
pub type CommandArgs = BTreeMap<String, String>;

/// Callable behind a command. Returns a short result summary.
pub type CommandAction =
    Arc<dyn Fn(&dyn Host, &CommandArgs) -> Result<String, ExtensionError> + Send + Sync>;

/// An action an extension adds to the host's menu/toolbar surface.
#[derive(Clone)]
pub struct Command {
    pub id: String,
    pub label: String,
    action: CommandAction,
}

impl Command {
    pub fn new<F>(id: impl Into<String>, label: impl Into<String>, action: F) -> Self
    where
        F: Fn(&dyn Host, &CommandArgs) -> Result<String, ExtensionError> + Send + Sync + 'static,
    {
        Self {
            id: id.into(),
            label: label.into(),
            action: Arc::new(action),
        }
    }

    pub fn invoke(&self, host: &dyn Host, args: &CommandArgs) -> Result<String, ExtensionError> {
        (self.action)(host, args)
    }
}

impl fmt::Debug for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Command")
            .field("id", &self.id)
            .field("label", &self.label)
            .finish_non_exhaustive()
    }
}

/// What an extension may ask of the host.
///
/// Enabling, disabling, loading, and unloading extensions are requests: the
/// host applies them after the current extension call returns.
pub trait Host {
    /// Files currently selected in the host.
    fn selection(&self) -> Vec<PathBuf>;

    fn set_selection(&self, files: Vec<PathBuf>);

    /// Add a command. Returns `false` if the id is already taken.
    fn register_command(&self, command: Command) -> bool;

    /// Remove a command. Returns `false` if the id was not registered.
    fn unregister_command(&self, id: &str) -> bool;

    /// Names in the persisted enabled-set.
    fn enabled_extensions(&self) -> BTreeSet<String>;

    fn set_extensions_enabled(&self, names: Vec<String>, on: bool);

    fn load_extension(&self, name: &str);

    fn unload_extension(&self, name: &str);

    /// Show a transient message; `None` keeps it until replaced.
    fn post_status(&self, message: &str, timeout: Option<Duration>);
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingHost {
        statuses: Mutex<Vec<String>>,
    }

    impl Host for RecordingHost {
        fn selection(&self) -> Vec<PathBuf> {
            vec![PathBuf::from("/v/a.mp4")]
        }
        fn set_selection(&self, _files: Vec<PathBuf>) {}
        fn register_command(&self, _command: Command) -> bool {
            true
        }
        fn unregister_command(&self, _id: &str) -> bool {
            true
        }
        fn enabled_extensions(&self) -> BTreeSet<String> {
            BTreeSet::new()
        }
        fn set_extensions_enabled(&self, _names: Vec<String>, _on: bool) {}
        fn load_extension(&self, _name: &str) {}
        fn unload_extension(&self, _name: &str) {}
        fn post_status(&self, message: &str, _timeout: Option<Duration>) {
            self.statuses.lock().unwrap().push(message.to_string());
        }
    }

    #[test]
    fn command_invokes_action_with_host_and_args() {
        let command = Command::new("demo.count", "Count", |host, args| {
            host.post_status("counting", None);
            let suffix = args.get("suffix").cloned().unwrap_or_default();
            Ok(format!("{}{}", host.selection().len(), suffix))
        });
        let host = RecordingHost::default();
        let mut args = CommandArgs::new();
        args.insert("suffix".into(), " files".into());

        assert_eq!(command.invoke(&host, &args).unwrap(), "1 files");
        assert_eq!(host.statuses.lock().unwrap().as_slice(), ["counting"]);
        assert!(format!("{command:?}").contains("demo.count"));
    }
}

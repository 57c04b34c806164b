//! The capability surface handed to extensions.
//!
//! Extensions only ever see this through the [`Host`] trait. Anything that
//! would change the loaded set is queued as a [`HostRequest`] and applied by
//! the application after the extension call returns.

use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::{Mutex, RwLock};
use tracing::{debug, error, info};
use videoinsight_sdk::{Command, Host};

use crate::settings::{read_enabled, SettingsStore};

/// Lifecycle change requested by an extension, applied later.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostRequest {
    SetEnabled { names: Vec<String>, on: bool },
    Load(String),
    Unload(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusMessage {
    pub text: String,
    pub timeout: Option<Duration>,
}

/// Transient status line. Messages posted while hidden are dropped.
#[derive(Debug)]
pub struct StatusChannel {
    visible: AtomicBool,
    messages: Mutex<Vec<StatusMessage>>,
}

impl StatusChannel {
    pub fn new(visible: bool) -> Self {
        Self {
            visible: AtomicBool::new(visible),
            messages: Mutex::new(Vec::new()),
        }
    }

    pub fn is_visible(&self) -> bool {
        self.visible.load(Ordering::Relaxed)
    }

    pub fn set_visible(&self, visible: bool) {
        self.visible.store(visible, Ordering::Relaxed);
    }

    /// Returns whether the message was shown.
    pub fn post(&self, text: &str, timeout: Option<Duration>) -> bool {
        if !self.is_visible() {
            debug!(status = %text, "Status channel hidden, message dropped");
            return false;
        }
        info!(status = %text, "Status");
        self.messages.lock().push(StatusMessage {
            text: text.to_string(),
            timeout,
        });
        true
    }

    pub fn messages(&self) -> Vec<StatusMessage> {
        self.messages.lock().clone()
    }

    pub fn last(&self) -> Option<StatusMessage> {
        self.messages.lock().last().cloned()
    }

    pub fn clear(&self) {
        self.messages.lock().clear();
    }
}

/// A failure surfaced to the user with its full detail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Alert {
    pub title: String,
    pub detail: String,
}

struct RegisteredCommand {
    command: Command,
    owner: Option<String>,
}

pub struct HostCapabilities {
    settings: Arc<dyn SettingsStore>,
    selection: RwLock<Vec<PathBuf>>,
    commands: RwLock<BTreeMap<String, RegisteredCommand>>,
    registering: Mutex<Option<String>>,
    requests: Mutex<VecDeque<HostRequest>>,
    status: StatusChannel,
    alerts: Mutex<Vec<Alert>>,
}

impl HostCapabilities {
    pub fn new(settings: Arc<dyn SettingsStore>, status_visible: bool) -> Self {
        Self {
            settings,
            selection: RwLock::new(Vec::new()),
            commands: RwLock::new(BTreeMap::new()),
            registering: Mutex::new(None),
            requests: Mutex::new(VecDeque::new()),
            status: StatusChannel::new(status_visible),
            alerts: Mutex::new(Vec::new()),
        }
    }

    pub fn settings(&self) -> &Arc<dyn SettingsStore> {
        &self.settings
    }

    pub fn status(&self) -> &StatusChannel {
        &self.status
    }

    /// `(id, label)` of every registered command, sorted by id.
    pub fn commands(&self) -> Vec<(String, String)> {
        self.commands
            .read()
            .values()
            .map(|r| (r.command.id.clone(), r.command.label.clone()))
            .collect()
    }

    /// Clone a command out of the table so it can run without holding the lock.
    pub fn command(&self, id: &str) -> Option<Command> {
        self.commands.read().get(id).map(|r| r.command.clone())
    }

    /// Attribute subsequently registered commands to `owner`.
    pub(crate) fn set_registering(&self, owner: Option<&str>) {
        *self.registering.lock() = owner.map(String::from);
    }

    /// Drop every command still attributed to `owner`.
    pub(crate) fn purge_commands(&self, owner: &str) -> usize {
        let mut commands = self.commands.write();
        let before = commands.len();
        commands.retain(|_, r| r.owner.as_deref() != Some(owner));
        before - commands.len()
    }

    pub fn take_requests(&self) -> Vec<HostRequest> {
        self.requests.lock().drain(..).collect()
    }

    pub fn has_requests(&self) -> bool {
        !self.requests.lock().is_empty()
    }

    fn request(&self, request: HostRequest) {
        debug!(?request, "Queued host request");
        self.requests.lock().push_back(request);
    }

    pub fn record_alert(&self, title: impl Into<String>, detail: impl Into<String>) {
        let alert = Alert {
            title: title.into(),
            detail: detail.into(),
        };
        error!(title = %alert.title, detail = %alert.detail, "Alert");
        self.alerts.lock().push(alert);
    }

    pub fn alerts(&self) -> Vec<Alert> {
        self.alerts.lock().clone()
    }

    pub fn take_alerts(&self) -> Vec<Alert> {
        std::mem::take(&mut *self.alerts.lock())
    }
}

impl Host for HostCapabilities {
    fn selection(&self) -> Vec<PathBuf> {
        self.selection.read().clone()
    }

    fn set_selection(&self, files: Vec<PathBuf>) {
        *self.selection.write() = files;
    }

    fn register_command(&self, command: Command) -> bool {
        let mut commands = self.commands.write();
        if commands.contains_key(&command.id) {
            debug!(id = %command.id, "Command id already registered");
            return false;
        }
        let owner = self.registering.lock().clone();
        debug!(id = %command.id, owner = ?owner, "Registered command");
        commands.insert(command.id.clone(), RegisteredCommand { command, owner });
        true
    }

    fn unregister_command(&self, id: &str) -> bool {
        self.commands.write().remove(id).is_some()
    }

    fn enabled_extensions(&self) -> BTreeSet<String> {
        read_enabled(&*self.settings)
    }

    fn set_extensions_enabled(&self, names: Vec<String>, on: bool) {
        self.request(HostRequest::SetEnabled { names, on });
    }

    fn load_extension(&self, name: &str) {
        self.request(HostRequest::Load(name.to_string()));
    }

    fn unload_extension(&self, name: &str) {
        self.request(HostRequest::Unload(name.to_string()));
    }

    fn post_status(&self, message: &str, timeout: Option<Duration>) {
        self.status.post(message, timeout);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::{write_enabled, MemorySettings};

    fn host(visible: bool) -> HostCapabilities {
        HostCapabilities::new(Arc::new(MemorySettings::new()), visible)
    }

    fn noop(id: &str) -> Command {
        Command::new(id, id.to_uppercase(), |_, _| Ok(String::new()))
    }

    #[test]
    fn hidden_status_drops_messages() {
        let host = host(false);
        host.post_status("hello", None);
        assert!(host.status().messages().is_empty());

        host.status().set_visible(true);
        host.post_status("again", Some(Duration::from_secs(1)));
        assert_eq!(host.status().last().unwrap().text, "again");
    }

    #[test]
    fn duplicate_command_ids_are_refused() {
        let host = host(true);
        assert!(host.register_command(noop("a.run")));
        assert!(!host.register_command(noop("a.run")));
        assert_eq!(host.commands(), [("a.run".to_string(), "A.RUN".to_string())]);
        assert!(host.unregister_command("a.run"));
        assert!(!host.unregister_command("a.run"));
    }

    #[test]
    fn purge_only_touches_owned_commands() {
        let host = host(true);
        host.set_registering(Some("Alpha"));
        host.register_command(noop("alpha.one"));
        host.register_command(noop("alpha.two"));
        host.set_registering(None);
        host.register_command(noop("free"));

        assert_eq!(host.purge_commands("Alpha"), 2);
        assert!(host.command("free").is_some());
        assert!(host.command("alpha.one").is_none());
    }

    #[test]
    fn lifecycle_calls_are_deferred() {
        let host = host(true);
        host.load_extension("A");
        host.set_extensions_enabled(vec!["B".into()], false);

        assert!(host.has_requests());
        assert_eq!(
            host.take_requests(),
            [
                HostRequest::Load("A".into()),
                HostRequest::SetEnabled {
                    names: vec!["B".into()],
                    on: false
                }
            ]
        );
        assert!(!host.has_requests());
    }

    #[test]
    fn enabled_set_reads_through_settings() {
        let settings = Arc::new(MemorySettings::new());
        let names: BTreeSet<String> = ["X".to_string()].into();
        write_enabled(&*settings, &names).unwrap();

        let host = HostCapabilities::new(settings, true);
        assert_eq!(host.enabled_extensions(), names);
    }
}

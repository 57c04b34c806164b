//! The application: file list, background jobs, and extensions.
//!
//! [`App`] is the single writer for all host state. Jobs run on tokio tasks
//! and report through a channel that only the app drains; extensions reach
//! the app through [`HostCapabilities`] and their lifecycle requests are
//! applied by [`App::process_requests`].

mod capabilities;
mod report;

pub use capabilities::{Alert, HostCapabilities, HostRequest, StatusChannel, StatusMessage};
pub use report::{render_text, to_json, FileEntry};

use std::collections::HashSet;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{anyhow, Result};
use tokio::sync::mpsc;
use tracing::{debug, info, trace, warn};
use videoinsight_av::{Prober, ThumbnailExtractor};
use videoinsight_common::{expand_inputs, JobKind};
use videoinsight_sdk::{CommandArgs, Host};

use crate::config::Config;
use crate::extensions::{panic_message, BuiltinCatalog, BulkReport, ExtensionManager};
use crate::jobs::{drain_workers, JobEvent, JobOutcome, TokioStarter, WorkQueue};
use crate::settings::{SettingsStore, TomlFileSettings};

/// Rounds of deferred requests applied per call before giving up.
const MAX_REQUEST_ROUNDS: usize = 16;

pub struct App {
    config: Config,
    host: Arc<HostCapabilities>,
    extensions: ExtensionManager,
    queue: WorkQueue<TokioStarter>,
    events: mpsc::UnboundedReceiver<JobEvent>,
    files: Vec<FileEntry>,
}

impl App {
    /// Build the app. Must be called inside a tokio runtime.
    pub fn new(config: Config, settings: Arc<dyn SettingsStore>, catalog: BuiltinCatalog) -> Self {
        let tools = config.tools.resolve();
        let prober = Prober::new(&tools.ffprobe).with_options(config.jobs.probe_options());
        let thumbnails = ThumbnailExtractor::new(&tools.ffmpeg)
            .with_options(config.thumbnails.options(config.jobs.thumbnail_timeout_secs));
        let (starter, events) = TokioStarter::new(prober, thumbnails);
        let queue = WorkQueue::new(starter, config.jobs.max_concurrent);

        let host = Arc::new(HostCapabilities::new(settings, config.ui.status_bar));
        let extensions = ExtensionManager::new(&config.extensions.dir, catalog, Arc::clone(&host));

        Self {
            config,
            host,
            extensions,
            queue,
            events,
            files: Vec::new(),
        }
    }

    /// Build the app with file-backed settings and the bundled extensions.
    pub fn from_config(config: Config) -> Self {
        let settings: Arc<dyn SettingsStore> = Arc::new(TomlFileSettings::open(&config.settings.path));
        let tools = config.tools.resolve();
        let catalog = BuiltinCatalog::with_bundled(tools.ffmpeg, config.jobs.tag_timeout());
        Self::new(config, settings, catalog)
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn host(&self) -> &Arc<HostCapabilities> {
        &self.host
    }

    pub fn extensions(&self) -> &ExtensionManager {
        &self.extensions
    }

    pub fn files(&self) -> &[FileEntry] {
        &self.files
    }

    pub fn file(&self, path: &Path) -> Option<&FileEntry> {
        self.files.iter().find(|f| f.path == path)
    }

    pub fn is_idle(&self) -> bool {
        self.queue.is_idle()
    }

    pub fn active_jobs(&self) -> usize {
        self.queue.active_count()
    }

    pub fn pending_jobs(&self) -> usize {
        self.queue.pending_count()
    }

    /// Scan for extensions and load the enabled ones.
    pub fn start(&mut self) -> BulkReport {
        let report = self.extensions.load_on_start();
        self.record_failures("loaded", &report);
        self.process_requests();
        info!(extensions = %report, "Started");
        report
    }

    /// Raise an alert for every failed item. `action` completes the title,
    /// as in "Extension X could not be loaded".
    fn record_failures(&self, action: &str, report: &BulkReport) {
        for (name, detail) in &report.failures {
            self.host
                .record_alert(format!("Extension {name} could not be {action}"), detail.clone());
        }
    }

    /// Add files and directories. Directories are searched recursively for
    /// video files. Each new file gets a probe and a thumbnail job.
    pub fn add_files(&mut self, inputs: &[PathBuf]) -> usize {
        let known: HashSet<PathBuf> = self.files.iter().map(|f| f.path.clone()).collect();
        let new: Vec<PathBuf> = expand_inputs(inputs)
            .into_iter()
            .filter(|p| !known.contains(p))
            .collect();

        for path in &new {
            self.files.push(FileEntry::new(path));
            for kind in JobKind::ALL {
                self.queue.enqueue(path, kind);
            }
        }

        if !new.is_empty() {
            self.host
                .post_status(&format!("Added {} video files", new.len()), None);
        }
        debug!(
            added = new.len(),
            active = self.queue.active_count(),
            pending = self.queue.pending_count(),
            "Files added"
        );
        new.len()
    }

    /// Wait for the next job event and apply it. Returns `false` for events
    /// that no longer match an active job, `None` if the channel closed.
    pub async fn next_event(&mut self) -> Option<bool> {
        let event = self.events.recv().await?;
        Some(self.handle_event(event))
    }

    /// Apply job events until no job is active or pending.
    pub async fn run_until_idle(&mut self) {
        while !self.queue.is_idle() {
            if self.next_event().await.is_none() {
                break;
            }
        }
    }

    fn handle_event(&mut self, event: JobEvent) -> bool {
        if !self.queue.complete(event.id) {
            trace!(job_id = %event.id, "Stale job event");
            return false;
        }

        let Some(entry) = self.files.iter_mut().find(|f| f.path == event.key.path) else {
            trace!(path = %event.key.path.display(), "Event for a file no longer listed");
            return false;
        };

        match event.outcome {
            JobOutcome::Probed(report) => entry.report = Some(*report),
            JobOutcome::Thumbnail(thumbnail) => entry.thumbnail = Some(thumbnail),
            JobOutcome::Failed(message) => {
                warn!(path = %entry.path.display(), kind = %event.key.kind, error = %message, "Job failed");
                entry.errors.push(format!("{}: {message}", event.key.kind));
            }
            JobOutcome::Cancelled => {
                debug!(path = %entry.path.display(), kind = %event.key.kind, "Job cancelled");
            }
        }
        true
    }

    /// Drop files from the list, stopping their jobs first.
    pub async fn remove_files(&mut self, paths: &[PathBuf]) -> usize {
        let mut workers = Vec::new();
        for path in paths {
            workers.extend(self.queue.cancel_path(path));
        }
        drain_workers(workers, self.config.jobs.cancel_grace()).await;

        let before = self.files.len();
        self.files.retain(|f| !paths.contains(&f.path));
        let selection: Vec<PathBuf> = self
            .host
            .selection()
            .into_iter()
            .filter(|p| !paths.contains(p))
            .collect();
        self.host.set_selection(selection);
        before - self.files.len()
    }

    pub async fn clear_files(&mut self) {
        let workers = self.queue.cancel_all();
        drain_workers(workers, self.config.jobs.cancel_grace()).await;
        self.files.clear();
        self.host.set_selection(Vec::new());
    }

    pub fn select(&self, files: Vec<PathBuf>) {
        self.host.set_selection(files);
    }

    /// Run a registered command, then apply whatever it requested.
    pub fn run_command(&mut self, id: &str, args: &CommandArgs) -> Result<String> {
        let command = self
            .host
            .command(id)
            .ok_or_else(|| anyhow!("Unknown command: {id}"))?;

        let host: &HostCapabilities = &self.host;
        let result = match catch_unwind(AssertUnwindSafe(|| command.invoke(host, args))) {
            Ok(Ok(message)) => Ok(message),
            Ok(Err(e)) => Err(anyhow!("Command {id} failed: {e}")),
            Err(payload) => Err(anyhow!(
                "Command {id} panicked: {}",
                panic_message(&*payload)
            )),
        };
        // Release everything owned by the extension before it may be unloaded.
        drop(command);

        self.process_requests();
        result
    }

    /// Apply lifecycle requests queued by extensions.
    pub fn process_requests(&mut self) {
        for _ in 0..MAX_REQUEST_ROUNDS {
            let requests = self.host.take_requests();
            if requests.is_empty() {
                return;
            }
            for request in requests {
                debug!(?request, "Applying host request");
                match request {
                    HostRequest::SetEnabled { names, on } => {
                        let report = self.extensions.set_enabled(&names, on);
                        self.record_failures("loaded", &report);
                    }
                    HostRequest::Load(name) => {
                        if let Err(e) = self.extensions.load(&name) {
                            self.host.record_alert(
                                format!("Extension {name} could not be loaded"),
                                e.to_string(),
                            );
                        }
                    }
                    HostRequest::Unload(name) => {
                        self.extensions.unload(&name);
                    }
                }
            }
        }
        warn!("Extensions kept issuing lifecycle requests, leaving the rest queued");
    }

    pub fn set_extensions_enabled(&mut self, names: &[String], on: bool) -> BulkReport {
        let report = self.extensions.set_enabled(names, on);
        self.record_failures("loaded", &report);
        self.process_requests();
        report
    }

    pub fn reload_extensions(&mut self) -> BulkReport {
        let report = self.extensions.reload_all();
        self.record_failures("loaded", &report);
        self.process_requests();
        report
    }

    pub fn install_extensions(&mut self, files: &[PathBuf]) -> BulkReport {
        let report = self.extensions.install(files);
        self.record_failures("installed", &report);
        self.process_requests();
        report
    }

    pub fn remove_extensions(&mut self, names: &[String]) -> BulkReport {
        let report = self.extensions.remove(names);
        self.record_failures("removed", &report);
        self.process_requests();
        report
    }

    pub fn install_bundled_extensions(&mut self) -> crate::extensions::Result<Vec<String>> {
        self.extensions.install_bundled()
    }

    pub fn export_report(&self) -> String {
        render_text(&self.files)
    }

    /// Stop every job and unload every extension.
    pub async fn shutdown(&mut self) {
        let workers = self.queue.cancel_all();
        drain_workers(workers, self.config.jobs.cancel_grace()).await;
        self.extensions.unload_all();
        info!("Shut down");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::MemorySettings;
    use videoinsight_sdk::{Command, Extension, ExtensionError, RegistrationHandle};

    struct Toggler;

    impl Extension for Toggler {
        fn register(&mut self, host: &dyn Host) -> std::result::Result<RegistrationHandle, ExtensionError> {
            host.register_command(Command::new("toggler.off", "Disable self", |host, _| {
                host.set_extensions_enabled(vec!["Toggler".into()], false);
                Ok("bye".into())
            }));
            Ok(RegistrationHandle::none())
        }
    }

    fn config(dir: &Path) -> Config {
        let mut config = Config::default();
        config.extensions.dir = dir.join("plugins");
        config.tools.ffmpeg_path = Some(dir.join("missing-ffmpeg"));
        config.tools.ffprobe_path = Some(dir.join("missing-ffprobe"));
        config.jobs.cancel_grace_ms = 200;
        config
    }

    fn app(dir: &Path) -> App {
        let mut catalog = BuiltinCatalog::new();
        catalog.register("toggler", || Box::new(Toggler));
        std::fs::create_dir_all(dir.join("plugins")).unwrap();
        std::fs::write(
            dir.join("plugins/toggler.ext"),
            "PLUGIN_NAME = \"Toggler\"\nbuiltin = \"toggler\"\n",
        )
        .unwrap();
        App::new(config(dir), Arc::new(MemorySettings::new()), catalog)
    }

    #[tokio::test]
    async fn command_requests_are_applied_after_it_returns() {
        let dir = tempfile::tempdir().unwrap();
        let mut app = app(dir.path());
        app.start();
        assert_eq!(app.set_extensions_enabled(&["Toggler".into()], true).to_string(), "1/1");

        let message = app.run_command("toggler.off", &CommandArgs::new()).unwrap();

        assert_eq!(message, "bye");
        assert!(!app.extensions().is_loaded("Toggler"));
        assert!(app.host().command("toggler.off").is_none());
    }

    #[tokio::test]
    async fn unknown_command_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let mut app = app(dir.path());
        assert!(app.run_command("nope", &CommandArgs::new()).is_err());
    }

    #[tokio::test]
    async fn failed_jobs_are_recorded_per_file() {
        let dir = tempfile::tempdir().unwrap();
        let clip = dir.path().join("clip.mp4");
        std::fs::write(&clip, vec![1u8; 512]).unwrap();
        let mut app = app(dir.path());

        assert_eq!(app.add_files(&[clip.clone(), clip.clone()]), 1);
        assert_eq!(app.add_files(&[clip.clone()]), 0);
        app.run_until_idle().await;

        let entry = app.file(&clip).unwrap();
        assert!(entry.report.is_none());
        assert_eq!(entry.errors.len(), 2);
        assert_eq!(
            app.host().status().messages()[0].text,
            "Added 1 video files"
        );
    }

    #[tokio::test]
    async fn removing_files_drops_entries() {
        let dir = tempfile::tempdir().unwrap();
        let clip = dir.path().join("clip.mkv");
        std::fs::write(&clip, vec![1u8; 512]).unwrap();
        let mut app = app(dir.path());

        app.add_files(&[clip.clone()]);
        assert_eq!(app.remove_files(&[clip.clone()]).await, 1);
        assert!(app.files().is_empty());
        assert!(app.is_idle());
    }

    #[tokio::test]
    async fn load_failures_become_alerts() {
        let dir = tempfile::tempdir().unwrap();
        let mut app = app(dir.path());
        std::fs::write(
            dir.path().join("plugins/broken.ext"),
            "PLUGIN_NAME = \"Broken\"\nbuiltin = \"nothing\"\n",
        )
        .unwrap();
        app.start();

        let report = app.set_extensions_enabled(&["Broken".into()], true);
        assert_eq!(report.to_string(), "0/1");
        let alerts = app.host().alerts();
        assert_eq!(alerts.len(), 1);
        assert!(alerts[0].detail.contains("nothing"));
    }
}

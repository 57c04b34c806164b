//! Batch container-tag clearing and editing for the current selection.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use videoinsight_av::{block_on, BatchReport, TagEdit, TagEditor};
use videoinsight_sdk::{
    Command, CommandArgs, Extension, ExtensionError, Host, RegistrationHandle,
};

pub const KEY: &str = "metatool";
pub const NAME: &str = "MetaTool";
pub const CLEAR_COMMAND: &str = "metatool.clear";
pub const EDIT_COMMAND: &str = "metatool.edit";

pub const MANIFEST: &str = "\
# Clear or edit container tags of the selected videos.
PLUGIN_NAME = \"MetaTool\"
builtin = \"metatool\"
version = \"1.0\"
";

const STATUS_TIMEOUT: Duration = Duration::from_secs(5);

pub struct MetaTool {
    editor: Arc<TagEditor>,
}

impl MetaTool {
    pub fn new(editor: Arc<TagEditor>) -> Self {
        Self { editor }
    }
}

impl Extension for MetaTool {
    fn register(&mut self, host: &dyn Host) -> Result<RegistrationHandle, ExtensionError> {
        let clear_editor = Arc::clone(&self.editor);
        let edit_editor = Arc::clone(&self.editor);

        let commands = [
            Command::new(CLEAR_COMMAND, "Clear container tags", move |host, _args| {
                let files = selected(host)?;
                let report = run_batch(clear_editor.clear_all(&files))?;
                Ok(finish(host, "Cleared tags", &report))
            }),
            Command::new(EDIT_COMMAND, "Edit container tags", move |host, args| {
                let edit = parse_edit(args)?;
                let files = selected(host)?;
                let report = run_batch(edit_editor.edit_all(&files, &edit))?;
                Ok(finish(host, "Edited tags", &report))
            }),
        ];

        let mut registered = Vec::with_capacity(commands.len());
        for command in commands {
            let id = command.id.clone();
            if host.register_command(command) {
                registered.push(id);
            }
        }

        host.post_status(&format!("{NAME} ready"), Some(STATUS_TIMEOUT));
        Ok(RegistrationHandle::new(registered))
    }

    fn unregister(
        &mut self,
        host: &dyn Host,
        handle: RegistrationHandle,
    ) -> Result<(), ExtensionError> {
        let ids = handle
            .downcast::<Vec<String>>()
            .map_err(|_| ExtensionError::invalid_argument("unexpected registration handle"))?;
        for id in ids {
            host.unregister_command(&id);
        }
        Ok(())
    }
}

fn selected(host: &dyn Host) -> Result<Vec<PathBuf>, ExtensionError> {
    let files = host.selection();
    if files.is_empty() {
        return Err(ExtensionError::invalid_argument("no files selected"));
    }
    Ok(files)
}

fn run_batch<F>(future: F) -> Result<BatchReport, ExtensionError>
where
    F: std::future::Future<Output = BatchReport> + Send,
{
    block_on(future).map_err(|e| ExtensionError::failed(e.to_string()))
}

fn finish(host: &dyn Host, verb: &str, report: &BatchReport) -> String {
    let message = format!("{verb}: {report} files");
    host.post_status(&message, Some(STATUS_TIMEOUT));
    message
}

/// Build a [`TagEdit`] from `title`, `comment`, `language` and `rename`.
pub fn parse_edit(args: &CommandArgs) -> Result<TagEdit, ExtensionError> {
    if let Some(unknown) = args
        .keys()
        .find(|k| !matches!(k.as_str(), "title" | "comment" | "language" | "rename"))
    {
        return Err(ExtensionError::invalid_argument(format!(
            "unknown argument `{unknown}`"
        )));
    }

    let edit = TagEdit {
        title: args.get("title").cloned(),
        comment: args.get("comment").cloned(),
        language: args.get("language").cloned(),
        rename: args
            .get("rename")
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty()),
    };
    if edit.is_empty() {
        return Err(ExtensionError::invalid_argument(
            "nothing to edit: pass title, comment, language or rename",
        ));
    }
    Ok(edit)
}

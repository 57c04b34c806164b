//! Container tag editing and clearing with stream copy.
//!
//! Each rewrite goes to a hidden temp file next to the source, so the final
//! rename never crosses filesystems. The first rewrite of a file keeps a
//! `<name>.backup` copy of the original.

use std::ffi::OsString;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use tracing::{info, warn};

use crate::command::ToolCommand;
use crate::{Error, Result};

/// Default budget for a stream-copy rewrite of a large file.
pub const DEFAULT_TAG_TIMEOUT: Duration = Duration::from_secs(900);

/// Container-level keys blanked by [`TagEditor::clear`].
pub const CLEARED_KEYS: &[&str] = &[
    "title",
    "comment",
    "description",
    "artist",
    "album",
    "date",
    "encoder",
    "language",
];

/// Per-type stream indices whose `title`/`language` tags are blanked.
pub const STREAM_TAG_SLOTS: usize = 8;

/// Requested tag changes; `None` leaves a field untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TagEdit {
    pub title: Option<String>,
    pub comment: Option<String>,
    /// Written to the container and to the first audio stream.
    pub language: Option<String>,
    /// New file stem; the extension is kept.
    pub rename: Option<String>,
}

impl TagEdit {
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.comment.is_none()
            && self.language.is_none()
            && self.rename.is_none()
    }

    /// ffmpeg metadata arguments for this edit.
    pub fn metadata_args(&self) -> Vec<String> {
        let mut args = Vec::new();
        if let Some(title) = &self.title {
            args.extend(["-metadata".to_string(), format!("title={title}")]);
        }
        if let Some(comment) = &self.comment {
            args.extend(["-metadata".to_string(), format!("comment={comment}")]);
        }
        if let Some(language) = &self.language {
            args.extend([
                "-metadata".to_string(),
                format!("language={language}"),
                "-metadata:s:a:0".to_string(),
                format!("language={language}"),
            ]);
        }
        args
    }
}

/// ffmpeg arguments that drop all metadata and chapters, then blank the
/// common keys that some muxers would otherwise re-add.
pub fn clear_args() -> Vec<String> {
    let mut args: Vec<String> = ["-map", "0", "-map_metadata", "-1", "-map_chapters", "-1"]
        .into_iter()
        .map(String::from)
        .collect();
    for key in CLEARED_KEYS {
        args.extend(["-metadata".to_string(), format!("{key}=")]);
    }
    for kind in ["v", "a", "s"] {
        for index in 0..STREAM_TAG_SLOTS {
            for key in ["title", "language"] {
                args.extend([format!("-metadata:s:{kind}:{index}"), format!("{key}=")]);
            }
        }
    }
    args
}

/// Outcome of a batch operation: `ok` of `total` items succeeded.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchReport {
    pub ok: usize,
    pub total: usize,
    pub failures: Vec<(PathBuf, String)>,
}

impl BatchReport {
    fn record(&mut self, path: &Path, result: Result<PathBuf>) {
        self.total += 1;
        match result {
            Ok(_) => self.ok += 1,
            Err(e) => self.failures.push((path.to_path_buf(), e.to_string())),
        }
    }
}

impl fmt::Display for BatchReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.ok, self.total)
    }
}

/// Rewrites container tags in place using ffmpeg stream copy.
#[derive(Debug, Clone)]
pub struct TagEditor {
    ffmpeg: PathBuf,
    timeout: Duration,
}

impl TagEditor {
    pub fn new(ffmpeg: impl Into<PathBuf>) -> Self {
        Self {
            ffmpeg: ffmpeg.into(),
            timeout: DEFAULT_TAG_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Apply `edit` to `src`. Returns the final path (changed by a rename).
    pub async fn edit(&self, src: &Path, edit: &TagEdit) -> Result<PathBuf> {
        if edit.is_empty() {
            return Err(Error::InvalidInput("no tag changes requested".into()));
        }
        let metadata = edit.metadata_args();
        if !metadata.is_empty() {
            self.rewrite(src, metadata).await?;
        }
        match edit.rename.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            Some(stem) => {
                let dest = unique_sibling(src, stem)?;
                std::fs::rename(src, &dest)?;
                info!(from = %src.display(), to = %dest.display(), "Renamed file");
                Ok(dest)
            }
            None => Ok(src.to_path_buf()),
        }
    }

    /// Remove container metadata, chapters, and common stream tags.
    pub async fn clear(&self, src: &Path) -> Result<PathBuf> {
        self.rewrite(src, clear_args()).await?;
        Ok(src.to_path_buf())
    }

    /// Edit every file, continuing past failures.
    pub async fn edit_all(&self, files: &[PathBuf], edit: &TagEdit) -> BatchReport {
        let mut report = BatchReport::default();
        for file in files {
            let result = self.edit(file, edit).await;
            if let Err(e) = &result {
                warn!(file = %file.display(), error = %e, "Tag edit failed");
            }
            report.record(file, result);
        }
        report
    }

    /// Clear every file, continuing past failures.
    pub async fn clear_all(&self, files: &[PathBuf]) -> BatchReport {
        let mut report = BatchReport::default();
        for file in files {
            let result = self.clear(file).await;
            if let Err(e) = &result {
                warn!(file = %file.display(), error = %e, "Tag clear failed");
            }
            report.record(file, result);
        }
        report
    }

    async fn rewrite(&self, src: &Path, metadata: Vec<String>) -> Result<()> {
        if !src.is_file() {
            return Err(Error::file_not_found(src));
        }
        let parent = src
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        let name = src
            .file_name()
            .ok_or_else(|| Error::InvalidInput(format!("not a file path: {}", src.display())))?;

        let mut suffix = OsString::from("_");
        suffix.push(name);
        let temp = tempfile::Builder::new()
            .prefix(".tmp_")
            .suffix(&suffix)
            .tempfile_in(parent)?;

        ToolCommand::new(&self.ffmpeg)
            .args(["-y", "-i"])
            .arg(src)
            .args(metadata)
            .args(["-c", "copy"])
            .arg(temp.path())
            .timeout(self.timeout)
            .execute()
            .await?;

        let backup = backup_path(src);
        if !backup.exists() {
            std::fs::copy(src, &backup)?;
        }
        temp.persist(src).map_err(|e| Error::Io(e.error))?;
        info!(file = %src.display(), "Rewrote container tags");
        Ok(())
    }
}

/// `<src>.backup` next to the source.
pub fn backup_path(src: &Path) -> PathBuf {
    let mut name = src.as_os_str().to_os_string();
    name.push(".backup");
    PathBuf::from(name)
}

/// `<stem>.<ext>` next to `src`, with ` (k)` appended until the name is free.
pub fn unique_sibling(src: &Path, stem: &str) -> Result<PathBuf> {
    let parent = src.parent().unwrap_or_else(|| Path::new(""));
    let ext = src
        .extension()
        .map(|e| format!(".{}", e.to_string_lossy()))
        .unwrap_or_default();

    let candidate = parent.join(format!("{stem}{ext}"));
    if candidate == src || !candidate.exists() {
        return Ok(candidate);
    }
    (1..10_000)
        .map(|k| parent.join(format!("{stem} ({k}){ext}")))
        .find(|p| !p.exists())
        .ok_or_else(|| Error::InvalidInput(format!("no free name for {stem}{ext}")))
}

//! Plain-text and JSON summaries of analysed files.

use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use chrono::Local;
use serde::Serialize;
use videoinsight_av::{ProbeReport, Thumbnail};

/// One file in the working list and everything learned about it.
#[derive(Debug, Clone, Default)]
pub struct FileEntry {
    pub path: PathBuf,
    pub report: Option<ProbeReport>,
    pub thumbnail: Option<Thumbnail>,
    pub errors: Vec<String>,
}

impl FileEntry {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            ..Default::default()
        }
    }

    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.path.display().to_string())
    }

    pub fn is_ok(&self) -> bool {
        self.report.is_some() && self.errors.is_empty()
    }
}

#[derive(Serialize)]
struct FileSummary<'a> {
    path: &'a Path,
    #[serde(skip_serializing_if = "Option::is_none")]
    report: Option<&'a ProbeReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    thumbnail: Option<ThumbnailSummary>,
    errors: &'a [String],
}

#[derive(Serialize)]
struct ThumbnailSummary {
    width: u32,
    height: u32,
    bytes: usize,
}

pub fn to_json(entries: &[FileEntry]) -> serde_json::Result<String> {
    let summaries: Vec<FileSummary<'_>> = entries
        .iter()
        .map(|e| FileSummary {
            path: &e.path,
            report: e.report.as_ref(),
            thumbnail: e.thumbnail.as_ref().map(|t| ThumbnailSummary {
                width: t.width,
                height: t.height,
                bytes: t.bytes.len(),
            }),
            errors: &e.errors,
        })
        .collect();
    serde_json::to_string_pretty(&summaries)
}

/// Human-readable report covering every file in the list.
pub fn render_text(entries: &[FileEntry]) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Video Insight Report");
    let _ = writeln!(out, "Generated: {}", Local::now().format("%Y-%m-%d %H:%M:%S"));
    let _ = writeln!(out, "Files: {}", entries.len());

    for entry in entries {
        let _ = writeln!(out);
        let _ = writeln!(out, "== {} ==", entry.file_name());
        let _ = writeln!(out, "Path: {}", entry.path.display());

        match &entry.report {
            Some(report) => {
                let _ = writeln!(out, "Title: {}", report.file.title);
                if let Some(subtitle) = &report.file.subtitle {
                    let _ = writeln!(out, "Subtitle: {subtitle}");
                }
                let _ = writeln!(out, "Size: {}", report.file.size_display());
                for (label, value) in report.media.rows() {
                    let _ = writeln!(out, "{label}: {value}");
                }
            }
            None => {
                let _ = writeln!(out, "Not analysed");
            }
        }

        if let Some(thumb) = &entry.thumbnail {
            let _ = writeln!(out, "Thumbnail: {}x{}", thumb.width, thumb.height);
        }
        for error in &entry.errors {
            let _ = writeln!(out, "Error: {error}");
        }
    }
    out
}

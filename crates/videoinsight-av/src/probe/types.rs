//! Normalized probe records and their display helpers.

use std::fmt;
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::Result;

/// Text shown for any field the probe could not determine.
pub const UNKNOWN: &str = "unknown";

/// Separators tried, in order, when splitting a file stem into title and subtitle.
const TITLE_SEPARATORS: [char; 4] = ['_', '-', '.', ' '];

/// Which ffprobe invocation produced a [`MediaReport`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ProbeSource {
    #[default]
    Json,
    Fallback,
}

/// Frame dimensions in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Container and stream facts extracted by ffprobe.
///
/// Video fields describe the first video stream, audio fields the first
/// audio stream.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MediaReport {
    pub source: ProbeSource,
    /// Container format name, e.g. `matroska,webm`.
    pub format: Option<String>,
    /// Duration in seconds.
    pub duration: Option<f64>,
    /// Overall bit rate in bits per second.
    pub bit_rate: Option<u64>,
    pub resolution: Option<Resolution>,
    pub video_codec: Option<String>,
    pub frame_rate: Option<f64>,
    pub audio_codec: Option<String>,
    pub audio_sample_rate: Option<u32>,
    pub audio_channels: Option<u32>,
    pub audio_bit_rate: Option<u64>,
    pub has_subtitles: bool,
}

impl MediaReport {
    pub fn duration_display(&self) -> String {
        self.duration
            .map(format_duration)
            .unwrap_or_else(|| UNKNOWN.to_string())
    }

    pub fn bit_rate_display(&self) -> String {
        self.bit_rate
            .map(format_bitrate)
            .unwrap_or_else(|| UNKNOWN.to_string())
    }

    pub fn resolution_display(&self) -> String {
        self.resolution
            .map(|r| r.to_string())
            .unwrap_or_else(|| UNKNOWN.to_string())
    }

    pub fn frame_rate_display(&self) -> String {
        self.frame_rate
            .map(|fps| format!("{fps:.2} fps"))
            .unwrap_or_else(|| UNKNOWN.to_string())
    }

    /// Label/value rows in display order.
    pub fn rows(&self) -> Vec<(&'static str, String)> {
        let or_unknown = |v: &Option<String>| v.clone().unwrap_or_else(|| UNKNOWN.to_string());
        vec![
            ("Duration", self.duration_display()),
            ("Resolution", self.resolution_display()),
            ("Frame rate", self.frame_rate_display()),
            ("Video codec", or_unknown(&self.video_codec)),
            ("Audio codec", or_unknown(&self.audio_codec)),
            (
                "Sample rate",
                self.audio_sample_rate
                    .map(|hz| format!("{hz} Hz"))
                    .unwrap_or_else(|| UNKNOWN.to_string()),
            ),
            (
                "Channels",
                self.audio_channels
                    .map(|c| c.to_string())
                    .unwrap_or_else(|| UNKNOWN.to_string()),
            ),
            (
                "Audio bit rate",
                self.audio_bit_rate
                    .map(format_bitrate)
                    .unwrap_or_else(|| UNKNOWN.to_string()),
            ),
            ("Format", or_unknown(&self.format)),
            ("Bit rate", self.bit_rate_display()),
            (
                "Subtitles",
                if self.has_subtitles { "yes" } else { "no" }.to_string(),
            ),
        ]
    }
}

/// Facts about the file itself, gathered without running any tool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileInfo {
    pub path: PathBuf,
    pub file_name: String,
    pub size_bytes: u64,
    pub title: String,
    pub subtitle: Option<String>,
}

impl FileInfo {
    /// Read file metadata and derive a title from the file stem.
    pub fn from_path(path: &Path) -> Result<Self> {
        let size_bytes = std::fs::metadata(path)?.len();
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let stem = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        let (title, subtitle) = split_title(&stem);

        Ok(Self {
            path: path.to_path_buf(),
            file_name,
            size_bytes,
            title,
            subtitle,
        })
    }

    /// Size in mebibytes with two decimals, e.g. `12.50 MB`.
    pub fn size_display(&self) -> String {
        format!("{:.2} MB", self.size_bytes as f64 / (1024.0 * 1024.0))
    }
}

/// Combined result of a probe job.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProbeReport {
    pub file: FileInfo,
    pub media: MediaReport,
}

/// Split a stem on the first separator it contains, in `_ - . space` order.
pub fn split_title(stem: &str) -> (String, Option<String>) {
    for sep in TITLE_SEPARATORS {
        if let Some((head, tail)) = stem.split_once(sep) {
            return (head.to_string(), Some(tail.to_string()));
        }
    }
    (stem.to_string(), None)
}

/// Format seconds as `HH:MM:SS`, truncating fractions.
pub fn format_duration(seconds: f64) -> String {
    if !seconds.is_finite() || seconds < 0.0 {
        return UNKNOWN.to_string();
    }
    let total = seconds as u64;
    format!(
        "{:02}:{:02}:{:02}",
        total / 3600,
        (total % 3600) / 60,
        total % 60
    )
}

/// Format bits per second as `x.x Mbps`, `N kbps`, or `N bps`.
pub fn format_bitrate(bps: u64) -> String {
    if bps >= 1_000_000 {
        format!("{:.1} Mbps", bps as f64 / 1_000_000.0)
    } else if bps >= 1000 {
        format!("{:.0} kbps", bps as f64 / 1000.0)
    } else {
        format!("{bps} bps")
    }
}

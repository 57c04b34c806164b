//! Media probing through ffprobe.
//!
//! A probe first asks ffprobe for JSON. If that output cannot be parsed, or
//! the invocation fails for any reason other than a timeout or cancellation,
//! a cheaper plain-text invocation is tried before giving up.

mod fallback;
mod ffprobe;
mod types;

pub use fallback::parse_plain;
pub use ffprobe::{parse_frame_rate, parse_json};
pub use types::{
    format_bitrate, format_duration, split_title, FileInfo, MediaReport, ProbeReport,
    ProbeSource, Resolution, UNKNOWN,
};

use std::io::Read;
use std::path::{Path, PathBuf};
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::command::ToolCommand;
use crate::{Error, Result};

/// Bytes read from the head of a file to decide whether it is usable.
const SNIFF_BYTES: usize = 100;

/// Time budgets for the two probe invocations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProbeOptions {
    pub timeout: Duration,
    pub fallback_timeout: Duration,
}

impl Default for ProbeOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            fallback_timeout: Duration::from_secs(15),
        }
    }
}

/// Runs ffprobe against a file and normalizes the result.
#[derive(Debug, Clone)]
pub struct Prober {
    ffprobe: PathBuf,
    options: ProbeOptions,
}

impl Prober {
    pub fn new(ffprobe: impl Into<PathBuf>) -> Self {
        Self {
            ffprobe: ffprobe.into(),
            options: ProbeOptions::default(),
        }
    }

    pub fn with_options(mut self, options: ProbeOptions) -> Self {
        self.options = options;
        self
    }

    /// Check the file, gather file info, then probe the media streams.
    pub async fn probe(
        &self,
        path: &Path,
        cancel: Option<&CancellationToken>,
    ) -> Result<ProbeReport> {
        check_readable(path)?;
        let file = FileInfo::from_path(path)?;
        let media = self.probe_media(path, cancel).await?;
        Ok(ProbeReport { file, media })
    }

    /// Probe media streams, falling back to plain-text output when needed.
    pub async fn probe_media(
        &self,
        path: &Path,
        cancel: Option<&CancellationToken>,
    ) -> Result<MediaReport> {
        let err = match self.probe_json(path, cancel).await {
            Ok(report) => return Ok(report),
            Err(e) if e.is_timeout() || e.is_cancelled() => return Err(e),
            Err(e) => e,
        };

        warn!(file = %path.display(), error = %err, "JSON probe failed, trying plain-text fallback");

        match self.probe_fallback(path, cancel).await {
            Ok(report) => Ok(report),
            Err(fallback_err) if fallback_err.is_cancelled() => Err(fallback_err),
            Err(fallback_err) => {
                debug!(file = %path.display(), error = %fallback_err, "Fallback probe failed");
                Err(err)
            }
        }
    }

    async fn probe_json(
        &self,
        path: &Path,
        cancel: Option<&CancellationToken>,
    ) -> Result<MediaReport> {
        let mut cmd = ToolCommand::new(&self.ffprobe);
        cmd.args(["-v", "error", "-print_format", "json", "-show_format", "-show_streams"])
            .arg(path)
            .timeout(self.options.timeout);
        if let Some(token) = cancel {
            cmd.cancel_on(token.clone());
        }

        let output = cmd.execute().await?;
        let stdout = output.stdout_text();
        if stdout.trim().is_empty() {
            return Err(Error::parse_error(
                "ffprobe",
                "empty output, format unsupported or file damaged",
            ));
        }
        parse_json(&stdout)
    }

    async fn probe_fallback(
        &self,
        path: &Path,
        cancel: Option<&CancellationToken>,
    ) -> Result<MediaReport> {
        let mut cmd = ToolCommand::new(&self.ffprobe);
        cmd.args([
            "-v",
            "quiet",
            "-show_entries",
            "format=duration,size,bit_rate:stream=codec_type,codec_name,width,height",
            "-of",
            "default=noprint_wrappers=1:nokey=1",
        ])
        .arg(path)
        .timeout(self.options.fallback_timeout);
        if let Some(token) = cancel {
            cmd.cancel_on(token.clone());
        }

        let output = cmd.execute().await?;
        Ok(parse_plain(&output.stdout_text()))
    }
}

/// Verify the file exists and its first bytes can be read.
pub fn check_readable(path: &Path) -> Result<()> {
    if !path.exists() {
        return Err(Error::file_not_found(path));
    }
    let mut head = [0u8; SNIFF_BYTES];
    let read = std::fs::File::open(path)?.read(&mut head)?;
    if read == 0 {
        return Err(Error::InvalidInput(format!(
            "{} is empty or damaged",
            path.display()
        )));
    }
    Ok(())
}

//! Single-frame thumbnail extraction through ffmpeg.
//!
//! ffmpeg writes one MJPEG frame to stdout; nothing touches the disk.

use std::path::{Path, PathBuf};
use std::time::Duration;

use image::ImageFormat;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use crate::command::ToolCommand;
use crate::{Error, Result};

/// Size, quality, and time budget for thumbnail extraction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThumbnailOptions {
    pub width: u32,
    pub height: u32,
    /// MJPEG quality scale passed to `-q:v` (2 best .. 31 worst).
    pub quality: u8,
    /// Offset of the extracted frame from the start of the file.
    pub seek: Duration,
    pub timeout: Duration,
}

impl Default for ThumbnailOptions {
    fn default() -> Self {
        Self {
            width: 80,
            height: 45,
            quality: 3,
            seek: Duration::from_secs(1),
            timeout: Duration::from_secs(10),
        }
    }
}

/// An encoded JPEG frame with its decoded dimensions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Thumbnail {
    pub bytes: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

impl Thumbnail {
    /// Write the JPEG bytes to `path`.
    pub fn save(&self, path: &Path) -> Result<()> {
        std::fs::write(path, &self.bytes)?;
        Ok(())
    }
}

/// Extracts thumbnails with a configured ffmpeg binary.
#[derive(Debug, Clone)]
pub struct ThumbnailExtractor {
    ffmpeg: PathBuf,
    options: ThumbnailOptions,
}

impl ThumbnailExtractor {
    pub fn new(ffmpeg: impl Into<PathBuf>) -> Self {
        Self {
            ffmpeg: ffmpeg.into(),
            options: ThumbnailOptions::default(),
        }
    }

    pub fn with_options(mut self, options: ThumbnailOptions) -> Self {
        self.options = options;
        self
    }

    pub fn options(&self) -> &ThumbnailOptions {
        &self.options
    }

    /// Build the ffmpeg argument list for `path`.
    pub fn args(&self, path: &Path) -> Vec<String> {
        let o = &self.options;
        vec![
            "-i".into(),
            path.to_string_lossy().into_owned(),
            "-ss".into(),
            seek_timestamp(o.seek),
            "-vframes".into(),
            "1".into(),
            "-f".into(),
            "image2pipe".into(),
            "-vcodec".into(),
            "mjpeg".into(),
            "-s".into(),
            format!("{}x{}", o.width, o.height),
            "-q:v".into(),
            o.quality.to_string(),
            "-vf".into(),
            "scale=flags=lanczos".into(),
            "-threads".into(),
            "1".into(),
            "-".into(),
        ]
    }

    /// Extract and validate one frame.
    pub async fn extract(
        &self,
        path: &Path,
        cancel: Option<&CancellationToken>,
    ) -> Result<Thumbnail> {
        if !path.exists() {
            return Err(Error::file_not_found(path));
        }

        let mut cmd = ToolCommand::new(&self.ffmpeg);
        cmd.args(self.args(path)).timeout(self.options.timeout);
        if let Some(token) = cancel {
            cmd.cancel_on(token.clone());
        }

        let output = cmd.execute().await?;
        decode_thumbnail(output.stdout)
    }
}

/// Validate raw ffmpeg output as a JPEG image.
pub fn decode_thumbnail(bytes: Vec<u8>) -> Result<Thumbnail> {
    if bytes.is_empty() {
        return Err(Error::parse_error("ffmpeg", "no image data"));
    }
    let image = image::load_from_memory_with_format(&bytes, ImageFormat::Jpeg)?;
    Ok(Thumbnail {
        width: image.width(),
        height: image.height(),
        bytes,
    })
}

fn seek_timestamp(offset: Duration) -> String {
    let secs = offset.as_secs();
    format!("{:02}:{:02}:{:02}", secs / 3600, (secs % 3600) / 60, secs % 60)
}

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use videoinsight_av::{ProbeOptions, ThumbnailOptions, ToolPaths};

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub extensions: ExtensionsConfig,

    #[serde(default)]
    pub settings: SettingsConfig,

    #[serde(default)]
    pub tools: ToolsConfig,

    #[serde(default)]
    pub jobs: JobsConfig,

    #[serde(default)]
    pub thumbnails: ThumbnailConfig,

    #[serde(default)]
    pub ui: UiConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ExtensionsConfig {
    /// Flat directory scanned for `.ext` manifests
    #[serde(default = "default_extensions_dir")]
    pub dir: PathBuf,
}

fn default_extensions_dir() -> PathBuf {
    PathBuf::from("./plugins")
}

impl Default for ExtensionsConfig {
    fn default() -> Self {
        Self {
            dir: default_extensions_dir(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SettingsConfig {
    /// TOML file holding persisted settings such as the enabled-set
    #[serde(default = "default_settings_path")]
    pub path: PathBuf,
}

fn default_settings_path() -> PathBuf {
    PathBuf::from("./videoinsight-settings.toml")
}

impl Default for SettingsConfig {
    fn default() -> Self {
        Self {
            path: default_settings_path(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ToolsConfig {
    #[serde(default)]
    pub ffmpeg_path: Option<PathBuf>,

    #[serde(default)]
    pub ffprobe_path: Option<PathBuf>,
}

impl ToolsConfig {
    pub fn resolve(&self) -> ToolPaths {
        ToolPaths::resolve(self.ffmpeg_path.as_deref(), self.ffprobe_path.as_deref())
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct JobsConfig {
    /// Concurrency ceiling of the background work queue
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent: usize,

    #[serde(default = "default_probe_timeout")]
    pub probe_timeout_secs: u64,

    #[serde(default = "default_fallback_timeout")]
    pub fallback_timeout_secs: u64,

    #[serde(default = "default_thumbnail_timeout")]
    pub thumbnail_timeout_secs: u64,

    #[serde(default = "default_tag_timeout")]
    pub tag_timeout_secs: u64,

    /// How long teardown waits for a cancelled worker to acknowledge
    #[serde(default = "default_cancel_grace")]
    pub cancel_grace_ms: u64,
}

fn default_max_concurrent() -> usize {
    3
}

fn default_probe_timeout() -> u64 {
    30
}

fn default_fallback_timeout() -> u64 {
    15
}

fn default_thumbnail_timeout() -> u64 {
    10
}

fn default_tag_timeout() -> u64 {
    900
}

fn default_cancel_grace() -> u64 {
    2000
}

impl Default for JobsConfig {
    fn default() -> Self {
        Self {
            max_concurrent: default_max_concurrent(),
            probe_timeout_secs: default_probe_timeout(),
            fallback_timeout_secs: default_fallback_timeout(),
            thumbnail_timeout_secs: default_thumbnail_timeout(),
            tag_timeout_secs: default_tag_timeout(),
            cancel_grace_ms: default_cancel_grace(),
        }
    }
}

impl JobsConfig {
    pub fn probe_options(&self) -> ProbeOptions {
        ProbeOptions {
            timeout: Duration::from_secs(self.probe_timeout_secs),
            fallback_timeout: Duration::from_secs(self.fallback_timeout_secs),
        }
    }

    pub fn tag_timeout(&self) -> Duration {
        Duration::from_secs(self.tag_timeout_secs)
    }

    pub fn cancel_grace(&self) -> Duration {
        Duration::from_millis(self.cancel_grace_ms)
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ThumbnailConfig {
    #[serde(default = "default_thumb_width")]
    pub width: u32,

    #[serde(default = "default_thumb_height")]
    pub height: u32,

    /// MJPEG quality scale, 2 (best) to 31
    #[serde(default = "default_thumb_quality")]
    pub quality: u8,

    #[serde(default = "default_thumb_seek")]
    pub seek_secs: u64,
}

fn default_thumb_width() -> u32 {
    80
}

fn default_thumb_height() -> u32 {
    45
}

fn default_thumb_quality() -> u8 {
    3
}

fn default_thumb_seek() -> u64 {
    1
}

impl Default for ThumbnailConfig {
    fn default() -> Self {
        Self {
            width: default_thumb_width(),
            height: default_thumb_height(),
            quality: default_thumb_quality(),
            seek_secs: default_thumb_seek(),
        }
    }
}

impl ThumbnailConfig {
    pub fn options(&self, timeout_secs: u64) -> ThumbnailOptions {
        ThumbnailOptions {
            width: self.width,
            height: self.height,
            quality: self.quality,
            seek: Duration::from_secs(self.seek_secs),
            timeout: Duration::from_secs(timeout_secs),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct UiConfig {
    /// Whether transient status messages are shown
    #[serde(default = "default_true")]
    pub status_bar: bool,
}

fn default_true() -> bool {
    true
}

impl Default for UiConfig {
    fn default() -> Self {
        Self {
            status_bar: default_true(),
        }
    }
}

mod types;

pub use types::*;

use anyhow::{Context, Result};
use std::path::Path;

/// Load configuration from a TOML file
pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {:?}", path))?;

    let mut config: Config = toml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {:?}", path))?;

    validate_config(&config)?;
    expand_paths(&mut config);

    Ok(config)
}

/// Load config from default locations or return default config
pub fn load_config_or_default(custom_path: Option<&Path>) -> Result<Config> {
    if let Some(path) = custom_path {
        return load_config(path);
    }

    let default_paths = [
        "./videoinsight.toml",
        "~/.config/videoinsight/config.toml",
    ];

    for path_str in default_paths {
        let path = shellexpand::tilde(path_str);
        let path = Path::new(path.as_ref());
        if path.exists() {
            return load_config(path);
        }
    }

    Ok(Config::default())
}

/// Expand `~` in every configured path
fn expand_paths(config: &mut Config) {
    fn expand(path: &mut std::path::PathBuf) {
        if let Some(s) = path.to_str() {
            *path = std::path::PathBuf::from(shellexpand::tilde(s).as_ref());
        }
    }

    expand(&mut config.extensions.dir);
    expand(&mut config.settings.path);
    if let Some(p) = config.tools.ffmpeg_path.as_mut() {
        expand(p);
    }
    if let Some(p) = config.tools.ffprobe_path.as_mut() {
        expand(p);
    }
}

/// Validate configuration
fn validate_config(config: &Config) -> Result<()> {
    if config.jobs.max_concurrent == 0 {
        anyhow::bail!("jobs.max_concurrent must be at least 1");
    }

    let timeouts = [
        ("probe_timeout_secs", config.jobs.probe_timeout_secs),
        ("fallback_timeout_secs", config.jobs.fallback_timeout_secs),
        ("thumbnail_timeout_secs", config.jobs.thumbnail_timeout_secs),
        ("tag_timeout_secs", config.jobs.tag_timeout_secs),
    ];
    for (name, secs) in timeouts {
        if secs == 0 {
            anyhow::bail!("jobs.{} cannot be 0", name);
        }
    }

    if config.thumbnails.width == 0 || config.thumbnails.height == 0 {
        anyhow::bail!("Thumbnail size cannot be 0");
    }

    if !(2..=31).contains(&config.thumbnails.quality) {
        tracing::warn!(
            "thumbnails.quality {} is outside ffmpeg's 2..=31 range",
            config.thumbnails.quality
        );
    }

    for (name, path) in [
        ("ffmpeg", &config.tools.ffmpeg_path),
        ("ffprobe", &config.tools.ffprobe_path),
    ] {
        if let Some(path) = path {
            if !path.exists() {
                tracing::warn!("Configured {} path does not exist: {:?}", name, path);
            }
        }
    }

    Ok(())
}

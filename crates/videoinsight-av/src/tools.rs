//! External tool detection and path resolution.

use crate::{Error, Result};
use std::path::{Path, PathBuf};
use std::process::Command;

/// Information about an external tool.
#[derive(Debug, Clone)]
pub struct ToolInfo {
    /// Name of the tool.
    pub name: String,
    /// Whether the tool is available.
    pub available: bool,
    /// Version string if available.
    pub version: Option<String>,
    /// Path to the tool executable.
    pub path: Option<PathBuf>,
}

/// Resolved locations of the tools the job wrappers shell out to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolPaths {
    pub ffmpeg: PathBuf,
    pub ffprobe: PathBuf,
}

impl ToolPaths {
    /// Resolve tool paths, preferring configured paths over `PATH` lookup.
    ///
    /// A tool that cannot be found keeps its bare name so the eventual spawn
    /// reports [`Error::ToolNotFound`] for the job that needed it.
    pub fn resolve(ffmpeg: Option<&Path>, ffprobe: Option<&Path>) -> Self {
        Self {
            ffmpeg: get_tool_path("ffmpeg", ffmpeg).unwrap_or_else(|_| PathBuf::from("ffmpeg")),
            ffprobe: get_tool_path("ffprobe", ffprobe).unwrap_or_else(|_| PathBuf::from("ffprobe")),
        }
    }
}

impl Default for ToolPaths {
    fn default() -> Self {
        Self::resolve(None, None)
    }
}

/// Check if a tool is available and get its information.
///
/// # Example
///
/// ```no_run
/// use videoinsight_av::check_tool;
///
/// let info = check_tool("ffprobe");
/// if info.available {
///     println!("ffprobe version: {:?}", info.version);
/// }
/// ```
pub fn check_tool(name: &str) -> ToolInfo {
    check_tool_with_arg(name, "-version")
}

/// Check if a tool is available using a custom version argument.
pub fn check_tool_with_arg(name: &str, version_arg: &str) -> ToolInfo {
    let result = Command::new(name).arg(version_arg).output();

    match result {
        Ok(output) if output.status.success() => {
            let version = String::from_utf8_lossy(&output.stdout)
                .lines()
                .next()
                .map(|s| s.to_string());

            let path = which::which(name).ok();

            ToolInfo {
                name: name.to_string(),
                available: true,
                version,
                path,
            }
        }
        _ => ToolInfo {
            name: name.to_string(),
            available: false,
            version: None,
            path: None,
        },
    }
}

/// Check the tools used by probe, thumbnail, and tag jobs.
pub fn check_tools(paths: &ToolPaths) -> Vec<ToolInfo> {
    [("ffmpeg", &paths.ffmpeg), ("ffprobe", &paths.ffprobe)]
        .into_iter()
        .map(|(name, path)| {
            let mut info = check_tool(&path.to_string_lossy());
            info.name = name.to_string();
            if info.available && info.path.is_none() {
                info.path = Some(path.clone());
            }
            info
        })
        .collect()
}

/// Require that a tool is available, returning its path.
///
/// # Errors
///
/// Returns an error if the tool is not found.
pub fn require_tool(name: &str) -> Result<PathBuf> {
    which::which(name).map_err(|_| Error::tool_not_found(name))
}

/// Get the path to a tool, preferring a configured path over PATH lookup.
pub fn get_tool_path(name: &str, config_path: Option<&Path>) -> Result<PathBuf> {
    if let Some(path) = config_path {
        if path.exists() {
            return Ok(path.to_path_buf());
        }
    }

    require_tool(name)
}

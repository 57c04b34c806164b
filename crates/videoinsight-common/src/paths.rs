//! Path utilities for detecting and collecting video files.

use std::path::{Path, PathBuf};

use walkdir::WalkDir;

/// Video file extensions accepted when adding files or folders.
pub const VIDEO_EXTENSIONS: &[&str] = &[
    "mp4", "avi", "mov", "mkv", "flv", "wmv", "mpeg", "mpg", "webm", "xl",
];

/// Check if a path has a video file extension (case-insensitive).
///
/// # Examples
///
/// ```
/// use std::path::Path;
/// use videoinsight_common::paths::is_video_file;
///
/// assert!(is_video_file(Path::new("movie.MKV")));
/// assert!(is_video_file(Path::new("/path/to/clip.xl")));
/// assert!(!is_video_file(Path::new("subtitle.srt")));
/// ```
pub fn is_video_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| VIDEO_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
        .unwrap_or(false)
}

/// Recursively collect every video file under `dir`, sorted by path.
///
/// Unreadable entries are skipped.
pub fn collect_video_files(dir: &Path) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = WalkDir::new(dir)
        .follow_links(true)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file() && is_video_file(e.path()))
        .map(|e| e.into_path())
        .collect();
    files.sort();
    files
}

/// Expand a mix of files and directories into a flat list of files.
///
/// Directories contribute their video files; plain paths are kept as given
/// (even when they do not exist, so the caller can report them per file).
/// Duplicates are dropped, first occurrence wins.
pub fn expand_inputs<I, P>(inputs: I) -> Vec<PathBuf>
where
    I: IntoIterator<Item = P>,
    P: AsRef<Path>,
{
    let mut out: Vec<PathBuf> = Vec::new();
    for input in inputs {
        let input = input.as_ref();
        let batch = if input.is_dir() {
            collect_video_files(input)
        } else {
            vec![input.to_path_buf()]
        };
        for path in batch {
            if !out.contains(&path) {
                out.push(path);
            }
        }
    }
    out
}

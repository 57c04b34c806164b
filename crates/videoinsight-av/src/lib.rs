//! # videoinsight-av
//!
//! External media tool plumbing for videoinsight.
//!
//! This crate provides:
//! - [`ToolCommand`]: runs a tool with a timeout and a cancellation token,
//!   killing the tool's whole process group when either fires
//! - [`Prober`]: ffprobe JSON probing with a plain-text fallback
//! - [`ThumbnailExtractor`]: single-frame JPEG extraction through ffmpeg
//! - [`TagEditor`]: container tag edit/clear with stream copy
//! - tool detection helpers
//!
//! ## Example
//!
//! ```no_run
//! use videoinsight_av::{Prober, ToolPaths};
//!
//! # async fn example() -> videoinsight_av::Result<()> {
//! let tools = ToolPaths::default();
//! let report = Prober::new(&tools.ffprobe)
//!     .probe("/path/to/video.mkv".as_ref(), None)
//!     .await?;
//! println!("{} {}", report.file.file_name, report.media.duration_display());
//! # Ok(())
//! # }
//! ```

mod blocking;
mod command;
mod error;
pub mod probe;
pub mod tags;
pub mod thumbnail;
pub mod tools;

pub use blocking::block_on;
pub use command::{ToolCommand, ToolOutput};
pub use error::{Error, Result};
pub use probe::{FileInfo, MediaReport, ProbeOptions, ProbeReport, Prober};
pub use tags::{BatchReport, TagEdit, TagEditor};
pub use thumbnail::{Thumbnail, ThumbnailExtractor, ThumbnailOptions};
pub use tools::{check_tool, check_tools, require_tool, ToolInfo, ToolPaths};

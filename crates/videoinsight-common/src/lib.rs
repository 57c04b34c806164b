//! Videoinsight-Common: shared types and utilities.
//!
//! - **Typed IDs**: [`JobId`] for background jobs tracked by the work queue
//! - **Core Types**: [`JobKind`] and [`JobState`]
//! - **Path Utilities**: video file detection and recursive folder collection
//!
//! # Examples
//!
//! ```
//! use videoinsight_common::{JobId, JobKind};
//! use videoinsight_common::paths::is_video_file;
//! use std::path::Path;
//!
//! let id = JobId::new();
//! assert_eq!(JobKind::Probe.to_string(), "probe");
//! assert!(is_video_file(Path::new("clip.webm")));
//! # let _ = id;
//! ```

pub mod ids;
pub mod paths;
pub mod types;

pub use ids::*;
pub use paths::{expand_inputs, is_video_file};
pub use types::*;

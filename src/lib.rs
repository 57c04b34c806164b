//! videoinsight - video file inspector with loadable extensions
//!
//! This library crate exposes the core functionality for integration testing.

pub mod config;
pub mod extensions;
pub mod host;
pub mod jobs;
pub mod settings;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "videoinsight")]
#[command(author, version, about = "Video file inspector with loadable extensions")]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Probe and thumbnail files or directories of videos
    Analyze {
        /// Files or directories to analyse
        #[arg(required = true)]
        paths: Vec<PathBuf>,

        /// Output as JSON
        #[arg(long)]
        json: bool,

        /// Directory to write thumbnails into
        #[arg(long)]
        thumbnails: Option<PathBuf>,

        /// Write a plain-text report to this file
        #[arg(long)]
        export: Option<PathBuf>,
    },

    /// Probe a single media file and display information
    Probe {
        /// File to probe
        #[arg(required = true)]
        file: PathBuf,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Extract a thumbnail frame from a video
    Thumbnail {
        /// Video file
        #[arg(required = true)]
        file: PathBuf,

        /// Output JPEG path
        #[arg(short, long)]
        output: PathBuf,
    },

    /// Manage extensions
    Extensions {
        #[command(subcommand)]
        action: ExtensionsAction,
    },

    /// Run a command registered by an extension
    Run {
        /// Command id, e.g. metatool.clear
        command: String,

        /// Files or directories to select before running
        files: Vec<PathBuf>,

        /// Command argument as key=value (repeatable)
        #[arg(long = "arg", value_parser = parse_key_value)]
        args: Vec<(String, String)>,
    },

    /// Clear or edit container tags directly
    Tags {
        #[command(subcommand)]
        action: TagsAction,
    },

    /// Check that required external tools are available
    CheckTools,

    /// Validate configuration file
    Validate {
        /// Config file to validate (uses default if not specified)
        #[arg(value_name = "CONFIG")]
        file: Option<PathBuf>,
    },

    /// Display version information
    Version,
}

#[derive(Subcommand)]
pub enum ExtensionsAction {
    /// List discovered extensions with their state
    List,

    /// Enable and load extensions
    Enable {
        #[arg(required = true)]
        names: Vec<String>,
    },

    /// Disable and unload extensions
    Disable {
        #[arg(required = true)]
        names: Vec<String>,
    },

    /// Unload everything, rescan, and load enabled extensions
    Reload,

    /// Install extension manifests (*.ext) or archives (*.zip) and enable them
    Install {
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },

    /// Disable extensions and move their manifests aside
    Remove {
        #[arg(required = true)]
        names: Vec<String>,
    },

    /// Write manifests for the extensions shipped with videoinsight
    InstallBundled,
}

#[derive(Subcommand)]
pub enum TagsAction {
    /// Strip all container and stream metadata
    Clear {
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },

    /// Set title, comment, or language, optionally renaming the file
    Edit {
        #[arg(required = true)]
        files: Vec<PathBuf>,

        #[arg(long)]
        title: Option<String>,

        #[arg(long)]
        comment: Option<String>,

        #[arg(long)]
        language: Option<String>,

        /// New file name without extension
        #[arg(long)]
        rename: Option<String>,
    },
}

fn parse_key_value(s: &str) -> Result<(String, String), String> {
    let (key, value) = s
        .split_once('=')
        .ok_or_else(|| format!("expected key=value, got `{s}`"))?;
    if key.trim().is_empty() {
        return Err(format!("empty key in `{s}`"));
    }
    Ok((key.trim().to_string(), value.to_string()))
}

use std::path::PathBuf;

pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised while discovering, loading, or managing extensions.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The name is absent from the latest scan.
    #[error("extension not found: {0}")]
    NotFound(String),

    /// Loading the code or running its registration entry point failed.
    /// Nothing is retained when this is returned.
    #[error("failed to load extension {name}: {detail}")]
    Load { name: String, detail: String },

    #[error("invalid extension manifest {}: {message}", path.display())]
    Manifest { path: PathBuf, message: String },

    #[error("invalid extension archive {}: {message}", path.display())]
    Archive { path: PathBuf, message: String },

    /// Only ever logged; unloading proceeds regardless.
    #[error("extension {name} failed to unregister: {detail}")]
    Deregistration { name: String, detail: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    pub fn load(name: impl Into<String>, detail: impl Into<String>) -> Self {
        Self::Load {
            name: name.into(),
            detail: detail.into(),
        }
    }

    pub fn manifest(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::Manifest {
            path: path.into(),
            message: message.into(),
        }
    }

    pub fn archive(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::Archive {
            path: path.into(),
            message: message.into(),
        }
    }
}

use std::path::PathBuf;
use thiserror::Error;

/// Core error type for hoister operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Expected early-exit condition (started outside a project root,
    /// modules folder absent). Reported at info level, exit code 0.
    #[error("{0}")]
    Uncritical(String),

    /// A manifest could not be read or parsed.
    #[error("Failed to read manifest at {}: {message}", path.display())]
    Manifest { path: PathBuf, message: String },

    /// The external installer exited with a non-zero status.
    #[error("Installer failed in {} (exit code {code:?})", target.display())]
    Installer {
        target: PathBuf,
        code: Option<i32>,
        stderr: String,
    },

    /// A post-install hook exited with a non-zero status.
    #[error("Post-install hook failed in {} (exit code {code:?})", module.display())]
    Hook { module: PathBuf, code: Option<i32> },

    /// A request exhausted its candidate list without a placement.
    /// This cannot happen on well-formed input; it indicates a bug.
    #[error("Placement invariant violated: {0}")]
    PlacementInvariant(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    #[must_use]
    pub fn uncritical(msg: impl Into<String>) -> Self {
        Self::Uncritical(msg.into())
    }

    #[must_use]
    pub fn manifest(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::Manifest {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Whether this error should terminate the run with a non-zero exit.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        !matches!(self, Self::Uncritical(_))
    }
}

//! Error types for autosquash-core.

use std::path::PathBuf;

/// Result type alias using [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in autosquash-core operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A hunk path is absolute or resolves outside the repository root.
    #[error("unsafe path '{path}': {reason}")]
    UnsafePath { path: PathBuf, reason: String },

    /// A recorded change could not be located in the file at the target commit.
    #[error("cannot locate change in {file}: {line:?}")]
    PatchCorrection { file: String, line: String },

    /// The pre-attempt snapshot could not be created.
    #[error("backup failed: {0}")]
    Backup(String),

    /// Restoring the pre-attempt snapshot failed.
    #[error("rollback failed: {0}")]
    Rollback(String),

    /// Configuration value out of range or unparseable.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// IO error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// TOML parsing error.
    #[error("toml error: {0}")]
    Toml(#[from] toml::de::Error),

    /// Git operation error.
    #[error("git error: {0}")]
    Git(#[from] autosquash_git::Error),
}

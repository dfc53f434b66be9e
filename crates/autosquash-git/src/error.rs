//! Error types for autosquash-git.

/// Result type alias using [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur during git operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Not inside a git repository (or the repository is bare).
    #[error("not a git repository")]
    NotARepository,

    /// HEAD is detached (not on a branch).
    #[error("HEAD is detached - checkout a branch first")]
    DetachedHead,

    /// Reference or revision could not be resolved.
    #[error("reference not found: {0}")]
    RefNotFound(String),

    /// Rebase stopped with unmerged paths.
    #[error("rebase conflict in: {0:?}")]
    RebaseConflict(Vec<String>),

    /// Rebase failed for a reason other than conflicts.
    #[error("rebase failed: {0}")]
    RebaseFailed(String),

    /// A git subprocess exited with a non-zero status.
    #[error("`git {command}` failed: {stderr}")]
    CommandFailed {
        /// The git arguments, space separated.
        command: String,
        /// Trimmed stderr of the failed invocation.
        stderr: String,
    },

    /// A git subprocess exceeded its wall-clock limit and was killed.
    #[error("`git {command}` timed out after {seconds}s")]
    Timeout {
        /// The git arguments, space separated.
        command: String,
        /// The limit that was exceeded.
        seconds: u64,
    },

    /// IO error (spawning git, reading files, writing patches).
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Underlying git2 error.
    #[error("git error: {0}")]
    Git2(#[from] git2::Error),
}

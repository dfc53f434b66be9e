//! # autosquash-git
//!
//! Git access layer for autosquash, built on git2-rs and the git CLI.
//! Provides the hunk model, blame parsing, stash/worktree/index primitives
//! and the interactive-rebase plumbing the engines drive.

mod blame;
mod command;
mod diff;
mod error;
mod rebase;
mod repository;
mod traits;

pub use blame::{BlameInfo, parse_blame_output};
pub use command::{DEFAULT_TIMEOUT, GitCommand, GitOutput};
pub use diff::{DiffHunk, DiffLine, DiffSource, LineKind, parse_diff_hunks};
pub use error::{Error, Result};
pub use rebase::{RebaseStep, edit_todo};
pub use repository::{ApplyOptions, Repository};
pub use traits::BlameOps;

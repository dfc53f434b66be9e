//! Trait abstractions for git operations.
//!
//! The target resolver only needs blame and hash lookups; putting them behind
//! a trait lets it run against a scripted mock in unit tests.

use crate::{BlameInfo, Repository, Result};

/// Blame-related queries used during target resolution.
#[allow(clippy::missing_errors_doc)]
pub trait BlameOps {
    /// Blame lines `start..=end` of `file_path` at HEAD.
    fn blame_range(&self, file_path: &str, start: u32, end: u32) -> Result<Vec<BlameInfo>>;

    /// Expand an abbreviated commit hash to the full hash.
    fn expand_hash(&self, short: &str) -> Result<String>;

    /// Number of lines of `file_path` at HEAD, `None` if it does not exist there.
    fn line_count_at_head(&self, file_path: &str) -> Result<Option<u32>>;
}

impl BlameOps for Repository {
    fn blame_range(&self, file_path: &str, start: u32, end: u32) -> Result<Vec<BlameInfo>> {
        Self::blame_range(self, file_path, start, end)
    }

    fn expand_hash(&self, short: &str) -> Result<String> {
        self.rev_parse(short)
    }

    fn line_count_at_head(&self, file_path: &str) -> Result<Option<u32>> {
        self.file_line_count("HEAD", file_path)
    }
}

//! Apply each hunk straight to the working tree.

use autosquash_git::{ApplyOptions, DiffHunk, Repository};
use tracing::debug;

use super::patch_file;
use crate::error::Result;

pub(super) fn apply(repo: &Repository, hunks: &[DiffHunk]) -> Result<()> {
    let root = repo.root()?;
    for hunk in hunks {
        let creates = hunk.is_file_creation() && !root.join(&hunk.file_path).exists();
        let patch = patch_file(hunk.to_patch(creates).as_bytes())?;
        repo.apply_patch(patch.path(), ApplyOptions::check(), None)?;
        repo.apply_patch(patch.path(), ApplyOptions::default(), None)?;
        debug!(path = %hunk.file_path, "applied hunk");
    }
    Ok(())
}

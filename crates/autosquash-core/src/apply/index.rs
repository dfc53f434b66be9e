//! Stage hunks one by one into the index, then carry the staged diff over.
//!
//! The index is put back to its captured tree whatever happens, so staging
//! never leaks into the user's index.

use autosquash_git::{ApplyOptions, DiffHunk, Repository};
use tracing::warn;

use super::{apply_to_working_tree, patch_file};
use crate::error::Result;

pub(super) fn apply(repo: &Repository, hunks: &[DiffHunk]) -> Result<()> {
    let saved = repo.write_tree()?;

    let staged = stage_hunks(repo, hunks)
        .and_then(|tree| repo.diff_trees(&saved, &tree).map_err(Into::into));
    if let Err(e) = repo.read_tree(&saved) {
        warn!(tree = %saved, "failed to restore index: {e}");
    }

    apply_to_working_tree(repo, &staged?)
}

fn stage_hunks(repo: &Repository, hunks: &[DiffHunk]) -> Result<String> {
    for hunk in hunks {
        let patch = patch_file(hunk.to_patch(hunk.is_file_creation()).as_bytes())?;
        repo.apply_patch(patch.path(), ApplyOptions::cached(), None)?;
    }
    Ok(repo.write_tree()?)
}

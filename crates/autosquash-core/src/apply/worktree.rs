//! Apply hunks inside a throwaway detached checkout of HEAD.
//!
//! The index and working tree of the main checkout are only touched by the
//! final combined patch, after it passed a dry run.

use std::path::{Path, PathBuf};

use autosquash_git::{ApplyOptions, DiffHunk, Repository};
use tempfile::TempDir;
use tracing::{debug, warn};

use super::{apply_to_working_tree, patch_file};
use crate::error::Result;

/// Linked worktree removed (with its directory) on drop.
struct WorktreeHandle<'r> {
    repo: &'r Repository,
    path: PathBuf,
    // Dropped after `Drop::drop` has unregistered the worktree
    _dir: TempDir,
}

impl<'r> WorktreeHandle<'r> {
    fn create(repo: &'r Repository) -> Result<Self> {
        let dir = tempfile::Builder::new()
            .prefix("autosquash-worktree-")
            .tempdir()?;
        let path = dir.path().join("checkout");
        repo.worktree_add_detached(&path, "HEAD")?;
        debug!(path = %path.display(), "created worktree");
        Ok(Self {
            repo,
            path,
            _dir: dir,
        })
    }

    fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for WorktreeHandle<'_> {
    fn drop(&mut self) {
        if let Err(e) = self.repo.worktree_remove(&self.path) {
            warn!(path = %self.path.display(), "failed to remove worktree: {e}");
        }
    }
}

pub(super) fn apply(repo: &Repository, hunks: &[DiffHunk]) -> Result<()> {
    let worktree = WorktreeHandle::create(repo)?;

    for hunk in hunks {
        let creates = hunk.is_file_creation() && !worktree.path().join(&hunk.file_path).exists();
        let patch = patch_file(hunk.to_patch(creates).as_bytes())?;
        repo.apply_patch(patch.path(), ApplyOptions::default(), Some(worktree.path()))?;
    }

    repo.git_in(worktree.path())
        .args(["add", "-A"])
        .run_checked()?;
    let combined = repo
        .git_in(worktree.path())
        .args(["diff", "--cached", "--binary", "--no-color", "HEAD"])
        .run_checked_raw()?;
    drop(worktree);

    apply_to_working_tree(repo, &combined)
}

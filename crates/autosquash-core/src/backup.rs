//! Point-in-time snapshot of the working tree for one application attempt.

use autosquash_git::Repository;
use tracing::{debug, info, warn};

use crate::error::{Error, Result};

/// Stash-backed snapshot of tracked and untracked working-tree state.
///
/// The snapshot is settled exactly once: [`discard`](Self::discard) after a
/// successful attempt, or [`restore`](Self::restore) after a failed one.
/// Both consume the backup. A backup dropped without being settled restores
/// itself.
#[derive(Debug)]
pub struct StashBackup<'r> {
    repo: &'r Repository,
    /// `None` when the tree was clean and nothing had to be saved.
    stash: Option<String>,
    settled: bool,
}

impl<'r> StashBackup<'r> {
    /// Snapshot the working tree, leaving it exactly as it was.
    ///
    /// # Errors
    /// Returns `Backup` if the stash cannot be created or re-applied.
    pub fn create(repo: &'r Repository, label: &str) -> Result<Self> {
        let stash = repo
            .stash_push(&format!("autosquash backup: {label}"))
            .map_err(|e| Error::Backup(e.to_string()))?;

        if let Some(hash) = &stash {
            if let Err(e) = repo.stash_apply(hash) {
                // Put the tree back before reporting; the entry is consumed by the pop
                if let Err(pop) = repo.stash_pop(hash) {
                    warn!(%hash, "backup left in stash list: {pop}");
                }
                return Err(Error::Backup(e.to_string()));
            }
            debug!(%hash, %label, "backup created");
        } else {
            debug!(%label, "clean tree, no backup stash needed");
        }

        Ok(Self {
            repo,
            stash,
            settled: false,
        })
    }

    /// Commit hash of the backing stash entry.
    #[must_use]
    pub fn stash(&self) -> Option<&str> {
        self.stash.as_deref()
    }

    /// Drop the snapshot after a successful attempt.
    ///
    /// # Errors
    /// Returns error if the stash entry cannot be dropped.
    pub fn discard(mut self) -> Result<()> {
        self.settled = true;
        if let Some(hash) = &self.stash {
            self.repo.stash_drop(hash)?;
            debug!(%hash, "backup discarded");
        }
        Ok(())
    }

    /// Return the working tree to the snapshot and consume it.
    ///
    /// Tries `stash pop` first. If that fails the tree is reset to HEAD and
    /// the snapshot's paths are checked out, then the entry is dropped.
    ///
    /// # Errors
    /// Returns `Rollback` if neither path restores the tree.
    pub fn restore(mut self) -> Result<()> {
        self.settled = true;
        self.restore_inner()
    }

    fn restore_inner(&self) -> Result<()> {
        let repo = self.repo;
        let rollback = |e: autosquash_git::Error| Error::Rollback(e.to_string());

        repo.reset_hard("HEAD").map_err(rollback)?;
        repo.clean_untracked().map_err(rollback)?;

        let Some(hash) = &self.stash else {
            info!("working tree reset to clean HEAD");
            return Ok(());
        };

        match repo.stash_pop(hash) {
            Ok(()) => {
                info!(%hash, "working tree restored from backup");
                Ok(())
            }
            Err(e) => {
                warn!(%hash, "stash pop failed, checking out backup paths: {e}");
                self.checkout_fallback(hash)
            }
        }
    }

    fn checkout_fallback(&self, hash: &str) -> Result<()> {
        let repo = self.repo;
        let rollback = |e: autosquash_git::Error| Error::Rollback(e.to_string());

        repo.reset_hard("HEAD").map_err(rollback)?;
        repo.clean_untracked().map_err(rollback)?;
        repo.checkout_paths_from(hash).map_err(rollback)?;
        // Checkout staged everything; only the file contents matter here
        repo.read_tree("HEAD").map_err(rollback)?;
        repo.restore_untracked_from(hash).map_err(rollback)?;

        if let Err(e) = repo.stash_drop(hash) {
            warn!(%hash, "could not drop backup after fallback restore: {e}");
        }
        info!(%hash, "working tree restored by checkout fallback");
        Ok(())
    }
}

impl Drop for StashBackup<'_> {
    fn drop(&mut self) {
        if self.settled {
            return;
        }
        warn!("backup dropped unsettled, restoring");
        if let Err(e) = self.restore_inner() {
            warn!("restore of unsettled backup failed: {e}");
        }
    }
}

//! Restore hunks the user chose not to squash into the working tree.
//!
//! Three strategies are tried in order until one succeeds. Every attempt is
//! wrapped in a [`StashBackup`]: success discards it, failure restores it,
//! so a failed attempt leaves the working tree exactly as it found it.

mod index;
mod legacy;
mod worktree;

use std::cell::OnceCell;
use std::fmt;
use std::io::Write as _;

use autosquash_git::{ApplyOptions, DiffHunk, Repository};
use tempfile::NamedTempFile;
use tracing::{debug, info, warn};

use crate::backup::StashBackup;
use crate::config::{ApplyConfig, StrategyChoice};
use crate::error::{Error, Result};
use crate::mapping::HunkTargetMapping;
use crate::safety;

/// A way of getting hunks back into the working tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Strategy {
    /// Apply in a throwaway detached checkout, then carry the diff over.
    Worktree,
    /// Stage each hunk into the index, then carry the staged diff over.
    Index,
    /// Apply each hunk directly to the working tree.
    Legacy,
}

impl Strategy {
    fn apply(self, repo: &Repository, hunks: &[DiffHunk]) -> Result<()> {
        match self {
            Self::Worktree => worktree::apply(repo, hunks),
            Self::Index => index::apply(repo, hunks),
            Self::Legacy => legacy::apply(repo, hunks),
        }
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Worktree => "worktree",
            Self::Index => "index",
            Self::Legacy => "legacy",
        };
        f.write_str(name)
    }
}

/// Picks the strategy order for a repository.
#[derive(Debug, Default)]
pub struct StrategySelector {
    choice: StrategyChoice,
    worktree_supported: OnceCell<bool>,
}

impl StrategySelector {
    #[must_use]
    pub fn new(choice: StrategyChoice) -> Self {
        Self {
            choice,
            worktree_supported: OnceCell::new(),
        }
    }

    /// Strategies to try, best first.
    ///
    /// A forced choice yields only that strategy. Worktree support is probed
    /// once and cached.
    pub fn order(&self, repo: &Repository) -> Vec<Strategy> {
        match self.choice {
            StrategyChoice::Worktree => vec![Strategy::Worktree],
            StrategyChoice::Index => vec![Strategy::Index],
            StrategyChoice::Legacy => vec![Strategy::Legacy],
            StrategyChoice::Auto => {
                let supported = *self
                    .worktree_supported
                    .get_or_init(|| repo.supports_worktree());
                if supported {
                    vec![Strategy::Worktree, Strategy::Index, Strategy::Legacy]
                } else {
                    vec![Strategy::Index, Strategy::Legacy]
                }
            }
        }
    }
}

/// One failed strategy attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StrategyAttempt {
    pub strategy: Strategy,
    pub error: String,
}

impl fmt::Display for StrategyAttempt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.strategy, self.error)
    }
}

/// Outcome of a successful restore.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApplyReport {
    /// Strategy that succeeded; `None` when there was nothing to restore.
    pub strategy: Option<Strategy>,
    pub hunks: usize,
    /// Attempts that failed (and were rolled back) before the success.
    pub failed_attempts: Vec<StrategyAttempt>,
}

/// Why no strategy restored the hunks.
#[derive(Debug, thiserror::Error)]
pub enum ApplyError {
    /// A hunk path is absolute or escapes the repository. Nothing was touched.
    #[error(transparent)]
    UnsafePath(Error),

    /// The pre-attempt snapshot could not be taken. Nothing was touched.
    #[error(transparent)]
    Backup(Error),

    /// Every strategy failed; each attempt was rolled back.
    #[error(
        "could not restore ignored hunks; inspect the working tree and stash list ({})",
        join_attempts(.attempts)
    )]
    AllStrategiesFailed { attempts: Vec<StrategyAttempt> },
}

fn join_attempts(attempts: &[StrategyAttempt]) -> String {
    attempts
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Restores ignored hunks with the first strategy that works.
#[derive(Debug)]
pub struct ApplyHandler<'r> {
    repo: &'r Repository,
    selector: StrategySelector,
}

impl<'r> ApplyHandler<'r> {
    #[must_use]
    pub fn new(repo: &'r Repository, config: &ApplyConfig) -> Self {
        Self {
            repo,
            selector: StrategySelector::new(config.strategy),
        }
    }

    /// Strategies this handler will try, best first.
    #[must_use]
    pub fn strategies(&self) -> Vec<Strategy> {
        self.selector.order(self.repo)
    }

    /// Restore the hunks of `mappings`.
    ///
    /// # Errors
    /// See [`ApplyError`].
    pub fn apply(
        &self,
        mappings: &[HunkTargetMapping],
    ) -> std::result::Result<ApplyReport, ApplyError> {
        let hunks: Vec<DiffHunk> = mappings.iter().map(|m| m.hunk.clone()).collect();
        self.apply_hunks(&hunks)
    }

    /// Restore `hunks` into the working tree.
    ///
    /// # Errors
    /// See [`ApplyError`].
    pub fn apply_hunks(&self, hunks: &[DiffHunk]) -> std::result::Result<ApplyReport, ApplyError> {
        if hunks.is_empty() {
            return Ok(ApplyReport {
                strategy: None,
                hunks: 0,
                failed_attempts: Vec::new(),
            });
        }

        let root = self.repo.root().map_err(|e| ApplyError::UnsafePath(e.into()))?;
        safety::validate_paths(root, hunks.iter().map(|h| h.file_path.as_str()))
            .map_err(ApplyError::UnsafePath)?;

        let mut attempts = Vec::new();
        for strategy in self.strategies() {
            let backup = StashBackup::create(self.repo, &strategy.to_string())
                .map_err(ApplyError::Backup)?;

            debug!(%strategy, hunks = hunks.len(), "attempting restore");
            match strategy.apply(self.repo, hunks) {
                Ok(()) => {
                    if let Err(e) = backup.discard() {
                        warn!(%strategy, "restore succeeded but backup was not dropped: {e}");
                    }
                    info!(%strategy, hunks = hunks.len(), "restored ignored hunks");
                    return Ok(ApplyReport {
                        strategy: Some(strategy),
                        hunks: hunks.len(),
                        failed_attempts: attempts,
                    });
                }
                Err(e) => {
                    warn!(%strategy, "restore attempt failed: {e}");
                    if let Err(rollback) = backup.restore() {
                        warn!(%strategy, "{rollback}");
                    }
                    attempts.push(StrategyAttempt {
                        strategy,
                        error: e.to_string(),
                    });
                }
            }
        }

        Err(ApplyError::AllStrategiesFailed { attempts })
    }
}

/// Write `contents` to a temporary patch file.
fn patch_file(contents: &[u8]) -> Result<NamedTempFile> {
    let mut file = tempfile::Builder::new()
        .prefix("autosquash-")
        .suffix(".patch")
        .tempfile()?;
    file.write_all(contents)?;
    file.flush()?;
    Ok(file)
}

/// Dry-run, then apply, a combined patch to the main working tree.
fn apply_to_working_tree(repo: &Repository, patch: &[u8]) -> Result<()> {
    if patch.is_empty() {
        debug!("combined patch is empty, nothing to apply");
        return Ok(());
    }
    let file = patch_file(patch)?;
    repo.apply_patch(file.path(), ApplyOptions::check(), None)?;
    repo.apply_patch(file.path(), ApplyOptions::default(), None)?;
    Ok(())
}

//! One end-to-end autosquash run over a repository.
//!
//! The session resolves the working-tree hunks, takes the reviewed split
//! into approved and ignored mappings, squashes the approved ones into
//! history and finally rebuilds the working tree from the ignored ones.

use std::path::Path;

use autosquash_git::{DiffSource, Repository};
use tracing::{info, warn};

use crate::apply::{ApplyError, ApplyHandler, ApplyReport};
use crate::config::Config;
use crate::error::{Error, Result};
use crate::mapping::HunkTargetMapping;
use crate::metadata::{GitMetadata, MetadataProvider};
use crate::rebase::{RebaseError, RebaseManager, RebaseSummary};
use crate::resolve::TargetResolver;

/// What to do when the rewrite stops on a conflict.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConflictChoice {
    /// The conflict was resolved in the working tree; carry on.
    Resume,
    /// Give up and restore the original branch and working tree.
    Abort,
}

/// Failure of [`SquashSession::squash`].
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// The rewrite failed or was interrupted; history and tree are restored.
    #[error(transparent)]
    Rebase(#[from] RebaseError),

    /// The caller chose to abort at a conflict; history and tree are restored.
    #[error("rewrite aborted at conflict in {commit}")]
    Aborted { commit: String },

    /// History was rewritten but the ignored hunks could not be restored.
    /// The pre-rewrite working tree is still in `stash`.
    #[error("history rewritten but ignored hunks were not restored: {source}")]
    Restore {
        #[source]
        source: ApplyError,
        stash: Option<String>,
    },

    /// History was rewritten but the untracked files saved before the
    /// rewrite could not be written back. They are still in `stash`.
    #[error("history rewritten but untracked files were not restored: {source}")]
    Untracked {
        #[source]
        source: Error,
        stash: String,
    },

    /// Anything outside the two engines.
    #[error(transparent)]
    Other(#[from] Error),
}

/// Result of a completed session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionOutcome {
    pub rebase: RebaseSummary,
    /// `None` when nothing was rewritten and the tree was left alone.
    pub restore: Option<ApplyReport>,
}

/// Open the repository containing `path` with its autosquash config applied.
///
/// # Errors
/// Returns error if no repository is found or the config is invalid.
pub fn open(path: impl AsRef<Path>) -> Result<(Repository, Config)> {
    let repo = Repository::open(path)?;
    let config = Config::load_for_repo(repo.git_dir())?;
    let repo = repo.with_timeout(config.git_timeout());
    Ok((repo, config))
}

/// Split reviewed mappings into (approved, ignored).
///
/// A mapping is approved when `approve` accepts it and it has a target;
/// everything else stays in the working tree.
pub fn partition(
    mappings: Vec<HunkTargetMapping>,
    mut approve: impl FnMut(&HunkTargetMapping) -> bool,
) -> (Vec<HunkTargetMapping>, Vec<HunkTargetMapping>) {
    mappings
        .into_iter()
        .partition(|m| m.target_commit().is_some() && approve(m))
}

/// Drives resolution, rewrite and restore for one repository.
#[derive(Debug)]
pub struct SquashSession<'r> {
    repo: &'r Repository,
    config: Config,
    merge_base: String,
}

impl<'r> SquashSession<'r> {
    /// Create a session against the discovered merge base.
    ///
    /// # Errors
    /// Returns error if no merge base can be found.
    pub fn new(repo: &'r Repository, config: Config) -> Result<Self> {
        let merge_base = repo.find_merge_base()?;
        Ok(Self::with_merge_base(repo, config, merge_base))
    }

    /// Create a session against an explicit merge base.
    #[must_use]
    pub fn with_merge_base(
        repo: &'r Repository,
        config: Config,
        merge_base: impl Into<String>,
    ) -> Self {
        Self {
            repo,
            config,
            merge_base: merge_base.into(),
        }
    }

    #[must_use]
    pub fn merge_base(&self) -> &str {
        &self.merge_base
    }

    #[must_use]
    pub const fn config(&self) -> &Config {
        &self.config
    }

    /// Metadata provider scoped to this session's merge base.
    #[must_use]
    pub fn metadata(&self) -> GitMetadata<'r> {
        GitMetadata::new(self.repo, self.merge_base.clone())
    }

    /// Resolve every hunk of `source` to a target commit.
    ///
    /// # Errors
    /// Returns error if the diff or commit metadata cannot be read.
    pub fn resolve(&self, source: DiffSource) -> Result<Vec<HunkTargetMapping>> {
        let hunks = self.repo.diff_hunks(source)?;
        let metadata = self.metadata();
        let mut resolver =
            TargetResolver::new(self.repo, &metadata).with_config(self.config.resolve.clone());
        let mappings = resolver.resolve(&hunks)?;
        metadata.clear();

        let pending = mappings.iter().filter(|m| m.needs_user_selection()).count();
        info!(hunks = mappings.len(), pending, "resolved hunks");
        Ok(mappings)
    }

    /// Squash `approved` into history, then rebuild the tree from `ignored`
    /// and bring back the untracked files.
    ///
    /// When nothing is approved the working tree is left untouched. On a
    /// conflict `on_conflict` is asked whether to resume or abort; it can be
    /// asked again if resuming hits another conflict.
    ///
    /// # Errors
    /// See [`SessionError`]. Only `Restore` and `Untracked` leave a stash
    /// behind.
    pub fn squash(
        &self,
        approved: &[HunkTargetMapping],
        ignored: &[HunkTargetMapping],
        mut on_conflict: impl FnMut(&str, &[String]) -> ConflictChoice,
    ) -> std::result::Result<SessionOutcome, SessionError> {
        let mut manager =
            RebaseManager::new(self.repo, self.merge_base.clone()).with_config(&self.config.rebase);

        let mut result = manager.execute(approved);
        let summary = loop {
            match result {
                Err(RebaseError::Conflict { commit, files }) => {
                    match on_conflict(&commit, &files) {
                        ConflictChoice::Resume => result = manager.resume(),
                        ConflictChoice::Abort => {
                            manager.abort()?;
                            return Err(SessionError::Aborted { commit });
                        }
                    }
                }
                other => break other?,
            }
        };

        if summary.targets.is_empty() {
            return Ok(SessionOutcome {
                rebase: summary,
                restore: None,
            });
        }

        let handler = ApplyHandler::new(self.repo, &self.config.apply);
        let report = match handler.apply(ignored) {
            Ok(report) => report,
            Err(source) => {
                if let Some(stash) = &summary.stash {
                    warn!(%stash, "pre-rewrite changes kept in stash");
                }
                return Err(SessionError::Restore {
                    source,
                    stash: summary.stash,
                });
            }
        };

        if let Some(stash) = &summary.stash {
            // Untracked files are not hunks, so only the stash still has them
            match self.repo.restore_untracked_from(stash) {
                Ok(true) => info!(%stash, "restored untracked files"),
                Ok(false) => {}
                Err(e) => {
                    warn!(%stash, "pre-rewrite changes kept in stash");
                    return Err(SessionError::Untracked {
                        source: e.into(),
                        stash: stash.clone(),
                    });
                }
            }
            if let Err(e) = self.repo.stash_drop(stash) {
                warn!(%stash, "could not drop pre-rewrite stash: {e}");
            }
        }
        Ok(SessionOutcome {
            rebase: summary,
            restore: Some(report),
        })
    }
}

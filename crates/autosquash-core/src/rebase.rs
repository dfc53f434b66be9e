//! History rewrite: squash approved hunks into their target commits.
//!
//! Each target gets its own interactive rebase that stops once, at an
//! `edit` entry for the target. While stopped, the target's hunks are
//! re-anchored against the checked-out file content, applied with a 3-way
//! fallback and amended into the commit. Targets are processed oldest
//! first.
//!
//! A rebase rewrites every commit after its target, so later targets are
//! tracked by their position in the branch rather than by hash.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::fs;
use std::io::Write as _;
use std::path::Path;

use autosquash_git::{ApplyOptions, DiffHunk, RebaseStep, Repository, edit_todo};
use tempfile::NamedTempFile;
use tracing::{debug, info, warn};

use crate::config::RebaseConfig;
use crate::error::Error;
use crate::interrupt::InterruptGuard;
use crate::mapping::HunkTargetMapping;
use crate::patch::PatchCorrector;

/// Outcome of a rewrite that did not complete.
#[derive(Debug, thiserror::Error)]
pub enum RebaseError {
    /// Stopped with unmerged paths; resolve them, then resume or abort.
    #[error("conflict while squashing into {commit}: {}", .files.join(", "))]
    Conflict { commit: String, files: Vec<String> },

    /// A SIGINT/SIGTERM arrived; the rewrite was aborted and state restored.
    #[error("interrupted, changes restored")]
    Interrupted,

    /// Unexpected failure; the rewrite was aborted and state restored.
    #[error(transparent)]
    Failed(#[from] Error),
}

impl From<autosquash_git::Error> for RebaseError {
    fn from(e: autosquash_git::Error) -> Self {
        Self::Failed(e.into())
    }
}

type RebaseResult<T> = std::result::Result<T, RebaseError>;

fn refused(reason: impl Into<String>) -> RebaseError {
    Error::Git(autosquash_git::Error::RebaseFailed(reason.into())).into()
}

/// Per-target progress of the state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RebasePhase {
    Idle,
    RebaseStarted,
    PatchCorrected,
    PatchApplied,
    Amended,
    Continued,
    Conflict,
    Aborted,
}

impl fmt::Display for RebasePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::RebaseStarted => "rebase started",
            Self::PatchCorrected => "patch corrected",
            Self::PatchApplied => "patch applied",
            Self::Amended => "amended",
            Self::Continued => "continued",
            Self::Conflict => "conflict",
            Self::Aborted => "aborted",
        };
        f.write_str(name)
    }
}

/// Result of a completed rewrite.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RebaseSummary {
    /// Original hashes of the commits that received hunks, oldest first.
    pub targets: Vec<String>,
    /// Number of hunks squashed.
    pub hunks: usize,
    /// HEAD before the rewrite.
    pub original_head: String,
    /// HEAD after the rewrite.
    pub new_head: String,
    /// Stash holding the working tree as it was before the rewrite. The
    /// caller drops it once the tree has been rebuilt.
    pub stash: Option<String>,
}

/// Hunks for one target commit, grouped by file.
#[derive(Debug, Clone)]
struct TargetPlan {
    original_hash: String,
    /// Position in the branch, oldest first.
    position: usize,
    files: BTreeMap<String, Vec<DiffHunk>>,
}

/// Where a conflicted target stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StopPoint {
    /// `git apply --3way` left conflict markers in the target commit.
    Apply,
    /// Replaying a later commit conflicted.
    Continue,
}

#[derive(Debug)]
struct Run {
    plans: Vec<TargetPlan>,
    next: usize,
    branch_len: usize,
    original_head: String,
    hunks: usize,
    stopped: Option<StopPoint>,
}

/// Drives the per-target rebase state machine.
///
/// Dropping a manager while a rewrite it started is still pending aborts
/// that rewrite and restores the stashed working tree.
pub struct RebaseManager<'r> {
    repo: &'r Repository,
    merge_base: String,
    corrector: PatchCorrector,
    phase: RebasePhase,
    stash: Option<String>,
    run: Option<Run>,
    interrupt: Option<InterruptGuard>,
}

impl<'r> RebaseManager<'r> {
    /// Create a manager rewriting commits in `merge_base..HEAD`.
    #[must_use]
    pub fn new(repo: &'r Repository, merge_base: impl Into<String>) -> Self {
        Self {
            repo,
            merge_base: merge_base.into(),
            corrector: PatchCorrector::default(),
            phase: RebasePhase::Idle,
            stash: None,
            run: None,
            interrupt: None,
        }
    }

    /// Apply rewrite settings.
    #[must_use]
    pub const fn with_config(mut self, config: &RebaseConfig) -> Self {
        self.corrector = PatchCorrector::new(config.patch_context);
        self
    }

    /// Current phase of the state machine.
    #[must_use]
    pub const fn phase(&self) -> RebasePhase {
        self.phase
    }

    /// Whether a rewrite is stopped at a conflict.
    #[must_use]
    pub const fn is_pending(&self) -> bool {
        self.run.is_some()
    }

    /// Stash of the pre-rewrite working tree, while one is held.
    #[must_use]
    pub fn stash(&self) -> Option<&str> {
        self.stash.as_deref()
    }

    /// Shared interrupt flag of the active rewrite.
    ///
    /// Setting it makes the rewrite abort at the next phase boundary.
    #[must_use]
    pub fn interrupt_flag(&self) -> Option<std::sync::Arc<std::sync::atomic::AtomicBool>> {
        self.interrupt.as_ref().map(InterruptGuard::flag)
    }

    /// Squash every mapping with a target into that commit.
    ///
    /// Mappings without a target are skipped.
    ///
    /// # Errors
    /// `Conflict` leaves the rebase stopped for [`resume`](Self::resume) or
    /// [`abort`](Self::abort). `Interrupted` and `Failed` have already
    /// restored the original branch and working tree.
    pub fn execute(&mut self, mappings: &[HunkTargetMapping]) -> RebaseResult<RebaseSummary> {
        if self.run.is_some() {
            return Err(refused("a rewrite is already pending"));
        }
        if self.repo.is_rebasing() {
            return Err(refused("a rebase is already in progress"));
        }

        let range = format!("{}..HEAD", self.merge_base);
        let branch = self.repo.rev_list_oldest_first(&range)?;
        let (plans, hunks) = plan_targets(mappings, &branch)?;
        let original_head = self.repo.head_commit()?;

        if plans.is_empty() {
            debug!("no approved hunks, nothing to rewrite");
            return Ok(RebaseSummary {
                targets: Vec::new(),
                hunks: 0,
                new_head: original_head.clone(),
                original_head,
                stash: None,
            });
        }
        if self.repo.range_has_merges(&range)? {
            return Err(refused("merge commits in branch history cannot be rewritten"));
        }

        self.stash = self.repo.stash_push("autosquash: pre-rewrite working tree")?;
        if let Some(stash) = &self.stash {
            info!(%stash, "stashed working tree");
        }
        self.interrupt = Some(InterruptGuard::install());

        info!(targets = plans.len(), hunks, "rewriting history");
        self.run = Some(Run {
            plans,
            next: 0,
            branch_len: branch.len(),
            original_head,
            hunks,
            stopped: None,
        });
        self.drive()
    }

    /// Continue after the user resolved a conflict.
    ///
    /// Resolved files are staged automatically.
    ///
    /// # Errors
    /// Same as [`execute`](Self::execute). Resuming with unmerged paths
    /// left reports the same conflict again.
    pub fn resume(&mut self) -> RebaseResult<RebaseSummary> {
        let Some(stopped) = self.run.as_ref().and_then(|r| r.stopped) else {
            return Err(refused("no stopped rewrite to resume"));
        };
        if self.interrupt.is_none() {
            self.interrupt = Some(InterruptGuard::install());
        }

        let step = (|| -> RebaseResult<()> {
            self.check_interrupt()?;
            self.repo.stage_all()?;
            let files = self.repo.unmerged_paths()?;
            if !files.is_empty() {
                return Err(self.conflict(files, stopped));
            }
            if stopped == StopPoint::Apply {
                self.repo.amend_no_edit()?;
                self.transition(RebasePhase::Amended);
                self.check_interrupt()?;
            }
            self.continue_rebase()
        })();

        match step {
            Ok(()) => {
                if let Some(run) = self.run.as_mut() {
                    run.stopped = None;
                    run.next += 1;
                }
                self.drive()
            }
            Err(e) => self.fail(e),
        }
    }

    /// Abandon a stopped rewrite and restore the original state.
    ///
    /// # Errors
    /// Returns error if no rewrite is pending.
    pub fn abort(&mut self) -> RebaseResult<()> {
        if self.run.is_none() {
            return Err(refused("no rewrite to abort"));
        }
        self.abort_and_restore();
        Ok(())
    }

    /// Run the remaining targets until done, stopped or failed.
    fn drive(&mut self) -> RebaseResult<RebaseSummary> {
        loop {
            let Some(run) = self.run.as_ref() else {
                return Err(refused("no rewrite in progress"));
            };
            let Some(plan) = run.plans.get(run.next).cloned() else {
                if let Err(e) = self.check_interrupt() {
                    return self.fail(e);
                }
                return self.finish();
            };

            if let Err(e) = self.squash_target(&plan) {
                return self.fail(e);
            }
            if let Some(run) = self.run.as_mut() {
                run.next += 1;
            }
        }
    }

    fn squash_target(&mut self, plan: &TargetPlan) -> RebaseResult<()> {
        self.check_interrupt()?;

        let branch_len = self.run.as_ref().map_or(0, |r| r.branch_len);
        let range = format!("{}..HEAD", self.merge_base);
        let commits = self.repo.rev_list_oldest_first(&range)?;
        if commits.len() != branch_len {
            return Err(refused(format!(
                "branch changed shape during rewrite ({branch_len} -> {} commits)",
                commits.len()
            )));
        }
        let target = commits[plan.position].clone();
        debug!(
            original = %plan.original_hash,
            current = %target,
            position = plan.position,
            "squashing into target"
        );

        let todo = edit_todo(&target, &commits[plan.position..]);
        let mut todo_file = NamedTempFile::new().map_err(Error::from)?;
        todo_file.write_all(todo.as_bytes()).map_err(Error::from)?;
        todo_file.flush().map_err(Error::from)?;

        let parent = format!("{target}^");
        let base = if self.repo.commit_exists(&parent) {
            parent
        } else {
            "--root".to_string()
        };
        if let RebaseStep::Conflict(files) = self.repo.rebase_interactive(&base, todo_file.path())? {
            return Err(self.conflict(files, StopPoint::Continue));
        }
        self.transition(RebasePhase::RebaseStarted);
        self.check_interrupt()?;

        let patch = self.corrected_patch(plan)?;
        self.transition(RebasePhase::PatchCorrected);
        self.check_interrupt()?;

        if let Some(patch) = patch {
            let mut patch_file = NamedTempFile::new().map_err(Error::from)?;
            patch_file.write_all(patch.as_bytes()).map_err(Error::from)?;
            patch_file.flush().map_err(Error::from)?;

            let opts = ApplyOptions {
                three_way: true,
                ignore_space_change: true,
                ..ApplyOptions::default()
            };
            if let Err(e) = self.repo.apply_patch(patch_file.path(), opts, None) {
                let files = self.repo.unmerged_paths()?;
                if files.is_empty() {
                    return Err(e.into());
                }
                return Err(self.conflict(files, StopPoint::Apply));
            }
        } else {
            debug!(commit = %target, "hunks already present, amending unchanged");
        }
        self.transition(RebasePhase::PatchApplied);
        self.check_interrupt()?;

        self.repo.stage_all()?;
        self.repo.amend_no_edit()?;
        self.transition(RebasePhase::Amended);
        self.check_interrupt()?;

        self.continue_rebase()
    }

    /// Re-anchor every file's hunks against the checked-out content.
    fn corrected_patch(&self, plan: &TargetPlan) -> RebaseResult<Option<String>> {
        let root = self.repo.root()?;
        let mut combined = String::new();
        for (path, hunks) in &plan.files {
            let current = read_optional(&root.join(path)).map_err(Error::from)?;
            let refs: Vec<&DiffHunk> = hunks.iter().collect();
            if let Some(patch) = self.corrector.correct(path, current.as_deref(), &refs)? {
                combined.push_str(&patch);
            }
        }
        Ok((!combined.is_empty()).then_some(combined))
    }

    fn continue_rebase(&mut self) -> RebaseResult<()> {
        match self.repo.rebase_continue()? {
            RebaseStep::Done => {
                self.transition(RebasePhase::Continued);
                Ok(())
            }
            RebaseStep::Conflict(files) => Err(self.conflict(files, StopPoint::Continue)),
        }
    }

    fn finish(&mut self) -> RebaseResult<RebaseSummary> {
        let Some(run) = self.run.take() else {
            return Err(refused("no rewrite in progress"));
        };
        self.interrupt = None;
        let new_head = self.repo.head_commit()?;
        info!(targets = run.plans.len(), %new_head, "history rewritten");
        Ok(RebaseSummary {
            targets: run.plans.into_iter().map(|p| p.original_hash).collect(),
            hunks: run.hunks,
            original_head: run.original_head,
            new_head,
            stash: self.stash.take(),
        })
    }

    /// Record a conflict stop and build the matching error.
    fn conflict(&mut self, files: Vec<String>, at: StopPoint) -> RebaseError {
        let commit = self
            .run
            .as_mut()
            .and_then(|run| {
                run.stopped = Some(at);
                run.plans.get(run.next).map(|p| p.original_hash.clone())
            })
            .unwrap_or_default();
        self.transition(RebasePhase::Conflict);
        warn!(%commit, ?files, "rewrite stopped on conflict");
        RebaseError::Conflict { commit, files }
    }

    /// Conflicts stay pending; everything else aborts and restores.
    fn fail<T>(&mut self, error: RebaseError) -> RebaseResult<T> {
        if !matches!(error, RebaseError::Conflict { .. }) {
            warn!("rewrite failed: {error}");
            self.abort_and_restore();
        }
        Err(error)
    }

    fn check_interrupt(&self) -> RebaseResult<()> {
        if self.interrupt.as_ref().is_some_and(InterruptGuard::triggered) {
            return Err(RebaseError::Interrupted);
        }
        Ok(())
    }

    fn transition(&mut self, next: RebasePhase) {
        debug!(from = %self.phase, to = %next, "rebase phase");
        self.phase = next;
    }

    /// Abort any rebase, put the branch back and pop the stash.
    ///
    /// Every step is attempted; failures are logged, never returned.
    fn abort_and_restore(&mut self) {
        let original_head = self.run.take().map(|r| r.original_head);
        self.transition(RebasePhase::Aborted);

        if self.repo.is_rebasing() {
            if let Err(e) = self.repo.rebase_abort() {
                warn!("rebase --abort failed: {e}");
            }
        }

        // Earlier targets may already be rewritten
        if let Some(head) = original_head {
            match self.repo.head_commit() {
                Ok(current) if current == head => {}
                _ => {
                    if let Err(e) = self.repo.reset_hard(&head) {
                        warn!(%head, "could not restore original branch tip: {e}");
                    }
                }
            }
        }

        if let Some(stash) = self.stash.take() {
            if let Err(e) = self.repo.stash_pop(&stash) {
                warn!(%stash, "could not restore stashed changes, left in stash list: {e}");
            } else {
                info!(%stash, "restored stashed working tree");
            }
        }
        self.interrupt = None;
    }
}

impl Drop for RebaseManager<'_> {
    fn drop(&mut self) {
        if self.run.is_some() {
            warn!("rebase manager dropped with a pending rewrite, aborting");
            self.abort_and_restore();
        }
    }
}

impl fmt::Debug for RebaseManager<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RebaseManager")
            .field("merge_base", &self.merge_base)
            .field("phase", &self.phase)
            .field("stash", &self.stash)
            .field("pending", &self.run.is_some())
            .finish_non_exhaustive()
    }
}

/// Group mappings by target then file, ordering targets oldest first.
///
/// `branch` is `merge-base..HEAD`, oldest first.
fn plan_targets(
    mappings: &[HunkTargetMapping],
    branch: &[String],
) -> std::result::Result<(Vec<TargetPlan>, usize), Error> {
    let positions: HashMap<&str, usize> = branch
        .iter()
        .enumerate()
        .map(|(i, h)| (h.as_str(), i))
        .collect();

    let mut by_target: HashMap<&str, BTreeMap<String, Vec<DiffHunk>>> = HashMap::new();
    let mut hunks = 0;
    for mapping in mappings {
        let Some(target) = mapping.target_commit() else {
            warn!(path = %mapping.file_path(), "mapping has no target, skipping");
            continue;
        };
        if !positions.contains_key(target) {
            return Err(autosquash_git::Error::RefNotFound(format!(
                "{target} is not a commit on this branch"
            ))
            .into());
        }
        by_target
            .entry(target)
            .or_default()
            .entry(mapping.hunk.file_path.clone())
            .or_default()
            .push(mapping.hunk.clone());
        hunks += 1;
    }

    let mut plans: Vec<TargetPlan> = by_target
        .into_iter()
        .map(|(hash, mut files)| {
            for file_hunks in files.values_mut() {
                file_hunks.sort_by_key(|h| (h.old_start, h.new_start));
            }
            TargetPlan {
                original_hash: hash.to_string(),
                position: positions[hash],
                files,
            }
        })
        .collect();
    plans.sort_by_key(|p| p.position);
    Ok((plans, hunks))
}

fn read_optional(path: &Path) -> std::io::Result<Option<String>> {
    match fs::read_to_string(path) {
        Ok(content) => Ok(Some(content)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e),
    }
}

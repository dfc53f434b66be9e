//! Interactive rebase and amend primitives.
//!
//! The todo list is injected through `GIT_SEQUENCE_EDITOR`: git invokes the
//! editor with the generated todo path appended, and the editor command
//! copies a prepared file over it.

use std::path::Path;

use tracing::{debug, warn};

use crate::Repository;
use crate::error::{Error, Result};

/// Outcome of a rebase step that may stop for conflicts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RebaseStep {
    /// The step finished (or stopped at an `edit` as requested).
    Done,
    /// The step stopped with unmerged paths.
    Conflict(Vec<String>),
}

impl Repository {
    /// Start `git rebase -i <base>` using `todo` as the instruction list.
    ///
    /// Pass `--root` as `base` to rewrite from the root commit.
    ///
    /// # Errors
    /// Returns `RebaseFailed` if git refuses to start the rebase.
    pub fn rebase_interactive(&self, base: &str, todo: &Path) -> Result<RebaseStep> {
        let editor = format!("cp {}", shell_quote(&todo.to_string_lossy()));
        let out = self
            .git()?
            .args(["rebase", "-i", base])
            .env("GIT_SEQUENCE_EDITOR", editor)
            .env("GIT_EDITOR", "true")
            .run()?;

        if out.success() {
            return Ok(RebaseStep::Done);
        }
        self.classify_failure("rebase -i", &out.stderr)
    }

    /// Continue the in-progress rebase without opening an editor.
    ///
    /// # Errors
    /// Returns `RebaseFailed` if git fails for a reason other than conflicts.
    pub fn rebase_continue(&self) -> Result<RebaseStep> {
        let out = self
            .git()?
            .args(["rebase", "--continue"])
            .env("GIT_EDITOR", "true")
            .run()?;

        if out.success() {
            return Ok(RebaseStep::Done);
        }
        self.classify_failure("rebase --continue", &out.stderr)
    }

    /// Abort the in-progress rebase, restoring the original branch.
    ///
    /// # Errors
    /// Returns error if git rebase --abort fails.
    pub fn rebase_abort(&self) -> Result<()> {
        self.git()?.args(["rebase", "--abort"]).run_checked()?;
        Ok(())
    }

    /// Amend HEAD with the staged changes, keeping its message.
    ///
    /// If a pre-commit hook rewrites files the first attempt leaves them
    /// unstaged; they are re-staged and the amend retried once.
    ///
    /// # Errors
    /// Returns `CommandFailed` if both attempts fail.
    pub fn amend_no_edit(&self) -> Result<()> {
        let amend = || {
            self.git()?
                .args(["commit", "--amend", "--no-edit", "--allow-empty"])
                .run_checked()
        };

        match amend() {
            Ok(_) => Ok(()),
            Err(first) => {
                warn!("amend failed, re-staging and retrying once: {first}");
                self.stage_all()?;
                amend().map(|_| ())
            }
        }
    }

    /// Whether any commit in `range` has more than one parent.
    ///
    /// # Errors
    /// Returns error if git rev-list fails.
    pub fn range_has_merges(&self, range: &str) -> Result<bool> {
        let out = self
            .git()?
            .args(["rev-list", "--merges", range])
            .run_checked()?;
        Ok(out.lines().any(|l| !l.trim().is_empty()))
    }

    /// Commits in `range`, oldest first.
    ///
    /// # Errors
    /// Returns error if git rev-list fails.
    pub fn rev_list_oldest_first(&self, range: &str) -> Result<Vec<String>> {
        Ok(self
            .git()?
            .args(["rev-list", "--reverse", range])
            .run_checked()?
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(String::from)
            .collect())
    }

    fn classify_failure(&self, what: &str, stderr: &str) -> Result<RebaseStep> {
        let conflicts = self.unmerged_paths().unwrap_or_default();
        if conflicts.is_empty() {
            debug!(%what, stderr = %stderr.trim(), "rebase step failed");
            Err(Error::RebaseFailed(format!("{what}: {}", stderr.trim())))
        } else {
            Ok(RebaseStep::Conflict(conflicts))
        }
    }
}

/// Build a rebase todo with exactly one `edit` entry.
///
/// `commits` are the commits from `target` to HEAD, oldest first, with
/// `target` first; everything after it is picked unchanged.
#[must_use]
pub fn edit_todo(target: &str, commits: &[String]) -> String {
    let mut todo = format!("edit {target}\n");
    for commit in commits.iter().filter(|c| c.as_str() != target) {
        todo.push_str("pick ");
        todo.push_str(commit);
        todo.push('\n');
    }
    todo
}

fn shell_quote(s: &str) -> String {
    format!("'{}'", s.replace('\'', r"'\''"))
}

//! Repository wrapper providing high-level git operations.

use std::path::{Path, PathBuf};
use std::time::Duration;

use git2::{BranchType, Oid, RepositoryState};
use tracing::debug;

use crate::command::{DEFAULT_TIMEOUT, GitCommand};
use crate::error::{Error, Result};

/// Options for `git apply`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[allow(clippy::struct_excessive_bools)]
pub struct ApplyOptions {
    /// Apply to the index only (`--cached`).
    pub cached: bool,
    /// Validate without applying (`--check`).
    pub check: bool,
    /// Fall back to a 3-way merge (`--3way`).
    pub three_way: bool,
    /// Ignore whitespace amount changes in context (`--ignore-space-change`).
    pub ignore_space_change: bool,
}

impl ApplyOptions {
    /// Dry-run against the working tree.
    #[must_use]
    pub const fn check() -> Self {
        Self {
            cached: false,
            check: true,
            three_way: false,
            ignore_space_change: false,
        }
    }

    /// Apply to the index only.
    #[must_use]
    pub const fn cached() -> Self {
        Self {
            cached: true,
            check: false,
            three_way: false,
            ignore_space_change: false,
        }
    }
}

/// High-level wrapper around a git repository.
///
/// Reads go through git2 where it is cheap; anything that mutates the
/// working tree, index or refs goes through the git CLI so hooks, stash and
/// rebase machinery behave exactly like a user's own invocation.
pub struct Repository {
    inner: git2::Repository,
    timeout: Duration,
}

impl Repository {
    /// Open a repository at the given path.
    ///
    /// # Errors
    /// Returns error if no repository found at path or any parent.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let inner = git2::Repository::discover(path)?;
        Ok(Self {
            inner,
            timeout: DEFAULT_TIMEOUT,
        })
    }

    /// Open the repository containing the current directory.
    ///
    /// # Errors
    /// Returns error if not inside a git repository.
    pub fn open_current() -> Result<Self> {
        Self::open(".")
    }

    /// Set the wall-clock limit applied to every git invocation.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// The wall-clock limit applied to every git invocation.
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Get the path to the repository root (workdir).
    #[must_use]
    pub fn workdir(&self) -> Option<&Path> {
        self.inner.workdir()
    }

    /// Like [`workdir`](Self::workdir) but errors for bare repositories.
    ///
    /// # Errors
    /// Returns `NotARepository` for bare repositories.
    pub fn root(&self) -> Result<&Path> {
        self.workdir().ok_or(Error::NotARepository)
    }

    /// Get the path to the .git directory.
    #[must_use]
    pub fn git_dir(&self) -> &Path {
        self.inner.path()
    }

    /// Start a git CLI invocation rooted at the workdir.
    ///
    /// # Errors
    /// Returns `NotARepository` for bare repositories.
    pub fn git(&self) -> Result<GitCommand> {
        Ok(self.git_in(self.root()?))
    }

    /// Start a git CLI invocation rooted at `dir` (e.g. a linked worktree).
    #[must_use]
    pub fn git_in(&self, dir: &Path) -> GitCommand {
        GitCommand::new(dir).timeout(self.timeout)
    }

    // === Repository state ===

    /// Get the current repository state.
    #[must_use]
    pub fn state(&self) -> RepositoryState {
        self.inner.state()
    }

    /// Check if there's a rebase in progress.
    #[must_use]
    pub fn is_rebasing(&self) -> bool {
        matches!(
            self.state(),
            RepositoryState::Rebase
                | RepositoryState::RebaseInteractive
                | RepositoryState::RebaseMerge
        )
    }

    /// Get the name of the current branch.
    ///
    /// # Errors
    /// Returns error if HEAD is detached.
    pub fn current_branch(&self) -> Result<String> {
        let head = self.inner.head()?;
        if !head.is_branch() {
            return Err(Error::DetachedHead);
        }

        head.shorthand()
            .map(String::from)
            .ok_or(Error::DetachedHead)
    }

    /// Full hash of the commit HEAD points at.
    ///
    /// # Errors
    /// Returns error if HEAD is unborn.
    pub fn head_commit(&self) -> Result<String> {
        Ok(self.inner.head()?.peel_to_commit()?.id().to_string())
    }

    /// Resolve any revision (including abbreviated hashes) to a full commit hash.
    ///
    /// # Errors
    /// Returns `RefNotFound` if the revision does not name a commit.
    pub fn rev_parse(&self, rev: &str) -> Result<String> {
        let object = self
            .inner
            .revparse_single(rev)
            .map_err(|_| Error::RefNotFound(rev.into()))?;
        let commit = object
            .peel_to_commit()
            .map_err(|_| Error::RefNotFound(rev.into()))?;
        Ok(commit.id().to_string())
    }

    /// Get the merge base between two commits.
    ///
    /// # Errors
    /// Returns error if either revision is unknown or there is no common ancestor.
    pub fn merge_base(&self, one: &str, two: &str) -> Result<String> {
        let one = Oid::from_str(&self.rev_parse(one)?)?;
        let two = Oid::from_str(&self.rev_parse(two)?)?;
        Ok(self.inner.merge_base(one, two)?.to_string())
    }

    /// Find the merge base of HEAD with its upstream or the default branch.
    ///
    /// Tries the configured upstream first, then `origin/main`,
    /// `origin/master`, `main` and `master`. The current branch is never its
    /// own base.
    ///
    /// # Errors
    /// Returns `RefNotFound` when no candidate shares history with HEAD.
    pub fn find_merge_base(&self) -> Result<String> {
        let head = self.head_commit()?;
        let current = self.current_branch().ok();

        let upstream = current.as_deref().and_then(|branch| {
            self.inner
                .find_branch(branch, BranchType::Local)
                .ok()?
                .upstream()
                .ok()?
                .get()
                .name()
                .map(String::from)
        });

        let candidates = upstream.into_iter().chain(
            ["origin/main", "origin/master", "main", "master"]
                .into_iter()
                .filter(|c| Some(*c) != current.as_deref())
                .map(String::from),
        );

        for candidate in candidates {
            if let Ok(base) = self.merge_base(&candidate, &head) {
                debug!(%candidate, %base, "resolved merge base");
                return Ok(base);
            }
        }

        Err(Error::RefNotFound("merge base with upstream or main".into()))
    }

    /// List commits in `range` (e.g. `base..HEAD`), most recent first.
    ///
    /// # Errors
    /// Returns error if git rev-list fails.
    pub fn rev_list(&self, range: &str, path: Option<&str>) -> Result<Vec<String>> {
        let mut cmd = self.git()?.args(["rev-list", range]);
        if let Some(path) = path {
            cmd = cmd.args(["--", path]);
        }
        Ok(cmd
            .run_checked()?
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(String::from)
            .collect())
    }

    /// Number of lines of `path` at `rev`, or `None` if the path is absent.
    ///
    /// # Errors
    /// Returns error if `rev` cannot be resolved.
    pub fn file_line_count(&self, rev: &str, path: &str) -> Result<Option<u32>> {
        let commit = self
            .inner
            .revparse_single(rev)
            .map_err(|_| Error::RefNotFound(rev.into()))?
            .peel_to_commit()?;
        let Ok(entry) = commit.tree()?.get_path(Path::new(path)) else {
            return Ok(None);
        };
        let Ok(blob) = entry.to_object(&self.inner)?.peel_to_blob() else {
            return Ok(None);
        };
        let content = blob.content();
        let mut count = content.iter().filter(|&&b| b == b'\n').count();
        if content.last().is_some_and(|&b| b != b'\n') {
            count += 1;
        }
        Ok(Some(u32::try_from(count).unwrap_or(u32::MAX)))
    }

    // === Working directory state ===

    /// Check if the working directory is clean (untracked files count as dirty).
    ///
    /// # Errors
    /// Returns error if status check fails.
    pub fn is_clean(&self) -> Result<bool> {
        let mut opts = git2::StatusOptions::new();
        opts.include_untracked(true).include_ignored(false);
        let statuses = self.inner.statuses(Some(&mut opts))?;
        Ok(statuses.is_empty())
    }

    /// Paths with unresolved merge conflicts.
    ///
    /// # Errors
    /// Returns error if git diff fails.
    pub fn unmerged_paths(&self) -> Result<Vec<String>> {
        Ok(self
            .git()?
            .args(["diff", "--name-only", "--diff-filter=U"])
            .run_checked()?
            .lines()
            .filter(|l| !l.is_empty())
            .map(String::from)
            .collect())
    }

    /// Files added since `base`, including untracked files.
    ///
    /// # Errors
    /// Returns error if git diff or ls-files fails.
    pub fn files_added_since(&self, base: &str) -> Result<Vec<String>> {
        let added = self
            .git()?
            .args(["diff", "--name-only", "--diff-filter=A", base])
            .run_checked()?;
        let untracked = self
            .git()?
            .args(["ls-files", "--others", "--exclude-standard"])
            .run_checked()?;
        Ok(added
            .lines()
            .chain(untracked.lines())
            .filter(|l| !l.is_empty())
            .map(String::from)
            .collect())
    }

    // === Stash ===

    /// Push a stash including untracked files.
    ///
    /// Returns the stash commit hash, or `None` when there was nothing to save.
    ///
    /// # Errors
    /// Returns error if git stash fails.
    pub fn stash_push(&self, message: &str) -> Result<Option<String>> {
        let before = self.stash_top()?;
        self.git()?
            .args(["stash", "push", "--include-untracked", "-m", message])
            .run_checked()?;
        let after = self.stash_top()?;
        Ok(after.filter(|top| before.as_ref() != Some(top)))
    }

    /// Re-apply a stash (by commit hash) without dropping it.
    ///
    /// # Errors
    /// Returns error if the stash cannot be applied cleanly.
    pub fn stash_apply(&self, stash: &str) -> Result<()> {
        self.git()?
            .args(["stash", "apply", "--index", stash])
            .run_checked()?;
        Ok(())
    }

    /// Pop the stash entry whose commit is `stash`.
    ///
    /// # Errors
    /// Returns error if the entry is missing or the pop conflicts.
    pub fn stash_pop(&self, stash: &str) -> Result<()> {
        let entry = self.stash_entry(stash)?;
        self.git()?
            .args(["stash", "pop", "--index", &entry])
            .run_checked()?;
        Ok(())
    }

    /// Drop the stash entry whose commit is `stash`.
    ///
    /// # Errors
    /// Returns error if the entry is missing.
    pub fn stash_drop(&self, stash: &str) -> Result<()> {
        let entry = self.stash_entry(stash)?;
        self.git()?.args(["stash", "drop", &entry]).run_checked()?;
        Ok(())
    }

    /// Commit hashes of all stash entries, top first.
    ///
    /// # Errors
    /// Returns error if git stash list fails.
    pub fn stash_list(&self) -> Result<Vec<String>> {
        Ok(self
            .git()?
            .args(["stash", "list", "--format=%H"])
            .run_checked()?
            .lines()
            .filter(|l| !l.is_empty())
            .map(String::from)
            .collect())
    }

    fn stash_top(&self) -> Result<Option<String>> {
        let out = self
            .git()?
            .args(["rev-parse", "--quiet", "--verify", "refs/stash"])
            .run()?;
        Ok(out
            .success()
            .then(|| out.stdout_lossy().trim().to_string())
            .filter(|s| !s.is_empty()))
    }

    /// Map a stash commit hash to its current `stash@{n}` selector.
    fn stash_entry(&self, stash: &str) -> Result<String> {
        self.stash_list()?
            .iter()
            .position(|h| h == stash)
            .map(|n| format!("stash@{{{n}}}"))
            .ok_or_else(|| Error::RefNotFound(format!("stash {stash}")))
    }

    // === Index and working tree ===

    /// Write the current index as a tree object.
    ///
    /// # Errors
    /// Returns error if git write-tree fails.
    pub fn write_tree(&self) -> Result<String> {
        Ok(self.git()?.arg("write-tree").run_checked()?.trim().to_string())
    }

    /// Replace the index with `tree`.
    ///
    /// # Errors
    /// Returns error if git read-tree fails.
    pub fn read_tree(&self, tree: &str) -> Result<()> {
        self.git()?.args(["read-tree", tree]).run_checked()?;
        Ok(())
    }

    /// Apply a patch file, optionally inside another directory.
    ///
    /// # Errors
    /// Returns `CommandFailed` if the patch does not apply.
    pub fn apply_patch(&self, patch: &Path, opts: ApplyOptions, dir: Option<&Path>) -> Result<()> {
        let mut cmd = match dir {
            Some(dir) => self.git_in(dir),
            None => self.git()?,
        }
        .args(["apply", "--whitespace=nowarn"]);
        if opts.cached {
            cmd = cmd.arg("--cached");
        }
        if opts.check {
            cmd = cmd.arg("--check");
        }
        if opts.three_way {
            cmd = cmd.arg("--3way");
        }
        if opts.ignore_space_change {
            cmd = cmd.arg("--ignore-space-change");
        }
        cmd.arg(patch).run_checked()?;
        Ok(())
    }

    /// Stage every working-tree change, including deletions and new files.
    ///
    /// # Errors
    /// Returns error if git add fails.
    pub fn stage_all(&self) -> Result<()> {
        self.git()?.args(["add", "-A"]).run_checked()?;
        Ok(())
    }

    /// Hard reset the working tree and index to `rev`.
    ///
    /// # Errors
    /// Returns error if git reset fails.
    pub fn reset_hard(&self, rev: &str) -> Result<()> {
        self.git()?.args(["reset", "--hard", "--quiet", rev]).run_checked()?;
        Ok(())
    }

    /// Remove untracked files and directories (ignored files are kept).
    ///
    /// # Errors
    /// Returns error if git clean fails.
    pub fn clean_untracked(&self) -> Result<()> {
        self.git()?.args(["clean", "-fd", "--quiet"]).run_checked()?;
        Ok(())
    }

    /// Check out every path recorded in `rev` into the working tree.
    ///
    /// # Errors
    /// Returns error if git checkout fails.
    pub fn checkout_paths_from(&self, rev: &str) -> Result<()> {
        self.git()?.args(["checkout", rev, "--", "."]).run_checked()?;
        Ok(())
    }

    /// Write the untracked files saved in stash commit `stash` back into the
    /// working tree. They stay untracked: the index is left as it was.
    ///
    /// Returns `false` when the stash recorded no untracked files.
    ///
    /// # Errors
    /// Returns error if the files cannot be checked out or the index restored.
    pub fn restore_untracked_from(&self, stash: &str) -> Result<bool> {
        let untracked = format!("{stash}^3");
        if !self.commit_exists(&untracked) {
            return Ok(false);
        }
        let index = self.write_tree()?;
        self.checkout_paths_from(&untracked)?;
        self.read_tree(&index)?;
        Ok(true)
    }

    /// Whether `rev` names an existing commit.
    #[must_use]
    pub fn commit_exists(&self, rev: &str) -> bool {
        self.rev_parse(rev).is_ok()
    }

    // === Worktrees ===

    /// Whether the installed git supports linked worktrees.
    #[must_use]
    pub fn supports_worktree(&self) -> bool {
        self.git()
            .and_then(|cmd| cmd.args(["worktree", "list"]).run())
            .is_ok_and(|out| out.success())
    }

    /// Create a detached checkout of `rev` at `path`.
    ///
    /// # Errors
    /// Returns error if git worktree add fails.
    pub fn worktree_add_detached(&self, path: &Path, rev: &str) -> Result<()> {
        self.git()?
            .args(["worktree", "add", "--detach", "--quiet"])
            .arg(path)
            .arg(rev)
            .run_checked()?;
        Ok(())
    }

    /// Remove a linked worktree and prune its metadata.
    ///
    /// # Errors
    /// Returns error if git worktree remove fails.
    pub fn worktree_remove(&self, path: &Path) -> Result<()> {
        let removed = self
            .git()?
            .args(["worktree", "remove", "--force"])
            .arg(path)
            .run_checked();
        // Prune even if remove failed so stale metadata never lingers
        self.git()?.args(["worktree", "prune"]).run_checked()?;
        removed.map(|_| ())
    }

    /// Paths of all linked worktrees (the main worktree excluded).
    ///
    /// # Errors
    /// Returns error if git worktree list fails.
    pub fn linked_worktrees(&self) -> Result<Vec<PathBuf>> {
        let out = self
            .git()?
            .args(["worktree", "list", "--porcelain"])
            .run_checked()?;
        Ok(out
            .lines()
            .filter_map(|l| l.strip_prefix("worktree "))
            .skip(1)
            .map(PathBuf::from)
            .collect())
    }

    // === Low-level access ===

    /// Get a reference to the underlying git2 repository.
    ///
    /// Use sparingly - prefer high-level methods.
    #[must_use]
    pub const fn inner(&self) -> &git2::Repository {
        &self.inner
    }
}

impl std::fmt::Debug for Repository {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Repository")
            .field("path", &self.git_dir())
            .field("timeout", &self.timeout)
            .finish()
    }
}

//! Commit and branch metadata with session-scoped caching.
//!
//! Everything here is read-only. Results are cached for the lifetime of one
//! resolution session; call [`MetadataProvider::clear`] after history changes.

use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap, HashSet};

use autosquash_git::Repository;
use chrono::DateTime;
use tracing::debug;

use crate::error::Result;

/// Metadata for a single commit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitInfo {
    pub hash: String,
    pub short_hash: String,
    pub subject: String,
    pub author: String,
    /// Committer timestamp, seconds since the epoch (UTC).
    pub timestamp: i64,
    pub is_merge: bool,
    pub parent_count: usize,
}

/// Read-only queries about the commits on the current branch.
#[allow(clippy::missing_errors_doc)]
pub trait MetadataProvider {
    /// Commits in `merge-base..HEAD`, most recent first.
    fn branch_commits(&self) -> Result<Vec<String>>;

    /// Metadata for each known hash; unknown hashes are omitted.
    fn commit_info(&self, hashes: &[String]) -> Result<HashMap<String, CommitInfo>>;

    /// Branch commits touching `path`, most recent first.
    fn commits_touching_file(&self, path: &str) -> Result<Vec<String>>;

    /// Paths that did not exist at the merge base.
    fn new_files(&self) -> Result<HashSet<String>>;

    /// Drop every cached answer.
    fn clear(&self);

    /// Non-merge commits by recency, then merge commits by recency.
    fn ordered_by_recency(&self, hashes: &[String]) -> Result<Vec<CommitInfo>> {
        let infos = self.commit_info(hashes)?;
        // Input order breaks timestamp ties so the result is reproducible
        let mut ordered: Vec<(usize, CommitInfo)> = hashes
            .iter()
            .enumerate()
            .filter_map(|(i, h)| infos.get(h).cloned().map(|info| (i, info)))
            .collect();
        ordered.sort_by(|(ia, a), (ib, b)| {
            a.is_merge
                .cmp(&b.is_merge)
                .then(b.timestamp.cmp(&a.timestamp))
                .then(ia.cmp(ib))
        });
        Ok(ordered.into_iter().map(|(_, info)| info).collect())
    }

    /// Split `hashes` into (commits touching `path`, all others), each by recency.
    fn file_relevant_commits(
        &self,
        hashes: &[String],
        path: &str,
    ) -> Result<(Vec<String>, Vec<String>)> {
        let touching: HashSet<String> = self.commits_touching_file(path)?.into_iter().collect();
        let (relevant, other): (Vec<String>, Vec<String>) =
            hashes.iter().cloned().partition(|h| touching.contains(h));
        Ok((
            self.ordered_by_recency(&relevant)?
                .into_iter()
                .map(|c| c.hash)
                .collect(),
            self.ordered_by_recency(&other)?
                .into_iter()
                .map(|c| c.hash)
                .collect(),
        ))
    }
}

#[derive(Debug, Default)]
struct Caches {
    branch_commits: Option<Vec<String>>,
    new_files: Option<HashSet<String>>,
    commit_info: BTreeMap<String, CommitInfo>,
    touching: BTreeMap<String, Vec<String>>,
}

/// Git-backed [`MetadataProvider`] scoped to one merge base.
#[derive(Debug)]
pub struct GitMetadata<'a> {
    repo: &'a Repository,
    merge_base: String,
    caches: RefCell<Caches>,
}

impl<'a> GitMetadata<'a> {
    const SHOW_FORMAT: &'static str = "--format=%H%x1f%h%x1f%s%x1f%an%x1f%cI%x1f%P%x1e";

    /// Create a provider for commits between `merge_base` and HEAD.
    #[must_use]
    pub fn new(repo: &'a Repository, merge_base: impl Into<String>) -> Self {
        Self {
            repo,
            merge_base: merge_base.into(),
            caches: RefCell::new(Caches::default()),
        }
    }

    /// Create a provider using the discovered upstream merge base.
    ///
    /// # Errors
    /// Returns error if no merge base can be found.
    pub fn discover(repo: &'a Repository) -> Result<Self> {
        let base = repo.find_merge_base()?;
        Ok(Self::new(repo, base))
    }

    #[must_use]
    pub fn merge_base(&self) -> &str {
        &self.merge_base
    }

    fn range(&self) -> String {
        format!("{}..HEAD", self.merge_base)
    }

    fn load_commit_info(&self, hashes: &[String]) -> Result<Vec<CommitInfo>> {
        if hashes.is_empty() {
            return Ok(Vec::new());
        }
        let out = self
            .repo
            .git()?
            .args(["show", "-s", "--no-color", Self::SHOW_FORMAT])
            .args(hashes)
            .run_checked()?;
        Ok(parse_show_output(&out))
    }
}

impl MetadataProvider for GitMetadata<'_> {
    fn branch_commits(&self) -> Result<Vec<String>> {
        if let Some(cached) = &self.caches.borrow().branch_commits {
            return Ok(cached.clone());
        }
        let commits = self.repo.rev_list(&self.range(), None)?;
        debug!(count = commits.len(), base = %self.merge_base, "branch commits");
        self.caches.borrow_mut().branch_commits = Some(commits.clone());
        Ok(commits)
    }

    fn commit_info(&self, hashes: &[String]) -> Result<HashMap<String, CommitInfo>> {
        let missing: Vec<String> = {
            let caches = self.caches.borrow();
            let mut seen = HashSet::new();
            hashes
                .iter()
                .filter(|h| !caches.commit_info.contains_key(*h) && seen.insert(h.as_str()))
                .cloned()
                .collect()
        };

        if !missing.is_empty() {
            let loaded = self.load_commit_info(&missing)?;
            let mut caches = self.caches.borrow_mut();
            for info in loaded {
                caches.commit_info.insert(info.hash.clone(), info);
            }
        }

        let caches = self.caches.borrow();
        Ok(hashes
            .iter()
            .filter_map(|h| caches.commit_info.get(h).map(|i| (h.clone(), i.clone())))
            .collect())
    }

    fn commits_touching_file(&self, path: &str) -> Result<Vec<String>> {
        if let Some(cached) = self.caches.borrow().touching.get(path) {
            return Ok(cached.clone());
        }
        let commits = self.repo.rev_list(&self.range(), Some(path))?;
        self.caches
            .borrow_mut()
            .touching
            .insert(path.to_string(), commits.clone());
        Ok(commits)
    }

    fn new_files(&self) -> Result<HashSet<String>> {
        if let Some(cached) = &self.caches.borrow().new_files {
            return Ok(cached.clone());
        }
        let files: HashSet<String> = self
            .repo
            .files_added_since(&self.merge_base)?
            .into_iter()
            .collect();
        self.caches.borrow_mut().new_files = Some(files.clone());
        Ok(files)
    }

    fn clear(&self) {
        *self.caches.borrow_mut() = Caches::default();
    }
}

/// Parse `git show -s` output produced with `SHOW_FORMAT`.
fn parse_show_output(out: &str) -> Vec<CommitInfo> {
    out.split('\x1e')
        .map(str::trim)
        .filter(|record| !record.is_empty())
        .filter_map(|record| {
            let mut fields = record.split('\x1f');
            let hash = fields.next()?.to_string();
            let short_hash = fields.next()?.to_string();
            let subject = fields.next()?.to_string();
            let author = fields.next()?.to_string();
            let timestamp = DateTime::parse_from_rfc3339(fields.next()?).ok()?.timestamp();
            let parent_count = fields.next().unwrap_or("").split_whitespace().count();
            Some(CommitInfo {
                hash,
                short_hash,
                subject,
                author,
                timestamp,
                is_merge: parent_count > 1,
                parent_count,
            })
        })
        .collect()
}

//! Target resolution: decide which branch commit owns each hunk.
//!
//! For every hunk the resolver tries, in order:
//! 1. new-file fallback (needs a human choice),
//! 2. reuse of the target already chosen for the same file in this pass,
//! 3. blame of the hunk's own lines, filtered to branch commits,
//! 4. blame of a narrow window around the hunk,
//! 5. existing-file fallback (needs a human choice).
//!
//! When blame finds branch commits, the commit owning most examined lines
//! wins; ties go to the most recent commit.

use std::collections::{BTreeMap, HashMap, HashSet};

use autosquash_git::{BlameInfo, BlameOps, DiffHunk};
use tracing::{debug, warn};

use crate::config::ResolveConfig;
use crate::error::Result;
use crate::mapping::{Confidence, HunkTargetMapping, TargetingMethod};
use crate::metadata::MetadataProvider;

/// Resolves hunks to target commits for one session.
pub struct TargetResolver<'a, G: BlameOps, M: MetadataProvider> {
    git: &'a G,
    metadata: &'a M,
    config: ResolveConfig,
    /// File path -> commit chosen earlier in the current pass.
    file_targets: HashMap<String, String>,
    /// File path -> commit chosen by a human; survives pass resets.
    manual_targets: HashMap<String, String>,
    expanded: HashMap<String, Option<String>>,
}

impl<'a, G: BlameOps, M: MetadataProvider> TargetResolver<'a, G, M> {
    /// Create a resolver with default settings.
    #[must_use]
    pub fn new(git: &'a G, metadata: &'a M) -> Self {
        Self {
            git,
            metadata,
            config: ResolveConfig::default(),
            file_targets: HashMap::new(),
            manual_targets: HashMap::new(),
            expanded: HashMap::new(),
        }
    }

    /// Replace the resolution settings.
    #[must_use]
    pub const fn with_config(mut self, config: ResolveConfig) -> Self {
        self.config = config;
        self
    }

    /// Resolve every hunk in a fresh pass, preserving input order.
    ///
    /// Manual choices recorded with
    /// [`set_target_for_file`](Self::set_target_for_file) carry into the pass.
    ///
    /// # Errors
    /// Returns error if commit metadata cannot be read.
    pub fn resolve(&mut self, hunks: &[DiffHunk]) -> Result<Vec<HunkTargetMapping>> {
        self.reset_pass();
        hunks.iter().map(|hunk| self.resolve_hunk(hunk)).collect()
    }

    /// Resolve one hunk within the current pass.
    ///
    /// Use this instead of [`resolve`](Self::resolve) to interleave manual
    /// choices with resolution, e.g. while a user reviews hunk by hunk.
    ///
    /// # Errors
    /// Returns error if commit metadata cannot be read.
    pub fn resolve_hunk(&mut self, hunk: &DiffHunk) -> Result<HunkTargetMapping> {
        let path = hunk.file_path.as_str();
        let branch = self.metadata.branch_commits()?;

        if self.metadata.new_files()?.contains(path) && !self.manual_targets.contains_key(path) {
            let candidates = self
                .metadata
                .ordered_by_recency(&branch)?
                .into_iter()
                .map(|c| c.hash)
                .collect();
            debug!(%path, "new file, needs selection");
            return Ok(HunkTargetMapping::needs_selection(
                hunk.clone(),
                TargetingMethod::FallbackNewFile,
                candidates,
            ));
        }

        if let Some(target) = self.file_targets.get(path) {
            debug!(%path, %target, "reusing file target");
            return Ok(HunkTargetMapping::resolved(
                hunk.clone(),
                target.clone(),
                Confidence::Medium,
                TargetingMethod::FallbackConsistency,
                Vec::new(),
            ));
        }

        let branch_set: HashSet<&str> = branch.iter().map(String::as_str).collect();

        let (start, end) = self.primary_range(hunk);
        let mut method = TargetingMethod::BlameMatch;
        let mut blame = self.branch_blame(path, start, end, &branch_set);

        if blame.is_empty() {
            let (start, end) = self.contextual_range(hunk);
            blame = self.branch_blame(path, start, end, &branch_set);
            method = TargetingMethod::ContextualBlameMatch;
        }

        if blame.is_empty() {
            let (relevant, other) = self.metadata.file_relevant_commits(&branch, path)?;
            debug!(%path, "no branch blame, needs selection");
            return Ok(HunkTargetMapping::needs_selection(
                hunk.clone(),
                TargetingMethod::FallbackExistingFile,
                relevant.into_iter().chain(other).collect(),
            ));
        }

        let (winner, share) = self.consensus(&blame, &branch)?;
        let confidence = Confidence::from_share(share);
        debug!(%path, %winner, share, %confidence, %method, "resolved");

        self.file_targets.insert(path.to_string(), winner.clone());
        Ok(HunkTargetMapping::resolved(
            hunk.clone(),
            winner,
            confidence,
            method,
            blame,
        ))
    }

    /// Record a manual choice: later hunks of `path` follow it, in this pass
    /// and in passes started by [`resolve`](Self::resolve), until
    /// [`clear_manual_targets`](Self::clear_manual_targets).
    pub fn set_target_for_file(&mut self, path: impl Into<String>, commit: impl Into<String>) {
        let (path, commit) = (path.into(), commit.into());
        self.manual_targets.insert(path.clone(), commit.clone());
        self.file_targets.insert(path, commit);
    }

    /// Forget every manual choice.
    pub fn clear_manual_targets(&mut self) {
        self.manual_targets.clear();
        self.reset_pass();
    }

    /// The target recorded for `path` in the current pass.
    #[must_use]
    pub fn file_target(&self, path: &str) -> Option<&str> {
        self.file_targets.get(path).map(String::as_str)
    }

    /// Forget targets found by resolution; the next hunk starts an
    /// independent pass seeded only with manual choices.
    pub fn reset_pass(&mut self) {
        self.file_targets.clone_from(&self.manual_targets);
    }

    /// Lines blamed first: the removed range, or a window around an insertion.
    fn primary_range(&self, hunk: &DiffHunk) -> (u32, u32) {
        if hunk.has_deletions() {
            let start = hunk.old_start.max(1);
            (start, start + hunk.old_count.max(1) - 1)
        } else {
            let ctx = self.config.blame_context;
            (
                hunk.new_start.saturating_sub(ctx).max(1),
                hunk.new_start.saturating_add(ctx),
            )
        }
    }

    /// The hunk's old-side range widened by the contextual window.
    fn contextual_range(&self, hunk: &DiffHunk) -> (u32, u32) {
        let w = self.config.contextual_window;
        let start = hunk.old_start.max(1);
        let end = start + hunk.old_count.max(1) - 1;
        (start.saturating_sub(w).max(1), end.saturating_add(w))
    }

    /// Blame `start..=end` at HEAD, keeping only lines owned by branch commits.
    ///
    /// Hashes in the result are expanded to full length.
    fn branch_blame(
        &mut self,
        path: &str,
        start: u32,
        end: u32,
        branch: &HashSet<&str>,
    ) -> Vec<BlameInfo> {
        let line_count = match self.git.line_count_at_head(path) {
            Ok(Some(n)) => n,
            Ok(None) => return Vec::new(),
            Err(e) => {
                warn!(%path, "cannot read file at HEAD: {e}");
                return Vec::new();
            }
        };
        let end = end.min(line_count);
        if start > end {
            return Vec::new();
        }

        let lines = match self.git.blame_range(path, start, end) {
            Ok(lines) => lines,
            Err(e) => {
                warn!(%path, start, end, "blame failed: {e}");
                return Vec::new();
            }
        };

        lines
            .into_iter()
            .filter_map(|mut info| {
                let full = self.expand(&info.commit_hash)?;
                branch.contains(full.as_str()).then(|| {
                    info.commit_hash = full;
                    info
                })
            })
            .collect()
    }

    fn expand(&mut self, hash: &str) -> Option<String> {
        if hash.len() == 40 {
            return Some(hash.to_string());
        }
        if hash.bytes().all(|b| b == b'0') {
            // Uncommitted lines
            return None;
        }
        self.expanded
            .entry(hash.to_string())
            .or_insert_with(|| self.git.expand_hash(hash).ok())
            .clone()
    }

    /// Pick the commit owning most lines; ties go to the newest commit.
    fn consensus(&self, blame: &[BlameInfo], branch: &[String]) -> Result<(String, f64)> {
        let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
        for info in blame {
            *counts.entry(info.commit_hash.as_str()).or_default() += 1;
        }

        let contenders: Vec<String> = counts.keys().map(|h| (*h).to_string()).collect();
        let infos = self.metadata.commit_info(&contenders)?;
        let recency = |hash: &str| {
            let timestamp = infos.get(hash).map_or(i64::MIN, |i| i.timestamp);
            // Branch order is most recent first, so a lower index is newer
            let position = branch.iter().position(|b| b == hash).unwrap_or(usize::MAX);
            (timestamp, std::cmp::Reverse(position))
        };

        let (winner, count) = counts
            .iter()
            .max_by(|(ha, ca), (hb, cb)| {
                ca.cmp(cb)
                    .then_with(|| recency(**ha).cmp(&recency(**hb)))
            })
            .map(|(h, c)| ((*h).to_string(), *c))
            .unwrap_or_default();

        #[allow(clippy::cast_precision_loss)]
        let share = count as f64 / blame.len() as f64;
        Ok((winner, share))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::metadata::CommitInfo;
    use autosquash_git::{DiffLine, LineKind, Result as GitResult};
    use std::cell::RefCell;

    const BASE: &str = "0000000000000000000000000000000000000bad";

    fn full(c: &str) -> String {
        format!("{c:0<40}")
    }

    /// Blame mock: one entry per line of each file at HEAD.
    #[derive(Default)]
    struct MockBlame {
        files: HashMap<String, Vec<String>>,
        calls: RefCell<Vec<(String, u32, u32)>>,
    }

    impl MockBlame {
        fn with_file(mut self, path: &str, owners: &[&str]) -> Self {
            self.files.insert(
                path.to_string(),
                owners.iter().map(|o| (*o).to_string()).collect(),
            );
            self
        }
    }

    impl BlameOps for MockBlame {
        fn blame_range(&self, file_path: &str, start: u32, end: u32) -> GitResult<Vec<BlameInfo>> {
            self.calls
                .borrow_mut()
                .push((file_path.to_string(), start, end));
            let owners = &self.files[file_path];
            Ok((start..=end)
                .map(|n| BlameInfo {
                    // Abbreviated like real blame output
                    commit_hash: owners[(n - 1) as usize][..8].to_string(),
                    author: "Dev".into(),
                    timestamp: "2024-01-01 00:00:00 +0000".into(),
                    line_number: n,
                    line_content: format!("line {n}"),
                })
                .collect())
        }

        fn expand_hash(&self, short: &str) -> GitResult<String> {
            self.files
                .values()
                .flatten()
                .find(|h| h.starts_with(short))
                .cloned()
                .ok_or_else(|| autosquash_git::Error::RefNotFound(short.into()))
        }

        fn line_count_at_head(&self, file_path: &str) -> GitResult<Option<u32>> {
            Ok(self
                .files
                .get(file_path)
                .map(|owners| u32::try_from(owners.len()).unwrap()))
        }
    }

    #[derive(Default)]
    struct MockMetadata {
        /// Most recent first.
        commits: Vec<CommitInfo>,
        new_files: HashSet<String>,
        touching: HashMap<String, Vec<String>>,
    }

    impl MockMetadata {
        fn with_commit(mut self, hash: &str, timestamp: i64, is_merge: bool) -> Self {
            self.commits.push(CommitInfo {
                hash: hash.to_string(),
                short_hash: hash[..8].to_string(),
                subject: format!("commit {}", &hash[..2]),
                author: "Dev".into(),
                timestamp,
                is_merge,
                parent_count: if is_merge { 2 } else { 1 },
            });
            self
        }

        fn with_new_file(mut self, path: &str) -> Self {
            self.new_files.insert(path.to_string());
            self
        }

        fn with_touching(mut self, path: &str, hashes: &[&str]) -> Self {
            self.touching.insert(
                path.to_string(),
                hashes.iter().map(|h| (*h).to_string()).collect(),
            );
            self
        }
    }

    impl MetadataProvider for MockMetadata {
        fn branch_commits(&self) -> Result<Vec<String>> {
            Ok(self.commits.iter().map(|c| c.hash.clone()).collect())
        }

        fn commit_info(&self, hashes: &[String]) -> Result<HashMap<String, CommitInfo>> {
            Ok(self
                .commits
                .iter()
                .filter(|c| hashes.contains(&c.hash))
                .map(|c| (c.hash.clone(), c.clone()))
                .collect())
        }

        fn commits_touching_file(&self, path: &str) -> Result<Vec<String>> {
            Ok(self.touching.get(path).cloned().unwrap_or_default())
        }

        fn new_files(&self) -> Result<HashSet<String>> {
            Ok(self.new_files.clone())
        }

        fn clear(&self) {}
    }

    fn line(kind: LineKind, content: &str) -> DiffLine {
        DiffLine {
            kind,
            content: content.into(),
        }
    }

    fn deletion_hunk(path: &str, old_start: u32, old_count: u32) -> DiffHunk {
        let mut lines: Vec<DiffLine> = (0..old_count)
            .map(|i| line(LineKind::Removed, &format!("line {}", old_start + i)))
            .collect();
        lines.push(line(LineKind::Added, "replacement"));
        DiffHunk {
            file_path: path.into(),
            old_start,
            old_count,
            new_start: old_start,
            new_count: 1,
            lines,
        }
    }

    fn addition_hunk(path: &str, at: u32) -> DiffHunk {
        DiffHunk {
            file_path: path.into(),
            old_start: at,
            old_count: 0,
            new_start: at + 1,
            new_count: 1,
            lines: vec![line(LineKind::Added, "inserted")],
        }
    }

    #[test]
    fn test_single_owner_deletion_is_high_confidence() {
        let c1 = full("c1");
        let git = MockBlame::default().with_file("a.rs", &[BASE, &c1, &c1, BASE]);
        let meta = MockMetadata::default().with_commit(&c1, 100, false);
        let mut resolver = TargetResolver::new(&git, &meta);

        let m = resolver.resolve_hunk(&deletion_hunk("a.rs", 2, 2)).unwrap();
        assert_eq!(m.target_commit(), Some(c1.as_str()));
        assert_eq!(m.confidence(), Confidence::High);
        assert_eq!(m.targeting_method, TargetingMethod::BlameMatch);
        assert!(!m.needs_user_selection());
        assert_eq!(m.blame_info.len(), 2);
        assert_eq!(m.blame_info[0].commit_hash, c1);
    }

    #[test]
    fn test_new_file_needs_selection_with_merges_last() {
        let (c1, m1, c2) = (full("c1"), full("e1"), full("c2"));
        let git = MockBlame::default();
        let meta = MockMetadata::default()
            .with_commit(&m1, 300, true)
            .with_commit(&c2, 200, false)
            .with_commit(&c1, 100, false)
            .with_new_file("new.rs");
        let mut resolver = TargetResolver::new(&git, &meta);

        let m = resolver.resolve_hunk(&addition_hunk("new.rs", 0)).unwrap();
        assert!(m.needs_user_selection());
        assert_eq!(m.target_commit(), None);
        assert_eq!(m.confidence(), Confidence::Low);
        assert_eq!(m.targeting_method, TargetingMethod::FallbackNewFile);
        assert_eq!(m.fallback_candidates, Some(vec![c2, c1, m1]));
        assert!(git.calls.borrow().is_empty());
    }

    #[test]
    fn test_second_hunk_of_file_reuses_target() {
        let (c1, c2) = (full("c1"), full("c2"));
        let git = MockBlame::default().with_file("a.rs", &[&c2, &c2, BASE, BASE, BASE, BASE, BASE, BASE]);
        let meta = MockMetadata::default()
            .with_commit(&c2, 200, false)
            .with_commit(&c1, 100, false);
        let mut resolver = TargetResolver::new(&git, &meta);

        let mappings = resolver
            .resolve(&[deletion_hunk("a.rs", 1, 1), deletion_hunk("a.rs", 7, 1)])
            .unwrap();
        assert_eq!(mappings[0].target_commit(), Some(c2.as_str()));
        assert_eq!(mappings[1].target_commit(), Some(c2.as_str()));
        assert_eq!(mappings[1].targeting_method, TargetingMethod::FallbackConsistency);
        assert_eq!(mappings[1].confidence(), Confidence::Medium);
        assert!(!mappings[1].needs_user_selection());
        // No blame for the second hunk
        assert_eq!(git.calls.borrow().len(), 1);
    }

    #[test]
    fn test_contextual_retry_finds_neighbouring_owner() {
        let c1 = full("c1");
        let git = MockBlame::default().with_file("a.rs", &[BASE, &c1, BASE, &c1, BASE]);
        let meta = MockMetadata::default().with_commit(&c1, 100, false);
        let mut resolver = TargetResolver::new(&git, &meta);

        let m = resolver.resolve_hunk(&deletion_hunk("a.rs", 3, 1)).unwrap();
        assert_eq!(m.targeting_method, TargetingMethod::ContextualBlameMatch);
        assert_eq!(m.target_commit(), Some(c1.as_str()));
        assert_eq!(m.confidence(), Confidence::High);
        assert_eq!(
            *git.calls.borrow(),
            vec![("a.rs".to_string(), 3, 3), ("a.rs".to_string(), 2, 4)]
        );
    }

    #[test]
    fn test_existing_file_fallback_orders_relevant_first() {
        let (c1, c2, c3, m1) = (full("c1"), full("c2"), full("c3"), full("e1"));
        let git = MockBlame::default().with_file("a.rs", &[BASE, BASE, BASE]);
        let meta = MockMetadata::default()
            .with_commit(&m1, 400, true)
            .with_commit(&c3, 300, false)
            .with_commit(&c2, 200, false)
            .with_commit(&c1, 100, false)
            .with_touching("a.rs", &[&m1, &c1]);
        let mut resolver = TargetResolver::new(&git, &meta);

        let m = resolver.resolve_hunk(&deletion_hunk("a.rs", 2, 1)).unwrap();
        assert!(m.needs_user_selection());
        assert_eq!(m.targeting_method, TargetingMethod::FallbackExistingFile);
        assert_eq!(m.fallback_candidates, Some(vec![c1, m1, c3, c2]));
    }

    #[test]
    fn test_majority_owner_medium_confidence() {
        let (c1, c2) = (full("c1"), full("c2"));
        let git = MockBlame::default().with_file("a.rs", &[&c1, &c2, &c1, &c2, &c1]);
        let meta = MockMetadata::default()
            .with_commit(&c2, 200, false)
            .with_commit(&c1, 100, false);
        let mut resolver = TargetResolver::new(&git, &meta);

        let m = resolver.resolve_hunk(&deletion_hunk("a.rs", 1, 5)).unwrap();
        assert_eq!(m.target_commit(), Some(c1.as_str()));
        assert_eq!(m.confidence(), Confidence::Medium);
    }

    #[test]
    fn test_share_ignores_lines_outside_branch() {
        let (c1, c2) = (full("c1"), full("c2"));
        // 2 of 5 lines by c1, 1 by c2, the rest predate the branch
        let git = MockBlame::default().with_file("a.rs", &[&c1, BASE, &c1, &c2, BASE]);
        let meta = MockMetadata::default()
            .with_commit(&c2, 200, false)
            .with_commit(&c1, 100, false);
        let mut resolver = TargetResolver::new(&git, &meta);

        let m = resolver.resolve_hunk(&deletion_hunk("a.rs", 1, 5)).unwrap();
        assert_eq!(m.target_commit(), Some(c1.as_str()));
        // 2/3 of branch-scoped lines
        assert_eq!(m.confidence(), Confidence::Medium);
        assert_eq!(m.blame_info.len(), 3);
    }

    #[test]
    fn test_tie_goes_to_most_recent_commit() {
        let (c1, c2) = (full("c1"), full("c2"));
        let git = MockBlame::default().with_file("a.rs", &[&c1, &c2, &c1, &c2]);
        let meta = MockMetadata::default()
            .with_commit(&c2, 200, false)
            .with_commit(&c1, 100, false);
        let mut resolver = TargetResolver::new(&git, &meta);

        let m = resolver.resolve_hunk(&deletion_hunk("a.rs", 1, 4)).unwrap();
        assert_eq!(m.target_commit(), Some(c2.as_str()));
        assert_eq!(m.confidence(), Confidence::Medium);
    }

    #[test]
    fn test_low_confidence_when_split_three_ways() {
        let (c1, c2, c3) = (full("c1"), full("c2"), full("c3"));
        let git = MockBlame::default().with_file("a.rs", &[&c1, &c2, &c3]);
        let meta = MockMetadata::default()
            .with_commit(&c3, 300, false)
            .with_commit(&c2, 200, false)
            .with_commit(&c1, 100, false);
        let mut resolver = TargetResolver::new(&git, &meta);

        let m = resolver.resolve_hunk(&deletion_hunk("a.rs", 1, 3)).unwrap();
        assert_eq!(m.target_commit(), Some(c3.as_str()));
        assert_eq!(m.confidence(), Confidence::Low);
    }

    #[test]
    fn test_pure_addition_blames_window_clamped_to_file() {
        let c1 = full("c1");
        let git = MockBlame::default().with_file("a.rs", &[&c1, &c1, &c1, &c1]);
        let meta = MockMetadata::default().with_commit(&c1, 100, false);
        let mut resolver = TargetResolver::new(&git, &meta);

        let m = resolver.resolve_hunk(&addition_hunk("a.rs", 2)).unwrap();
        assert_eq!(m.target_commit(), Some(c1.as_str()));
        // new_start = 3, window 3 lines either side, clamped to 1..=4
        assert_eq!(*git.calls.borrow(), vec![("a.rs".to_string(), 1, 4)]);
    }

    #[test]
    fn test_manual_choice_seeds_consistency() {
        let (c1, c2) = (full("c1"), full("c2"));
        let git = MockBlame::default().with_file("a.rs", &[&c1, &c1]);
        let meta = MockMetadata::default()
            .with_commit(&c2, 200, false)
            .with_commit(&c1, 100, false)
            .with_new_file("new.rs");
        let mut resolver = TargetResolver::new(&git, &meta);

        resolver.set_target_for_file("a.rs", c2.clone());
        resolver.set_target_for_file("new.rs", c1.clone());

        let m = resolver.resolve_hunk(&deletion_hunk("a.rs", 1, 1)).unwrap();
        assert_eq!(m.target_commit(), Some(c2.as_str()));
        assert_eq!(m.targeting_method, TargetingMethod::FallbackConsistency);

        let n = resolver.resolve_hunk(&addition_hunk("new.rs", 0)).unwrap();
        assert_eq!(n.target_commit(), Some(c1.as_str()));
        assert!(git.calls.borrow().is_empty());
    }

    #[test]
    fn test_manual_choice_survives_fresh_pass() {
        let (c1, c2) = (full("c1"), full("c2"));
        let git = MockBlame::default().with_file("a.rs", &[&c1, &c1]);
        let meta = MockMetadata::default()
            .with_commit(&c2, 200, false)
            .with_commit(&c1, 100, false);
        let mut resolver = TargetResolver::new(&git, &meta);
        resolver.set_target_for_file("a.rs", c2.clone());

        let hunks = vec![deletion_hunk("a.rs", 1, 1)];
        let seeded = resolver.resolve(&hunks).unwrap();
        assert_eq!(seeded[0].target_commit(), Some(c2.as_str()));
        assert_eq!(seeded[0].targeting_method, TargetingMethod::FallbackConsistency);
        assert!(git.calls.borrow().is_empty());

        resolver.clear_manual_targets();
        let blamed = resolver.resolve(&hunks).unwrap();
        assert_eq!(blamed[0].target_commit(), Some(c1.as_str()));
        assert_eq!(blamed[0].targeting_method, TargetingMethod::BlameMatch);
    }

    #[test]
    fn test_resolve_starts_fresh_pass_and_is_deterministic() {
        let (c1, c2) = (full("c1"), full("c2"));
        let git = MockBlame::default()
            .with_file("a.rs", &[&c1, &c2, &c2, &c1])
            .with_file("b.rs", &[&c1, BASE]);
        let meta = MockMetadata::default()
            .with_commit(&c2, 200, false)
            .with_commit(&c1, 100, false);
        let mut resolver = TargetResolver::new(&git, &meta);
        let hunks = vec![
            deletion_hunk("a.rs", 1, 4),
            deletion_hunk("b.rs", 2, 1),
            deletion_hunk("a.rs", 4, 1),
        ];

        let first = resolver.resolve(&hunks).unwrap();
        let second = resolver.resolve(&hunks).unwrap();

        let summary = |ms: &[HunkTargetMapping]| {
            ms.iter()
                .map(|m| {
                    (
                        m.target_commit().map(String::from),
                        m.confidence(),
                        m.targeting_method,
                    )
                })
                .collect::<Vec<_>>()
        };
        assert_eq!(summary(&first), summary(&second));
        assert_eq!(first[0].target_commit(), Some(c2.as_str()));
        assert_eq!(first[1].targeting_method, TargetingMethod::ContextualBlameMatch);
        assert_eq!(first[1].target_commit(), Some(c1.as_str()));
        assert_eq!(first[2].targeting_method, TargetingMethod::FallbackConsistency);
    }
}

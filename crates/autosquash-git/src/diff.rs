//! Hunk model and unified-diff parsing.
//!
//! A [`DiffHunk`] is produced once from `git diff` output and never mutated
//! afterwards. It can render itself back into a minimal single-hunk patch,
//! which is what the application strategies feed to `git apply`.

use std::fmt::Write as _;

use crate::Repository;
use crate::error::Result;

/// Role of a line inside a hunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LineKind {
    /// Unchanged line present on both sides.
    Context,
    /// Line only present after the change.
    Added,
    /// Line only present before the change.
    Removed,
}

impl LineKind {
    /// Unified-diff prefix character for this kind.
    #[must_use]
    pub const fn prefix(self) -> char {
        match self {
            Self::Context => ' ',
            Self::Added => '+',
            Self::Removed => '-',
        }
    }
}

/// A single line of a hunk, without its prefix character.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DiffLine {
    pub kind: LineKind,
    pub content: String,
}

/// A contiguous block of a unified diff.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DiffHunk {
    /// File path relative to repository root.
    pub file_path: String,
    /// Starting line in the original file (1-indexed, before changes).
    pub old_start: u32,
    /// Number of lines in the original file.
    pub old_count: u32,
    /// Starting line in the new file (1-indexed, after changes).
    pub new_start: u32,
    /// Number of lines in the new file.
    pub new_count: u32,
    /// Ordered context / added / removed lines.
    pub lines: Vec<DiffLine>,
}

impl DiffHunk {
    /// Whether the hunk removes any line.
    #[must_use]
    pub fn has_deletions(&self) -> bool {
        self.lines.iter().any(|l| l.kind == LineKind::Removed)
    }

    /// Whether the hunk adds any line.
    #[must_use]
    pub fn has_additions(&self) -> bool {
        self.lines.iter().any(|l| l.kind == LineKind::Added)
    }

    /// Whether the hunk creates its file (nothing on the old side).
    #[must_use]
    pub const fn is_file_creation(&self) -> bool {
        self.old_start == 0 && self.old_count == 0
    }

    /// The `@@ -a,b +c,d @@` header line.
    #[must_use]
    pub fn header(&self) -> String {
        format!(
            "@@ -{},{} +{},{} @@",
            self.old_start, self.old_count, self.new_start, self.new_count
        )
    }

    /// Render the hunk body (header plus prefixed lines).
    #[must_use]
    pub fn body(&self) -> String {
        let mut out = self.header();
        out.push('\n');
        for line in &self.lines {
            out.push(line.kind.prefix());
            out.push_str(&line.content);
            out.push('\n');
        }
        out
    }

    /// Render a patch containing only this hunk.
    ///
    /// When `creates_file` is set the patch is emitted as a file creation so
    /// `git apply` accepts it against a tree where the path is absent.
    #[must_use]
    pub fn to_patch(&self, creates_file: bool) -> String {
        let mut out = String::new();
        let path = &self.file_path;
        let _ = writeln!(out, "diff --git a/{path} b/{path}");
        if creates_file {
            out.push_str("new file mode 100644\n--- /dev/null\n");
        } else {
            let _ = writeln!(out, "--- a/{path}");
        }
        let _ = writeln!(out, "+++ b/{path}");
        out.push_str(&self.body());
        out
    }
}

/// Which pair of trees `git diff` compares.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiffSource {
    /// Index against HEAD (`git diff --cached`).
    Staged,
    /// Working tree against the index (`git diff`).
    Unstaged,
    /// Working tree against HEAD (`git diff HEAD`).
    HeadToWorkingTree,
}

impl Repository {
    /// Get the current diff as a list of hunks.
    ///
    /// # Errors
    /// Returns error if git diff fails.
    pub fn diff_hunks(&self, source: DiffSource) -> Result<Vec<DiffHunk>> {
        let mut cmd = self.git()?.args(["diff", "--no-color", "--no-ext-diff"]);
        cmd = match source {
            DiffSource::Staged => cmd.arg("--cached"),
            DiffSource::Unstaged => cmd,
            DiffSource::HeadToWorkingTree => cmd.arg("HEAD"),
        };
        let stdout = cmd.run_checked()?;
        Ok(parse_diff_hunks(&stdout))
    }

    /// Binary-safe diff between two tree-ish revisions.
    ///
    /// # Errors
    /// Returns error if git diff fails.
    pub fn diff_trees(&self, from: &str, to: &str) -> Result<Vec<u8>> {
        self.git()?
            .args(["diff", "--no-color", "--no-ext-diff", "--binary", from, to])
            .run_checked_raw()
    }
}

/// Parse unified diff output into hunks.
#[must_use]
pub fn parse_diff_hunks(diff: &str) -> Vec<DiffHunk> {
    let mut hunks = Vec::new();
    let mut current_file: Option<String> = None;
    let mut current: Option<DiffHunk> = None;

    for line in diff.lines() {
        // New file header: diff --git a/path b/path
        if line.starts_with("diff --git ") {
            hunks.extend(current.take());
            current_file = line.split(" b/").nth(1).map(String::from);
            continue;
        }

        // Hunk header: @@ -old_start,old_count +new_start,new_count @@
        if line.starts_with("@@ ") {
            hunks.extend(current.take());
            if let (Some(file), Some(((old_start, old_count), (new_start, new_count)))) =
                (&current_file, parse_hunk_header(line))
            {
                current = Some(DiffHunk {
                    file_path: file.clone(),
                    old_start,
                    old_count,
                    new_start,
                    new_count,
                    lines: Vec::new(),
                });
            }
            continue;
        }

        let Some(hunk) = current.as_mut() else {
            // Headers between `diff --git` and the first `@@`
            continue;
        };

        let kind = match line.chars().next() {
            Some('+') => LineKind::Added,
            Some('-') => LineKind::Removed,
            Some(' ') | None => LineKind::Context,
            // "\ No newline at end of file" and anything unexpected
            _ => continue,
        };
        hunk.lines.push(DiffLine {
            kind,
            content: line.get(1..).unwrap_or("").to_string(),
        });
    }

    hunks.extend(current);
    hunks
}

/// Parse a hunk header line like "@@ -1,3 +1,4 @@" or "@@ -1 +1,2 @@"
fn parse_hunk_header(line: &str) -> Option<((u32, u32), (u32, u32))> {
    let line = line.trim_start_matches("@@ ");
    let line = line.split(" @@").next()?; // Handle trailing context

    let mut parts = line.split_whitespace();
    let old = parse_range(parts.next()?.strip_prefix('-')?)?;
    let new = parse_range(parts.next()?.strip_prefix('+')?)?;

    Some((old, new))
}

/// Parse a range like "1,3" or "1" into (start, count).
fn parse_range(s: &str) -> Option<(u32, u32)> {
    if let Some((start, count)) = s.split_once(',') {
        Some((start.parse().ok()?, count.parse().ok()?))
    } else {
        // Single line: "1" means start=1, count=1
        Some((s.parse().ok()?, 1))
    }
}

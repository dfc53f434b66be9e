//! Re-anchor hunks against the file content of an older commit.
//!
//! Hunks are recorded against the working tree. By the time their target
//! commit is checked out the same lines may sit at different offsets, so
//! each change is located again by text and a fresh patch is generated.

use std::collections::HashSet;
use std::fmt::Write as _;

use autosquash_git::{DiffHunk, LineKind};
use similar::TextDiff;
use tracing::debug;

use crate::error::{Error, Result};

/// What to do at the old-side line a [`LineChange`] is attached to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChangeOp {
    /// Replace the line with these lines (empty deletes it).
    Replace(Vec<String>),
    /// Keep the line and insert these lines after it.
    InsertAfter(Vec<String>),
}

/// One atomic edit extracted from a hunk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineChange {
    /// Text of the old-side line the change is attached to. `None` when the
    /// hunk has no old-side line to anchor on (top of file, zero context).
    pub old_line: Option<String>,
    /// Line number of that line in the hunk's old coordinates.
    pub old_number: u32,
    pub op: ChangeOp,
}

/// Split a hunk into line-level changes, in hunk order.
///
/// Within each run of removed/added lines, removed lines are paired with
/// added lines in order. Unpaired removed lines become deletions; unpaired
/// added lines go with the last removed line, or are inserted after the
/// preceding context line when nothing was removed.
#[must_use]
pub fn extract_changes(hunk: &DiffHunk) -> Vec<LineChange> {
    let mut changes = Vec::new();
    let mut next_old = if hunk.old_count == 0 {
        hunk.old_start + 1
    } else {
        hunk.old_start
    };
    let mut previous: (Option<String>, u32) = (None, next_old.saturating_sub(1));
    let mut removed: Vec<(String, u32)> = Vec::new();
    let mut added: Vec<String> = Vec::new();

    for line in &hunk.lines {
        match line.kind {
            LineKind::Removed => {
                if !added.is_empty() {
                    flush_run(&mut changes, &previous, &mut removed, &mut added);
                }
                removed.push((line.content.clone(), next_old));
                next_old += 1;
            }
            LineKind::Added => added.push(line.content.clone()),
            LineKind::Context => {
                flush_run(&mut changes, &previous, &mut removed, &mut added);
                previous = (Some(line.content.clone()), next_old);
                next_old += 1;
            }
        }
    }
    flush_run(&mut changes, &previous, &mut removed, &mut added);
    changes
}

fn flush_run(
    changes: &mut Vec<LineChange>,
    previous: &(Option<String>, u32),
    removed: &mut Vec<(String, u32)>,
    added: &mut Vec<String>,
) {
    if removed.is_empty() {
        if !added.is_empty() {
            changes.push(LineChange {
                old_line: previous.0.clone(),
                old_number: previous.1,
                op: ChangeOp::InsertAfter(std::mem::take(added)),
            });
        }
        return;
    }

    let last = removed.len() - 1;
    let mut added = std::mem::take(added).into_iter();
    for (i, (text, number)) in removed.drain(..).enumerate() {
        let new = if i == last {
            added.by_ref().collect()
        } else {
            added.next().into_iter().collect()
        };
        changes.push(LineChange {
            old_line: Some(text),
            old_number: number,
            op: ChangeOp::Replace(new),
        });
    }
}

/// Rebuilds a file's hunks as a patch against its current content.
#[derive(Debug, Clone, Copy)]
pub struct PatchCorrector {
    context: usize,
}

impl Default for PatchCorrector {
    fn default() -> Self {
        Self::new(3)
    }
}

impl PatchCorrector {
    /// Create a corrector emitting `context` lines around each change.
    #[must_use]
    pub const fn new(context: usize) -> Self {
        Self { context }
    }

    /// Apply every hunk of `path` to `current` and return the resulting text.
    ///
    /// `current` is `None` when the file does not exist at the checkout.
    /// Each recorded old line is matched against the first line with the
    /// same text (trailing whitespace ignored) not already claimed by an
    /// earlier change in the file. With many identical lines this can pick
    /// the wrong one; hunks are processed in old-start order so the choice
    /// is at least reproducible.
    ///
    /// # Errors
    /// Returns `PatchCorrection` when a recorded line is not in the file.
    pub fn corrected_content(
        &self,
        path: &str,
        current: Option<&str>,
        hunks: &[&DiffHunk],
    ) -> Result<String> {
        let current = current.unwrap_or("");
        let lines: Vec<&str> = current.lines().collect();
        let mut claimed: HashSet<usize> = HashSet::new();
        // (position, replaces_line, new lines)
        let mut edits: Vec<(usize, bool, Vec<String>)> = Vec::new();

        let mut ordered: Vec<&DiffHunk> = hunks.to_vec();
        ordered.sort_by_key(|h| (h.old_start, h.new_start));

        for change in ordered.iter().flat_map(|h| extract_changes(h)) {
            let index = match &change.old_line {
                Some(text) => {
                    let wanted = text.trim_end();
                    let index = (0..lines.len())
                        .find(|i| !claimed.contains(i) && lines[*i].trim_end() == wanted)
                        .ok_or_else(|| Error::PatchCorrection {
                            file: path.to_string(),
                            line: text.clone(),
                        })?;
                    claimed.insert(index);
                    if index + 1 != change.old_number as usize {
                        debug!(
                            %path,
                            recorded = change.old_number,
                            found = index + 1,
                            "line moved"
                        );
                    }
                    Some(index)
                }
                None => None,
            };

            match change.op {
                ChangeOp::Replace(new) => {
                    // Replace always carries an old line
                    if let Some(index) = index {
                        edits.push((index, true, new));
                    }
                }
                ChangeOp::InsertAfter(new) => {
                    let at = index.map_or_else(
                        || (change.old_number as usize).min(lines.len()),
                        |i| i + 1,
                    );
                    edits.push((at, false, new));
                }
            }
        }

        // Apply bottom-up; at equal positions the replacement goes first so
        // an insertion lands above the replaced line.
        edits.sort_by(|a, b| b.0.cmp(&a.0).then(b.1.cmp(&a.1)));
        let mut result: Vec<String> = lines.iter().map(|l| (*l).to_string()).collect();
        for (at, replaces, new) in edits {
            let end = if replaces { at + 1 } else { at };
            result.splice(at..end, new);
        }

        let mut out = result.join("\n");
        if !result.is_empty() && (current.is_empty() || current.ends_with('\n')) {
            out.push('\n');
        }
        Ok(out)
    }

    /// Build a single-file patch from `current` to the corrected content.
    ///
    /// Returns `None` if the hunks leave the file unchanged.
    ///
    /// # Errors
    /// Returns `PatchCorrection` when a recorded line is not in the file.
    pub fn correct(
        &self,
        path: &str,
        current: Option<&str>,
        hunks: &[&DiffHunk],
    ) -> Result<Option<String>> {
        let new = self.corrected_content(path, current, hunks)?;
        let old = current.unwrap_or("");
        if new == old && current.is_some() {
            return Ok(None);
        }

        let diff = TextDiff::from_lines(old, new.as_str());
        let body = diff
            .unified_diff()
            .context_radius(self.context)
            .to_string();
        if body.is_empty() {
            return Ok(None);
        }

        let mut patch = String::new();
        let _ = writeln!(patch, "diff --git a/{path} b/{path}");
        if current.is_some() {
            let _ = writeln!(patch, "--- a/{path}");
        } else {
            patch.push_str("new file mode 100644\n--- /dev/null\n");
        }
        let _ = writeln!(patch, "+++ b/{path}");
        patch.push_str(&body);
        Ok(Some(patch))
    }
}

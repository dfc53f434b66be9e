//! Hunk-to-commit mappings produced by target resolution.

use std::fmt;
use std::hash::{Hash, Hasher};

use autosquash_git::{BlameInfo, DiffHunk};

/// How a mapping's target was derived.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TargetingMethod {
    /// Blame of the hunk's own lines.
    BlameMatch,
    /// Blame of the lines immediately surrounding the hunk.
    ContextualBlameMatch,
    /// File did not exist at the merge base.
    FallbackNewFile,
    /// File existed but no branch commit was found by blame.
    FallbackExistingFile,
    /// Reused the target of an earlier hunk in the same file.
    FallbackConsistency,
}

impl fmt::Display for TargetingMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::BlameMatch => "blame match",
            Self::ContextualBlameMatch => "contextual blame match",
            Self::FallbackNewFile => "new file",
            Self::FallbackExistingFile => "no blame match",
            Self::FallbackConsistency => "same file as earlier hunk",
        };
        f.write_str(name)
    }
}

/// Confidence tier of a target assignment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Confidence {
    Low,
    Medium,
    High,
}

impl Confidence {
    /// Share threshold for [`Confidence::High`].
    pub const HIGH_SHARE: f64 = 0.8;
    /// Share threshold for [`Confidence::Medium`].
    pub const MEDIUM_SHARE: f64 = 0.5;

    /// Tier for the winning commit's share of examined lines.
    #[must_use]
    pub fn from_share(share: f64) -> Self {
        if share >= Self::HIGH_SHARE {
            Self::High
        } else if share >= Self::MEDIUM_SHARE {
            Self::Medium
        } else {
            Self::Low
        }
    }
}

impl fmt::Display for Confidence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        };
        f.write_str(name)
    }
}

/// Assignment of one hunk to a target commit.
///
/// Equality and hashing only look at the hunk's position and the targeting
/// method, so a mapping stays a valid set/map key while its target and
/// confidence are edited during review.
#[derive(Debug, Clone)]
pub struct HunkTargetMapping {
    pub hunk: DiffHunk,
    pub targeting_method: TargetingMethod,
    /// Blame lines the target was derived from.
    pub blame_info: Vec<BlameInfo>,
    /// Ordered candidates offered when the user has to pick.
    pub fallback_candidates: Option<Vec<String>>,
    target_commit: Option<String>,
    confidence: Confidence,
    needs_user_selection: bool,
}

impl HunkTargetMapping {
    /// A mapping with a resolved target.
    #[must_use]
    pub const fn resolved(
        hunk: DiffHunk,
        target: String,
        confidence: Confidence,
        method: TargetingMethod,
        blame_info: Vec<BlameInfo>,
    ) -> Self {
        Self {
            hunk,
            targeting_method: method,
            blame_info,
            fallback_candidates: None,
            target_commit: Some(target),
            confidence,
            needs_user_selection: false,
        }
    }

    /// A mapping that needs a human to choose among `candidates`.
    #[must_use]
    pub const fn needs_selection(
        hunk: DiffHunk,
        method: TargetingMethod,
        candidates: Vec<String>,
    ) -> Self {
        Self {
            hunk,
            targeting_method: method,
            blame_info: Vec::new(),
            fallback_candidates: Some(candidates),
            target_commit: None,
            confidence: Confidence::Low,
            needs_user_selection: true,
        }
    }

    /// Assign (or re-assign) the target. Clears the selection flag.
    pub fn assign_target(&mut self, commit: impl Into<String>, confidence: Confidence) {
        self.target_commit = Some(commit.into());
        self.confidence = confidence;
        self.needs_user_selection = false;
    }

    #[must_use]
    pub fn target_commit(&self) -> Option<&str> {
        self.target_commit.as_deref()
    }

    #[must_use]
    pub const fn confidence(&self) -> Confidence {
        self.confidence
    }

    #[must_use]
    pub const fn needs_user_selection(&self) -> bool {
        self.needs_user_selection
    }

    #[must_use]
    pub fn file_path(&self) -> &str {
        &self.hunk.file_path
    }

    fn identity(&self) -> (&str, u32, u32, u32, u32, TargetingMethod) {
        (
            &self.hunk.file_path,
            self.hunk.old_start,
            self.hunk.old_count,
            self.hunk.new_start,
            self.hunk.new_count,
            self.targeting_method,
        )
    }
}

impl PartialEq for HunkTargetMapping {
    fn eq(&self, other: &Self) -> bool {
        self.identity() == other.identity()
    }
}

impl Eq for HunkTargetMapping {}

impl Hash for HunkTargetMapping {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.identity().hash(state);
    }
}

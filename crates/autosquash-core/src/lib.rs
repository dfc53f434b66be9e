//! # autosquash-core
//!
//! Redistributes uncommitted changes into the branch commits that own them.
//! Resolves each hunk to a target commit, squashes approved hunks into
//! history through automated interactive rebases, and restores the hunks
//! left out of the squash into the working tree with rollback on failure.

pub mod apply;
pub mod backup;
pub mod config;
pub mod error;
pub mod interrupt;
pub mod mapping;
pub mod metadata;
pub mod patch;
pub mod rebase;
pub mod resolve;
pub mod safety;
pub mod session;

#[cfg(test)]
mod test_support;

pub use apply::{ApplyError, ApplyHandler, ApplyReport, Strategy, StrategyAttempt, StrategySelector};
pub use backup::StashBackup;
pub use config::{Config, StrategyChoice};
pub use error::{Error, Result};
pub use interrupt::InterruptGuard;
pub use mapping::{Confidence, HunkTargetMapping, TargetingMethod};
pub use metadata::{CommitInfo, GitMetadata, MetadataProvider};
pub use patch::PatchCorrector;
pub use rebase::{RebaseError, RebaseManager, RebasePhase, RebaseSummary};
pub use resolve::TargetResolver;
pub use session::{ConflictChoice, SessionError, SessionOutcome, SquashSession};

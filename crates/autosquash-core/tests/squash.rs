//! History rewrite and ignored-hunk restore against real repositories.

#![allow(clippy::expect_used, clippy::unwrap_used)]

mod common;

use autosquash_core::config::ApplyConfig;
use autosquash_core::session::partition;
use autosquash_core::{
    ApplyError, ApplyHandler, Confidence, Config, ConflictChoice, HunkTargetMapping, RebaseError,
    RebaseManager, RebasePhase, SessionError, SquashSession, Strategy, StrategyChoice,
};
use autosquash_git::{DiffHunk, DiffSource};
use common::{Fixture, read, write};

fn edit(fx: &Fixture, path: &str, from: &str, to: &str) {
    let content = read(fx.dir(), path).replace(from, to);
    write(fx.dir(), path, &content);
}

#[test]
fn test_squash_rewrites_targets_oldest_first() {
    let fx = Fixture::new();
    edit(&fx, "a.txt", "A4", "A4 changed");
    edit(&fx, "b.txt", "B5", "B5 changed");

    let session = SquashSession::new(&fx.repo, Config::default()).unwrap();
    let mut mappings = session.resolve(DiffSource::HeadToWorkingTree).unwrap();
    // Newest target first on input
    mappings.reverse();

    let outcome = session
        .squash(&mappings, &[], |_, _| ConflictChoice::Abort)
        .unwrap();
    assert_eq!(outcome.rebase.targets, vec![fx.c1.clone(), fx.c2.clone()]);
    assert_eq!(outcome.rebase.hunks, 2);

    let branch = fx.branch();
    assert_eq!(branch.len(), 2);
    assert_eq!(fx.subject(&branch[0]), "Tweak a");
    assert_eq!(fx.subject(&branch[1]), "Tweak b");
    assert!(fx.show(&branch[0], "a.txt").contains("A4 changed\n"));
    assert!(!fx.show(&branch[0], "b.txt").contains("B5"));
    assert!(fx.show(&branch[1], "b.txt").contains("B5 changed\n"));

    assert!(fx.repo.is_clean().unwrap());
    assert_eq!(fx.stash_count(), 0);
    assert!(!fx.repo.is_rebasing());
}

#[test]
fn test_ignored_hunks_are_restored_after_squash() {
    let fx = Fixture::new();
    edit(&fx, "a.txt", "A4", "A4 changed");
    edit(&fx, "b.txt", "B5", "B5 changed");

    let session = SquashSession::new(&fx.repo, Config::default()).unwrap();
    let mappings = session.resolve(DiffSource::HeadToWorkingTree).unwrap();
    let (approved, ignored) = partition(mappings, |m| m.file_path() == "a.txt");

    let outcome = session
        .squash(&approved, &ignored, |_, _| ConflictChoice::Abort)
        .unwrap();
    let report = outcome.restore.unwrap();
    assert_eq!(report.hunks, 1);
    assert!(report.strategy.is_some());

    assert!(fx.show("HEAD~1", "a.txt").contains("A4 changed\n"));
    assert!(!fx.show("HEAD", "b.txt").contains("B5 changed"));
    assert!(read(fx.dir(), "b.txt").contains("B5 changed\n"));
    assert!(read(fx.dir(), "a.txt").contains("A4 changed\n"));

    assert_eq!(fx.stash_count(), 0);
    assert!(fx.repo.linked_worktrees().unwrap().is_empty());
}

#[test]
fn test_untracked_files_survive_squash() {
    let fx = Fixture::new();
    edit(&fx, "a.txt", "A4", "A4 changed");
    write(fx.dir(), "notes.txt", "untracked notes\n");
    std::fs::create_dir(fx.dir().join("scratch")).unwrap();
    write(fx.dir(), "scratch/todo.txt", "todo\n");

    let session = SquashSession::new(&fx.repo, Config::default()).unwrap();
    let mappings = session.resolve(DiffSource::HeadToWorkingTree).unwrap();
    assert_eq!(mappings.len(), 1);
    session
        .squash(&mappings, &[], |_, _| ConflictChoice::Abort)
        .unwrap();

    assert!(fx.show("HEAD~1", "a.txt").contains("A4 changed\n"));
    assert_eq!(read(fx.dir(), "notes.txt"), "untracked notes\n");
    assert_eq!(read(fx.dir(), "scratch/todo.txt"), "todo\n");
    // Still untracked, not staged
    let status = common::git(fx.dir(), &["status", "--porcelain"]);
    assert!(status.contains("?? notes.txt"), "{status}");
    assert!(status.contains("?? scratch/"), "{status}");
    assert_eq!(fx.stash_count(), 0);
}

#[test]
fn test_nothing_approved_leaves_tree_alone() {
    let fx = Fixture::new();
    edit(&fx, "a.txt", "A4", "A4 changed");
    let head = fx.repo.head_commit().unwrap();

    let session = SquashSession::new(&fx.repo, Config::default()).unwrap();
    let mappings = session.resolve(DiffSource::HeadToWorkingTree).unwrap();
    let (approved, ignored) = partition(mappings, |_| false);

    let outcome = session
        .squash(&approved, &ignored, |_, _| ConflictChoice::Abort)
        .unwrap();
    assert!(outcome.restore.is_none());
    assert_eq!(fx.repo.head_commit().unwrap(), head);
    assert!(read(fx.dir(), "a.txt").contains("A4 changed\n"));
}

/// Move `c.txt`'s l1 edit into c1, where it collides with c2's l2 edit.
fn conflicting_mappings(fx: &Fixture) -> Vec<HunkTargetMapping> {
    write(fx.dir(), "c.txt", "first\nL2\nl3\n");
    let session = SquashSession::new(&fx.repo, Config::default()).unwrap();
    let mut mappings = session.resolve(DiffSource::HeadToWorkingTree).unwrap();
    mappings[0].assign_target(fx.c1.clone(), Confidence::High);
    mappings
}

#[test]
fn test_conflict_then_abort_restores_everything() {
    let fx = Fixture::new();
    let head = fx.repo.head_commit().unwrap();
    let mappings = conflicting_mappings(&fx);

    let mut manager = RebaseManager::new(&fx.repo, fx.base.clone());
    let err = manager.execute(&mappings).unwrap_err();
    match err {
        RebaseError::Conflict { commit, files } => {
            assert_eq!(commit, fx.c1);
            assert_eq!(files, vec!["c.txt".to_string()]);
        }
        other => panic!("expected conflict, got {other}"),
    }
    assert_eq!(manager.phase(), RebasePhase::Conflict);
    assert!(fx.repo.is_rebasing());
    assert!(manager.stash().is_some());

    manager.abort().unwrap();
    assert_eq!(manager.phase(), RebasePhase::Aborted);
    assert!(!fx.repo.is_rebasing());
    assert_eq!(fx.repo.head_commit().unwrap(), head);
    assert_eq!(read(fx.dir(), "c.txt"), "first\nL2\nl3\n");
    assert_eq!(fx.stash_count(), 0);
}

#[test]
fn test_conflict_then_resume_completes() {
    let fx = Fixture::new();
    let mappings = conflicting_mappings(&fx);

    let mut manager = RebaseManager::new(&fx.repo, fx.base.clone());
    assert!(matches!(
        manager.execute(&mappings),
        Err(RebaseError::Conflict { .. })
    ));

    write(fx.dir(), "c.txt", "first\nL2\nl3\n");
    let summary = manager.resume().unwrap();
    assert_eq!(summary.targets, vec![fx.c1.clone()]);
    assert!(!manager.is_pending());

    assert_eq!(fx.show("HEAD~1", "c.txt"), "first\nl2\nl3\n");
    assert_eq!(fx.show("HEAD", "c.txt"), "first\nL2\nl3\n");
    assert_eq!(fx.subject("HEAD"), "Tweak b");

    let stash = summary.stash.unwrap();
    fx.repo.stash_drop(&stash).unwrap();
}

#[test]
fn test_interrupt_during_resume_aborts_and_restores() {
    let fx = Fixture::new();
    let head = fx.repo.head_commit().unwrap();
    let mappings = conflicting_mappings(&fx);

    let mut manager = RebaseManager::new(&fx.repo, fx.base.clone());
    assert!(matches!(
        manager.execute(&mappings),
        Err(RebaseError::Conflict { .. })
    ));

    write(fx.dir(), "c.txt", "first\nL2\nl3\n");
    manager
        .interrupt_flag()
        .unwrap()
        .store(true, std::sync::atomic::Ordering::SeqCst);
    let err = manager.resume().unwrap_err();
    assert!(matches!(err, RebaseError::Interrupted), "got {err}");
    assert_eq!(manager.phase(), RebasePhase::Aborted);
    assert!(!manager.is_pending());

    assert!(!fx.repo.is_rebasing());
    assert_eq!(fx.repo.head_commit().unwrap(), head);
    assert_eq!(read(fx.dir(), "c.txt"), "first\nL2\nl3\n");
    assert_eq!(fx.stash_count(), 0);
}

#[cfg(unix)]
#[test]
fn test_amend_retries_after_hook_rewrites_files() {
    use std::os::unix::fs::PermissionsExt;

    let fx = Fixture::new();
    let hook = fx.dir().join(".git/hooks/pre-commit");
    std::fs::create_dir_all(hook.parent().unwrap()).unwrap();
    // First run appends to a tracked file and rejects the commit
    std::fs::write(
        &hook,
        "#!/bin/sh\n\
         marker=\"$(git rev-parse --git-dir)/hook-ran\"\n\
         if [ -f \"$marker\" ]; then exit 0; fi\n\
         touch \"$marker\"\n\
         echo hooked >> a.txt\n\
         exit 1\n",
    )
    .unwrap();
    std::fs::set_permissions(&hook, std::fs::Permissions::from_mode(0o755)).unwrap();

    edit(&fx, "a.txt", "A4", "A4 changed");
    let session = SquashSession::new(&fx.repo, Config::default()).unwrap();
    let mappings = session.resolve(DiffSource::HeadToWorkingTree).unwrap();
    session
        .squash(&mappings, &[], |_, _| ConflictChoice::Abort)
        .unwrap();

    let branch = fx.branch();
    assert_eq!(fx.subject(&branch[0]), "Tweak a");
    let target = fx.show(&branch[0], "a.txt");
    assert!(target.contains("A4 changed\n"), "{target}");
    assert!(target.ends_with("a8\nhooked\n"), "{target}");
    assert!(fx.dir().join(".git/hook-ran").exists());
    assert!(fx.repo.is_clean().unwrap());
}

#[test]
fn test_dropping_pending_manager_aborts() {
    let fx = Fixture::new();
    let head = fx.repo.head_commit().unwrap();
    let mappings = conflicting_mappings(&fx);
    {
        let mut manager = RebaseManager::new(&fx.repo, fx.base.clone());
        assert!(manager.execute(&mappings).is_err());
    }
    assert!(!fx.repo.is_rebasing());
    assert_eq!(fx.repo.head_commit().unwrap(), head);
    assert_eq!(read(fx.dir(), "c.txt"), "first\nL2\nl3\n");
    assert_eq!(fx.stash_count(), 0);
}

#[test]
fn test_session_abort_choice() {
    let fx = Fixture::new();
    let mappings = conflicting_mappings(&fx);
    let session = SquashSession::new(&fx.repo, Config::default()).unwrap();

    let mut asked = 0;
    let err = session
        .squash(&mappings, &[], |_, files| {
            asked += 1;
            assert_eq!(files, ["c.txt".to_string()]);
            ConflictChoice::Abort
        })
        .unwrap_err();
    assert_eq!(asked, 1);
    assert!(matches!(err, SessionError::Aborted { .. }));
    assert!(!fx.repo.is_rebasing());
    assert_eq!(fx.stash_count(), 0);
}

#[test]
fn test_unlocatable_change_aborts_and_restores() {
    let fx = Fixture::new();
    let head = fx.repo.head_commit().unwrap();
    edit(&fx, "b.txt", "B5", "B5 changed");

    let session = SquashSession::new(&fx.repo, Config::default()).unwrap();
    let mut mappings = session.resolve(DiffSource::HeadToWorkingTree).unwrap();
    // c1 predates the B5 line
    mappings[0].assign_target(fx.c1.clone(), Confidence::Low);

    let mut manager = RebaseManager::new(&fx.repo, fx.base.clone());
    let err = manager.execute(&mappings).unwrap_err();
    assert!(matches!(err, RebaseError::Failed(_)), "got {err}");
    assert_eq!(manager.phase(), RebasePhase::Aborted);

    assert!(!fx.repo.is_rebasing());
    assert_eq!(fx.repo.head_commit().unwrap(), head);
    assert!(read(fx.dir(), "b.txt").contains("B5 changed\n"));
    assert_eq!(fx.stash_count(), 0);
}

fn recorded_hunks(fx: &Fixture) -> Vec<DiffHunk> {
    edit(fx, "a.txt", "A4", "A4 changed");
    let hunks = fx.repo.diff_hunks(DiffSource::HeadToWorkingTree).unwrap();
    fx.repo.reset_hard("HEAD").unwrap();
    hunks
}

#[test]
fn test_each_strategy_restores_hunks() {
    for choice in [
        StrategyChoice::Worktree,
        StrategyChoice::Index,
        StrategyChoice::Legacy,
    ] {
        let fx = Fixture::new();
        let hunks = recorded_hunks(&fx);

        let handler = ApplyHandler::new(&fx.repo, &ApplyConfig { strategy: choice });
        let report = handler.apply_hunks(&hunks).unwrap();
        assert_eq!(report.strategy.map(|s| s.to_string()), Some(choice.to_string()));
        assert!(read(fx.dir(), "a.txt").contains("A4 changed\n"), "{choice}");
        // Index strategy must not leave anything staged
        assert!(
            fx.repo
                .git()
                .unwrap()
                .args(["diff", "--cached", "--quiet"])
                .run()
                .unwrap()
                .success(),
            "{choice}"
        );
        assert_eq!(fx.stash_count(), 0);
        assert!(fx.repo.linked_worktrees().unwrap().is_empty());
    }
}

#[test]
fn test_failed_dry_run_leaves_tree_byte_identical() {
    let fx = Fixture::new();
    let hunks = recorded_hunks(&fx);

    // The tree moved on since the hunks were recorded
    write(fx.dir(), "a.txt", "rewritten\n");
    write(fx.dir(), "notes.txt", "untracked notes\n");
    let before_a = read(fx.dir(), "a.txt");
    let before_notes = read(fx.dir(), "notes.txt");
    let stashes = fx.stash_count();

    let handler = ApplyHandler::new(&fx.repo, &ApplyConfig::default());
    let err = handler.apply_hunks(&hunks).unwrap_err();
    match err {
        ApplyError::AllStrategiesFailed { attempts } => {
            let tried: Vec<Strategy> = attempts.iter().map(|a| a.strategy).collect();
            assert_eq!(tried, handler.strategies());
            assert!(tried.ends_with(&[Strategy::Index, Strategy::Legacy]));
        }
        other => panic!("expected all strategies to fail, got {other}"),
    }

    assert_eq!(read(fx.dir(), "a.txt"), before_a);
    assert_eq!(read(fx.dir(), "notes.txt"), before_notes);
    assert_eq!(fx.stash_count(), stashes);
    assert!(fx.repo.linked_worktrees().unwrap().is_empty());
}

#[test]
fn test_unsafe_path_is_rejected_before_any_mutation() {
    let fx = Fixture::new();
    let mut hunks = recorded_hunks(&fx);
    hunks[0].file_path = "../escape.txt".into();
    write(fx.dir(), "a.txt", "dirty\n");

    let handler = ApplyHandler::new(&fx.repo, &ApplyConfig::default());
    let err = handler.apply_hunks(&hunks).unwrap_err();
    assert!(matches!(err, ApplyError::UnsafePath(_)));
    assert_eq!(read(fx.dir(), "a.txt"), "dirty\n");
    assert_eq!(fx.stash_count(), 0);
}

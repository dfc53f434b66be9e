//! Throwaway repositories for unit tests.

#![allow(clippy::unwrap_used)]

use std::fs;
use std::path::Path;

use autosquash_git::{GitCommand, Repository};
use tempfile::TempDir;

/// Run git in `dir`, panicking on failure.
pub fn git(dir: &Path, args: &[&str]) -> String {
    let out = GitCommand::new(dir).args(args).run().unwrap();
    assert!(out.success(), "git {args:?} failed: {}", out.stderr);
    out.stdout_lossy()
}

/// A repository with one commit adding `file.txt` ("one\ntwo\nthree\n").
pub fn init_test_repo() -> (TempDir, Repository) {
    let temp = TempDir::new().unwrap();
    git(temp.path(), &["init", "--quiet"]);
    git(temp.path(), &["config", "user.email", "test@example.com"]);
    git(temp.path(), &["config", "user.name", "Test User"]);
    git(temp.path(), &["config", "commit.gpgsign", "false"]);
    fs::write(temp.path().join("file.txt"), "one\ntwo\nthree\n").unwrap();
    git(temp.path(), &["add", "."]);
    git(temp.path(), &["commit", "--quiet", "-m", "Initial commit"]);

    let repo = Repository::open(temp.path()).unwrap();
    (temp, repo)
}

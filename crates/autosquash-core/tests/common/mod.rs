//! Shared fixtures for integration tests.

#![allow(clippy::expect_used, clippy::unwrap_used, dead_code)]

use std::fs;
use std::path::Path;

use autosquash_git::{GitCommand, Repository};
use tempfile::TempDir;

/// Run git in `dir`, panicking on failure, and return stdout.
pub fn git(dir: &Path, args: &[&str]) -> String {
    let out = GitCommand::new(dir).args(args).run().expect("failed to spawn git");
    assert!(out.success(), "git {args:?} failed: {}", out.stderr);
    out.stdout_lossy()
}

pub fn read(dir: &Path, path: &str) -> String {
    fs::read_to_string(dir.join(path)).expect("failed to read file")
}

pub fn write(dir: &Path, path: &str, contents: &str) {
    fs::write(dir.join(path), contents).expect("failed to write file");
}

fn commit_all(dir: &Path, message: &str) -> String {
    git(dir, &["add", "-A"]);
    git(dir, &["commit", "--quiet", "-m", message]);
    git(dir, &["rev-parse", "HEAD"]).trim().to_string()
}

/// A `feature` branch with two commits on top of `main`.
///
/// - base (main): `a.txt` a1..a8, `b.txt` b1..b8, `c.txt` l1..l3
/// - c1 "Tweak a": a4, a5 -> A4, A5
/// - c2 "Tweak b": b4, b5 -> B4, B5 and l2 -> L2
pub struct Fixture {
    pub temp: TempDir,
    pub repo: Repository,
    pub base: String,
    pub c1: String,
    pub c2: String,
}

impl Fixture {
    pub fn new() -> Self {
        let temp = TempDir::new().expect("failed to create temp dir");
        let dir = temp.path();
        git(dir, &["init", "--quiet"]);
        git(dir, &["config", "user.email", "test@example.com"]);
        git(dir, &["config", "user.name", "Test User"]);
        git(dir, &["config", "commit.gpgsign", "false"]);
        git(dir, &["config", "core.editor", "true"]);

        write(dir, "a.txt", &numbered("a", 8));
        write(dir, "b.txt", &numbered("b", 8));
        write(dir, "c.txt", "l1\nl2\nl3\n");
        let base = commit_all(dir, "Initial commit");
        git(dir, &["branch", "-M", "main"]);
        git(dir, &["checkout", "--quiet", "-b", "feature"]);

        write(dir, "a.txt", &numbered("a", 8).replace("a4\na5", "A4\nA5"));
        let c1 = commit_all(dir, "Tweak a");

        write(dir, "b.txt", &numbered("b", 8).replace("b4\nb5", "B4\nB5"));
        write(dir, "c.txt", "l1\nL2\nl3\n");
        let c2 = commit_all(dir, "Tweak b");

        let repo = Repository::open(dir).expect("failed to open repo");
        Self {
            temp,
            repo,
            base,
            c1,
            c2,
        }
    }

    pub fn dir(&self) -> &Path {
        self.temp.path()
    }

    /// Branch commits after the merge base, oldest first.
    pub fn branch(&self) -> Vec<String> {
        git(self.dir(), &["rev-list", "--reverse", &format!("{}..HEAD", self.base)])
            .lines()
            .map(String::from)
            .collect()
    }

    /// Contents of `path` at `rev`.
    pub fn show(&self, rev: &str, path: &str) -> String {
        git(self.dir(), &["show", &format!("{rev}:{path}")])
    }

    pub fn subject(&self, rev: &str) -> String {
        git(self.dir(), &["log", "-1", "--format=%s", rev])
            .trim()
            .to_string()
    }

    pub fn stash_count(&self) -> usize {
        self.repo.stash_list().unwrap().len()
    }
}

/// `{prefix}1\n..{prefix}{n}\n`
pub fn numbered(prefix: &str, n: usize) -> String {
    (1..=n).map(|i| format!("{prefix}{i}\n")).collect()
}

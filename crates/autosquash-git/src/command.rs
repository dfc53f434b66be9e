//! Subprocess runner for the git CLI.
//!
//! Every invocation is bounded by a wall-clock limit. A child that exceeds it
//! is killed and reported as [`Error::Timeout`]; callers treat that as a hard
//! failure of the invocation, never as something to retry.

use std::ffi::{OsStr, OsString};
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use tracing::{debug, warn};

use crate::error::{Error, Result};

/// Default wall-clock limit for a single git invocation.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(300);

const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Captured result of a finished git process.
#[derive(Debug, Clone)]
pub struct GitOutput {
    /// Exit status of the process.
    pub status: ExitStatus,
    /// Raw stdout bytes (patches may not be valid UTF-8).
    pub stdout: Vec<u8>,
    /// Stderr, lossily decoded.
    pub stderr: String,
}

impl GitOutput {
    /// Whether the process exited successfully.
    #[must_use]
    pub fn success(&self) -> bool {
        self.status.success()
    }

    /// Stdout decoded as UTF-8, replacing invalid sequences.
    #[must_use]
    pub fn stdout_lossy(&self) -> String {
        String::from_utf8_lossy(&self.stdout).into_owned()
    }
}

/// Builder for a single git invocation.
#[derive(Debug, Clone)]
pub struct GitCommand {
    args: Vec<OsString>,
    envs: Vec<(OsString, OsString)>,
    cwd: PathBuf,
    timeout: Duration,
}

impl GitCommand {
    /// Create a command that runs in `cwd` with the default timeout.
    #[must_use]
    pub fn new(cwd: impl Into<PathBuf>) -> Self {
        Self {
            args: Vec::new(),
            envs: Vec::new(),
            cwd: cwd.into(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Append one argument.
    #[must_use]
    pub fn arg(mut self, arg: impl AsRef<OsStr>) -> Self {
        self.args.push(arg.as_ref().to_os_string());
        self
    }

    /// Append several arguments.
    #[must_use]
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        self.args
            .extend(args.into_iter().map(|a| a.as_ref().to_os_string()));
        self
    }

    /// Set an environment variable for the child.
    #[must_use]
    pub fn env(mut self, key: impl AsRef<OsStr>, value: impl AsRef<OsStr>) -> Self {
        self.envs
            .push((key.as_ref().to_os_string(), value.as_ref().to_os_string()));
        self
    }

    /// Override the wall-clock limit.
    #[must_use]
    pub const fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Working directory the command runs in.
    #[must_use]
    pub fn cwd(&self) -> &Path {
        &self.cwd
    }

    /// The argument list joined for messages.
    #[must_use]
    pub fn display(&self) -> String {
        self.args
            .iter()
            .map(|a| a.to_string_lossy().into_owned())
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Run the command and capture its output regardless of exit status.
    ///
    /// # Errors
    /// Returns `Io` if git cannot be spawned, `Timeout` if the limit is hit.
    pub fn run(&self) -> Result<GitOutput> {
        debug!(command = %self.display(), cwd = %self.cwd.display(), "git");

        let mut child = Command::new("git")
            .args(&self.args)
            .envs(self.envs.iter().map(|(k, v)| (k, v)))
            .current_dir(&self.cwd)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()?;

        let stdout = child.stdout.take().map(spawn_reader);
        let stderr = child.stderr.take().map(spawn_reader);

        let Some(status) = wait_with_deadline(&mut child, self.timeout)? else {
            // Reader threads are left detached: grandchildren may still hold the pipes.
            if let Err(e) = child.kill() {
                warn!("failed to kill timed out git process: {e}");
            }
            let _ = child.wait();
            return Err(Error::Timeout {
                command: self.display(),
                seconds: self.timeout.as_secs(),
            });
        };

        Ok(GitOutput {
            status,
            stdout: collect(stdout),
            stderr: String::from_utf8_lossy(&collect(stderr)).into_owned(),
        })
    }

    /// Run the command and return stdout, failing on a non-zero exit.
    ///
    /// # Errors
    /// Returns `CommandFailed` carrying stderr when git exits non-zero.
    pub fn run_checked(&self) -> Result<String> {
        self.run_checked_raw()
            .map(|out| String::from_utf8_lossy(&out).into_owned())
    }

    /// Like [`run_checked`](Self::run_checked) but returns raw stdout bytes.
    ///
    /// # Errors
    /// Returns `CommandFailed` carrying stderr when git exits non-zero.
    pub fn run_checked_raw(&self) -> Result<Vec<u8>> {
        let output = self.run()?;
        if output.success() {
            Ok(output.stdout)
        } else {
            Err(Error::CommandFailed {
                command: self.display(),
                stderr: output.stderr.trim().to_string(),
            })
        }
    }
}

fn spawn_reader<R: Read + Send + 'static>(mut reader: R) -> JoinHandle<Vec<u8>> {
    thread::spawn(move || {
        let mut buf = Vec::new();
        let _ = reader.read_to_end(&mut buf);
        buf
    })
}

fn collect(handle: Option<JoinHandle<Vec<u8>>>) -> Vec<u8> {
    handle.and_then(|h| h.join().ok()).unwrap_or_default()
}

fn wait_with_deadline(child: &mut Child, timeout: Duration) -> std::io::Result<Option<ExitStatus>> {
    let deadline = Instant::now() + timeout;
    loop {
        if let Some(status) = child.try_wait()? {
            return Ok(Some(status));
        }
        if Instant::now() >= deadline {
            return Ok(None);
        }
        thread::sleep(POLL_INTERVAL);
    }
}

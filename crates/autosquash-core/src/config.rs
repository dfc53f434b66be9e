//! Configuration management for autosquash.

use std::fmt;
use std::fs;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Environment variable that forces an application strategy.
pub const STRATEGY_ENV: &str = "GIT_AUTOSQUASH_STRATEGY";

/// Autosquash configuration loaded from .git/autosquash/config.toml.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// General settings.
    #[serde(default)]
    pub general: GeneralConfig,

    /// Target resolution settings.
    #[serde(default)]
    pub resolve: ResolveConfig,

    /// History rewrite settings.
    #[serde(default)]
    pub rebase: RebaseConfig,

    /// Ignored-hunk restoration settings.
    #[serde(default)]
    pub apply: ApplyConfig,
}

impl Config {
    /// Directory (under the git dir) holding the config file.
    pub const DIR: &'static str = "autosquash";
    /// File name of the config file.
    pub const FILE: &'static str = "config.toml";

    /// Load config from a TOML file.
    ///
    /// # Errors
    /// Returns error if file can't be read or parsed.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load the repository config and apply environment overrides.
    ///
    /// # Errors
    /// Returns error if the file is invalid or the override is unknown.
    pub fn load_for_repo(git_dir: impl AsRef<Path>) -> Result<Self> {
        let path = git_dir.as_ref().join(Self::DIR).join(Self::FILE);
        let mut config = Self::load(path)?;
        config.apply_env_override(std::env::var(STRATEGY_ENV).ok().as_deref())?;
        Ok(config)
    }

    /// Apply a strategy override as read from [`STRATEGY_ENV`].
    ///
    /// # Errors
    /// Returns `InvalidConfig` for unknown strategy names.
    pub fn apply_env_override(&mut self, value: Option<&str>) -> Result<()> {
        if let Some(value) = value.map(str::trim).filter(|v| !v.is_empty()) {
            self.apply.strategy = value.parse()?;
        }
        Ok(())
    }

    /// Save config to a TOML file.
    ///
    /// # Errors
    /// Returns error if serialization or write fails.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let content =
            toml::to_string_pretty(self).map_err(|e| std::io::Error::other(e.to_string()))?;
        if let Some(parent) = path.as_ref().parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, content)?;
        Ok(())
    }

    /// Wall-clock limit for each git invocation.
    #[must_use]
    pub const fn git_timeout(&self) -> Duration {
        Duration::from_secs(self.general.git_timeout_secs)
    }

    fn validate(&self) -> Result<()> {
        if self.general.git_timeout_secs == 0 {
            return Err(Error::InvalidConfig(
                "general.git_timeout_secs must be positive".into(),
            ));
        }
        if self.resolve.contextual_window == 0 {
            return Err(Error::InvalidConfig(
                "resolve.contextual_window must be positive".into(),
            ));
        }
        Ok(())
    }
}

/// General settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Seconds before a git invocation is killed.
    #[serde(default = "default_git_timeout_secs")]
    pub git_timeout_secs: u64,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            git_timeout_secs: default_git_timeout_secs(),
        }
    }
}

const fn default_git_timeout_secs() -> u64 {
    300
}

/// Target resolution settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolveConfig {
    /// Lines blamed on either side of a pure addition.
    #[serde(default = "default_blame_context")]
    pub blame_context: u32,

    /// Lines blamed around a hunk when the first blame finds nothing.
    #[serde(default = "default_contextual_window")]
    pub contextual_window: u32,
}

impl Default for ResolveConfig {
    fn default() -> Self {
        Self {
            blame_context: default_blame_context(),
            contextual_window: default_contextual_window(),
        }
    }
}

const fn default_blame_context() -> u32 {
    3
}

const fn default_contextual_window() -> u32 {
    1
}

/// History rewrite settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RebaseConfig {
    /// Fresh context lines around each corrected change.
    #[serde(default = "default_patch_context")]
    pub patch_context: usize,
}

impl Default for RebaseConfig {
    fn default() -> Self {
        Self {
            patch_context: default_patch_context(),
        }
    }
}

const fn default_patch_context() -> usize {
    3
}

/// Ignored-hunk restoration settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ApplyConfig {
    /// Strategy selection; `auto` probes for worktree support.
    #[serde(default)]
    pub strategy: StrategyChoice,
}

/// Requested application strategy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StrategyChoice {
    /// Pick the best supported strategy.
    #[default]
    Auto,
    /// Force the isolated-worktree strategy.
    Worktree,
    /// Force the index-manipulation strategy.
    Index,
    /// Force the direct-patch strategy.
    Legacy,
}

impl FromStr for StrategyChoice {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "auto" => Ok(Self::Auto),
            "worktree" => Ok(Self::Worktree),
            "index" => Ok(Self::Index),
            "legacy" => Ok(Self::Legacy),
            other => Err(Error::InvalidConfig(format!(
                "unknown strategy '{other}' (expected auto, worktree, index or legacy)"
            ))),
        }
    }
}

impl fmt::Display for StrategyChoice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Auto => "auto",
            Self::Worktree => "worktree",
            Self::Index => "index",
            Self::Legacy => "legacy",
        };
        f.write_str(name)
    }
}

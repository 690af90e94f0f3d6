//! Configuration management for Treeline.
//!
//! Handles loading and saving configuration from TOML files.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Directory (relative to the repository root) holding all orchestrator
/// state: feature records, the id allocator, and the config file.
pub const STATE_DIR: &str = ".treeline";

/// Application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// General settings
    pub general: GeneralConfig,

    /// Workspace settings
    pub workspace: WorkspaceConfig,

    /// Scheduler settings
    pub scheduler: SchedulerConfig,
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Branch that feature branches are created from and merged back into
    pub base_branch: String,

    /// Maximum slug length in characters
    pub max_slug_length: usize,

    /// Maximum number of words kept in a slug
    pub max_slug_words: usize,
}

/// Workspace settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkspaceConfig {
    /// Directory (relative to the repository root) where feature worktrees
    /// are created, one subdirectory per branch
    pub root: PathBuf,
}

/// Scheduler settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Whether a skipped dependency counts as resolved for unblocking
    /// purposes. When false, dependents of a skipped task stay blocked
    /// until an operator intervenes.
    pub skipped_unblocks: bool,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            base_branch: "main".to_string(),
            max_slug_length: 40,
            max_slug_words: 4,
        }
    }
}

impl Default for WorkspaceConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from(STATE_DIR).join("worktrees"),
        }
    }
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            skipped_unblocks: true,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            general: GeneralConfig::default(),
            workspace: WorkspaceConfig::default(),
            scheduler: SchedulerConfig::default(),
        }
    }
}

impl Config {
    /// Get the config file path for a repository root.
    pub fn path_for(repo_root: &Path) -> PathBuf {
        repo_root.join(STATE_DIR).join("config.toml")
    }

    /// Per-user fallback config path (`~/.config/treeline/config.toml`).
    pub fn global_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("treeline").join("config.toml"))
    }

    /// Load configuration for a repository.
    ///
    /// Repo-local config wins; otherwise the per-user config is used, and
    /// defaults apply when neither exists.
    pub fn load(repo_root: &Path) -> anyhow::Result<Self> {
        let path = Self::path_for(repo_root);
        if path.exists() {
            return Self::load_from_file(&path);
        }
        if let Some(global) = Self::global_path() {
            if global.exists() {
                return Self::load_from_file(&global);
            }
        }
        Ok(Self::default())
    }

    /// Load configuration from a specific file.
    pub fn load_from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config = toml::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to its default location under the state dir.
    pub fn save(&self, repo_root: &Path) -> anyhow::Result<()> {
        let path = Self::path_for(repo_root);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(&path, content)?;
        Ok(())
    }
}

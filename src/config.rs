//! Typed, TOML-backed configuration for the sync core: a config file under
//! `~/.config/park/`, a sensible default when absent, and atomic persist.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

fn default_sync_interval_secs() -> u64 {
    60
}

/// Durable, user-editable configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Absolute sync root path.
    pub local_dir: PathBuf,
    /// Interval between change polls, in seconds.
    #[serde(default = "default_sync_interval_secs")]
    pub sync_interval_secs: u64,
    /// Set once the initial sync has completed successfully.
    #[serde(default)]
    pub is_initialized: bool,
}

impl Config {
    /// Build the default configuration (sync root under the user's home
    /// directory, default poll interval, not yet initialized).
    pub fn default_for_home() -> Result<Self> {
        let home = dirs::home_dir().context("failed to determine home directory")?;
        Ok(Self {
            local_dir: home.join("park-drive"),
            sync_interval_secs: default_sync_interval_secs(),
            is_initialized: false,
        })
    }

    pub fn sync_interval(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.sync_interval_secs)
    }

    /// Load the configuration from `<state_dir>/config.toml`, falling back to
    /// a fresh default if the file is absent.
    pub fn load(state_dir: &Path) -> Result<Self> {
        let path = config_path_in(state_dir);
        if !path.exists() {
            return Self::default_for_home();
        }

        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        let config: Config = toml::from_str(&content)
            .with_context(|| format!("failed to parse config file {}", path.display()))?;
        Ok(config)
    }

    /// Persist the configuration atomically (write to a sibling temp file,
    /// then rename over the target).
    pub fn persist(&self, state_dir: &Path) -> Result<()> {
        std::fs::create_dir_all(state_dir)
            .with_context(|| format!("failed to create config directory {}", state_dir.display()))?;

        let path = config_path_in(state_dir);
        let tmp_path = state_dir.join("config.toml.tmp");
        let content = toml::to_string_pretty(self).context("failed to serialize config")?;
        std::fs::write(&tmp_path, content)
            .with_context(|| format!("failed to write {}", tmp_path.display()))?;
        std::fs::rename(&tmp_path, &path)
            .with_context(|| format!("failed to rename config into place at {}", path.display()))?;

        tracing::debug!(target: "config", path = %path.display(), "Persisted configuration");
        Ok(())
    }
}

/// Directory holding all durable state: `parkTable`, `page_token`,
/// `config.toml`. Production callers use this; tests pass an explicit
/// `state_dir` (usually a `tempfile::tempdir()`) straight to the
/// `_in`/`_from`/`_to` variants below instead.
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir().context("failed to determine home directory")?;
    Ok(home.join(".config").join("park"))
}

pub fn config_path_in(state_dir: &Path) -> PathBuf {
    state_dir.join("config.toml")
}

pub fn park_table_path_in(state_dir: &Path) -> PathBuf {
    state_dir.join("parkTable")
}

pub fn page_token_path_in(state_dir: &Path) -> PathBuf {
    state_dir.join("page_token")
}

/// Load the persisted change cursor (`page_token`), if any. Absence is not
/// an error: the change applier treats it as "fetch a fresh start-cursor".
pub fn load_cursor_from(state_dir: &Path) -> Result<Option<String>> {
    let path = page_token_path_in(state_dir);
    if !path.exists() {
        return Ok(None);
    }
    let token = std::fs::read_to_string(&path)
        .with_context(|| format!("failed to read cursor file {}", path.display()))?;
    Ok(Some(token.trim().to_string()))
}

/// Persist the change cursor atomically.
pub fn persist_cursor_to(state_dir: &Path, token: &str) -> Result<()> {
    std::fs::create_dir_all(state_dir)
        .with_context(|| format!("failed to create config directory {}", state_dir.display()))?;

    let path = page_token_path_in(state_dir);
    let tmp_path = state_dir.join("page_token.tmp");
    std::fs::write(&tmp_path, token)
        .with_context(|| format!("failed to write {}", tmp_path.display()))?;
    std::fs::rename(&tmp_path, &path)
        .with_context(|| format!("failed to rename cursor into place at {}", path.display()))?;

    tracing::debug!(target: "config", cursor = %token, "Persisted change cursor");
    Ok(())
}

/// True if `path` exists and contains at least one entry.
pub fn dir_is_nonempty(path: &Path) -> Result<bool> {
    if !path.exists() {
        return Ok(false);
    }
    let mut entries = std::fs::read_dir(path)
        .with_context(|| format!("failed to read directory {}", path.display()))?;
    Ok(entries.next().is_some())
}

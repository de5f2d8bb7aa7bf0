//! Daemon configuration.
//!
//! Lives in `.draftline/config.json` at the repository root. Every field
//! has a default, so a missing file or a partial one both work.

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Directory holding draftline's own files inside the working tree.
pub const CONFIG_DIR: &str = ".draftline";

/// Config file name inside [`CONFIG_DIR`].
pub const CONFIG_FILE: &str = "config.json";

/// Settings for one repository.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Branch that receives the periodic commits.
    pub draft_branch: String,

    /// Branch left alone for deliberate history.
    pub stable_branch: String,

    /// Remote used when publishing the draft branch.
    pub remote: String,

    /// Seconds between commit scheduler ticks.
    pub interval_secs: u64,

    /// Localhost port for the control channel.
    pub control_port: u16,

    /// Write the marker file when the draft branch is first created.
    pub write_marker: bool,

    /// Extra ignore patterns layered on top of `.gitignore`.
    pub ignore: Vec<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            draft_branch: "draft".to_string(),
            stable_branch: "main".to_string(),
            remote: "origin".to_string(),
            interval_secs: 10,
            control_port: 7521,
            write_marker: true,
            ignore: Vec::new(),
        }
    }
}

impl Config {
    /// Path of the config file for a repository root.
    pub fn path(root: &Path) -> PathBuf {
        root.join(CONFIG_DIR).join(CONFIG_FILE)
    }

    /// Loads the config for `root`, falling back to defaults if there is none.
    pub fn load(root: &Path) -> Result<Self, ConfigError> {
        let path = Self::path(root);
        if !path.exists() {
            tracing::debug!("No config at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = fs::read_to_string(&path).map_err(|source| ConfigError::Io {
            path: path.clone(),
            source,
        })?;
        serde_json::from_str(&content).map_err(|source| ConfigError::Invalid { path, source })
    }

    /// Writes the config to `.draftline/config.json`, creating the directory.
    pub fn save(&self, root: &Path) -> Result<PathBuf, ConfigError> {
        let path = Self::path(root);
        let io_err = |source| ConfigError::Io {
            path: path.clone(),
            source,
        };

        fs::create_dir_all(root.join(CONFIG_DIR)).map_err(io_err)?;
        let json = serde_json::to_string_pretty(self).map_err(|source| ConfigError::Invalid {
            path: path.clone(),
            source,
        })?;
        fs::write(&path, json).map_err(io_err)?;
        Ok(path)
    }

    /// Scheduler tick interval.
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs.max(1))
    }
}

/// Adds `.draftline/` to `<git_dir>/info/exclude` so git never stages it.
///
/// Returns `false` if the entry was already present.
pub fn exclude_config_dir(git_dir: &Path) -> Result<bool, ConfigError> {
    let info = git_dir.join("info");
    let path = info.join("exclude");
    let io_err = |source| ConfigError::Io {
        path: path.clone(),
        source,
    };

    let entry = format!("{}/", CONFIG_DIR);
    let existing = match fs::read_to_string(&path) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => String::new(),
        Err(e) => return Err(io_err(e)),
    };
    if existing.lines().any(|line| line.trim() == entry) {
        return Ok(false);
    }

    fs::create_dir_all(&info).map_err(io_err)?;
    let mut file = fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .map_err(io_err)?;
    let separator = if existing.is_empty() || existing.ends_with('\n') {
        ""
    } else {
        "\n"
    };
    writeln!(file, "{}{}", separator, entry).map_err(io_err)?;
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_missing_config_uses_defaults() {
        let dir = tempdir().unwrap();
        let config = Config::load(dir.path()).unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.interval(), Duration::from_secs(10));
    }

    #[test]
    fn test_partial_config_fills_defaults() {
        let dir = tempdir().unwrap();
        fs::create_dir_all(dir.path().join(CONFIG_DIR)).unwrap();
        fs::write(
            Config::path(dir.path()),
            r#"{ "draft_branch": "wip", "interval_secs": 30 }"#,
        )
        .unwrap();

        let config = Config::load(dir.path()).unwrap();
        assert_eq!(config.draft_branch, "wip");
        assert_eq!(config.interval_secs, 30);
        assert_eq!(config.stable_branch, "main");
    }

    #[test]
    fn test_save_then_load() {
        let dir = tempdir().unwrap();
        let config = Config {
            ignore: vec!["*.bak".to_string()],
            ..Config::default()
        };
        config.save(dir.path()).unwrap();
        assert_eq!(Config::load(dir.path()).unwrap(), config);
    }

    #[test]
    fn test_invalid_config_is_an_error() {
        let dir = tempdir().unwrap();
        fs::create_dir_all(dir.path().join(CONFIG_DIR)).unwrap();
        fs::write(Config::path(dir.path()), "not json").unwrap();

        let err = Config::load(dir.path()).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { .. }));
    }

    #[test]
    fn test_exclude_entry_written_once() {
        let dir = tempdir().unwrap();
        assert!(exclude_config_dir(dir.path()).unwrap());
        assert!(!exclude_config_dir(dir.path()).unwrap());

        let content = fs::read_to_string(dir.path().join("info/exclude")).unwrap();
        assert_eq!(content.matches(".draftline/").count(), 1);
    }
}

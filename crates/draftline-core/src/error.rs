//! Error types for the core crate.
//!
//! We keep errors simple and actionable. Each variant carries the path
//! that was being touched so a log line is enough to find the culprit.

use std::path::PathBuf;
use thiserror::Error;

/// Convenience type for working-tree operations.
pub type Result<T> = std::result::Result<T, TreeError>;

/// Things that can go wrong while clearing, copying or snapshotting a tree.
#[derive(Error, Debug)]
pub enum TreeError {
    /// A filesystem call failed.
    #[error("filesystem error at '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Directory traversal failed part way.
    #[error("failed to walk '{path}': {source}")]
    Walk {
        path: PathBuf,
        #[source]
        source: walkdir::Error,
    },
}

impl TreeError {
    /// Creates an IO error with the path for context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn walk(path: impl Into<PathBuf>, source: walkdir::Error) -> Self {
        Self::Walk {
            path: path.into(),
            source,
        }
    }
}

/// Problems reading or writing `.draftline/config.json`.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Couldn't read or write the config file.
    #[error("failed to access config '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The file exists but isn't valid JSON for [`crate::Config`].
    #[error("invalid config '{path}': {source}")]
    Invalid {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

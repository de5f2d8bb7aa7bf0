//! Draftline Core - repository facts and working-tree plumbing
//!
//! This crate provides the pieces every other Draftline crate leans on:
//! the config file, ignore rules, startup discovery of branches from the
//! git metadata directory, and the scratch snapshot used to carry edits
//! across a branch switch.
//!
//! # Example
//!
//! ```no_run
//! use draftline_core::{Config, IgnoreFilter, RepositoryState, SnapshotStore};
//! use std::path::Path;
//!
//! let root = Path::new(".");
//! let config = Config::load(root).unwrap();
//! let repo = RepositoryState::discover(root, &config.draft_branch);
//! let filter = IgnoreFilter::load(root, &config.ignore).unwrap();
//! let snapshot = SnapshotStore::new(filter).unwrap();
//! snapshot.capture(&repo.working_dir).unwrap();
//! ```

pub mod config;
pub mod error;
pub mod filter;
pub mod repo;
pub mod snapshot;
pub mod tree;

pub use config::{exclude_config_dir, Config, CONFIG_DIR};
pub use error::{ConfigError, Result, TreeError};
pub use filter::{IgnoreFilter, BUILTIN_PATTERNS};
pub use repo::RepositoryState;
pub use snapshot::SnapshotStore;
pub use tree::{clear_tree, copy_tree, TreeStats};

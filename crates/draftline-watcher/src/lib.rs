//! Draftline Watcher - filesystem change monitoring
//!
//! This crate handles the file system side of things:
//! - One recursive subscription over the working tree
//! - Filtering events through the repository's ignore rules
//! - Raising the dirty flag for the commit scheduler
//!
//! It never commits anything itself.

mod watcher;

pub use watcher::{handle_event, ChangeKind, ChangeMonitor, DirtyMark, WatchError};

//! Change monitor.
//!
//! Uses the notify crate to watch the whole working tree with a single
//! recursive subscription. Each create, modify or delete of a path the
//! ignore rules don't exclude marks the tree dirty. That's all it does:
//! no debouncing, no I/O beyond a metadata probe, no commits.

use draftline_core::IgnoreFilter;
use notify::{Event, EventKind, RecursiveMode, Watcher};
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Receives the "something changed" signal.
///
/// Called from the watcher's own thread, so implementations must only
/// flip state (an atomic, say) and return.
pub trait DirtyMark: Send + Sync + 'static {
    fn mark_dirty(&self);
}

/// Type of file change detected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    Created,
    Modified,
    Deleted,
}

impl ChangeKind {
    /// Maps a notify event kind; access and other events don't count.
    pub fn classify(kind: &EventKind) -> Option<Self> {
        match kind {
            EventKind::Create(_) => Some(Self::Created),
            EventKind::Modify(_) => Some(Self::Modified),
            EventKind::Remove(_) => Some(Self::Deleted),
            _ => None,
        }
    }
}

/// Couldn't set up the subscription.
#[derive(Error, Debug)]
#[error("failed to watch '{path}': {source}")]
pub struct WatchError {
    path: String,
    #[source]
    source: notify::Error,
}

/// Handles one notify event. Returns how many of its paths counted.
pub fn handle_event(event: &Event, filter: &IgnoreFilter, sink: &dyn DirtyMark) -> usize {
    let Some(kind) = ChangeKind::classify(&event.kind) else {
        return 0;
    };

    let mut relevant = 0;
    for path in &event.paths {
        if filter.is_excluded(path) {
            continue;
        }
        debug!("{:?}: {}", kind, path.display());
        relevant += 1;
    }

    if relevant > 0 {
        sink.mark_dirty();
    }
    relevant
}

/// Watches the working tree for as long as it is alive.
pub struct ChangeMonitor {
    #[allow(dead_code)]
    watcher: notify::RecommendedWatcher,
}

impl ChangeMonitor {
    /// Subscribes to every path under `root`.
    pub fn new(
        root: &Path,
        filter: IgnoreFilter,
        sink: Arc<dyn DirtyMark>,
    ) -> Result<Self, WatchError> {
        let watch_err = |source| WatchError {
            path: root.display().to_string(),
            source,
        };

        let mut watcher =
            notify::recommended_watcher(move |res: Result<Event, notify::Error>| match res {
                Ok(event) => {
                    handle_event(&event, &filter, sink.as_ref());
                }
                Err(e) => warn!("Watch error: {}", e),
            })
            .map_err(watch_err)?;

        watcher
            .watch(root, RecursiveMode::Recursive)
            .map_err(watch_err)?;

        info!("Watching {} for changes", root.display());

        Ok(Self { watcher })
    }
}

impl std::fmt::Debug for ChangeMonitor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChangeMonitor").finish_non_exhaustive()
    }
}

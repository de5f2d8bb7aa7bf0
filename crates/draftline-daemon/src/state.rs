//! The three flags everything else coordinates on.
//!
//! They sit together in one [`SyncState`], created by the mode
//! controller and shared by `Arc` with the change monitor and the commit
//! scheduler. The monitor may only raise the dirty flag; mode and
//! transition are written by the controller alone.

use draftline_watcher::DirtyMark;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};

/// Which branch the working tree is on, as far as syncing is concerned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    Stable,
    Draft,
}

impl Mode {
    /// Draft iff `current_branch` is the draft branch.
    pub fn from_branch(current_branch: &str, draft_branch: &str) -> Self {
        if current_branch == draft_branch {
            Self::Draft
        } else {
            Self::Stable
        }
    }

    /// Indicator text.
    pub fn label(self) -> &'static str {
        match self {
            Self::Draft => "Draft: On",
            Self::Stable => "Draft: Off",
        }
    }
}

impl std::fmt::Display for Mode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Mode, dirty and transition flags.
#[derive(Debug, Default)]
pub struct SyncState {
    draft: AtomicBool,
    dirty: AtomicBool,
    transition: AtomicBool,
}

impl SyncState {
    pub fn new(mode: Mode) -> Self {
        Self {
            draft: AtomicBool::new(mode == Mode::Draft),
            ..Self::default()
        }
    }

    pub fn mode(&self) -> Mode {
        if self.draft.load(Ordering::SeqCst) {
            Mode::Draft
        } else {
            Mode::Stable
        }
    }

    pub(crate) fn set_mode(&self, mode: Mode) {
        self.draft.store(mode == Mode::Draft, Ordering::SeqCst);
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty.load(Ordering::SeqCst)
    }

    pub(crate) fn clear_dirty(&self) {
        self.dirty.store(false, Ordering::SeqCst);
    }

    pub fn in_transition(&self) -> bool {
        self.transition.load(Ordering::SeqCst)
    }

    /// Raises the transition flag until the returned guard is dropped.
    pub(crate) fn begin_transition(&self) -> TransitionGuard<'_> {
        self.transition.store(true, Ordering::SeqCst);
        TransitionGuard { state: self }
    }
}

impl DirtyMark for SyncState {
    fn mark_dirty(&self) {
        self.dirty.store(true, Ordering::SeqCst);
    }
}

/// Clears the transition flag on drop, whichever way the transition ends.
#[derive(Debug)]
pub(crate) struct TransitionGuard<'a> {
    state: &'a SyncState,
}

impl Drop for TransitionGuard<'_> {
    fn drop(&mut self) {
        self.state.transition.store(false, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mode_from_branch() {
        assert_eq!(Mode::from_branch("draft", "draft"), Mode::Draft);
        assert_eq!(Mode::from_branch("main", "draft"), Mode::Stable);
        assert_eq!(Mode::Draft.label(), "Draft: On");
        assert_eq!(Mode::Stable.to_string(), "Draft: Off");
    }

    #[test]
    fn test_transition_guard_resets() {
        let state = SyncState::new(Mode::Stable);
        {
            let _guard = state.begin_transition();
            assert!(state.in_transition());
        }
        assert!(!state.in_transition());
    }

    #[test]
    fn test_dirty_flag() {
        let state = SyncState::new(Mode::Draft);
        assert!(!state.is_dirty());
        state.mark_dirty();
        assert!(state.is_dirty());
        state.clear_dirty();
        assert!(!state.is_dirty());
    }
}

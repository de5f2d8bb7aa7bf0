//! Mode controller: the draft/stable state machine.
//!
//! Stable -> Draft
//!   1. no draft branch yet and we're on stable: write the marker, mark the
//!      branch as existing (before git confirms), run `create-draft-branch`
//!   2. raise the transition flag, clear the working tree, `checkout <draft>`
//!      and switch mode
//!   3. run `refresh-draft` (restore and pull); failure is logged only
//!
//! Draft -> Stable
//!   1. raise the transition flag, capture the tree into the snapshot
//!   2. run `checkout <stable>` and switch mode
//!   3. clear the tree, restore the snapshot
//!
//! The mode follows the branch git has checked out. Once a checkout
//! succeeds the mode switches, even if a later step fails.
//!
//! If the restore in step 3 fails, the snapshot is kept and the next
//! toggle retries the restore instead of entering draft.
//!
//! Toggles are not reentrant: a toggle while another is running is
//! refused with [`ControllerError::Busy`].

use crate::state::{Mode, SyncState};
use draftline_core::{
    clear_tree, Config, IgnoreFilter, RepositoryState, SnapshotStore, TreeError,
};
use draftline_vcs::{Pipeline, VcsError, VcsGateway};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use thiserror::Error;
use tracing::{info, warn};

/// Content of the marker file. Nothing reads it back.
const MARKER_CONTENT: &str = "Off";

#[derive(Error, Debug)]
pub enum ControllerError {
    /// Another toggle is still running.
    #[error("a mode transition is already in progress")]
    Busy,

    #[error(transparent)]
    Vcs(#[from] VcsError),

    #[error(transparent)]
    Tree(#[from] TreeError),

    #[error("failed to write marker file '{path}': {source}")]
    Marker {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("background task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

/// Snapshot of the controller for the indicator and `status` calls.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusReport {
    pub mode: Mode,
    pub label: String,
    pub branch: String,
    pub dirty: bool,
    pub transitioning: bool,
    pub draft_branch_exists: bool,
    /// Carried edits are still waiting in the snapshot.
    #[serde(default)]
    pub restore_pending: bool,
}

/// Owns the sync flags, the repository facts and the scratch snapshot.
pub struct ModeController {
    config: Config,
    repo: Mutex<RepositoryState>,
    filter: IgnoreFilter,
    snapshot: Arc<SnapshotStore>,
    state: Arc<SyncState>,
    gateway: Arc<VcsGateway>,
    toggle_lock: tokio::sync::Mutex<()>,
    restore_pending: AtomicBool,
}

impl ModeController {
    /// Starts in the mode implied by the repository's current branch.
    pub fn new(
        config: Config,
        repo: RepositoryState,
        filter: IgnoreFilter,
        snapshot: SnapshotStore,
        gateway: Arc<VcsGateway>,
    ) -> Self {
        let mode = Mode::from_branch(&repo.current_branch, &config.draft_branch);
        info!("Starting in mode '{}' on branch {}", mode, repo.current_branch);

        Self {
            config,
            repo: Mutex::new(repo),
            filter,
            snapshot: Arc::new(snapshot),
            state: Arc::new(SyncState::new(mode)),
            gateway,
            toggle_lock: tokio::sync::Mutex::new(()),
            restore_pending: AtomicBool::new(false),
        }
    }

    /// Shared flags, for the change monitor and the commit scheduler.
    pub fn state(&self) -> Arc<SyncState> {
        self.state.clone()
    }

    pub fn mode(&self) -> Mode {
        self.state.mode()
    }

    /// A copy of the current repository facts.
    pub fn repository(&self) -> RepositoryState {
        self.repo().clone()
    }

    fn repo(&self) -> MutexGuard<'_, RepositoryState> {
        self.repo.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn working_dir(&self) -> PathBuf {
        self.repo().working_dir.clone()
    }

    /// Pulls the draft branch if we start on it. Failure is logged only.
    pub async fn startup(&self) {
        if self.mode() != Mode::Draft {
            return;
        }
        if let Err(e) = self.gateway.run(&Pipeline::startup_pull()).await {
            warn!("Startup pull failed, continuing: {}", e);
        }
    }

    pub fn status(&self) -> StatusReport {
        let repo = self.repo();
        let mode = self.state.mode();
        StatusReport {
            mode,
            label: mode.label().to_string(),
            branch: repo.current_branch.clone(),
            dirty: self.state.is_dirty(),
            transitioning: self.state.in_transition(),
            draft_branch_exists: repo.draft_branch_exists,
            restore_pending: self.restore_pending.load(Ordering::SeqCst),
        }
    }

    /// Switches to the other mode and returns the new one.
    ///
    /// The transition flag is always cleared afterwards. A failure before
    /// the checkout leaves the mode unchanged; whatever git already did
    /// stays done.
    pub async fn toggle(&self) -> Result<Mode, ControllerError> {
        let _toggle = self
            .toggle_lock
            .try_lock()
            .map_err(|_| ControllerError::Busy)?;

        match self.state.mode() {
            Mode::Stable if self.restore_pending.load(Ordering::SeqCst) => {
                self.retry_restore().await
            }
            Mode::Stable => self.enter_draft().await,
            Mode::Draft => self.leave_draft().await,
        }
    }

    async fn enter_draft(&self) -> Result<Mode, ControllerError> {
        let draft = self.config.draft_branch.clone();
        info!("Switching to {}...", draft);

        // Check and claim in one critical section so a second toggle can
        // never issue the creation again.
        let create = {
            let mut repo = self.repo();
            let create =
                !repo.draft_branch_exists && repo.current_branch == self.config.stable_branch;
            if create {
                repo.draft_branch_exists = true;
            }
            create
        };
        if create {
            self.create_draft_branch().await?;
        }

        let _guard = self.state.begin_transition();
        let root = self.working_dir();
        let filter = self.filter.clone();
        let cleared = tokio::task::spawn_blocking(move || clear_tree(&root, &filter)).await??;
        info!("Cleared {} files from the working tree", cleared.files);

        if let Err(e) = self.gateway.run(&Pipeline::checkout(&draft)).await {
            warn!("Working tree was cleared but '{}' was not checked out", draft);
            return Err(e.into());
        }
        self.repo().current_branch = draft.clone();
        self.state.set_mode(Mode::Draft);

        if let Err(e) = self.gateway.run(&Pipeline::refresh_draft()).await {
            warn!("Refreshing {} failed, continuing: {}", draft, e);
        }

        self.state.clear_dirty();
        info!("Now on {}", draft);
        Ok(Mode::Draft)
    }

    async fn create_draft_branch(&self) -> Result<(), ControllerError> {
        let draft = &self.config.draft_branch;
        info!("No {} branch yet, creating it", draft);

        if self.config.write_marker {
            let path = self.working_dir().join(draft);
            if let Err(source) = tokio::fs::write(&path, MARKER_CONTENT).await {
                return Err(ControllerError::Marker { path, source });
            }
        }

        self.gateway
            .run(&Pipeline::create_draft_branch(
                draft,
                &self.config.stable_branch,
                &self.config.remote,
            ))
            .await?;

        self.repo().record_branch(draft);
        info!("Created {} branch", draft);
        Ok(())
    }

    async fn leave_draft(&self) -> Result<Mode, ControllerError> {
        let stable = self.config.stable_branch.clone();
        info!("Switching to {}...", stable);

        let _guard = self.state.begin_transition();
        let root = self.working_dir();
        let snapshot = self.snapshot.clone();
        tokio::task::spawn_blocking(move || snapshot.capture(&root)).await??;

        self.gateway.run(&Pipeline::checkout(&stable)).await?;
        self.repo().current_branch = stable.clone();
        self.state.set_mode(Mode::Stable);

        self.restore_pending.store(true, Ordering::SeqCst);
        self.restore_snapshot().await?;
        info!("Now on {}", stable);
        Ok(Mode::Stable)
    }

    /// Second attempt at putting the carried edits back on stable.
    async fn retry_restore(&self) -> Result<Mode, ControllerError> {
        info!("Retrying restore of carried edits");
        let _guard = self.state.begin_transition();
        self.restore_snapshot().await?;
        info!("Carried edits restored, toggle again to enter draft");
        Ok(Mode::Stable)
    }

    /// Copies the snapshot over the tree, clearing the pending flag on success.
    async fn restore_snapshot(&self) -> Result<(), ControllerError> {
        let root = self.working_dir();
        let snapshot = self.snapshot.clone();
        let restored = tokio::task::spawn_blocking(move || snapshot.restore(&root)).await;

        match restored {
            Ok(Ok(_)) => {
                self.restore_pending.store(false, Ordering::SeqCst);
                Ok(())
            }
            Ok(Err(e)) => {
                warn!(
                    "Carried edits not restored, they remain in {}",
                    self.snapshot.path().display()
                );
                Err(e.into())
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Removes the scratch snapshot directory.
    pub fn close(self) {
        match Arc::try_unwrap(self.snapshot) {
            Ok(snapshot) => snapshot.close(),
            Err(_) => warn!("Snapshot still in use, leaving cleanup to drop"),
        }
    }
}

impl std::fmt::Debug for ModeController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModeController")
            .field("mode", &self.state.mode())
            .field("draft_branch", &self.config.draft_branch)
            .field("stable_branch", &self.config.stable_branch)
            .finish_non_exhaustive()
    }
}

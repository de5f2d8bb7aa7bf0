//! Daemon lifecycle: wire everything up, run, tear down.

use crate::controller::ModeController;
use crate::scheduler::CommitScheduler;
use crate::server::ControlServer;
use draftline_core::{Config, IgnoreFilter, RepositoryState, SnapshotStore, TreeError};
use draftline_vcs::{CommandRunner, GitCli, VcsGateway};
use draftline_watcher::{ChangeMonitor, WatchError};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

#[derive(Error, Debug)]
pub enum DaemonError {
    #[error("working directory '{path}' is not usable: {source}")]
    WorkingDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid ignore rules: {0}")]
    Ignore(#[from] ignore::Error),

    #[error(transparent)]
    Snapshot(#[from] TreeError),

    #[error(transparent)]
    Watch(#[from] WatchError),

    #[error("failed to bind control channel on {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },
}

/// A running daemon: controller, monitor, scheduler and control channel.
pub struct Daemon {
    controller: Arc<ModeController>,
    scheduler: CommitScheduler,
    server: ControlServer,
    monitor: ChangeMonitor,
    shutdown: CancellationToken,
    addr: SocketAddr,
}

impl Daemon {
    /// Starts a daemon for `root` that drives the `git` binary.
    pub async fn start(root: &Path, config: Config) -> Result<Self, DaemonError> {
        Self::start_with_runner(root, config, Arc::new(GitCli::new())).await
    }

    /// Starts a daemon with a custom command runner.
    pub async fn start_with_runner(
        root: &Path,
        config: Config,
        runner: Arc<dyn CommandRunner>,
    ) -> Result<Self, DaemonError> {
        let root = root
            .canonicalize()
            .map_err(|source| DaemonError::WorkingDir {
                path: root.to_path_buf(),
                source,
            })?;
        info!("Starting draftline in {}", root.display());

        let repo = RepositoryState::discover(&root, &config.draft_branch);
        let filter = IgnoreFilter::load(&root, &config.ignore)?;
        let snapshot = SnapshotStore::new(filter.clone())?;
        let gateway = Arc::new(VcsGateway::new(&root, runner));

        let controller = Arc::new(ModeController::new(
            config.clone(),
            repo,
            filter.clone(),
            snapshot,
            gateway.clone(),
        ));
        controller.startup().await;

        let state = controller.state();
        let monitor = ChangeMonitor::new(&root, filter, state.clone())?;
        let scheduler = CommitScheduler::new(
            state,
            gateway,
            config.draft_branch.clone(),
            config.interval(),
        );

        let shutdown = CancellationToken::new();
        let addr = SocketAddr::from(([127, 0, 0, 1], config.control_port));
        let server = ControlServer::bind(addr, controller.clone(), shutdown.clone())
            .await
            .map_err(|source| DaemonError::Bind { addr, source })?;
        let addr = server.local_addr().unwrap_or(addr);

        Ok(Self {
            controller,
            scheduler,
            server,
            monitor,
            shutdown,
            addr,
        })
    }

    /// Address of the control channel.
    pub fn control_addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn controller(&self) -> Arc<ModeController> {
        self.controller.clone()
    }

    /// Cancelling this token stops the daemon.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Runs until Ctrl+C or a `shutdown` request, then cleans up.
    pub async fn run(self) {
        let Self {
            controller,
            scheduler,
            server,
            monitor,
            shutdown,
            ..
        } = self;

        let scheduler_task = tokio::spawn(scheduler.run(shutdown.clone()));
        let server_task = tokio::spawn(server.run());

        tokio::select! {
            _ = shutdown.cancelled() => {}
            result = tokio::signal::ctrl_c() => {
                if let Err(e) = result {
                    warn!("Failed to listen for Ctrl+C: {}", e);
                }
                info!("Interrupted");
            }
        }
        shutdown.cancel();

        if let Err(e) = scheduler_task.await {
            warn!("Commit scheduler task failed: {}", e);
        }
        if let Err(e) = server_task.await {
            warn!("Control channel task failed: {}", e);
        }
        drop(monitor);

        match Arc::try_unwrap(controller) {
            Ok(controller) => controller.close(),
            Err(_) => warn!("Controller still referenced, snapshot removed on drop"),
        }
        info!("Stopped");
    }
}

impl std::fmt::Debug for Daemon {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Daemon")
            .field("controller", &self.controller)
            .field("addr", &self.addr)
            .finish_non_exhaustive()
    }
}

//! Commit scheduler.
//!
//! Ticks on a fixed interval. A tick commits and pushes when we're in
//! draft mode, the tree is dirty and no transition is running. A commit
//! dispatched while the previous one is still running queues behind it
//! in the gateway. The dirty flag is cleared right after the commit task
//! is spawned, not when git reports back, so:
//!
//! - a change that lands between the spawn and the clear is absorbed by
//!   the clear; it reaches git only if the spawned `git add .` runs after
//!   it, otherwise it waits for the next real change
//! - a change that lands after the clear is picked up by the next tick
//! - a failed commit does not re-arm the flag

use crate::state::{Mode, SyncState};
use chrono::{Local, NaiveDateTime};
use draftline_vcs::{Pipeline, VcsGateway};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

/// What a tick decided.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// Stable mode, nothing to do.
    Idle,
    /// Draft mode but nothing changed.
    Clean,
    /// A mode transition is running.
    Guarded,
    /// A commit was spawned and the flag cleared.
    Dispatched,
}

/// `"<branch>: YYYY-MM-DD HH:MM:SS"`.
pub fn commit_message(branch: &str, at: NaiveDateTime) -> String {
    format!("{}: {}", branch, at.format("%Y-%m-%d %H:%M:%S"))
}

pub struct CommitScheduler {
    state: Arc<SyncState>,
    gateway: Arc<VcsGateway>,
    branch: String,
    interval: Duration,
    commits: Vec<JoinHandle<()>>,
    #[cfg(test)]
    spawn_hook: Option<Box<dyn Fn() + Send + Sync>>,
}

impl CommitScheduler {
    pub fn new(
        state: Arc<SyncState>,
        gateway: Arc<VcsGateway>,
        branch: impl Into<String>,
        interval: Duration,
    ) -> Self {
        Self {
            state,
            gateway,
            branch: branch.into(),
            interval,
            commits: Vec::new(),
            #[cfg(test)]
            spawn_hook: None,
        }
    }

    /// Runs one scheduling decision. Must be called inside a tokio runtime.
    pub fn tick(&mut self) -> TickOutcome {
        if self.state.mode() != Mode::Draft {
            return TickOutcome::Idle;
        }
        if !self.state.is_dirty() {
            return TickOutcome::Clean;
        }
        if self.state.in_transition() {
            debug!("Transition running, holding commit");
            return TickOutcome::Guarded;
        }
        self.commits.retain(|h| !h.is_finished());
        if !self.commits.is_empty() {
            debug!("Previous commit still running, queueing behind it");
        }

        let message = commit_message(&self.branch, Local::now().naive_local());
        info!("Changes detected, committing \"{}\"", message);

        let gateway = self.gateway.clone();
        self.commits.push(tokio::spawn(async move {
            if let Err(e) = gateway.run(&Pipeline::commit_and_push(message)).await {
                error!("Scheduled commit failed: {}", e);
            }
        }));
        #[cfg(test)]
        self.after_spawn();
        self.state.clear_dirty();

        TickOutcome::Dispatched
    }

    #[cfg(test)]
    fn after_spawn(&self) {
        if let Some(hook) = &self.spawn_hook {
            hook();
        }
    }

    /// Waits for every spawned commit that hasn't been reaped yet.
    pub async fn wait_in_flight(&mut self) {
        for handle in self.commits.drain(..) {
            if let Err(e) = handle.await {
                error!("Commit task panicked: {}", e);
            }
        }
    }

    /// Ticks until `shutdown` is cancelled. Commits still running at that
    /// point are left to finish on their own.
    pub async fn run(mut self, shutdown: CancellationToken) {
        let mut interval = tokio::time::interval(self.interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick fires immediately; skip it.
        interval.tick().await;

        info!("Commit scheduler running every {:?}", self.interval);
        loop {
            tokio::select! {
                _ = interval.tick() => {
                    let outcome = self.tick();
                    debug!("Tick: {:?}", outcome);
                }
                _ = shutdown.cancelled() => {
                    debug!("Commit scheduler shutting down");
                    break;
                }
            }
        }
    }
}

impl std::fmt::Debug for CommitScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommitScheduler")
            .field("branch", &self.branch)
            .field("interval", &self.interval)
            .finish_non_exhaustive()
    }
}

//! Draftline Daemon - the sync engine
//!
//! This crate ties the pieces together:
//! - [`ModeController`] switches between the stable and draft branches
//! - [`CommitScheduler`] commits and pushes pending edits on a timer
//! - [`ControlServer`] / [`ControlClient`] expose the toggle over JSON-RPC
//! - [`Daemon`] owns all of the above for one repository
//!
//! The three flags they coordinate on live in [`SyncState`].

mod controller;
mod daemon;
pub mod protocol;
mod scheduler;
mod server;
mod state;

pub use controller::{ControllerError, ModeController, StatusReport};
pub use daemon::{Daemon, DaemonError};
pub use protocol::{Request, Response, RpcError};
pub use scheduler::{commit_message, CommitScheduler, TickOutcome};
pub use server::{dispatch, ClientError, ControlClient, ControlServer};
pub use state::{Mode, SyncState};

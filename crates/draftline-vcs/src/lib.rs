//! Draftline VCS - the git gateway
//!
//! Wraps the git command line as async operations:
//! - [`VcsOp`] is a single invocation (`git add .`, `git checkout main`, ...)
//! - [`Pipeline`] is an ordered list of ops that stops at the first failure
//! - [`VcsGateway`] runs pipelines in the repository root, one at a time
//!
//! Failures are logged and returned; nothing is retried or rolled back.

mod error;
mod gateway;
pub mod mock;
mod op;

pub use error::VcsError;
pub use gateway::{CommandOutput, CommandRunner, GitCli, VcsGateway};
pub use op::{Pipeline, VcsOp};

//! Error types for git invocations.

use thiserror::Error;

/// A git command that couldn't run or didn't succeed.
///
/// Failures are terminal for the invocation: nothing retries, and the
/// rest of the pipeline is skipped.
#[derive(Error, Debug)]
pub enum VcsError {
    /// The process couldn't be started (git missing, bad cwd, ...).
    #[error("failed to run '{command}': {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    /// The process ran and exited unsuccessfully.
    #[error("'{command}' failed ({}): {}", describe_exit(.code), .stderr.trim())]
    Failed {
        command: String,
        code: Option<i32>,
        stderr: String,
    },
}

impl VcsError {
    /// The command line that failed.
    pub fn command(&self) -> &str {
        match self {
            Self::Spawn { command, .. } | Self::Failed { command, .. } => command,
        }
    }
}

fn describe_exit(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!("exit code {}", code),
        None => "killed by signal".to_string(),
    }
}

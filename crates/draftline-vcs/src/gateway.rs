//! The gateway: runs pipelines against the repository.
//!
//! Every git invocation goes through [`VcsGateway::run`]. Pipelines are
//! serialized on a single async lane, so a scheduled commit and a branch
//! switch never interleave their commands.

use crate::error::VcsError;
use crate::op::{Pipeline, VcsOp};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use tokio::process::Command;
use tokio::sync::Mutex;
use tracing::{debug, error, info};

/// Captured output of a successful command.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
}

/// Something that can execute a single [`VcsOp`] in a directory.
#[async_trait]
pub trait CommandRunner: Send + Sync {
    async fn run(&self, workdir: &Path, op: &VcsOp) -> Result<CommandOutput, VcsError>;
}

/// Runs ops through the `git` binary.
#[derive(Debug, Clone)]
pub struct GitCli {
    program: PathBuf,
}

impl GitCli {
    pub fn new() -> Self {
        Self::with_program("git")
    }

    /// Uses a specific git executable.
    pub fn with_program(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

impl Default for GitCli {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CommandRunner for GitCli {
    async fn run(&self, workdir: &Path, op: &VcsOp) -> Result<CommandOutput, VcsError> {
        let command = op.to_string();

        // A daemon has nobody to answer credential prompts.
        let output = Command::new(&self.program)
            .args(op.args())
            .current_dir(workdir)
            .env("GIT_TERMINAL_PROMPT", "0")
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|source| VcsError::Spawn {
                command: command.clone(),
                source,
            })?;

        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        let stderr = String::from_utf8_lossy(&output.stderr).into_owned();

        if output.status.success() {
            Ok(CommandOutput { stdout, stderr })
        } else {
            Err(VcsError::Failed {
                command,
                code: output.status.code(),
                stderr,
            })
        }
    }
}

/// Runs pipelines with the working directory bound to the repository root.
pub struct VcsGateway {
    root: PathBuf,
    runner: Arc<dyn CommandRunner>,
    lane: Mutex<()>,
}

impl VcsGateway {
    pub fn new(root: impl Into<PathBuf>, runner: Arc<dyn CommandRunner>) -> Self {
        Self {
            root: root.into(),
            runner,
            lane: Mutex::new(()),
        }
    }

    /// Gateway backed by the `git` binary.
    pub fn git(root: impl Into<PathBuf>) -> Self {
        Self::new(root, Arc::new(GitCli::new()))
    }

    /// Runs every op in order, stopping at the first failure.
    ///
    /// There is no retry and no rollback: whatever the earlier ops did to
    /// the repository stays done.
    pub async fn run(&self, pipeline: &Pipeline) -> Result<Vec<CommandOutput>, VcsError> {
        let _lane = self.lane.lock().await;
        info!("Running {}: {}", pipeline.name, pipeline);

        let mut outputs = Vec::with_capacity(pipeline.ops.len());
        for op in &pipeline.ops {
            match self.runner.run(&self.root, op).await {
                Ok(output) => {
                    debug!("{} -> stdout: {}", op, output.stdout.trim());
                    if !output.stderr.trim().is_empty() {
                        debug!("{} -> stderr: {}", op, output.stderr.trim());
                    }
                    outputs.push(output);
                }
                Err(e) => {
                    error!("{} aborted: {}", pipeline.name, e);
                    return Err(e);
                }
            }
        }

        debug!("{} finished", pipeline.name);
        Ok(outputs)
    }
}

impl std::fmt::Debug for VcsGateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VcsGateway")
            .field("root", &self.root)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockRunner;
    use std::time::Duration;

    #[tokio::test]
    async fn test_pipeline_runs_in_order() {
        let runner = MockRunner::new();
        let gateway = VcsGateway::new("/repo", Arc::new(runner.clone()));

        let outputs = gateway.run(&Pipeline::commit_and_push("m")).await.unwrap();

        assert_eq!(outputs.len(), 3);
        assert_eq!(
            runner.operations(),
            vec![VcsOp::AddAll, VcsOp::commit("m"), VcsOp::Push]
        );
    }

    #[tokio::test]
    async fn test_pipeline_short_circuits() {
        let runner = MockRunner::new();
        runner.fail_on(VcsOp::Push);
        let gateway = VcsGateway::new("/repo", Arc::new(runner.clone()));

        let err = gateway
            .run(&Pipeline::create_draft_branch("draft", "main", "origin"))
            .await
            .unwrap_err();

        assert_eq!(err.command(), "git push");
        // add, commit, push ran; nothing after the failing push did.
        assert_eq!(runner.operations().len(), 3);
    }

    #[tokio::test]
    async fn test_pipelines_do_not_interleave() {
        let runner = MockRunner::held();
        let gateway = Arc::new(VcsGateway::new("/repo", Arc::new(runner.clone())));

        let first = {
            let gateway = gateway.clone();
            tokio::spawn(async move { gateway.run(&Pipeline::commit_and_push("m")).await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        let second = {
            let gateway = gateway.clone();
            tokio::spawn(async move { gateway.run(&Pipeline::checkout("main")).await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;

        runner.release(4);
        first.await.unwrap().unwrap();
        second.await.unwrap().unwrap();

        assert_eq!(
            runner.operations(),
            vec![
                VcsOp::AddAll,
                VcsOp::commit("m"),
                VcsOp::Push,
                VcsOp::checkout("main"),
            ]
        );
    }

    #[tokio::test]
    async fn test_git_cli_reports_failure() {
        let dir = tempfile::tempdir().unwrap();
        let gateway = VcsGateway::new(dir.path(), Arc::new(GitCli::new()));

        // Not a repository, so checkout fails (or git is missing).
        let result = gateway.run(&Pipeline::checkout("main")).await;
        assert!(result.is_err());
    }
}

//! Mock runner for deterministic testing.
//!
//! Records every op it is asked to run, succeeds by default, and can be
//! told to fail a specific op or to hold each op until released. Clones
//! share state, so a test keeps one handle while the gateway owns another.
//!
//! # Example
//!
//! ```
//! use draftline_vcs::mock::MockRunner;
//! use draftline_vcs::{Pipeline, VcsGateway, VcsOp};
//! use std::sync::Arc;
//!
//! # tokio::runtime::Runtime::new().unwrap().block_on(async {
//! let runner = MockRunner::new();
//! let gateway = VcsGateway::new("/repo", Arc::new(runner.clone()));
//!
//! gateway.run(&Pipeline::checkout("main")).await.unwrap();
//! assert_eq!(runner.operations(), vec![VcsOp::checkout("main")]);
//! # });
//! ```

use crate::error::VcsError;
use crate::gateway::{CommandOutput, CommandRunner};
use crate::op::VcsOp;
use async_trait::async_trait;
use std::path::Path;
use std::sync::{Arc, Mutex};
use tokio::sync::Semaphore;

/// Thread-safe via internal `Arc<Mutex<...>>` wrapping.
#[derive(Debug, Clone, Default)]
pub struct MockRunner {
    inner: Arc<Mutex<MockRunnerInner>>,
    gate: Option<Arc<Semaphore>>,
}

#[derive(Debug, Default)]
struct MockRunnerInner {
    /// Ops in the order they were started.
    operations: Vec<VcsOp>,
    /// Op that fails every time it is run.
    fail_on: Option<VcsOp>,
}

impl MockRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// A runner where every op waits for a permit from [`MockRunner::release`].
    pub fn held() -> Self {
        Self {
            inner: Arc::default(),
            gate: Some(Arc::new(Semaphore::new(0))),
        }
    }

    /// Lets `ops` more held ops finish.
    pub fn release(&self, ops: usize) {
        if let Some(gate) = &self.gate {
            gate.add_permits(ops);
        }
    }

    /// Makes `op` fail with a non-zero exit from now on.
    pub fn fail_on(&self, op: VcsOp) {
        self.lock().fail_on = Some(op);
    }

    /// Stops failing.
    pub fn clear_failure(&self) {
        self.lock().fail_on = None;
    }

    /// Every op started so far.
    pub fn operations(&self) -> Vec<VcsOp> {
        self.lock().operations.clone()
    }

    /// How many times `op` was started.
    pub fn count(&self, op: &VcsOp) -> usize {
        self.lock().operations.iter().filter(|o| *o == op).count()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MockRunnerInner> {
        // A panicking test thread must not hide the recorded ops.
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl CommandRunner for MockRunner {
    async fn run(&self, _workdir: &Path, op: &VcsOp) -> Result<CommandOutput, VcsError> {
        let fail = {
            let mut inner = self.lock();
            inner.operations.push(op.clone());
            inner.fail_on.as_ref() == Some(op)
        };

        if let Some(gate) = &self.gate {
            if let Ok(permit) = gate.acquire().await {
                permit.forget();
            }
        }

        if fail {
            return Err(VcsError::Failed {
                command: op.to_string(),
                code: Some(1),
                stderr: "mock failure".to_string(),
            });
        }
        Ok(CommandOutput::default())
    }
}

//! Git operations and the pipelines built from them.

use std::fmt;

/// One git invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VcsOp {
    /// `git add .`
    AddAll,
    /// `git commit -m <message>`
    Commit { message: String },
    /// `git push`
    Push,
    /// `git push --set-upstream <remote> <branch>`
    PushSetUpstream { remote: String, branch: String },
    /// `git pull`
    Pull,
    /// `git checkout <branch>`
    Checkout { branch: String },
    /// `git checkout -b <branch>`
    CreateBranch { branch: String },
    /// `git restore .`
    RestoreAll,
}

impl VcsOp {
    /// Arguments passed to the git binary.
    pub fn args(&self) -> Vec<&str> {
        match self {
            Self::AddAll => vec!["add", "."],
            Self::Commit { message } => vec!["commit", "-m", message.as_str()],
            Self::Push => vec!["push"],
            Self::PushSetUpstream { remote, branch } => {
                vec!["push", "--set-upstream", remote.as_str(), branch.as_str()]
            }
            Self::Pull => vec!["pull"],
            Self::Checkout { branch } => vec!["checkout", branch.as_str()],
            Self::CreateBranch { branch } => vec!["checkout", "-b", branch.as_str()],
            Self::RestoreAll => vec!["restore", "."],
        }
    }

    pub fn checkout(branch: impl Into<String>) -> Self {
        Self::Checkout {
            branch: branch.into(),
        }
    }

    pub fn commit(message: impl Into<String>) -> Self {
        Self::Commit {
            message: message.into(),
        }
    }
}

impl fmt::Display for VcsOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "git")?;
        for arg in self.args() {
            if arg.contains(char::is_whitespace) {
                write!(f, " \"{}\"", arg)?;
            } else {
                write!(f, " {}", arg)?;
            }
        }
        Ok(())
    }
}

/// An ordered list of operations that runs as a unit and stops at the
/// first failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pipeline {
    /// Short label for logs.
    pub name: &'static str,
    pub ops: Vec<VcsOp>,
}

impl Pipeline {
    pub fn new(name: &'static str, ops: Vec<VcsOp>) -> Self {
        Self { name, ops }
    }

    /// Brings the draft branch up to date when we start on it.
    pub fn startup_pull() -> Self {
        Self::new("startup-pull", vec![VcsOp::Pull])
    }

    /// Stages everything, commits and pushes.
    pub fn commit_and_push(message: impl Into<String>) -> Self {
        Self::new(
            "commit-and-push",
            vec![VcsOp::AddAll, VcsOp::commit(message), VcsOp::Push],
        )
    }

    /// Publishes the stable branch, creates and publishes the draft
    /// branch from it, then returns to stable.
    pub fn create_draft_branch(draft: &str, stable: &str, remote: &str) -> Self {
        Self::new(
            "create-draft-branch",
            vec![
                VcsOp::AddAll,
                VcsOp::commit(format!("{}: initialize", draft)),
                VcsOp::Push,
                VcsOp::CreateBranch {
                    branch: draft.to_string(),
                },
                VcsOp::PushSetUpstream {
                    remote: remote.to_string(),
                    branch: draft.to_string(),
                },
                VcsOp::checkout(stable),
            ],
        )
    }

    /// Makes the tree match the checked-out draft branch and pulls it.
    pub fn refresh_draft() -> Self {
        Self::new("refresh-draft", vec![VcsOp::RestoreAll, VcsOp::Pull])
    }

    /// Plain branch switch.
    pub fn checkout(branch: &str) -> Self {
        Self::new("checkout", vec![VcsOp::checkout(branch)])
    }
}

impl fmt::Display for Pipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, op) in self.ops.iter().enumerate() {
            if i > 0 {
                write!(f, " && ")?;
            }
            write!(f, "{}", op)?;
        }
        Ok(())
    }
}

//! Repository discovery.
//!
//! Reads git metadata straight off disk at startup: loose branch heads,
//! `packed-refs`, and `HEAD`. Nothing here shells out to git.

use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

/// Branch assumed when the metadata can't be read.
pub const FALLBACK_BRANCH: &str = "main";

/// What we know about the repository.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepositoryState {
    /// Repository root, the directory we sync.
    pub working_dir: PathBuf,

    /// Git metadata directory (usually `<root>/.git`).
    pub git_dir: PathBuf,

    /// Local and remote-tracking branch names (last path segment only).
    pub known_branches: BTreeSet<String>,

    /// Branch HEAD points at.
    pub current_branch: String,

    /// Whether the draft branch exists. Set optimistically when we issue
    /// the branch creation, before git confirms it.
    pub draft_branch_exists: bool,
}

impl RepositoryState {
    /// Scans `<root>/.git` for branches and the current HEAD.
    ///
    /// Never fails: missing metadata degrades to branch `main` with no
    /// known branches.
    pub fn discover(root: &Path, draft_branch: &str) -> Self {
        let git_dir = resolve_git_dir(root);

        let (known_branches, current_branch) = if git_dir.is_dir() {
            let branches = read_branches(&git_dir);
            let head = read_head(&git_dir).unwrap_or_else(|| {
                warn!(
                    "Could not read HEAD in {}, assuming '{}'",
                    git_dir.display(),
                    FALLBACK_BRANCH
                );
                FALLBACK_BRANCH.to_string()
            });
            (branches, head)
        } else {
            warn!(
                "No git metadata at {}, assuming branch '{}'",
                git_dir.display(),
                FALLBACK_BRANCH
            );
            (BTreeSet::new(), FALLBACK_BRANCH.to_string())
        };

        info!("Known branches: {:?}", known_branches);
        info!("Current branch: {}", current_branch);

        let draft_branch_exists = known_branches.contains(draft_branch);
        Self {
            working_dir: root.to_path_buf(),
            git_dir,
            known_branches,
            current_branch,
            draft_branch_exists,
        }
    }

    /// Records a branch that git has confirmed exists.
    pub fn record_branch(&mut self, branch: &str) {
        self.known_branches.insert(branch.to_string());
    }
}

/// Follows a `.git` file (worktrees, submodules) to the real metadata dir.
fn resolve_git_dir(root: &Path) -> PathBuf {
    let dot_git = root.join(".git");
    if !dot_git.is_file() {
        return dot_git;
    }

    let Ok(content) = fs::read_to_string(&dot_git) else {
        return dot_git;
    };
    match content.lines().next().and_then(|l| l.strip_prefix("gitdir:")) {
        Some(target) => {
            let target = Path::new(target.trim());
            let resolved = if target.is_absolute() {
                target.to_path_buf()
            } else {
                root.join(target)
            };
            debug!("Following .git file to {}", resolved.display());
            resolved
        }
        None => dot_git,
    }
}

/// Last segment of a ref name (`refs/heads/feature/x` -> `x`).
fn last_segment(reference: &str) -> Option<&str> {
    reference.rsplit('/').next().filter(|s| !s.is_empty())
}

fn read_branches(git_dir: &Path) -> BTreeSet<String> {
    let mut branches = BTreeSet::new();

    let heads = git_dir.join("refs").join("heads");
    for entry in WalkDir::new(&heads).min_depth(1).into_iter().filter_map(Result::ok) {
        if entry.file_type().is_file() {
            if let Some(name) = entry.file_name().to_str() {
                branches.insert(name.to_string());
            }
        }
    }

    match fs::read_to_string(git_dir.join("packed-refs")) {
        Ok(content) => branches.extend(parse_packed_refs(&content)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!("Failed to read packed-refs: {}", e),
    }

    branches
}

/// Branch names from `packed-refs` content.
///
/// Comment (`#`) and peeled-tag (`^`) lines are skipped, as are tags.
pub fn parse_packed_refs(content: &str) -> Vec<String> {
    content
        .lines()
        .filter(|line| !line.starts_with('#') && !line.starts_with('^'))
        .filter_map(|line| line.split_whitespace().nth(1))
        .filter(|reference| {
            reference.starts_with("refs/heads/") || reference.starts_with("refs/remotes/")
        })
        .filter_map(last_segment)
        .filter(|name| *name != "HEAD")
        .map(str::to_string)
        .collect()
}

fn read_head(git_dir: &Path) -> Option<String> {
    let content = fs::read_to_string(git_dir.join("HEAD")).ok()?;
    parse_head(&content)
}

/// Current branch from `HEAD` content: the last segment of the first line.
pub fn parse_head(content: &str) -> Option<String> {
    let first = content.lines().next()?.trim();
    last_segment(first).map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn fake_git(root: &Path, head: &str, loose: &[&str], packed: &str) {
        let git = root.join(".git");
        fs::create_dir_all(git.join("refs/heads")).unwrap();
        fs::write(git.join("HEAD"), head).unwrap();
        for branch in loose {
            let path = git.join("refs/heads").join(branch);
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            fs::write(path, "0123456789abcdef0123456789abcdef01234567\n").unwrap();
        }
        if !packed.is_empty() {
            fs::write(git.join("packed-refs"), packed).unwrap();
        }
    }

    #[test]
    fn test_discover_loose_and_packed() {
        let dir = tempdir().unwrap();
        fake_git(
            dir.path(),
            "ref: refs/heads/main\n",
            &["main", "feature/login"],
            "# pack-refs with: peeled fully-peeled sorted\n\
             1111111111111111111111111111111111111111 refs/heads/old\n\
             2222222222222222222222222222222222222222 refs/remotes/origin/draft\n\
             3333333333333333333333333333333333333333 refs/tags/v1.0\n\
             ^4444444444444444444444444444444444444444\n",
        );

        let state = RepositoryState::discover(dir.path(), "draft");
        assert_eq!(state.current_branch, "main");
        assert!(state.known_branches.contains("main"));
        assert!(state.known_branches.contains("login"));
        assert!(state.known_branches.contains("old"));
        assert!(state.known_branches.contains("draft"));
        assert!(!state.known_branches.contains("v1.0"));
        assert!(state.draft_branch_exists);
    }

    #[test]
    fn test_discover_on_draft_branch() {
        let dir = tempdir().unwrap();
        fake_git(dir.path(), "ref: refs/heads/draft\n", &["main", "draft"], "");

        let state = RepositoryState::discover(dir.path(), "draft");
        assert_eq!(state.current_branch, "draft");
        assert!(state.draft_branch_exists);
    }

    #[test]
    fn test_discover_without_git_falls_back() {
        let dir = tempdir().unwrap();
        let state = RepositoryState::discover(dir.path(), "draft");

        assert_eq!(state.current_branch, FALLBACK_BRANCH);
        assert!(state.known_branches.is_empty());
        assert!(!state.draft_branch_exists);
    }

    #[test]
    fn test_git_file_is_followed() {
        let dir = tempdir().unwrap();
        let real = dir.path().join("real-git");
        fs::create_dir_all(real.join("refs/heads")).unwrap();
        fs::write(real.join("HEAD"), "ref: refs/heads/topic\n").unwrap();
        fs::write(real.join("refs/heads/topic"), "abc\n").unwrap();

        let work = dir.path().join("work");
        fs::create_dir_all(&work).unwrap();
        fs::write(work.join(".git"), format!("gitdir: {}\n", real.display())).unwrap();

        let state = RepositoryState::discover(&work, "draft");
        assert_eq!(state.git_dir, real);
        assert_eq!(state.current_branch, "topic");
    }

    #[test]
    fn test_parse_head_detached() {
        assert_eq!(parse_head("abc123\n").as_deref(), Some("abc123"));
        assert_eq!(parse_head(""), None);
    }

    #[test]
    fn test_record_branch() {
        let dir = tempdir().unwrap();
        let mut state = RepositoryState::discover(dir.path(), "draft");
        state.record_branch("draft");
        assert!(state.known_branches.contains("draft"));
    }
}

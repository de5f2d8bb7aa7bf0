//! Bulk working-tree operations.
//!
//! Both operations walk the tree with walkdir and prune anything the
//! [`IgnoreFilter`] excludes, matching paths relative to the directory
//! being walked. Excluded entries are never touched.

use crate::error::{Result, TreeError};
use crate::filter::IgnoreFilter;
use std::fs;
use std::path::Path;
use tracing::debug;
use walkdir::{DirEntry, WalkDir};

/// Counts from a tree operation, mostly for logging.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TreeStats {
    pub files: usize,
    pub dirs: usize,
}

fn walker<'a>(
    root: &'a Path,
    filter: &'a IgnoreFilter,
    contents_first: bool,
) -> impl Iterator<Item = walkdir::Result<DirEntry>> + 'a {
    WalkDir::new(root)
        .min_depth(1)
        .follow_links(false)
        .contents_first(contents_first)
        .into_iter()
        .filter_entry(move |entry| {
            let relative = entry.path().strip_prefix(root).unwrap_or(entry.path());
            !filter.is_excluded_relative(relative, entry.file_type().is_dir())
        })
}

/// Deletes every non-excluded entry under `root`, keeping `root` itself.
///
/// A directory that still holds excluded entries after its contents are
/// removed is left in place.
pub fn clear_tree(root: &Path, filter: &IgnoreFilter) -> Result<TreeStats> {
    let mut stats = TreeStats::default();

    for entry in walker(root, filter, true) {
        let entry = entry.map_err(|e| TreeError::walk(root, e))?;
        let path = entry.path();

        if entry.file_type().is_dir() {
            let mut children = fs::read_dir(path).map_err(|e| TreeError::io(path, e))?;
            if children.next().is_some() {
                debug!("Keeping {} (holds excluded entries)", path.display());
                continue;
            }
            fs::remove_dir(path).map_err(|e| TreeError::io(path, e))?;
            stats.dirs += 1;
        } else {
            fs::remove_file(path).map_err(|e| TreeError::io(path, e))?;
            stats.files += 1;
        }
    }

    debug!(
        "Cleared {} files, {} dirs from {}",
        stats.files,
        stats.dirs,
        root.display()
    );
    Ok(stats)
}

/// Copies every non-excluded entry from `src` into `dest`, preserving
/// structure and overwriting files that already exist.
pub fn copy_tree(src: &Path, dest: &Path, filter: &IgnoreFilter) -> Result<TreeStats> {
    let mut stats = TreeStats::default();
    fs::create_dir_all(dest).map_err(|e| TreeError::io(dest, e))?;

    for entry in walker(src, filter, false) {
        let entry = entry.map_err(|e| TreeError::walk(src, e))?;
        let relative = entry.path().strip_prefix(src).unwrap_or(entry.path());
        let target = dest.join(relative);
        let file_type = entry.file_type();

        if file_type.is_dir() {
            fs::create_dir_all(&target).map_err(|e| TreeError::io(&target, e))?;
            stats.dirs += 1;
            continue;
        }

        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent).map_err(|e| TreeError::io(parent, e))?;
        }
        if file_type.is_symlink() {
            copy_symlink(entry.path(), &target)?;
        } else {
            fs::copy(entry.path(), &target).map_err(|e| TreeError::io(entry.path(), e))?;
        }
        stats.files += 1;
    }

    debug!(
        "Copied {} files, {} dirs from {} to {}",
        stats.files,
        stats.dirs,
        src.display(),
        dest.display()
    );
    Ok(stats)
}

#[cfg(unix)]
fn copy_symlink(src: &Path, target: &Path) -> Result<()> {
    let link = fs::read_link(src).map_err(|e| TreeError::io(src, e))?;
    if target.symlink_metadata().is_ok() {
        fs::remove_file(target).map_err(|e| TreeError::io(target, e))?;
    }
    std::os::unix::fs::symlink(&link, target).map_err(|e| TreeError::io(target, e))
}

#[cfg(not(unix))]
fn copy_symlink(src: &Path, target: &Path) -> Result<()> {
    fs::copy(src, target)
        .map(|_| ())
        .map_err(|e| TreeError::io(src, e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn filter(root: &Path) -> IgnoreFilter {
        IgnoreFilter::from_patterns(root, &["secret/"]).unwrap()
    }

    fn write(root: &Path, rel: &str, content: &str) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    #[test]
    fn test_clear_keeps_excluded() {
        let dir = tempdir().unwrap();
        let root = dir.path();
        write(root, "src/main.rs", "fn main() {}");
        write(root, "src/debug.log", "noise");
        write(root, "docs/guide.md", "# guide");
        write(root, ".git/HEAD", "ref: refs/heads/main");
        write(root, "secret/key", "hunter2");

        let stats = clear_tree(root, &filter(root)).unwrap();

        assert_eq!(stats.files, 2);
        assert!(!root.join("src/main.rs").exists());
        assert!(!root.join("docs").exists());
        // src survives because it still holds an excluded file.
        assert!(root.join("src/debug.log").exists());
        assert!(root.join(".git/HEAD").exists());
        assert!(root.join("secret/key").exists());
    }

    #[test]
    fn test_copy_skips_excluded() {
        let src = tempdir().unwrap();
        let dest = tempdir().unwrap();
        write(src.path(), "a.txt", "a");
        write(src.path(), "nested/deep/b.txt", "b");
        write(src.path(), "node_modules/pkg/index.js", "js");
        write(src.path(), "trace.log", "log");

        let stats = copy_tree(src.path(), dest.path(), &filter(src.path())).unwrap();

        assert_eq!(stats.files, 2);
        assert_eq!(fs::read_to_string(dest.path().join("a.txt")).unwrap(), "a");
        assert_eq!(
            fs::read_to_string(dest.path().join("nested/deep/b.txt")).unwrap(),
            "b"
        );
        assert!(!dest.path().join("node_modules").exists());
        assert!(!dest.path().join("trace.log").exists());
    }

    #[test]
    fn test_copy_overwrites_existing() {
        let src = tempdir().unwrap();
        let dest = tempdir().unwrap();
        write(src.path(), "a.txt", "new");
        write(dest.path(), "a.txt", "old");

        copy_tree(src.path(), dest.path(), &filter(src.path())).unwrap();
        assert_eq!(fs::read_to_string(dest.path().join("a.txt")).unwrap(), "new");
    }

    #[cfg(unix)]
    #[test]
    fn test_copy_preserves_symlinks() {
        let src = tempdir().unwrap();
        let dest = tempdir().unwrap();
        write(src.path(), "target.txt", "t");
        std::os::unix::fs::symlink("target.txt", src.path().join("link.txt")).unwrap();

        copy_tree(src.path(), dest.path(), &filter(src.path())).unwrap();
        let link = fs::read_link(dest.path().join("link.txt")).unwrap();
        assert_eq!(link, Path::new("target.txt"));
    }
}

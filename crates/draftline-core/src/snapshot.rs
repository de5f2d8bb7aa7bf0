//! Scratch snapshot of the working tree.
//!
//! Carries uncommitted edits across a branch switch: capture before
//! leaving the draft branch, restore once the stable branch is checked
//! out. The backing directory lives for the whole daemon run and is
//! removed when the store is closed or dropped.

use crate::error::{Result, TreeError};
use crate::filter::IgnoreFilter;
use crate::tree::{clear_tree, copy_tree, TreeStats};
use std::fs;
use std::path::Path;
use tempfile::TempDir;
use tracing::{info, warn};

/// Owns the scratch directory.
#[derive(Debug)]
pub struct SnapshotStore {
    dir: TempDir,
    filter: IgnoreFilter,
}

impl SnapshotStore {
    /// Creates the scratch directory under the system temp dir.
    pub fn new(filter: IgnoreFilter) -> Result<Self> {
        let dir = tempfile::Builder::new()
            .prefix("draftline-")
            .tempdir()
            .map_err(|e| TreeError::io(std::env::temp_dir(), e))?;
        info!("Scratch snapshot at {}", dir.path().display());
        Ok(Self { dir, filter })
    }

    /// Path of the scratch directory.
    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Replaces the snapshot with the non-excluded contents of `working_dir`.
    pub fn capture(&self, working_dir: &Path) -> Result<TreeStats> {
        self.wipe()?;
        let stats = copy_tree(working_dir, self.path(), &self.filter)?;
        info!("Captured {} files into snapshot", stats.files);
        Ok(stats)
    }

    /// Clears the non-excluded contents of `working_dir`, then copies the
    /// snapshot into it.
    pub fn restore(&self, working_dir: &Path) -> Result<TreeStats> {
        clear_tree(working_dir, &self.filter)?;
        let stats = copy_tree(self.path(), working_dir, &self.filter)?;
        info!("Restored {} files from snapshot", stats.files);
        Ok(stats)
    }

    /// Empties the scratch directory completely, excluded names included.
    fn wipe(&self) -> Result<()> {
        let root = self.path();
        for entry in fs::read_dir(root).map_err(|e| TreeError::io(root, e))? {
            let entry = entry.map_err(|e| TreeError::io(root, e))?;
            let path = entry.path();
            let is_dir = entry
                .file_type()
                .map_err(|e| TreeError::io(&path, e))?
                .is_dir();
            if is_dir {
                fs::remove_dir_all(&path).map_err(|e| TreeError::io(&path, e))?;
            } else {
                fs::remove_file(&path).map_err(|e| TreeError::io(&path, e))?;
            }
        }
        Ok(())
    }

    /// Removes the scratch directory.
    pub fn close(self) {
        let path = self.dir.path().to_path_buf();
        if let Err(e) = self.dir.close() {
            warn!("Failed to remove snapshot dir {}: {}", path.display(), e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use std::path::PathBuf;
    use tempfile::tempdir;
    use walkdir::WalkDir;

    fn write(root: &Path, rel: &str, content: &[u8]) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    /// Every regular file under `root` with its bytes.
    fn files(root: &Path) -> BTreeMap<PathBuf, Vec<u8>> {
        WalkDir::new(root)
            .into_iter()
            .filter_map(std::result::Result::ok)
            .filter(|e| e.file_type().is_file())
            .map(|e| {
                let rel = e.path().strip_prefix(root).unwrap().to_path_buf();
                (rel, fs::read(e.path()).unwrap())
            })
            .collect()
    }

    fn store(root: &Path) -> SnapshotStore {
        SnapshotStore::new(IgnoreFilter::from_patterns(root, &["*.cache"]).unwrap()).unwrap()
    }

    #[test]
    fn test_round_trip_is_byte_identical() {
        let work = tempdir().unwrap();
        let root = work.path();
        write(root, "README.md", b"# hello\n");
        write(root, "src/lib.rs", b"pub fn f() {}\n");
        write(root, "assets/logo.bin", &[0u8, 159, 146, 150, 255]);
        write(root, "empty.txt", b"");
        write(root, "build/out.o", b"obj");
        write(root, "x.cache", b"c");
        write(root, ".git/HEAD", b"ref: refs/heads/draft\n");

        let store = store(root);
        let mut expected = files(root);
        expected.retain(|path, _| !store.filter.is_excluded_relative(path, false));

        store.capture(root).unwrap();

        // Snapshot holds exactly the non-excluded files.
        assert_eq!(files(store.path()), expected);

        // Mutate the working tree, then restore.
        write(root, "README.md", b"changed");
        write(root, "stray.txt", b"stray");
        fs::remove_file(root.join("src/lib.rs")).unwrap();

        store.restore(root).unwrap();

        let mut restored = files(root);
        restored.retain(|path, _| !store.filter.is_excluded_relative(path, false));
        assert_eq!(restored, expected);

        // Excluded files were never touched.
        assert_eq!(fs::read(root.join("build/out.o")).unwrap(), b"obj");
        assert!(root.join(".git/HEAD").exists());
    }

    #[test]
    fn test_restore_into_empty_dir_has_no_excluded_files() {
        let work = tempdir().unwrap();
        write(work.path(), "keep.txt", b"keep");
        write(work.path(), "debug.log", b"log");
        write(work.path(), "node_modules/a/b.js", b"js");

        let store = store(work.path());
        store.capture(work.path()).unwrap();

        let fresh = tempdir().unwrap();
        store.restore(fresh.path()).unwrap();

        let restored = files(fresh.path());
        assert_eq!(restored.len(), 1);
        assert_eq!(restored[Path::new("keep.txt")], b"keep");
    }

    #[test]
    fn test_capture_replaces_old_contents() {
        let work = tempdir().unwrap();
        write(work.path(), "first.txt", b"1");

        let store = store(work.path());
        store.capture(work.path()).unwrap();

        fs::remove_file(work.path().join("first.txt")).unwrap();
        write(work.path(), "second.txt", b"2");
        store.capture(work.path()).unwrap();

        assert!(!store.path().join("first.txt").exists());
        assert!(store.path().join("second.txt").exists());
    }

    #[test]
    fn test_close_removes_dir() {
        let work = tempdir().unwrap();
        let store = store(work.path());
        let path = store.path().to_path_buf();
        assert!(path.exists());

        store.close();
        assert!(!path.exists());
    }
}

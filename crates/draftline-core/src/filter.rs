//! Ignore rules.
//!
//! Answers one question: is this path excluded from syncing? The answer
//! combines the repository's `.gitignore`, any extra patterns from the
//! config, and a fixed set of names that are always left alone.
//!
//! The same filter is used by the change monitor and by every bulk
//! tree operation, so an excluded path is never staged, copied or
//! deleted by us.

use ignore::gitignore::{Gitignore, GitignoreBuilder};
use std::fs;
use std::path::{Component, Path, PathBuf};
use tracing::{debug, warn};

/// Patterns that are always excluded, added after everything else so
/// they cannot be negated.
pub const BUILTIN_PATTERNS: &[&str] = &[
    ".git",
    ".draftline",
    "node_modules",
    "dist",
    "build",
    ".DS_Store",
    "Thumbs.db",
    "*.log",
    "*.tmp",
    "*.swp",
    "*.swo",
];

/// Compiled ignore rules anchored at a repository root.
#[derive(Debug, Clone)]
pub struct IgnoreFilter {
    root: PathBuf,
    rules: Gitignore,
}

impl IgnoreFilter {
    /// Loads `<root>/.gitignore` (if present), then `extra` patterns, then
    /// the built-ins.
    pub fn load(root: &Path, extra: &[String]) -> Result<Self, ignore::Error> {
        let mut patterns = Vec::new();

        let gitignore = root.join(".gitignore");
        match fs::read_to_string(&gitignore) {
            Ok(content) => {
                debug!("Loading ignore rules from {}", gitignore.display());
                patterns.extend(
                    content
                        .lines()
                        .filter(|line| !line.trim().is_empty())
                        .map(str::to_string),
                );
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!("Failed to read {}: {}", gitignore.display(), e),
        }

        patterns.extend(extra.iter().cloned());
        Self::from_patterns(root, &patterns)
    }

    /// Builds a filter from explicit patterns; built-ins are still applied.
    pub fn from_patterns<S: AsRef<str>>(root: &Path, patterns: &[S]) -> Result<Self, ignore::Error> {
        let mut builder = GitignoreBuilder::new(root);

        for pattern in patterns {
            let pattern = pattern.as_ref();
            if let Err(e) = builder.add_line(None, pattern) {
                warn!("Skipping invalid ignore pattern '{}': {}", pattern, e);
            }
        }
        for pattern in BUILTIN_PATTERNS {
            builder.add_line(None, pattern)?;
        }

        Ok(Self {
            root: root.to_path_buf(),
            rules: builder.build()?,
        })
    }

    /// Checks a path that may be absolute (under the root) or relative to it.
    ///
    /// Paths outside the root, and the root itself, are never excluded.
    pub fn is_excluded(&self, path: &Path) -> bool {
        let relative = if path.is_absolute() {
            match path.strip_prefix(&self.root) {
                Ok(rel) => rel,
                Err(_) => return false,
            }
        } else {
            path
        };

        // Only stat when the path is actually on disk under our root.
        let is_dir = self.root.join(relative).is_dir();
        self.is_excluded_relative(relative, is_dir)
    }

    /// Checks a path relative to the root without touching the filesystem.
    ///
    /// The path and each of its parent directories are tested, so a rule
    /// like `build/` also excludes `build/output.txt`.
    pub fn is_excluded_relative(&self, relative: &Path, is_dir: bool) -> bool {
        let relative = normalize(relative);
        if relative.as_os_str().is_empty() {
            return false;
        }
        self.rules
            .matched_path_or_any_parents(&relative, is_dir)
            .is_ignore()
    }
}

/// Drops `.` components and any leading root so the matcher never sees
/// an absolute path.
fn normalize(path: &Path) -> PathBuf {
    path.components()
        .filter(|c| matches!(c, Component::Normal(_) | Component::ParentDir))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn filter(patterns: &[&str]) -> IgnoreFilter {
        IgnoreFilter::from_patterns(Path::new("/repo"), patterns).unwrap()
    }

    #[test]
    fn test_rules_and_builtins() {
        let f = filter(&["*.log", "build/"]);

        assert!(f.is_excluded_relative(Path::new("build/output.txt"), false));
        assert!(f.is_excluded_relative(Path::new("app.log"), false));
        assert!(!f.is_excluded_relative(Path::new("src/app.ts"), false));
    }

    #[test]
    fn test_builtins_apply_without_rules() {
        let f = filter(&[]);

        assert!(f.is_excluded_relative(Path::new(".git"), true));
        assert!(f.is_excluded_relative(Path::new(".git/HEAD"), false));
        assert!(f.is_excluded_relative(Path::new("web/node_modules/x/index.js"), false));
        assert!(f.is_excluded_relative(Path::new("notes.swp"), false));
        assert!(f.is_excluded_relative(Path::new(".draftline/config.json"), false));
        assert!(!f.is_excluded_relative(Path::new("README.md"), false));
    }

    #[test]
    fn test_builtins_cannot_be_negated() {
        let f = filter(&["!keep.log"]);
        assert!(f.is_excluded_relative(Path::new("keep.log"), false));
    }

    #[test]
    fn test_user_negation_still_works() {
        let f = filter(&["*.csv", "!keep.csv"]);
        assert!(f.is_excluded_relative(Path::new("data.csv"), false));
        assert!(!f.is_excluded_relative(Path::new("keep.csv"), false));
    }

    #[test]
    fn test_absolute_paths() {
        let f = filter(&["secret.txt"]);

        assert!(f.is_excluded(Path::new("/repo/secret.txt")));
        assert!(f.is_excluded(Path::new("/repo/nested/secret.txt")));
        assert!(!f.is_excluded(Path::new("/repo/public.txt")));
        // Outside the root and the root itself.
        assert!(!f.is_excluded(Path::new("/elsewhere/secret.txt")));
        assert!(!f.is_excluded(Path::new("/repo")));
    }

    #[test]
    fn test_load_reads_gitignore_and_extra() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join(".gitignore"), "target/\n\n*.bak\n").unwrap();

        let f = IgnoreFilter::load(dir.path(), &["scratch/".to_string()]).unwrap();
        assert!(f.is_excluded_relative(Path::new("target/debug/app"), false));
        assert!(f.is_excluded_relative(Path::new("old.bak"), false));
        assert!(f.is_excluded_relative(Path::new("scratch/notes.md"), false));
        assert!(!f.is_excluded_relative(Path::new("src/main.rs"), false));
    }

    #[test]
    fn test_load_without_gitignore() {
        let dir = tempdir().unwrap();
        let f = IgnoreFilter::load(dir.path(), &[]).unwrap();
        assert!(f.is_excluded_relative(Path::new("debug.log"), false));
        assert!(!f.is_excluded_relative(Path::new("main.rs"), false));
    }
}

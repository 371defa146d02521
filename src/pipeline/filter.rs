//! File filtering for the repository walk.
//!
//! Precedence:
//! 1. Hard internal ignores (VCS/store directories, database files)
//! 2. Gitignore-style rules (handled by the `ignore` walker itself,
//!    including every ancestor `.gitignore`/`.ignore` file)
//! 3. Include globs (if any provided)
//! 4. Exclude globs
//!
//! Filtering is a pure function of the relative path: same inputs always
//! produce the same outcome.

use anyhow::Result;
use globset::{Glob, GlobMatcher};

/// Directories that are always ignored, wherever they appear.
const INTERNAL_IGNORE_DIRS: &[&str] = &[
    ".git",
    ".axon",
    ".hg",
    ".svn",
    "node_modules",
    "target",
    "__pycache__",
    ".venv",
    "venv",
    "dist",
    "build",
    "bin",
    "obj",
];

/// File suffixes that are always ignored.
const INTERNAL_IGNORE_SUFFIXES: &[&str] = &[
    ".db",
    ".db-journal",
    ".db-wal",
    ".db-shm",
    ".sqlite",
    ".sqlite3",
    ".min.js",
];

/// Why a path was skipped during the walk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    IgnoredInternal,
    ExcludedByGlob,
}

/// Compiled include/exclude rules plus the internal ignore tables.
pub struct FileFilter {
    include: Vec<GlobMatcher>,
    exclude: Vec<GlobMatcher>,
}

impl FileFilter {
    /// Compile globs. Empty include list means "include everything".
    pub fn new(include: &[String], exclude: &[String]) -> Result<Self> {
        Ok(Self {
            include: compile(include)?,
            exclude: compile(exclude)?,
        })
    }

    /// Check a repo-relative path (forward slashes) against the rules.
    ///
    /// # Returns
    /// * `None`: the path should be processed
    /// * `Some(reason)`: the path should be skipped
    pub fn should_skip(&self, rel_path: &str) -> Option<SkipReason> {
        if is_internal_ignore(rel_path) {
            return Some(SkipReason::IgnoredInternal);
        }

        if !self.include.is_empty() && !self.include.iter().any(|m| m.is_match(rel_path)) {
            return Some(SkipReason::ExcludedByGlob);
        }

        if self.exclude.iter().any(|m| m.is_match(rel_path)) {
            return Some(SkipReason::ExcludedByGlob);
        }

        None
    }
}

fn compile(patterns: &[String]) -> Result<Vec<GlobMatcher>> {
    let mut matchers = Vec::new();
    for pattern in patterns {
        let glob = Glob::new(pattern)
            .map_err(|e| anyhow::anyhow!("invalid glob pattern '{pattern}': {e}"))?;
        matchers.push(glob.compile_matcher());
    }
    Ok(matchers)
}

fn is_internal_ignore(rel_path: &str) -> bool {
    for suffix in INTERNAL_IGNORE_SUFFIXES {
        if rel_path.ends_with(suffix) {
            return true;
        }
    }
    rel_path
        .split('/')
        .any(|component| INTERNAL_IGNORE_DIRS.contains(&component))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_internal_dirs_ignored() {
        let filter = FileFilter::new(&[], &[]).unwrap();
        assert_eq!(
            filter.should_skip("node_modules/react/index.js"),
            Some(SkipReason::IgnoredInternal)
        );
        assert_eq!(
            filter.should_skip(".git/config"),
            Some(SkipReason::IgnoredInternal)
        );
        assert_eq!(
            filter.should_skip(".axon/meta.json"),
            Some(SkipReason::IgnoredInternal)
        );
    }

    #[test]
    fn test_database_files_ignored() {
        let filter = FileFilter::new(&[], &[]).unwrap();
        assert_eq!(
            filter.should_skip("data/cache.db"),
            Some(SkipReason::IgnoredInternal)
        );
        assert_eq!(
            filter.should_skip("cache.db-journal"),
            Some(SkipReason::IgnoredInternal)
        );
    }

    #[test]
    fn test_plain_source_passes() {
        let filter = FileFilter::new(&[], &[]).unwrap();
        assert_eq!(filter.should_skip("src/app.py"), None);
        assert_eq!(filter.should_skip("lib/database.py"), None);
    }

    #[test]
    fn test_include_patterns() {
        let filter = FileFilter::new(&["src/**".to_string()], &[]).unwrap();
        assert_eq!(filter.should_skip("src/app.py"), None);
        assert_eq!(
            filter.should_skip("scripts/deploy.py"),
            Some(SkipReason::ExcludedByGlob)
        );
    }

    #[test]
    fn test_exclude_patterns() {
        let filter = FileFilter::new(&[], &["**/*_test.py".to_string()]).unwrap();
        assert_eq!(filter.should_skip("src/app.py"), None);
        assert_eq!(
            filter.should_skip("src/app_test.py"),
            Some(SkipReason::ExcludedByGlob)
        );
    }

    #[test]
    fn test_invalid_glob_rejected() {
        assert!(FileFilter::new(&["[".to_string()], &[]).is_err());
    }
}

//! Phase 1: repository walk.
//!
//! Enumerates files under the repo root honoring the composed ignore
//! ruleset (every ancestor `.gitignore`/`.ignore`, via the `ignore`
//! walker), applies internal ignores and include/exclude globs, reads
//! contents in parallel, and tags each entry with its language.
//!
//! Failure policy: an unreadable root is fatal; an unreadable file is
//! logged and skipped; binary content is logged, kept as a File entry,
//! and never parsed.

use std::path::Path;

use anyhow::Result;
use rayon::prelude::*;
use tracing::warn;

use crate::cancel::CancellationToken;
use crate::config::AnalysisConfig;
use crate::error::AxonError;
use crate::ingest::detect::{detect_language, Language};

use super::filter::FileFilter;

/// One accepted file, fully read into memory.
#[derive(Debug, Clone)]
pub struct FileEntry {
    /// Repo-relative path, forward slashes, no leading `./`.
    pub path: String,
    pub source: Vec<u8>,
    /// `None` for files with no registered parser.
    pub language: Option<Language>,
    /// Binary files are kept as File nodes but never parsed.
    pub is_binary: bool,
}

impl FileEntry {
    /// Language name stored on the File node.
    pub fn language_name(&self) -> &'static str {
        self.language.map(|l| l.as_str()).unwrap_or("unknown")
    }
}

/// Walk the repository and read every accepted file.
///
/// # Behavior
/// 1. Walk with the `ignore` crate (ancestor ignore files honored,
///    hidden files skipped, symlinks not followed).
/// 2. Apply internal ignores and include/exclude globs.
/// 3. Sort candidate paths for determinism.
/// 4. Read contents in parallel; detect binary payloads.
///
/// # Errors
/// `AxonError::Io` when the root itself cannot be read. Per-file read
/// errors are logged and the file is skipped.
pub fn walk_repo(
    repo_path: &Path,
    config: &AnalysisConfig,
    cancel: &CancellationToken,
) -> Result<Vec<FileEntry>> {
    if !repo_path.is_dir() {
        let source = std::io::Error::new(
            std::io::ErrorKind::NotFound,
            "repository root is not a readable directory",
        );
        return Err(AxonError::io(repo_path, source).into());
    }

    let filter = FileFilter::new(&config.include, &config.exclude)?;

    let mut candidates: Vec<(std::path::PathBuf, String)> = Vec::new();
    for entry in ignore::WalkBuilder::new(repo_path)
        .follow_links(false)
        .hidden(true)
        .git_ignore(true)
        .git_global(false)
        .require_git(false)
        .parents(false)
        .build()
    {
        let entry = match entry {
            Ok(e) => e,
            Err(e) => {
                warn!("walk error: {e}");
                continue;
            }
        };
        let path = entry.path();
        if !entry.file_type().map(|t| t.is_file()).unwrap_or(false) {
            continue;
        }

        let rel_path = match path.strip_prefix(repo_path) {
            Ok(rel) => normalize_path(rel),
            Err(_) => continue,
        };

        if filter.should_skip(&rel_path).is_some() {
            continue;
        }

        candidates.push((path.to_path_buf(), rel_path));
    }

    // Sort for deterministic downstream ordering.
    candidates.sort_by(|a, b| a.1.cmp(&b.1));

    cancel.check()?;

    // Parallel reads; the graph is untouched here so no writer discipline
    // is needed yet.
    let entries: Vec<FileEntry> = candidates
        .par_iter()
        .filter_map(|(abs_path, rel_path)| {
            if cancel.is_cancelled() {
                return None;
            }
            let source = match std::fs::read(abs_path) {
                Ok(bytes) => bytes,
                Err(e) => {
                    warn!("skipping unreadable file {rel_path}: {e}");
                    return None;
                }
            };
            let is_binary = looks_binary(&source);
            if is_binary {
                warn!("binary content in {rel_path}, keeping file node only");
            }
            Some(FileEntry {
                path: rel_path.clone(),
                language: if is_binary {
                    None
                } else {
                    detect_language(Path::new(rel_path))
                },
                source,
                is_binary,
            })
        })
        .collect();

    cancel.check()?;
    Ok(entries)
}

/// Repo-relative path with forward slashes and no leading `./`.
pub fn normalize_path(path: &Path) -> String {
    let joined = path
        .components()
        .filter_map(|c| match c {
            std::path::Component::Normal(part) => Some(part.to_string_lossy()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/");
    joined
}

/// NUL byte in the first 8 KiB marks the content as binary.
fn looks_binary(source: &[u8]) -> bool {
    let window = &source[..source.len().min(8192)];
    window.contains(&0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn default_walk(root: &Path) -> Vec<FileEntry> {
        walk_repo(root, &AnalysisConfig::default(), &CancellationToken::new()).unwrap()
    }

    #[test]
    fn test_walk_collects_sorted_entries() {
        let temp_dir = TempDir::new().unwrap();
        fs::write(temp_dir.path().join("b.py"), "x = 1\n").unwrap();
        fs::write(temp_dir.path().join("a.py"), "y = 2\n").unwrap();

        let entries = default_walk(temp_dir.path());
        let paths: Vec<_> = entries.iter().map(|e| e.path.as_str()).collect();
        assert_eq!(paths, vec!["a.py", "b.py"]);
    }

    #[test]
    fn test_gitignore_honored() {
        let temp_dir = TempDir::new().unwrap();
        fs::write(temp_dir.path().join(".gitignore"), "ignored.py\n").unwrap();
        fs::write(temp_dir.path().join("ignored.py"), "x = 1\n").unwrap();
        fs::write(temp_dir.path().join("kept.py"), "y = 2\n").unwrap();

        let entries = default_walk(temp_dir.path());
        let paths: Vec<_> = entries.iter().map(|e| e.path.as_str()).collect();
        assert!(paths.contains(&"kept.py"));
        assert!(!paths.contains(&"ignored.py"));
    }

    #[test]
    fn test_nested_gitignore_honored() {
        let temp_dir = TempDir::new().unwrap();
        fs::create_dir_all(temp_dir.path().join("sub")).unwrap();
        fs::write(temp_dir.path().join("sub/.gitignore"), "local.py\n").unwrap();
        fs::write(temp_dir.path().join("sub/local.py"), "x = 1\n").unwrap();
        fs::write(temp_dir.path().join("sub/kept.py"), "y = 2\n").unwrap();

        let entries = default_walk(temp_dir.path());
        let paths: Vec<_> = entries.iter().map(|e| e.path.as_str()).collect();
        assert!(paths.contains(&"sub/kept.py"));
        assert!(!paths.contains(&"sub/local.py"));
    }

    #[test]
    fn test_unknown_language_kept() {
        let temp_dir = TempDir::new().unwrap();
        fs::write(temp_dir.path().join("README.md"), "# hi\n").unwrap();

        let entries = default_walk(temp_dir.path());
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].language, None);
        assert_eq!(entries[0].language_name(), "unknown");
    }

    #[test]
    fn test_binary_detected() {
        let temp_dir = TempDir::new().unwrap();
        fs::write(temp_dir.path().join("blob.py"), b"\x00\x01\x02").unwrap();

        let entries = default_walk(temp_dir.path());
        assert_eq!(entries.len(), 1);
        assert!(entries[0].is_binary);
        assert_eq!(entries[0].language, None);
    }

    #[test]
    fn test_missing_root_is_fatal() {
        let result = walk_repo(
            Path::new("/definitely/not/a/repo"),
            &AnalysisConfig::default(),
            &CancellationToken::new(),
        );
        assert!(result.is_err());
        let err = result.unwrap_err();
        assert!(err.downcast_ref::<AxonError>().is_some());
    }

    #[test]
    fn test_cancelled_walk_errors() {
        let temp_dir = TempDir::new().unwrap();
        fs::write(temp_dir.path().join("a.py"), "x = 1\n").unwrap();
        let cancel = CancellationToken::new();
        cancel.cancel();

        let result = walk_repo(temp_dir.path(), &AnalysisConfig::default(), &cancel);
        assert!(result.is_err());
    }

    #[test]
    fn test_language_dispatch() {
        let temp_dir = TempDir::new().unwrap();
        fs::write(temp_dir.path().join("a.py"), "x = 1\n").unwrap();
        fs::write(temp_dir.path().join("b.ts"), "let x = 1;\n").unwrap();
        fs::write(temp_dir.path().join("c.cs"), "class A {}\n").unwrap();

        let entries = default_walk(temp_dir.path());
        let langs: Vec<_> = entries.iter().map(|e| e.language_name()).collect();
        assert_eq!(langs, vec!["python", "typescript", "csharp"]);
    }

    #[test]
    fn test_normalize_path() {
        assert_eq!(normalize_path(Path::new("./a/b.py")), "a/b.py");
        assert_eq!(normalize_path(Path::new("a/b.py")), "a/b.py");
    }
}

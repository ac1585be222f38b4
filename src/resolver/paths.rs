// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Map possibly-partial paths onto files in the repository.

use std::path::{Path, PathBuf};

use crate::index::{to_slash, FileWalker};

/// A path that exists in the repository.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoPath {
    pub absolute: PathBuf,
    pub relative: String,
}

/// Resolve `partial` against `walker`'s root: a direct join wins, then the
/// basename match sharing the most path segments with `partial` (ties keep
/// the first file found).
pub fn resolve_repo_path(walker: &FileWalker, partial: &str) -> Option<RepoPath> {
    let root = walker.root();
    let trimmed = partial.trim_start_matches("./");
    let direct = root.join(trimmed);
    if direct.is_file() {
        let relative = direct
            .strip_prefix(root)
            .map(to_slash)
            .unwrap_or_else(|_| trimmed.to_string());
        return Some(RepoPath {
            absolute: direct,
            relative,
        });
    }

    let basename = Path::new(trimmed).file_name()?.to_str()?;
    let segments: Vec<&str> = trimmed
        .split(['/', '\\'])
        .filter(|s| !s.is_empty() && *s != "." && *s != "..")
        .collect();

    let mut best: Option<(usize, RepoPath)> = None;
    for candidate in walker.find_by_name(basename) {
        let score = segments
            .iter()
            .filter(|s| candidate.relative_path.contains(*s))
            .count();
        if best.as_ref().map_or(true, |(b, _)| score > *b) {
            best = Some((
                score,
                RepoPath {
                    absolute: candidate.path.clone(),
                    relative: candidate.relative_path.clone(),
                },
            ));
        }
    }
    best.map(|(_, path)| path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::IndexConfig;
    use tempfile::TempDir;

    fn fixture() -> (TempDir, FileWalker) {
        let temp = TempDir::new().unwrap();
        for rel in ["src/storage/page_service.rs", "src/net/page_service.rs", "src/lib.rs"] {
            let path = temp.path().join(rel);
            std::fs::create_dir_all(path.parent().unwrap()).unwrap();
            std::fs::write(path, "fn x() {}\n").unwrap();
        }
        let walker = FileWalker::new(temp.path(), &IndexConfig::default()).unwrap();
        (temp, walker)
    }

    #[test]
    fn test_direct_join() {
        let (temp, walker) = fixture();
        let resolved = resolve_repo_path(&walker, "src/lib.rs").unwrap();
        assert_eq!(resolved.relative, "src/lib.rs");
        assert_eq!(resolved.absolute, temp.path().join("src/lib.rs"));
    }

    #[test]
    fn test_partial_path_segment_scoring() {
        let (_temp, walker) = fixture();
        let resolved = resolve_repo_path(&walker, "storage/page_service.rs").unwrap();
        assert_eq!(resolved.relative, "src/storage/page_service.rs");

        let resolved = resolve_repo_path(&walker, "net/page_service.rs").unwrap();
        assert_eq!(resolved.relative, "src/net/page_service.rs");
    }

    #[test]
    fn test_tie_keeps_first_found() {
        let (_temp, walker) = fixture();
        // Walk order is sorted by name: src/net before src/storage
        let resolved = resolve_repo_path(&walker, "page_service.rs").unwrap();
        assert_eq!(resolved.relative, "src/net/page_service.rs");
    }

    #[test]
    fn test_unknown_file() {
        let (_temp, walker) = fixture();
        assert!(resolve_repo_path(&walker, "src/missing.rs").is_none());
    }
}

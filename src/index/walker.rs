// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Repository traversal for indexing and file lookup.

use std::path::{Component, Path, PathBuf};

use globset::{Glob, GlobSet, GlobSetBuilder};
use walkdir::WalkDir;

use crate::config::IndexConfig;
use crate::error::EngineError;

/// Directory names skipped regardless of configuration.
const ALWAYS_EXCLUDED: &[&str] = &["target", "node_modules", ".git", "dist", "build"];

/// A source file selected for indexing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFile {
    pub path: PathBuf,
    /// `/`-separated path relative to the repository root.
    pub relative_path: String,
}

/// Walks a repository applying include globs, exclude globs and `.gitignore`
/// directory patterns.
pub struct FileWalker {
    root: PathBuf,
    include_globs: GlobSet,
    exclude_globs: GlobSet,
    max_file_size: u64,
}

impl FileWalker {
    pub fn new(root: &Path, config: &IndexConfig) -> Result<Self, EngineError> {
        let mut excludes = config.exclude_patterns.clone();
        if config.respect_gitignore {
            excludes.extend(gitignore_directory_globs(root));
        }

        Ok(Self {
            root: root.to_path_buf(),
            include_globs: build_globset(&config.include_patterns)?,
            exclude_globs: build_globset(&excludes)?,
            max_file_size: config.max_file_size,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Collect matching files in walk order (sorted by name per directory).
    pub fn collect(&self) -> Result<Vec<SourceFile>, EngineError> {
        let mut files = Vec::new();

        let walker = WalkDir::new(&self.root)
            .follow_links(false)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|e| {
                if e.path() == self.root {
                    return true;
                }
                let relative = e.path().strip_prefix(&self.root).unwrap_or(e.path());
                !self.should_exclude(relative)
            });

        for entry in walker {
            let entry = match entry {
                Ok(e) => e,
                Err(e) => {
                    // Unreadable subdirectories should not abort the walk
                    tracing::debug!("skipping unreadable entry: {}", e);
                    continue;
                }
            };

            if !entry.file_type().is_file() {
                continue;
            }

            let relative = entry.path().strip_prefix(&self.root).unwrap_or(entry.path());
            if !self.include_globs.is_match(relative) {
                continue;
            }

            let too_large = entry
                .metadata()
                .map(|m| m.len() > self.max_file_size)
                .unwrap_or(true);
            if too_large {
                tracing::debug!("skipping large file {}", relative.display());
                continue;
            }

            files.push(SourceFile {
                path: entry.path().to_path_buf(),
                relative_path: to_slash(relative),
            });
        }

        Ok(files)
    }

    /// Every file (no include filter) whose name equals `file_name`.
    pub fn find_by_name(&self, file_name: &str) -> Vec<SourceFile> {
        WalkDir::new(&self.root)
            .follow_links(false)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|e| {
                e.path() == self.root
                    || !self.should_exclude(e.path().strip_prefix(&self.root).unwrap_or(e.path()))
            })
            .filter_map(Result::ok)
            .filter(|e| e.file_type().is_file() && e.file_name().to_string_lossy() == file_name)
            .map(|e| {
                let relative = e.path().strip_prefix(&self.root).unwrap_or(e.path());
                SourceFile {
                    relative_path: to_slash(relative),
                    path: e.path().to_path_buf(),
                }
            })
            .collect()
    }

    fn should_exclude(&self, relative_path: &Path) -> bool {
        for component in relative_path.components() {
            if let Component::Normal(name) = component {
                let name = name.to_string_lossy();
                if name.starts_with('.') || ALWAYS_EXCLUDED.contains(&name.as_ref()) {
                    return true;
                }
            }
        }
        self.exclude_globs.is_match(relative_path)
    }
}

/// Convert a relative path to a `/`-separated string.
pub fn to_slash(path: &Path) -> String {
    path.components()
        .filter_map(|c| match c {
            Component::Normal(s) => Some(s.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/")
}

fn build_globset(patterns: &[String]) -> Result<GlobSet, EngineError> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        let glob = Glob::new(pattern).map_err(|e| {
            EngineError::Configuration(format!("invalid glob pattern '{}': {}", pattern, e))
        })?;
        builder.add(glob);
    }
    builder
        .build()
        .map_err(|e| EngineError::Configuration(format!("failed to build globset: {}", e)))
}

/// Translate directory entries (lines ending in `/`) of the repository
/// `.gitignore` into exclude globs. Other gitignore syntax is not interpreted.
pub fn gitignore_directory_globs(root: &Path) -> Vec<String> {
    let Ok(content) = std::fs::read_to_string(root.join(".gitignore")) else {
        return Vec::new();
    };

    let mut globs = Vec::new();
    for line in content.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') || line.starts_with('!') {
            continue;
        }
        let Some(dir) = line.strip_suffix('/') else {
            continue;
        };
        match dir.strip_prefix('/') {
            Some(anchored) if !anchored.is_empty() => {
                globs.push(anchored.to_string());
                globs.push(format!("{}/**", anchored));
            }
            Some(_) => {}
            None if !dir.is_empty() => {
                globs.push(format!("**/{}", dir));
                globs.push(format!("**/{}/**", dir));
            }
            None => {}
        }
    }
    globs
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write(root: &Path, rel: &str, content: &str) {
        let path = root.join(rel);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, content).unwrap();
    }

    #[test]
    fn test_collect_respects_includes_and_defaults() {
        let temp = TempDir::new().unwrap();
        write(temp.path(), "src/main.rs", "fn main() {}");
        write(temp.path(), "README.md", "# readme");
        write(temp.path(), "target/debug/gen.rs", "fn gen() {}");
        write(temp.path(), ".hidden/secret.rs", "fn s() {}");

        let walker = FileWalker::new(temp.path(), &IndexConfig::default()).unwrap();
        let files: Vec<String> = walker.collect().unwrap().into_iter().map(|f| f.relative_path).collect();
        assert_eq!(files, vec!["src/main.rs".to_string()]);
    }

    #[test]
    fn test_gitignore_directory_patterns() {
        let temp = TempDir::new().unwrap();
        write(temp.path(), ".gitignore", "# comment\ngenerated/\n/vendor/\n*.log\n");
        write(temp.path(), "src/lib.rs", "pub fn a() {}");
        write(temp.path(), "src/generated/out.rs", "pub fn g() {}");
        write(temp.path(), "vendor/dep.rs", "pub fn d() {}");

        let globs = gitignore_directory_globs(temp.path());
        assert!(globs.contains(&"**/generated/**".to_string()));
        assert!(globs.contains(&"vendor/**".to_string()));
        assert!(!globs.iter().any(|g| g.contains("log")));

        let walker = FileWalker::new(temp.path(), &IndexConfig::default()).unwrap();
        let files: Vec<String> = walker.collect().unwrap().into_iter().map(|f| f.relative_path).collect();
        assert_eq!(files, vec!["src/lib.rs".to_string()]);
    }

    #[test]
    fn test_gitignore_can_be_disabled() {
        let temp = TempDir::new().unwrap();
        write(temp.path(), ".gitignore", "generated/\n");
        write(temp.path(), "generated/out.rs", "pub fn g() {}");

        let config = IndexConfig {
            respect_gitignore: false,
            ..Default::default()
        };
        let walker = FileWalker::new(temp.path(), &config).unwrap();
        assert_eq!(walker.collect().unwrap().len(), 1);
    }

    #[test]
    fn test_find_by_name() {
        let temp = TempDir::new().unwrap();
        write(temp.path(), "a/util.rs", "");
        write(temp.path(), "b/c/util.rs", "");
        write(temp.path(), "b/other.rs", "");

        let found: Vec<String> = FileWalker::new(temp.path(), &IndexConfig::default())
            .unwrap()
            .find_by_name("util.rs")
            .into_iter()
            .map(|f| f.relative_path)
            .collect();
        assert_eq!(found, vec!["a/util.rs".to_string(), "b/c/util.rs".to_string()]);
    }

    #[test]
    fn test_invalid_glob_is_configuration_error() {
        let temp = TempDir::new().unwrap();
        let config = IndexConfig {
            include_patterns: vec!["src/[".to_string()],
            ..Default::default()
        };
        let result = FileWalker::new(temp.path(), &config);
        assert!(matches!(result, Err(EngineError::Configuration(_))));
    }
}

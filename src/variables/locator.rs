// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Locating a variable's most relevant occurrence in the repository.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use globset::{Glob, GlobMatcher};
use serde::Serialize;
use tracing::{debug, instrument, warn};

#[cfg(feature = "telemetry")]
use crate::telemetry::metrics::GLOBAL_METRICS;

use super::scoring::{best_occurrence, scan_text, Occurrence};
use crate::config::{IndexConfig, VariableWeights};
use crate::error::EngineError;
use crate::index::{EmbeddingIndex, FileWalker, SearchMode};

/// Files pulled from the index per lookup.
pub const SEARCH_TOP_K: usize = 10;

/// Hint segments that name no particular place.
const GENERIC_SEGMENTS: &[&str] = &["crate", "self", "super", "src", "lib", "mod", "main", "index"];

/// What to look for.
#[derive(Debug, Clone, Default)]
pub struct VariableQuery {
    pub name: String,
    /// Module path or target of the log, e.g. `storage::page_service`.
    pub hint_module_path: Option<String>,
    /// The file the log line was resolved to.
    pub active_file: Option<PathBuf>,
    /// 0-based line the log was emitted from.
    pub anchor_line: Option<u32>,
}

impl VariableQuery {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint_module_path = Some(hint.into());
        self
    }

    pub fn with_active_file(mut self, path: impl Into<PathBuf>, anchor_line: Option<u32>) -> Self {
        self.active_file = Some(path.into());
        self.anchor_line = anchor_line;
        self
    }
}

/// The winning occurrence plus every occurrence in its file.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VariableMatch {
    pub best: Occurrence,
    pub all: Vec<Occurrence>,
}

/// Finds where a variable is most plausibly set near a log line.
pub struct VariableLocator {
    index: Option<Arc<EmbeddingIndex>>,
    repo_root: Option<PathBuf>,
    index_config: IndexConfig,
    weights: VariableWeights,
}

impl VariableLocator {
    pub fn new(
        index: Option<Arc<EmbeddingIndex>>,
        repo_root: Option<PathBuf>,
        index_config: IndexConfig,
        weights: VariableWeights,
    ) -> Self {
        Self {
            index,
            repo_root,
            index_config,
            weights,
        }
    }

    /// `Ok(None)` when the name occurs in no candidate file.
    #[instrument(skip(self), fields(name = %query.name))]
    pub async fn locate(&self, query: &VariableQuery) -> Result<Option<VariableMatch>, EngineError> {
        let root = self
            .repo_root
            .as_deref()
            .ok_or_else(|| EngineError::Configuration("no repository root configured".to_string()))?;
        if query.name.trim().is_empty() {
            return Err(EngineError::InvalidInput("variable name is empty".to_string()));
        }
        let start = Instant::now();
        let active = query.active_file.as_deref().map(|p| absolute(root, p));

        let mut found = None;
        for file in self.candidate_files(root, active.as_deref(), query).await? {
            let text = match tokio::fs::read_to_string(&file).await {
                Ok(text) => text,
                Err(e) => {
                    debug!(file = %file.display(), error = %e, "skipping unreadable candidate");
                    continue;
                }
            };
            // Proximity only means something in the file the log came from
            let anchor = match &active {
                Some(active) if active != &file => None,
                _ => query.anchor_line,
            };
            let occurrences = scan_text(&file, &text, query.name.trim(), anchor, &self.weights);
            if let Some(best) = best_occurrence(&occurrences).cloned() {
                debug!(file = %file.display(), occurrences = occurrences.len(), "variable found");
                found = Some(VariableMatch { best, all: occurrences });
                break;
            }
        }

        #[cfg(feature = "telemetry")]
        GLOBAL_METRICS.record_operation("variables.locate", start.elapsed());
        debug!(found = found.is_some(), elapsed_ms = start.elapsed().as_millis() as u64, "locate finished");
        Ok(found)
    }

    /// Active file, then hint matches, then index hits; no duplicates.
    async fn candidate_files(
        &self,
        root: &Path,
        active: Option<&Path>,
        query: &VariableQuery,
    ) -> Result<Vec<PathBuf>, EngineError> {
        let mut seen = HashSet::new();
        let mut files = Vec::new();
        let mut push = |path: PathBuf, files: &mut Vec<PathBuf>| {
            if seen.insert(path.clone()) {
                files.push(path);
            }
        };

        if let Some(active) = active {
            push(active.to_path_buf(), &mut files);
        }

        if let Some(hint) = &query.hint_module_path {
            let matchers = hint_matchers(hint);
            if !matchers.is_empty() {
                let walker = FileWalker::new(root, &self.index_config)?;
                let repo_files = walker.collect()?;
                for matcher in &matchers {
                    for file in repo_files.iter().filter(|f| matcher.is_match(&f.relative_path)) {
                        push(file.path.clone(), &mut files);
                    }
                }
            }
        }

        if let Some(index) = self.index.as_ref().filter(|i| i.is_ready()) {
            match index.search(query.name.trim(), SEARCH_TOP_K, SearchMode::Semantic).await {
                Ok(hits) => {
                    for hit in hits {
                        push(root.join(&hit.file), &mut files);
                    }
                }
                Err(e) => warn!(error = %e, "index search for variable failed"),
            }
        }

        debug!(candidates = files.len(), "candidate files");
        Ok(files)
    }
}

fn absolute(root: &Path, path: &Path) -> PathBuf {
    if path.is_relative() {
        root.join(path)
    } else {
        path.to_path_buf()
    }
}

/// Split a module path (`a::b`, `a.b`, `a/b`) into segments.
pub fn hint_segments(hint: &str) -> Vec<&str> {
    hint.split(|c: char| c == ':' || c == '.' || c == '/' || c == '\\')
        .map(str::trim)
        .filter(|s| !s.is_empty() && !GENERIC_SEGMENTS.contains(s))
        .collect()
}

/// One literal `**/*segment*` glob per segment.
fn hint_matchers(hint: &str) -> Vec<GlobMatcher> {
    hint_segments(hint)
        .into_iter()
        .filter_map(|segment| {
            let pattern = format!("**/*{}*", globset::escape(segment));
            match Glob::new(&pattern) {
                Ok(glob) => Some(glob.compile_matcher()),
                Err(e) => {
                    warn!(segment, error = %e, "ignoring unusable hint segment");
                    None
                }
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::test_support::HashEmbedder;
    use tempfile::TempDir;

    fn write(root: &Path, rel: &str, content: &str) {
        let path = root.join(rel);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, content).unwrap();
    }

    fn repo() -> TempDir {
        let temp = TempDir::new().unwrap();
        write(
            temp.path(),
            "src/storage/page_service.rs",
            "fn handle(req: Request) {\n    let blkno = req.blkno;\n    read(blkno);\n    error!(\"canceled\");\n}\n",
        );
        write(temp.path(), "src/network/dispatch.rs", "fn dispatch() {\n    let blkno = 0;\n}\n");
        write(temp.path(), "src/util.rs", "fn pad(width: usize) {}\n");
        temp
    }

    fn locator(root: Option<&Path>, index: Option<Arc<EmbeddingIndex>>) -> VariableLocator {
        VariableLocator::new(
            index,
            root.map(Path::to_path_buf),
            IndexConfig::default(),
            VariableWeights::default(),
        )
    }

    #[test]
    fn test_hint_segments() {
        assert_eq!(hint_segments("storage::page_service"), vec!["storage", "page_service"]);
        assert_eq!(hint_segments("crate::net"), vec!["net"]);
        assert_eq!(hint_segments("src/app.worker"), vec!["app", "worker"]);
        assert!(hint_segments("").is_empty());
    }

    #[tokio::test]
    async fn test_no_repo_root() {
        let result = locator(None, None).locate(&VariableQuery::new("blkno")).await;
        assert!(matches!(result, Err(EngineError::Configuration(_))));
    }

    #[tokio::test]
    async fn test_active_file_first_with_proximity() {
        let temp = repo();
        let query = VariableQuery::new("blkno")
            .with_hint("network::dispatch")
            .with_active_file("src/storage/page_service.rs", Some(3));

        let found = locator(Some(temp.path()), None).locate(&query).await.unwrap().unwrap();
        assert!(found.best.file.ends_with("src/storage/page_service.rs"));
        assert_eq!(found.best.line, 1);
        // let blkno (decl + assign + proximity 46), req.blkno (46), read(blkno) (arg + 48)
        assert_eq!(found.best.score, 40 + 30 + 46);
        assert_eq!(found.all.len(), 3);
        assert!(found.all.iter().all(|o| o.file == found.best.file));
    }

    #[tokio::test]
    async fn test_hint_selects_file() {
        let temp = repo();
        let query = VariableQuery::new("blkno").with_hint("network::dispatch");
        let found = locator(Some(temp.path()), None).locate(&query).await.unwrap().unwrap();
        assert!(found.best.file.ends_with("src/network/dispatch.rs"));
        assert_eq!(found.all.len(), 1);
    }

    #[tokio::test]
    async fn test_not_found_is_none() {
        let temp = repo();
        let query = VariableQuery::new("missing_var").with_hint("storage");
        assert!(locator(Some(temp.path()), None).locate(&query).await.unwrap().is_none());

        // Substrings do not count
        let query = VariableQuery::new("blk").with_hint("storage");
        assert!(locator(Some(temp.path()), None).locate(&query).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_index_supplies_candidates() {
        let temp = repo();
        let index = Arc::new(EmbeddingIndex::new(
            temp.path(),
            IndexConfig::default(),
            Arc::new(HashEmbedder::new(64)),
        ));
        index.index().await.unwrap();

        let found = locator(Some(temp.path()), Some(index))
            .locate(&VariableQuery::new("width"))
            .await
            .unwrap()
            .unwrap();
        assert!(found.best.file.ends_with("src/util.rs"));
    }

    #[tokio::test]
    async fn test_unbuilt_index_is_skipped() {
        let temp = repo();
        let index = Arc::new(EmbeddingIndex::new(
            temp.path(),
            IndexConfig::default(),
            Arc::new(HashEmbedder::new(64)),
        ));
        let result = locator(Some(temp.path()), Some(index))
            .locate(&VariableQuery::new("width"))
            .await
            .unwrap();
        assert!(result.is_none());
    }
}

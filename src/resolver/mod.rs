// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Map a log message to the source line most likely to have emitted it.

mod clean;
mod context;
mod explicit;
mod paths;

pub use clean::clean_message;
pub use context::{code_context, read_line};
pub use explicit::{explicit_locations, ExplicitLocation};
pub use paths::{resolve_repo_path, RepoPath};

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use serde::Serialize;
use tracing::{debug, instrument};

use crate::config::IndexConfig;
use crate::error::EngineError;
use crate::index::{EmbeddingIndex, FileWalker, SearchHit, SearchMode};

#[cfg(feature = "telemetry")]
use crate::telemetry::metrics::GLOBAL_METRICS;

/// Results considered when listing candidate locations.
pub const DEFAULT_TOP_K: usize = 10;

/// A resolved source location.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResolvedLocation {
    pub path: PathBuf,
    pub relative_path: String,
    /// 0-based line number.
    pub line: u32,
    pub similarity: f64,
    /// Current text of the line on disk.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub preview: Option<String>,
}

/// Outcome of [`LocationResolver::resolve`].
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Resolution {
    Best(Option<ResolvedLocation>),
    All(Vec<ResolvedLocation>),
}

pub struct LocationResolver {
    index: Arc<EmbeddingIndex>,
    repo_root: Option<PathBuf>,
    index_config: IndexConfig,
    top_k: usize,
}

impl LocationResolver {
    pub fn new(index: Arc<EmbeddingIndex>, repo_root: Option<PathBuf>, index_config: IndexConfig) -> Self {
        Self {
            index,
            repo_root,
            index_config,
            top_k: DEFAULT_TOP_K,
        }
    }

    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k.max(1);
        self
    }

    fn walker(&self) -> Result<FileWalker, EngineError> {
        let root = self
            .repo_root
            .as_ref()
            .ok_or_else(|| EngineError::Configuration("no repository root configured".to_string()))?;
        FileWalker::new(root, &self.index_config)
    }

    /// Resolve a message to its best location, or to every ranked location
    /// when `return_all` is set.
    #[instrument(skip(self), level = "debug")]
    pub async fn resolve(&self, message: &str, return_all: bool) -> Result<Resolution, EngineError> {
        if return_all {
            self.resolve_all(message).await.map(Resolution::All)
        } else {
            self.resolve_best(message).await.map(Resolution::Best)
        }
    }

    async fn search(&self, message: &str, top_k: usize) -> Result<Vec<SearchHit>, EngineError> {
        let (mode, text) = SearchMode::parse_query(message.trim());
        let cleaned = clean_message(text);
        debug!(?mode, query = %cleaned, "resolving log message");
        if cleaned.is_empty() {
            return Ok(Vec::new());
        }
        self.index.search(&cleaned, top_k, mode).await
    }

    /// Top-1 hit with its path mapped onto a real repository file.
    ///
    /// A message that names its own location (`panicked at src/x.rs:12:5`,
    /// a stack frame) resolves to that location without searching, provided
    /// the file is in the repository and has that line.
    pub async fn resolve_best(&self, message: &str) -> Result<Option<ResolvedLocation>, EngineError> {
        let start = Instant::now();
        let walker = self.walker()?;

        if let Some(named) = self.named_location(&walker, message).await {
            debug!(file = %named.relative_path, line = named.line, "log names its location");
            return Ok(Some(named));
        }

        let Some(hit) = self.search(message, 1).await?.into_iter().next() else {
            return Ok(None);
        };

        let (path, relative_path) = match resolve_repo_path(&walker, &hit.file) {
            Some(found) => (found.absolute, found.relative),
            None => (walker.root().join(&hit.file), hit.file.clone()),
        };

        #[cfg(feature = "telemetry")]
        GLOBAL_METRICS.record_operation("resolver.resolve_best", start.elapsed());
        debug!(file = %relative_path, line = hit.line, elapsed_ms = start.elapsed().as_millis() as u64, "resolved");

        Ok(Some(ResolvedLocation {
            path,
            relative_path,
            line: hit.line,
            similarity: hit.similarity,
            preview: None,
        }))
    }

    /// First location mentioned in a semantic-mode message that exists in
    /// the repository.
    async fn named_location(&self, walker: &FileWalker, message: &str) -> Option<ResolvedLocation> {
        let (mode, text) = SearchMode::parse_query(message.trim());
        if mode == SearchMode::Exact {
            return None;
        }
        for named in explicit_locations(text) {
            let Some(found) = resolve_repo_path(walker, &named.path) else {
                continue;
            };
            if let Some(preview) = read_line(&found.absolute, named.line).await {
                return Some(ResolvedLocation {
                    path: found.absolute,
                    relative_path: found.relative,
                    line: named.line,
                    similarity: 1.0,
                    preview: Some(preview),
                });
            }
        }
        None
    }

    /// Every hit, ranked, each with a live preview of its line.
    pub async fn resolve_all(&self, message: &str) -> Result<Vec<ResolvedLocation>, EngineError> {
        let walker = self.walker()?;
        let hits = self.search(message, self.top_k).await?;

        let mut locations = Vec::with_capacity(hits.len());
        for hit in hits {
            let path = walker.root().join(&hit.file);
            let preview = read_line(&path, hit.line).await;
            locations.push(ResolvedLocation {
                path,
                relative_path: hit.file,
                line: hit.line,
                similarity: hit.similarity,
                preview,
            });
        }
        Ok(locations)
    }
}

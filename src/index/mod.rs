// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Embedding index over every non-blank source line of a repository.
//!
//! ```text
//!   FileWalker ──> chunk_lines ──> EmbeddingProvider ──> IndexSnapshot
//!                                                             │
//!              search(query, top_k, mode) <───────────────────┘
//! ```
//!
//! The build is single-flight: concurrent [`EmbeddingIndex::index`] calls
//! wait on one build and all observe its outcome. A failed build stays
//! failed until `index` is called again.
//!
//! # Telemetry
//!
//! - `index.build` - full build duration
//! - `index.search.semantic` / `index.search.exact` - query latency

mod chunker;
mod metric;
mod search;
mod types;
mod walker;

pub use chunker::chunk_lines;
pub use metric::{cosine_similarity, DistanceMetric};
pub use search::{best_line, exact_match, finalize_hits, token_overlap, tokenize, EXACT_THRESHOLD};
pub use types::{
    CodeChunk, ContextLine, IndexProgress, IndexSnapshot, IndexState, IndexStats, ProgressCallback,
    SearchHit, SearchMode,
};
pub use walker::{gitignore_directory_globs, to_slash, FileWalker, SourceFile};

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Instant;

use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, instrument, warn};

use crate::config::IndexConfig;
use crate::embeddings::EmbeddingProvider;
use crate::error::EngineError;

#[cfg(feature = "telemetry")]
use crate::telemetry::metrics::GLOBAL_METRICS;

/// Line-level embedding index for one repository.
pub struct EmbeddingIndex {
    root: PathBuf,
    config: IndexConfig,
    provider: Arc<dyn EmbeddingProvider>,
    state: RwLock<IndexState>,
    build_lock: Mutex<()>,
    /// Incremented each time a build finishes, successfully or not.
    completed_builds: AtomicU64,
    progress: Option<ProgressCallback>,
}

impl EmbeddingIndex {
    pub fn new(root: impl Into<PathBuf>, config: IndexConfig, provider: Arc<dyn EmbeddingProvider>) -> Self {
        Self {
            root: root.into(),
            config,
            provider,
            state: RwLock::new(IndexState::Empty),
            build_lock: Mutex::new(()),
            completed_builds: AtomicU64::new(0),
            progress: None,
        }
    }

    pub fn with_progress(mut self, callback: ProgressCallback) -> Self {
        self.progress = Some(callback);
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn metric(&self) -> DistanceMetric {
        self.config.metric
    }

    pub fn state(&self) -> IndexState {
        self.state.read().map(|s| s.clone()).unwrap_or_default()
    }

    pub fn is_ready(&self) -> bool {
        matches!(self.state(), IndexState::Ready(_))
    }

    /// Stats of the current build, if ready.
    pub fn stats(&self) -> Option<IndexStats> {
        match self.state() {
            IndexState::Ready(snapshot) => Some(snapshot.stats.clone()),
            _ => None,
        }
    }

    /// Build the index if it is not already built.
    ///
    /// Callers arriving while a build is running wait for it and receive its
    /// outcome instead of starting another.
    #[instrument(skip(self), fields(root = %self.root.display()))]
    pub async fn index(&self) -> Result<IndexStats, EngineError> {
        let observed = self.completed_builds.load(Ordering::SeqCst);
        let _guard = self.build_lock.lock().await;

        let current = self.state();
        if self.completed_builds.load(Ordering::SeqCst) != observed {
            debug!("joined in-flight index build");
            return match current {
                IndexState::Ready(snapshot) => Ok(snapshot.stats.clone()),
                IndexState::Failed(message) => {
                    Err(EngineError::NotReady(format!("index build failed: {}", message)))
                }
                other => Err(EngineError::NotReady(format!("index is {}", other.label()))),
            };
        }
        if let IndexState::Ready(snapshot) = current {
            return Ok(snapshot.stats.clone());
        }

        self.run_build().await
    }

    /// Discard the current index and build again.
    pub async fn reindex(&self) -> Result<IndexStats, EngineError> {
        let _guard = self.build_lock.lock().await;
        self.run_build().await
    }

    /// Build in a detached task. Failure is logged and leaves the index in
    /// the failed state; callers keep working without it.
    pub fn spawn_indexing(self: &Arc<Self>) -> JoinHandle<()> {
        let index = Arc::clone(self);
        tokio::spawn(async move {
            match index.index().await {
                Ok(stats) => info!(chunks = stats.chunks, "background indexing complete"),
                Err(e) => warn!("background indexing unavailable: {}", e),
            }
        })
    }

    /// Must be called with `build_lock` held.
    async fn run_build(&self) -> Result<IndexStats, EngineError> {
        self.set_state(IndexState::Building);

        let result = self.build().await;
        match &result {
            Ok(snapshot) => {
                info!(
                    files = snapshot.stats.files_indexed,
                    chunks = snapshot.stats.chunks,
                    ms = snapshot.stats.duration_ms,
                    "index built"
                );
                self.set_state(IndexState::Ready(Arc::clone(snapshot)));
            }
            Err(e) => {
                error!("index build failed: {}", e);
                self.set_state(IndexState::Failed(e.to_string()));
            }
        }
        self.completed_builds.fetch_add(1, Ordering::SeqCst);

        result.map(|snapshot| snapshot.stats.clone())
    }

    fn set_state(&self, state: IndexState) {
        if let Ok(mut guard) = self.state.write() {
            *guard = state;
        }
    }

    fn report(&self, progress: IndexProgress) {
        if let Some(ref callback) = self.progress {
            callback(progress);
        }
    }

    async fn build(&self) -> Result<Arc<IndexSnapshot>, EngineError> {
        let start = Instant::now();

        let walker = FileWalker::new(&self.root, &self.config)?;
        let files = walker.collect()?;
        let total_files = files.len() as u32;

        self.report(IndexProgress {
            total_files,
            ..Default::default()
        });

        let mut chunks = Vec::new();
        let mut files_indexed = 0u32;
        let mut files_skipped = 0u32;

        for (i, file) in files.iter().enumerate() {
            let content = match tokio::fs::read_to_string(&file.path).await {
                Ok(c) => c,
                Err(e) => {
                    debug!("skipping {}: {}", file.relative_path, e);
                    files_skipped += 1;
                    continue;
                }
            };

            chunks.extend(chunk_lines(&file.relative_path, &content, self.config.context_radius));
            files_indexed += 1;

            self.report(IndexProgress {
                current_file: Some(file.relative_path.clone()),
                files_processed: i as u32 + 1,
                total_files,
                chunks_created: chunks.len() as u32,
                is_complete: false,
            });
        }

        let dimensions = self.embed_chunks(&mut chunks).await?;

        let stats = IndexStats {
            files_indexed,
            files_skipped,
            chunks: chunks.len() as u32,
            dimensions,
            duration_ms: start.elapsed().as_millis() as u64,
            provider: self.provider.name().to_string(),
            model: self.provider.model().to_string(),
        };

        self.report(IndexProgress {
            current_file: None,
            files_processed: total_files,
            total_files,
            chunks_created: stats.chunks,
            is_complete: true,
        });

        #[cfg(feature = "telemetry")]
        GLOBAL_METRICS.record_operation("index.build", start.elapsed());

        Ok(Arc::new(IndexSnapshot { chunks, stats }))
    }

    /// Embed all chunks in batches; every vector must share one length.
    async fn embed_chunks(&self, chunks: &mut [CodeChunk]) -> Result<usize, EngineError> {
        let mut dimensions: Option<usize> = None;
        let batch_size = self.config.batch_size.max(1);

        for batch in chunks.chunks_mut(batch_size) {
            let texts: Vec<String> = batch.iter().map(|c| c.content.clone()).collect();
            let embeddings = self.provider.embed(&texts).await?;

            if embeddings.len() != batch.len() {
                return Err(EngineError::Backend(crate::error::ProviderError::ParseError(format!(
                    "expected {} embeddings, got {}",
                    batch.len(),
                    embeddings.len()
                ))));
            }

            for (chunk, embedding) in batch.iter_mut().zip(embeddings) {
                let expected = *dimensions.get_or_insert(embedding.len());
                if embedding.len() != expected {
                    return Err(EngineError::DimensionMismatch {
                        expected,
                        actual: embedding.len(),
                    });
                }
                chunk.embedding = embedding;
            }
        }

        Ok(dimensions.unwrap_or(0))
    }

    fn snapshot(&self) -> Result<Arc<IndexSnapshot>, EngineError> {
        match self.state() {
            IndexState::Ready(snapshot) => Ok(snapshot),
            other => Err(EngineError::NotReady(format!("index is {}", other.label()))),
        }
    }

    /// Search with an explicit mode.
    #[instrument(skip(self), level = "debug")]
    pub async fn search(&self, query: &str, top_k: usize, mode: SearchMode) -> Result<Vec<SearchHit>, EngineError> {
        let snapshot = self.snapshot()?;
        if query.trim().is_empty() {
            return Ok(Vec::new());
        }
        let start = Instant::now();
        let query_words = tokenize(query);

        let hits = match mode {
            SearchMode::Exact => {
                let hits: Vec<SearchHit> = snapshot
                    .chunks
                    .iter()
                    .filter_map(|c| exact_match(c, query, &query_words))
                    .filter(|h| h.similarity >= EXACT_THRESHOLD)
                    .collect();

                #[cfg(feature = "telemetry")]
                GLOBAL_METRICS.record_operation("index.search.exact", start.elapsed());
                hits
            }
            SearchMode::Semantic => {
                let query_embedding = self.provider.embed_one(query).await?;
                let metric = self.config.metric;

                let mut hits = Vec::with_capacity(snapshot.chunks.len());
                for chunk in &snapshot.chunks {
                    let distance = metric.distance(&query_embedding, &chunk.embedding)?;
                    if let Some((line, _)) = best_line(chunk, &query_words) {
                        hits.push(SearchHit {
                            file: chunk.file.clone(),
                            line: line.line_number,
                            similarity: metric.similarity(distance),
                            text: line.content.clone(),
                        });
                    }
                }

                #[cfg(feature = "telemetry")]
                GLOBAL_METRICS.record_operation("index.search.semantic", start.elapsed());
                hits
            }
        };

        let hits = finalize_hits(hits, top_k);
        debug!(results = hits.len(), elapsed_ms = start.elapsed().as_millis() as u64, "search done");
        Ok(hits)
    }

    /// Search with the mode taken from an optional `exact:` prefix.
    pub async fn search_query(&self, query: &str, top_k: usize) -> Result<Vec<SearchHit>, EngineError> {
        let (mode, text) = SearchMode::parse_query(query);
        self.search(text, top_k, mode).await
    }
}

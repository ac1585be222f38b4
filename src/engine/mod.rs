// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! The correlation engine: one explicitly constructed context owning the
//! embedding index and every stage that reads from it.
//!
//! ```text
//! LogEntry ─▶ LocationResolver ─▶ CallerAnalyzer ─▶ CallerRanker ─▶ CallerAnalysis
//!                    │
//!                    └─ VariableLocator (driven per variable)
//! ```
//!
//! # Example
//!
//! ```rust,ignore
//! use traceback::config::{load_config, CliOptions};
//! use traceback::engine::Engine;
//! use traceback::logs::LogEntry;
//!
//! let config = load_config(&workspace, CliOptions::default())?;
//! let engine = Engine::from_config(config).await?;
//! engine.build_index().await?;
//!
//! let mut entry = LogEntry::from_raw("[ERROR] Operation canceled (os error 125)");
//! let analysis = engine.analyze_entry(&mut entry, &session_lines).await?;
//! ```

mod notice;

pub use notice::{NoticeLevel, UserNotice};

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::task::JoinHandle;
use tracing::{debug, error, info, instrument, warn};

use crate::config::TracebackConfig;
use crate::embeddings::{create_embedding_provider, EmbeddingProvider};
use crate::error::EngineError;
use crate::index::{ContextLine, EmbeddingIndex, IndexStats, ProgressCallback};
use crate::logs::LogEntry;
use crate::lsp::LspBackend;
use crate::ranking::{AnthropicScorer, CallerAnalysis, CallerCandidate, CallerRanker, CallerScorer};
use crate::resolver::{code_context, LocationResolver, Resolution, ResolvedLocation};
use crate::state::{default_state_path, StateStore, ANTHROPIC_API_KEY_ENV, ANTHROPIC_API_KEY_SECRET};
use crate::symbols::{CallerAnalyzer, FsTextBackend, SymbolBackend, TextBackend};
use crate::variables::{VariableLocator, VariableMatch, VariableQuery};

/// Everything [`Engine::new`] wires together.
pub struct EngineOptions {
    pub config: TracebackConfig,
    pub embedding_provider: Arc<dyn EmbeddingProvider>,
    pub symbol_backend: Arc<dyn SymbolBackend>,
    pub text_backend: Arc<dyn TextBackend>,
    /// Without a scorer, caller ranking reports a configuration error.
    pub scorer: Option<Arc<dyn CallerScorer>>,
    pub state: Arc<StateStore>,
    pub progress: Option<ProgressCallback>,
}

/// One resolved log line with its ranked callers.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct EntryAnalysis {
    pub location: ResolvedLocation,
    pub anchor: String,
    /// Lines around the anchor.
    pub context: Vec<ContextLine>,
    pub analysis: CallerAnalysis,
}

pub struct Engine {
    config: TracebackConfig,
    repo_root: PathBuf,
    index: Arc<EmbeddingIndex>,
    resolver: LocationResolver,
    analyzer: CallerAnalyzer,
    ranker: Option<CallerRanker>,
    locator: VariableLocator,
    state: Arc<StateStore>,
    lsp: Option<Arc<LspBackend>>,
}

impl Engine {
    /// Wire the pipeline. Fails when no repository root is configured.
    pub fn new(options: EngineOptions) -> Result<Self, EngineError> {
        let EngineOptions {
            config,
            embedding_provider,
            symbol_backend,
            text_backend,
            scorer,
            state,
            progress,
        } = options;
        let repo_root = config.require_repo_root()?.clone();

        let mut index = EmbeddingIndex::new(&repo_root, config.index.clone(), embedding_provider);
        if let Some(callback) = progress {
            index = index.with_progress(callback);
        }
        let index = Arc::new(index);

        let resolver = LocationResolver::new(Arc::clone(&index), Some(repo_root.clone()), config.index.clone());
        let analyzer = CallerAnalyzer::new(symbol_backend, text_backend);
        let ranker = scorer.map(|s| CallerRanker::new(s, Arc::clone(&state), config.llm.history_window));
        let locator = VariableLocator::new(
            Some(Arc::clone(&index)),
            Some(repo_root.clone()),
            config.index.clone(),
            config.variables,
        );

        Ok(Self {
            config,
            repo_root,
            index,
            resolver,
            analyzer,
            ranker,
            locator,
            state,
            lsp: None,
        })
    }

    /// Production wiring: configured embeddings, language servers, the
    /// on-disk state store and Claude when an API key is available.
    pub async fn from_config(config: TracebackConfig) -> Result<Self, EngineError> {
        Self::from_config_with_progress(config, None).await
    }

    pub async fn from_config_with_progress(
        config: TracebackConfig,
        progress: Option<ProgressCallback>,
    ) -> Result<Self, EngineError> {
        let repo_root = config.require_repo_root()?.clone();
        let embedding_provider = create_embedding_provider(&config.embedding).await?;

        let state_path = config
            .state_path
            .clone()
            .unwrap_or_else(|| default_state_path(&repo_root));
        let state = Arc::new(StateStore::open_at(&state_path)?);
        let scorer = scorer_from_store(&state, &config)?;

        let lsp = Arc::new(LspBackend::with_defaults(&repo_root));
        let mut engine = Self::new(EngineOptions {
            config,
            embedding_provider,
            symbol_backend: lsp.clone(),
            text_backend: Arc::new(FsTextBackend),
            scorer,
            state,
            progress,
        })?;
        engine.lsp = Some(lsp);
        Ok(engine)
    }

    pub fn config(&self) -> &TracebackConfig {
        &self.config
    }

    pub fn repo_root(&self) -> &Path {
        &self.repo_root
    }

    pub fn index(&self) -> &Arc<EmbeddingIndex> {
        &self.index
    }

    pub fn state(&self) -> &Arc<StateStore> {
        &self.state
    }

    pub fn resolver(&self) -> &LocationResolver {
        &self.resolver
    }

    pub fn analyzer(&self) -> &CallerAnalyzer {
        &self.analyzer
    }

    pub fn locator(&self) -> &VariableLocator {
        &self.locator
    }

    pub fn has_ranker(&self) -> bool {
        self.ranker.is_some()
    }

    pub async fn build_index(&self) -> Result<IndexStats, EngineError> {
        self.index.index().await
    }

    /// Discard any built index and walk the repository again.
    pub async fn rebuild_index(&self) -> Result<IndexStats, EngineError> {
        self.index.reindex().await
    }

    /// Build in the background; the rest of the engine works meanwhile.
    pub fn spawn_indexing(&self) -> JoinHandle<()> {
        self.index.spawn_indexing()
    }

    pub async fn locate(&self, message: &str, return_all: bool) -> Result<Resolution, EngineError> {
        self.resolver.resolve(message, return_all).await
    }

    pub async fn find_callers(&self, path: &Path, line: u32) -> Result<Vec<CallerCandidate>, EngineError> {
        self.analyzer.find_potential_callers(&self.repo_path(path), line).await
    }

    /// Probable call stack ending at `line`, outermost frame first.
    pub async fn stack_trace(
        &self,
        path: &Path,
        line: u32,
        max_depth: usize,
    ) -> Result<Vec<CallerCandidate>, EngineError> {
        self.analyzer.stack_trace(&self.repo_path(path), line, max_depth).await
    }

    fn repo_path(&self, path: &Path) -> PathBuf {
        if path.is_relative() {
            self.repo_root.join(path)
        } else {
            path.to_path_buf()
        }
    }

    /// Resolve `entry`, discover its callers and rank them. The analysis is
    /// attached to the entry. `Ok(None)` when the line cannot be located.
    #[instrument(skip_all, fields(severity = %entry.severity))]
    pub async fn analyze_entry(
        &self,
        entry: &mut LogEntry,
        all_log_lines: &[String],
    ) -> Result<Option<EntryAnalysis>, EngineError> {
        let ranker = self.ranker.as_ref().ok_or_else(|| {
            EngineError::Configuration(format!(
                "no LLM API key; set {} or store the '{}' secret",
                ANTHROPIC_API_KEY_ENV, ANTHROPIC_API_KEY_SECRET
            ))
        })?;

        let Some(location) = self.resolver.resolve_best(entry.display_text()).await? else {
            debug!("log line did not resolve to a source location");
            return Ok(None);
        };
        let radius = self.config.index.context_radius as u32;
        let context = code_context(&location.path, location.line, radius)
            .await
            .unwrap_or_else(|e| {
                warn!(file = %location.relative_path, error = %e, "cannot read anchor context");
                Vec::new()
            });
        let anchor = context
            .iter()
            .find(|l| l.line_number == location.line)
            .map(|l| l.content.clone())
            .unwrap_or_default();

        let candidates = self
            .analyzer
            .find_potential_callers(&location.path, location.line)
            .await?;
        let analysis = ranker
            .analyze_callers(entry.display_text(), anchor.trim(), all_log_lines, candidates)
            .await?;

        if !entry.attach_caller_analysis(analysis.clone()) {
            debug!("entry already carries a caller analysis; keeping it");
        }
        info!(
            file = %location.relative_path,
            line = location.line,
            callers = analysis.ranked_callers.len(),
            "analyzed log entry"
        );
        Ok(Some(EntryAnalysis {
            location,
            anchor,
            context,
            analysis,
        }))
    }

    pub async fn locate_variable(&self, query: &VariableQuery) -> Result<Option<VariableMatch>, EngineError> {
        self.locator.locate(query).await
    }

    /// Log `err` and turn it into a notice.
    pub fn notice(err: &EngineError) -> UserNotice {
        let notice = UserNotice::from(err);
        if notice.is_error() {
            error!(error = %err, "operation failed");
        } else {
            info!(error = %err, "operation deferred");
        }
        notice
    }

    /// Stop any language servers this engine started.
    pub async fn shutdown(&self) {
        if let Some(lsp) = &self.lsp {
            lsp.shutdown().await;
        }
    }
}

/// Claude scorer when a key is available, `None` otherwise.
pub fn scorer_from_store(
    state: &StateStore,
    config: &TracebackConfig,
) -> Result<Option<Arc<dyn CallerScorer>>, EngineError> {
    match state.anthropic_api_key()? {
        Some(key) => {
            let scorer: Arc<dyn CallerScorer> = Arc::new(AnthropicScorer::new(key, &config.llm)?);
            Ok(Some(scorer))
        }
        None => {
            warn!("no LLM API key configured; caller ranking is disabled");
            Ok(None)
        }
    }
}

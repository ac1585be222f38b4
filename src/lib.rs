// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Traceback - correlate runtime logs with the code that emitted them.
//!
//! Given a log line, traceback finds the source line most likely to have
//! produced it, lists the call sites that could have led there, and asks an
//! LLM to rank them. Variables mentioned in the log can be traced to where
//! they were most plausibly set.
//!
//! # Architecture
//!
//! - [`config`] - Configuration loading and merging
//! - [`error`] - Error types and result aliases
//! - [`telemetry`] - Logging subscriber and operation metrics
//! - [`logs`] - Log entries, spans and fingerprints
//! - [`embeddings`] - Embedding backends (Ollama, OpenAI)
//! - [`index`] - Line-level embedding index with semantic and exact search
//! - [`resolver`] - Log message to source location
//! - [`lsp`] - Language Server Protocol client
//! - [`symbols`] - Enclosing functions and potential callers
//! - [`ranking`] - LLM ranking of caller candidates, cached by fingerprint
//! - [`variables`] - Variable occurrence lookup
//! - [`state`] - Persistent selections, secrets and cached analyses
//! - [`engine`] - The assembled pipeline
//!
//! # Example
//!
//! ```rust,ignore
//! use traceback::config::{load_config, CliOptions};
//! use traceback::engine::Engine;
//!
//! let config = load_config(&workspace, CliOptions::default())?;
//! let engine = Engine::from_config(config).await?;
//! engine.build_index().await?;
//! let location = engine.resolver().resolve_best("pool exhausted").await?;
//! ```

pub mod config;
pub mod embeddings;
pub mod engine;
pub mod error;
pub mod index;
pub mod logs;
pub mod lsp;
pub mod ranking;
pub mod resolver;
pub mod state;
pub mod symbols;
pub mod telemetry;
pub mod variables;

// Re-export commonly used types at crate root
pub use config::{load_config, CliOptions, TracebackConfig};
pub use engine::{Engine, EngineOptions, EntryAnalysis, NoticeLevel, UserNotice};
pub use error::{ConfigError, EngineError, ProviderError, Result};
pub use index::{DistanceMetric, EmbeddingIndex, SearchHit, SearchMode};
pub use logs::{LogEntry, Severity, Span};
pub use ranking::{CallerAnalysis, CallerCandidate, RankedCaller};
pub use resolver::{Resolution, ResolvedLocation};
pub use state::{StateKey, StateStore};
pub use variables::{VariableMatch, VariableQuery};

/// Traceback version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

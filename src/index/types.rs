// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Type definitions for the embedding index.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

/// One line of a chunk's context window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContextLine {
    /// 0-based line number in the file.
    pub line_number: u32,
    pub content: String,
}

/// A line-anchored slice of a source file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CodeChunk {
    /// Path relative to the repository root, `/`-separated.
    pub file: String,
    /// 0-based anchor line.
    pub line: u32,
    /// Anchor line plus its surrounding context, newline-joined.
    pub content: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub embedding: Vec<f32>,
    pub context_lines: Vec<ContextLine>,
}

impl CodeChunk {
    /// Text of the anchor line itself.
    pub fn anchor_text(&self) -> &str {
        self.context_lines
            .iter()
            .find(|l| l.line_number == self.line)
            .map(|l| l.content.as_str())
            .unwrap_or("")
    }
}

/// How a query is matched against the index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchMode {
    #[default]
    Semantic,
    Exact,
}

impl SearchMode {
    /// Prefix that selects exact matching in free-form queries.
    pub const EXACT_PREFIX: &'static str = "exact:";

    /// Split a legacy query string into its mode and the query text.
    pub fn parse_query(query: &str) -> (SearchMode, &str) {
        match query.strip_prefix(Self::EXACT_PREFIX) {
            Some(rest) => (SearchMode::Exact, rest.trim()),
            None => (SearchMode::Semantic, query),
        }
    }
}

/// A search result pointing at one source line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    pub file: String,
    /// 0-based line number.
    pub line: u32,
    /// Higher is better; 1.0 is a verbatim exact match.
    pub similarity: f64,
    /// Text of the matched line.
    pub text: String,
}

/// Summary of a completed build.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IndexStats {
    pub files_indexed: u32,
    pub files_skipped: u32,
    pub chunks: u32,
    pub dimensions: usize,
    pub duration_ms: u64,
    pub provider: String,
    pub model: String,
}

/// Progress notification during a build.
#[derive(Debug, Clone, Default)]
pub struct IndexProgress {
    pub current_file: Option<String>,
    pub files_processed: u32,
    pub total_files: u32,
    pub chunks_created: u32,
    pub is_complete: bool,
}

/// Progress callback for indexing operations.
pub type ProgressCallback = Arc<dyn Fn(IndexProgress) + Send + Sync>;

/// Built chunks together with the stats of the build that produced them.
#[derive(Debug)]
pub struct IndexSnapshot {
    pub chunks: Vec<CodeChunk>,
    pub stats: IndexStats,
}

/// Lifecycle of the index.
#[derive(Debug, Clone, Default)]
pub enum IndexState {
    #[default]
    Empty,
    Building,
    Ready(Arc<IndexSnapshot>),
    Failed(String),
}

impl IndexState {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Empty => "empty",
            Self::Building => "building",
            Self::Ready(_) => "ready",
            Self::Failed(_) => "failed",
        }
    }
}

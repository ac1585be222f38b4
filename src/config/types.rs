// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Configuration type definitions.
//!
//! `WorkspaceConfig` is the partial shape read from disk (every field
//! optional); `TracebackConfig` is the resolved shape the engine consumes.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::index::DistanceMetric;

/// Configuration as it appears in a config file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkspaceConfig {
    /// Repository root that log paths are resolved against
    #[serde(skip_serializing_if = "Option::is_none")]
    pub repo_root: Option<PathBuf>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub index: Option<IndexConfigPartial>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub embedding: Option<EmbeddingConfigPartial>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub llm: Option<LlmConfigPartial>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub ranking: Option<RankingConfigPartial>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub variables: Option<VariableWeightsPartial>,

    /// SQLite file for the state store and caller cache
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state_path: Option<PathBuf>,
}

/// Index settings (partial).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexConfigPartial {
    /// File patterns to include
    #[serde(skip_serializing_if = "Option::is_none")]
    pub include_patterns: Option<Vec<String>>,

    /// File patterns to exclude (added to the defaults)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exclude_patterns: Option<Vec<String>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub metric: Option<DistanceMetric>,

    /// Chunks sent to the embedding backend per request
    #[serde(skip_serializing_if = "Option::is_none")]
    pub batch_size: Option<usize>,

    /// Lines of context on each side of a chunk's anchor line
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context_radius: Option<usize>,

    /// Skip files larger than this many bytes
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_file_size: Option<u64>,

    /// Honor directory patterns from the repository .gitignore
    #[serde(skip_serializing_if = "Option::is_none")]
    pub respect_gitignore: Option<bool>,
}

/// Embedding backend settings (partial).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmbeddingConfigPartial {
    /// `ollama`, `openai` or `auto`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub ollama_model: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub ollama_base_url: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub openai_model: Option<String>,
}

/// LLM backend settings (partial).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LlmConfigPartial {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,

    /// Request timeout in milliseconds
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,

    /// Surrounding log lines included in the ranking prompt
    #[serde(skip_serializing_if = "Option::is_none")]
    pub history_window: Option<usize>,
}

/// Ranking settings (partial).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RankingConfigPartial {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub focus_threshold: Option<f64>,
}

/// Variable scoring weights (partial).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VariableWeightsPartial {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub proximity_base: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub proximity_decay: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assignment: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub declaration: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub argument: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub returned: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub conditional: Option<i32>,
}

/// Resolved configuration with all values set.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TracebackConfig {
    pub repo_root: Option<PathBuf>,
    pub index: IndexConfig,
    pub embedding: EmbeddingConfig,
    pub llm: LlmConfig,
    pub ranking: RankingConfig,
    pub variables: VariableWeights,
    pub state_path: Option<PathBuf>,
}

impl TracebackConfig {
    /// Repository root, or a configuration error when none is set.
    pub fn require_repo_root(&self) -> Result<&PathBuf, crate::error::EngineError> {
        self.repo_root.as_ref().ok_or_else(|| {
            crate::error::EngineError::Configuration("no repository root configured".to_string())
        })
    }
}

/// Resolved index settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexConfig {
    pub include_patterns: Vec<String>,
    pub exclude_patterns: Vec<String>,
    pub metric: DistanceMetric,
    pub batch_size: usize,
    pub context_radius: usize,
    pub max_file_size: u64,
    pub respect_gitignore: bool,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            include_patterns: vec![
                "**/*.rs".to_string(),
                "**/*.py".to_string(),
                "**/*.go".to_string(),
                "**/*.java".to_string(),
                "**/*.kt".to_string(),
                "**/*.ts".to_string(),
                "**/*.tsx".to_string(),
                "**/*.js".to_string(),
                "**/*.c".to_string(),
                "**/*.cc".to_string(),
                "**/*.cpp".to_string(),
                "**/*.h".to_string(),
                "**/*.cs".to_string(),
                "**/*.rb".to_string(),
            ],
            exclude_patterns: vec![
                "**/target/**".to_string(),
                "**/node_modules/**".to_string(),
                "**/.git/**".to_string(),
                "**/dist/**".to_string(),
                "**/build/**".to_string(),
            ],
            metric: DistanceMetric::Cosine,
            batch_size: 32,
            context_radius: 2,
            max_file_size: 1024 * 1024,
            respect_gitignore: true,
        }
    }
}

/// Resolved embedding settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmbeddingConfig {
    pub provider: String,
    pub ollama_model: String,
    pub ollama_base_url: String,
    pub openai_model: String,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: "auto".to_string(),
            ollama_model: "nomic-embed-text".to_string(),
            ollama_base_url: "http://localhost:11434".to_string(),
            openai_model: "text-embedding-3-small".to_string(),
        }
    }
}

/// Resolved LLM settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LlmConfig {
    pub model: String,
    pub base_url: String,
    pub max_tokens: u32,
    pub timeout_ms: u64,
    pub history_window: usize,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            model: "claude-3-7-sonnet-latest".to_string(),
            base_url: "https://api.anthropic.com".to_string(),
            max_tokens: 4096,
            timeout_ms: 120_000,
            history_window: 20,
        }
    }
}

/// Resolved ranking settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RankingConfig {
    /// Callers above this confidence are the ones worth focusing on
    pub focus_threshold: f64,
}

impl Default for RankingConfig {
    fn default() -> Self {
        Self { focus_threshold: 0.7 }
    }
}

/// Additive scoring weights for variable occurrences.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VariableWeights {
    pub proximity_base: i32,
    pub proximity_decay: i32,
    pub assignment: i32,
    pub declaration: i32,
    pub argument: i32,
    pub returned: i32,
    pub conditional: i32,
}

impl Default for VariableWeights {
    fn default() -> Self {
        Self {
            proximity_base: 50,
            proximity_decay: 2,
            assignment: 40,
            declaration: 30,
            argument: 20,
            returned: 35,
            conditional: 25,
        }
    }
}

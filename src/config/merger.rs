// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Configuration merging.
//!
//! Handles merging configurations from different sources with proper precedence.

use std::path::PathBuf;

use super::types::{TracebackConfig, WorkspaceConfig};
use crate::index::DistanceMetric;

/// CLI options that can override configuration.
#[derive(Debug, Clone, Default)]
pub struct CliOptions {
    pub repo_root: Option<PathBuf>,
    pub metric: Option<DistanceMetric>,
    pub embedding_provider: Option<String>,
    pub model: Option<String>,
    pub state_path: Option<PathBuf>,
}

/// Default configuration values.
pub fn default_config() -> TracebackConfig {
    TracebackConfig::default()
}

/// Merge multiple configurations with precedence.
///
/// Precedence (highest to lowest):
/// 1. CLI options
/// 2. Local config (.traceback.local.json)
/// 3. Workspace config (.traceback.json)
/// 4. Global config (~/.traceback/config.json)
/// 5. Default values
pub fn merge_config(
    global: Option<WorkspaceConfig>,
    workspace: Option<WorkspaceConfig>,
    local: Option<WorkspaceConfig>,
    cli: CliOptions,
) -> TracebackConfig {
    let mut result = default_config();

    for config in [global, workspace, local].into_iter().flatten() {
        apply_workspace_config(&mut result, &config);
    }

    apply_cli_options(&mut result, &cli);

    result
}

fn apply_workspace_config(result: &mut TracebackConfig, config: &WorkspaceConfig) {
    if config.repo_root.is_some() {
        result.repo_root = config.repo_root.clone();
    }

    if config.state_path.is_some() {
        result.state_path = config.state_path.clone();
    }

    if let Some(ref index) = config.index {
        if let Some(ref include) = index.include_patterns {
            result.index.include_patterns = include.clone();
        }
        if let Some(ref exclude) = index.exclude_patterns {
            // Excludes accumulate so a local file cannot drop target/ by accident
            for pattern in exclude {
                if !result.index.exclude_patterns.contains(pattern) {
                    result.index.exclude_patterns.push(pattern.clone());
                }
            }
        }
        if let Some(metric) = index.metric {
            result.index.metric = metric;
        }
        if let Some(batch_size) = index.batch_size {
            result.index.batch_size = batch_size.max(1);
        }
        if let Some(radius) = index.context_radius {
            result.index.context_radius = radius;
        }
        if let Some(max) = index.max_file_size {
            result.index.max_file_size = max;
        }
        if let Some(respect) = index.respect_gitignore {
            result.index.respect_gitignore = respect;
        }
    }

    if let Some(ref embedding) = config.embedding {
        if let Some(ref provider) = embedding.provider {
            result.embedding.provider = provider.clone();
        }
        if let Some(ref model) = embedding.ollama_model {
            result.embedding.ollama_model = model.clone();
        }
        if let Some(ref url) = embedding.ollama_base_url {
            result.embedding.ollama_base_url = url.clone();
        }
        if let Some(ref model) = embedding.openai_model {
            result.embedding.openai_model = model.clone();
        }
    }

    if let Some(ref llm) = config.llm {
        if let Some(ref model) = llm.model {
            result.llm.model = model.clone();
        }
        if let Some(ref url) = llm.base_url {
            result.llm.base_url = url.clone();
        }
        if let Some(max_tokens) = llm.max_tokens {
            result.llm.max_tokens = max_tokens;
        }
        if let Some(timeout) = llm.timeout_ms {
            result.llm.timeout_ms = timeout;
        }
        if let Some(window) = llm.history_window {
            result.llm.history_window = window;
        }
    }

    if let Some(ref ranking) = config.ranking {
        if let Some(threshold) = ranking.focus_threshold {
            result.ranking.focus_threshold = threshold.clamp(0.0, 1.0);
        }
    }

    if let Some(ref weights) = config.variables {
        let w = &mut result.variables;
        w.proximity_base = weights.proximity_base.unwrap_or(w.proximity_base);
        w.proximity_decay = weights.proximity_decay.unwrap_or(w.proximity_decay);
        w.assignment = weights.assignment.unwrap_or(w.assignment);
        w.declaration = weights.declaration.unwrap_or(w.declaration);
        w.argument = weights.argument.unwrap_or(w.argument);
        w.returned = weights.returned.unwrap_or(w.returned);
        w.conditional = weights.conditional.unwrap_or(w.conditional);
    }
}

fn apply_cli_options(result: &mut TracebackConfig, cli: &CliOptions) {
    if cli.repo_root.is_some() {
        result.repo_root = cli.repo_root.clone();
    }

    if let Some(metric) = cli.metric {
        result.index.metric = metric;
    }

    if let Some(ref provider) = cli.embedding_provider {
        result.embedding.provider = provider.clone();
    }

    if let Some(ref model) = cli.model {
        result.llm.model = model.clone();
    }

    if cli.state_path.is_some() {
        result.state_path = cli.state_path.clone();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::types::{IndexConfigPartial, LlmConfigPartial, RankingConfigPartial};

    #[test]
    fn test_default_config() {
        let config = default_config();
        assert!(config.repo_root.is_none());
        assert_eq!(config.embedding.provider, "auto");
    }

    #[test]
    fn test_merge_config_precedence() {
        let global = WorkspaceConfig {
            llm: Some(LlmConfigPartial {
                model: Some("global-model".to_string()),
                ..Default::default()
            }),
            ..Default::default()
        };

        let workspace = WorkspaceConfig {
            repo_root: Some(PathBuf::from("/workspace")),
            llm: Some(LlmConfigPartial {
                model: Some("workspace-model".to_string()),
                ..Default::default()
            }),
            ..Default::default()
        };

        let local = WorkspaceConfig {
            llm: Some(LlmConfigPartial {
                model: Some("local-model".to_string()),
                ..Default::default()
            }),
            ..Default::default()
        };

        let cli = CliOptions {
            repo_root: Some(PathBuf::from("/cli")),
            ..Default::default()
        };

        let result = merge_config(Some(global), Some(workspace), Some(local), cli);

        assert_eq!(result.repo_root, Some(PathBuf::from("/cli")));
        assert_eq!(result.llm.model, "local-model");
    }

    #[test]
    fn test_exclude_patterns_accumulate() {
        let workspace = WorkspaceConfig {
            index: Some(IndexConfigPartial {
                exclude_patterns: Some(vec!["**/vendor/**".to_string(), "**/target/**".to_string()]),
                ..Default::default()
            }),
            ..Default::default()
        };

        let result = merge_config(None, Some(workspace), None, CliOptions::default());
        let excludes = &result.index.exclude_patterns;
        assert!(excludes.contains(&"**/vendor/**".to_string()));
        assert_eq!(excludes.iter().filter(|p| *p == "**/target/**").count(), 1);
    }

    #[test]
    fn test_threshold_clamped() {
        let workspace = WorkspaceConfig {
            ranking: Some(RankingConfigPartial {
                focus_threshold: Some(1.5),
            }),
            ..Default::default()
        };

        let result = merge_config(None, Some(workspace), None, CliOptions::default());
        assert!((result.ranking.focus_threshold - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_cli_metric_override() {
        let workspace = WorkspaceConfig {
            index: Some(IndexConfigPartial {
                metric: Some(DistanceMetric::Euclidean),
                ..Default::default()
            }),
            ..Default::default()
        };

        let cli = CliOptions {
            metric: Some(DistanceMetric::Manhattan),
            ..Default::default()
        };

        let result = merge_config(None, Some(workspace), None, cli);
        assert_eq!(result.index.metric, DistanceMetric::Manhattan);
    }
}

// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Configuration module.
//!
//! Handles loading and merging configuration from multiple sources:
//! - Global config: ~/.traceback/config.json
//! - Workspace config: .traceback.json, .traceback/config.json, or .traceback.yaml
//! - Local config: .traceback.local.json (gitignored, for personal overrides)
//! - CLI options: command-line arguments
//!
//! Configuration is merged with precedence (CLI > local > workspace > global > defaults).

mod loader;
mod merger;
mod types;

pub use loader::{
    find_workspace_root, get_global_config_dir, get_global_config_path, load_config_file,
    load_global_config, load_local_config, load_workspace_config, save_workspace_config,
    CONFIG_FILES, GLOBAL_CONFIG_DIR, GLOBAL_CONFIG_FILE, LOCAL_CONFIG_FILE,
};

pub use merger::{default_config, merge_config, CliOptions};

pub use types::{
    EmbeddingConfig, EmbeddingConfigPartial, IndexConfig, IndexConfigPartial, LlmConfig,
    LlmConfigPartial, RankingConfig, RankingConfigPartial, TracebackConfig, VariableWeights,
    VariableWeightsPartial, WorkspaceConfig,
};

use crate::error::ConfigError;
use std::path::Path;

/// Load and merge all configuration sources for a workspace.
///
/// When no source names a repository root, the workspace root itself is used.
pub fn load_config(
    workspace_root: &Path,
    cli_options: CliOptions,
) -> Result<TracebackConfig, ConfigError> {
    let global = load_global_config()?;
    let workspace = load_workspace_config(workspace_root)?;
    let local = load_local_config(workspace_root)?;

    let mut config = merge_config(global, workspace, local, cli_options);
    match config.repo_root.take() {
        Some(root) if root.is_relative() => config.repo_root = Some(workspace_root.join(root)),
        Some(root) => config.repo_root = Some(root),
        None => config.repo_root = Some(workspace_root.to_path_buf()),
    }
    if let Some(state) = config.state_path.take() {
        config.state_path = Some(if state.is_relative() {
            workspace_root.join(state)
        } else {
            state
        });
    }
    Ok(config)
}

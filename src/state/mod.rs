// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Persistent state: trace and dataset selections, secrets, cached analyses.

mod store;

pub use store::{
    StateKey, StateStore, ANTHROPIC_API_KEY_ENV, ANTHROPIC_API_KEY_SECRET, SCHEMA_VERSION,
};

use std::path::{Path, PathBuf};

/// Default store location inside a workspace.
pub fn default_state_path(workspace_root: &Path) -> PathBuf {
    workspace_root.join(".traceback").join("state.db")
}

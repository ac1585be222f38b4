// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Language server commands per file type.

use std::path::Path;

use serde::{Deserialize, Serialize};

/// How to launch one language server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LspServerConfig {
    pub name: String,
    pub command: String,
    #[serde(default)]
    pub args: Vec<String>,
    /// Extensions without the dot.
    #[serde(default)]
    pub file_types: Vec<String>,
    #[serde(default = "default_request_timeout")]
    pub request_timeout_ms: u64,
}

fn default_request_timeout() -> u64 {
    10_000
}

impl LspServerConfig {
    pub fn new(name: impl Into<String>, command: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            command: command.into(),
            args: Vec::new(),
            file_types: Vec::new(),
            request_timeout_ms: default_request_timeout(),
        }
    }

    pub fn with_file_types(mut self, types: &[&str]) -> Self {
        self.file_types = types.iter().map(|s| s.to_string()).collect();
        self
    }

    pub fn with_args(mut self, args: &[&str]) -> Self {
        self.args = args.iter().map(|s| s.to_string()).collect();
        self
    }

    pub fn handles_extension(&self, ext: &str) -> bool {
        self.file_types.iter().any(|t| t.eq_ignore_ascii_case(ext))
    }

    pub fn handles_file(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| self.handles_extension(e))
    }
}

/// Servers for the languages the index covers by default.
pub fn default_server_configs() -> Vec<LspServerConfig> {
    vec![
        LspServerConfig::new("rust-analyzer", "rust-analyzer").with_file_types(&["rs"]),
        LspServerConfig::new("typescript-language-server", "typescript-language-server")
            .with_args(&["--stdio"])
            .with_file_types(&["ts", "tsx", "js", "jsx"]),
        LspServerConfig::new("pyright", "pyright-langserver")
            .with_args(&["--stdio"])
            .with_file_types(&["py"]),
        LspServerConfig::new("gopls", "gopls").with_file_types(&["go"]),
        LspServerConfig::new("clangd", "clangd").with_file_types(&["c", "cc", "cpp", "h", "hpp"]),
    ]
}

/// Language ID for a file extension, as LSP servers expect it.
pub fn language_id_for_extension(ext: &str) -> &'static str {
    match ext.to_lowercase().as_str() {
        "rs" => "rust",
        "ts" => "typescript",
        "tsx" => "typescriptreact",
        "js" => "javascript",
        "jsx" => "javascriptreact",
        "py" => "python",
        "go" => "go",
        "c" | "h" => "c",
        "cc" | "cpp" | "hpp" => "cpp",
        "java" => "java",
        "kt" => "kotlin",
        "cs" => "csharp",
        "rb" => "ruby",
        _ => "plaintext",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_handles_file() {
        let config = LspServerConfig::new("rust-analyzer", "rust-analyzer").with_file_types(&["rs"]);
        assert!(config.handles_file(Path::new("/foo/bar.RS")));
        assert!(!config.handles_file(Path::new("/foo/bar.py")));
        assert!(!config.handles_file(Path::new("/foo/Makefile")));
    }

    #[test]
    fn test_defaults_cover_index_languages() {
        let configs = default_server_configs();
        for ext in ["rs", "ts", "py", "go", "cpp"] {
            assert!(configs.iter().any(|c| c.handles_extension(ext)), "{}", ext);
        }
    }

    #[test]
    fn test_language_id() {
        assert_eq!(language_id_for_extension("tsx"), "typescriptreact");
        assert_eq!(language_id_for_extension("H"), "c");
        assert_eq!(language_id_for_extension("unknown"), "plaintext");
    }
}

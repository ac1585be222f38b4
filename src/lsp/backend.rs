// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Symbol backend over one or more language servers.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::{info, warn};

use super::client::LspClient;
use super::config::{default_server_configs, LspServerConfig};
use super::error::{LspError, LspResult};
use super::types::{DocumentSymbol, Location, Position, WorkspaceSymbol};
use crate::symbols::SymbolBackend;

/// Starts language servers lazily, one per configured server, the first
/// time a file they handle is queried. A server that fails to start is not
/// retried.
pub struct LspBackend {
    work_dir: PathBuf,
    configs: Vec<LspServerConfig>,
    clients: Mutex<HashMap<String, Arc<LspClient>>>,
    failed: Mutex<HashSet<String>>,
}

impl LspBackend {
    pub fn new(work_dir: impl Into<PathBuf>, configs: Vec<LspServerConfig>) -> Self {
        Self {
            work_dir: work_dir.into(),
            configs,
            clients: Mutex::new(HashMap::new()),
            failed: Mutex::new(HashSet::new()),
        }
    }

    pub fn with_defaults(work_dir: impl Into<PathBuf>) -> Self {
        Self::new(work_dir, default_server_configs())
    }

    pub fn config_for(&self, path: &Path) -> Option<&LspServerConfig> {
        self.configs.iter().find(|c| c.handles_file(path))
    }

    async fn client_for(&self, path: &Path) -> LspResult<Arc<LspClient>> {
        let config = self
            .config_for(path)
            .ok_or_else(|| LspError::ServerNotFound(path.display().to_string()))?;

        let mut clients = self.clients.lock().await;
        if let Some(client) = clients.get(&config.name) {
            return Ok(Arc::clone(client));
        }
        if self.failed.lock().await.contains(&config.name) {
            return Err(LspError::StartupFailed(format!("{} failed earlier", config.name)));
        }

        let client = Arc::new(LspClient::new(config.clone(), &self.work_dir));
        if let Err(e) = client.start().await {
            warn!(server = %config.name, error = %e, "language server unavailable");
            self.failed.lock().await.insert(config.name.clone());
            return Err(e);
        }
        info!(server = %config.name, "language server started");
        clients.insert(config.name.clone(), Arc::clone(&client));
        Ok(client)
    }

    /// Stop every running server.
    pub async fn shutdown(&self) {
        let clients: Vec<Arc<LspClient>> = self.clients.lock().await.drain().map(|(_, c)| c).collect();
        for client in clients {
            if let Err(e) = client.stop().await {
                warn!(server = client.name(), error = %e, "language server did not stop cleanly");
            }
        }
    }
}

#[async_trait]
impl SymbolBackend for LspBackend {
    fn name(&self) -> &str {
        "lsp"
    }

    async fn document_symbols(&self, path: &Path) -> LspResult<Vec<DocumentSymbol>> {
        let client = self.client_for(path).await?;
        let uri = client.open_file_on_demand(path).await?;
        client.document_symbols(&uri).await
    }

    async fn generic_document_symbols(&self, path: &Path) -> LspResult<Vec<DocumentSymbol>> {
        let client = self.client_for(path).await?;
        let uri = client.open_file_on_demand(path).await?;
        client.symbol_information(&uri).await
    }

    /// Asks every running server; servers are never started for this.
    async fn workspace_symbols(&self, query: &str) -> LspResult<Vec<WorkspaceSymbol>> {
        let clients: Vec<Arc<LspClient>> = self.clients.lock().await.values().cloned().collect();
        let mut symbols = Vec::new();
        for client in clients {
            match client.workspace_symbols(query).await {
                Ok(found) => symbols.extend(found),
                Err(e) => warn!(server = client.name(), error = %e, "workspace symbol query failed"),
            }
        }
        Ok(symbols)
    }

    async fn references(&self, path: &Path, position: Position) -> LspResult<Vec<Location>> {
        let client = self.client_for(path).await?;
        let uri = client.open_file_on_demand(path).await?;
        client.references(&uri, position, true).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_unhandled_extension() {
        let backend = LspBackend::with_defaults("/tmp");
        let result = backend.document_symbols(Path::new("/tmp/notes.txt")).await;
        assert!(matches!(result, Err(LspError::ServerNotFound(_))));
    }

    #[tokio::test]
    async fn test_missing_server_is_remembered() {
        let temp = tempfile::TempDir::new().unwrap();
        let config = LspServerConfig::new("ghost", "traceback-no-such-language-server").with_file_types(&["rs"]);
        let backend = LspBackend::new(temp.path(), vec![config]);
        let file = temp.path().join("lib.rs");

        let first = backend.references(&file, Position::new(0, 0)).await;
        assert!(matches!(first, Err(LspError::StartupFailed(_))));
        let second = backend.document_symbols(&file).await;
        assert!(matches!(second, Err(LspError::StartupFailed(msg)) if msg.contains("failed earlier")));
    }

    #[tokio::test]
    async fn test_workspace_symbols_without_servers() {
        let backend = LspBackend::with_defaults("/tmp");
        assert!(backend.workspace_symbols("").await.unwrap().is_empty());
    }
}

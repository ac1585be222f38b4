// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Symbol and reference providers.

use std::path::Path;

use async_trait::async_trait;

use crate::lsp::{DocumentSymbol, Location, LspResult, Position, WorkspaceSymbol};

/// Symbol and reference queries against a code-intelligence provider.
///
/// Callers treat every error as "no results".
#[async_trait]
pub trait SymbolBackend: Send + Sync {
    fn name(&self) -> &str;

    /// Language-specific, hierarchical symbols for one file.
    async fn document_symbols(&self, path: &Path) -> LspResult<Vec<DocumentSymbol>>;

    /// Symbols from a provider that does not know the language.
    async fn generic_document_symbols(&self, _path: &Path) -> LspResult<Vec<DocumentSymbol>> {
        Ok(Vec::new())
    }

    /// Flat symbol search; an empty query asks for everything.
    async fn workspace_symbols(&self, query: &str) -> LspResult<Vec<WorkspaceSymbol>>;

    /// References to the symbol at `position`, declaration included.
    async fn references(&self, path: &Path, position: Position) -> LspResult<Vec<Location>>;
}

/// Backend with no symbol knowledge at all. Analysis falls through to the
/// textual scan.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSymbolBackend;

#[async_trait]
impl SymbolBackend for NullSymbolBackend {
    fn name(&self) -> &str {
        "none"
    }

    async fn document_symbols(&self, _path: &Path) -> LspResult<Vec<DocumentSymbol>> {
        Ok(Vec::new())
    }

    async fn workspace_symbols(&self, _query: &str) -> LspResult<Vec<WorkspaceSymbol>> {
        Ok(Vec::new())
    }

    async fn references(&self, _path: &Path, _position: Position) -> LspResult<Vec<Location>> {
        Ok(Vec::new())
    }
}

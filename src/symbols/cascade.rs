// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Ordered symbol-resolution strategies.

use std::path::Path;
use std::sync::Arc;

use tracing::{debug, warn};

use super::backend::SymbolBackend;
use super::brace_scan;
use super::text::Document;
use crate::lsp::{DocumentSymbol, LspResult, WorkspaceSymbol};

/// One way of getting a file's symbols. [`SymbolStrategy::CASCADE`] is the
/// order they are tried in; the first non-empty answer wins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SymbolStrategy {
    /// The language server's own document symbols.
    LanguageDocumentSymbols,
    /// Workspace symbols queried by the file's stem, kept if they live in the file.
    WorkspaceByBasename,
    /// A provider that does not understand the language.
    GenericDocumentSymbols,
    /// Every workspace symbol, kept if it lives in the file.
    WorkspaceForFile,
    /// Brace-counting textual scan.
    BraceScan,
}

impl SymbolStrategy {
    pub const CASCADE: [SymbolStrategy; 5] = [
        SymbolStrategy::LanguageDocumentSymbols,
        SymbolStrategy::WorkspaceByBasename,
        SymbolStrategy::GenericDocumentSymbols,
        SymbolStrategy::WorkspaceForFile,
        SymbolStrategy::BraceScan,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            Self::LanguageDocumentSymbols => "document-symbols",
            Self::WorkspaceByBasename => "workspace-by-basename",
            Self::GenericDocumentSymbols => "generic-document-symbols",
            Self::WorkspaceForFile => "workspace-for-file",
            Self::BraceScan => "brace-scan",
        }
    }
}

/// Symbols for one file and the strategy that produced them.
#[derive(Debug, Clone)]
pub struct FileSymbols {
    pub strategy: SymbolStrategy,
    pub symbols: Vec<DocumentSymbol>,
}

impl FileSymbols {
    /// The innermost function or method whose range contains `line`.
    pub fn enclosing_function(&self, line: u32) -> Option<&DocumentSymbol> {
        enclosing_function(&self.symbols, line)
    }
}

/// Runs [`SymbolStrategy::CASCADE`] against a backend.
#[derive(Clone)]
pub struct SymbolCascade {
    backend: Arc<dyn SymbolBackend>,
}

impl SymbolCascade {
    pub fn new(backend: Arc<dyn SymbolBackend>) -> Self {
        Self { backend }
    }

    pub fn backend_name(&self) -> &str {
        self.backend.name()
    }

    /// Symbols for `document`, or `None` when every strategy came back empty.
    pub async fn resolve(&self, document: &Document) -> Option<FileSymbols> {
        for strategy in SymbolStrategy::CASCADE {
            let symbols = self.run(strategy, document).await;
            if !symbols.is_empty() {
                debug!(
                    file = %document.path().display(),
                    strategy = strategy.label(),
                    count = symbols.len(),
                    "resolved symbols"
                );
                return Some(FileSymbols { strategy, symbols });
            }
        }
        None
    }

    /// One strategy. Provider errors are logged and read as "no symbols".
    pub async fn run(&self, strategy: SymbolStrategy, document: &Document) -> Vec<DocumentSymbol> {
        let path = document.path();
        let result = match strategy {
            SymbolStrategy::LanguageDocumentSymbols => self.backend.document_symbols(path).await,
            SymbolStrategy::WorkspaceByBasename => match path.file_stem().and_then(|s| s.to_str()) {
                Some(stem) => self.workspace_in_file(stem, path).await,
                None => Ok(Vec::new()),
            },
            SymbolStrategy::GenericDocumentSymbols => self.backend.generic_document_symbols(path).await,
            SymbolStrategy::WorkspaceForFile => self.workspace_in_file("", path).await,
            SymbolStrategy::BraceScan => Ok(brace_scan::scan_symbols(document.text())),
        };

        result.unwrap_or_else(|e| {
            warn!(
                backend = self.backend.name(),
                strategy = strategy.label(),
                file = %path.display(),
                error = %e,
                "symbol provider failed"
            );
            Vec::new()
        })
    }

    async fn workspace_in_file(&self, query: &str, path: &Path) -> LspResult<Vec<DocumentSymbol>> {
        let symbols = self.backend.workspace_symbols(query).await?;
        Ok(symbols
            .iter()
            .filter(|s| s.is_in(path))
            .map(WorkspaceSymbol::to_document_symbol)
            .collect())
    }
}

/// Depth-first search for the innermost function, method or constructor
/// containing `line`. Containers are never answers themselves, but their
/// children are searched. Among overlapping siblings (flat symbol lists) the
/// narrowest wins.
pub fn enclosing_function(symbols: &[DocumentSymbol], line: u32) -> Option<&DocumentSymbol> {
    symbols
        .iter()
        .filter(|s| s.range.contains_line(line))
        .filter_map(|s| {
            enclosing_function(&s.children, line).or_else(|| s.kind.is_callable().then_some(s))
        })
        .min_by_key(|s| s.range.line_span())
}

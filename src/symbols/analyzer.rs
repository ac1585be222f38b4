// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Caller discovery for a source line.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, instrument, warn};

use super::backend::SymbolBackend;
use super::cascade::{FileSymbols, SymbolCascade, SymbolStrategy};
use super::text::{Document, TextBackend};
use crate::error::EngineError;
use crate::lsp::{DocumentSymbol, Location, Range};
use crate::ranking::{CallerCandidate, FunctionRange};

#[cfg(feature = "telemetry")]
use crate::telemetry::metrics::GLOBAL_METRICS;

/// Function name used when no enclosing function is known.
pub const UNKNOWN_FUNCTION: &str = "unknown";

/// Lines of context captured on each side of a call site.
const CALL_CONTEXT_RADIUS: u32 = 1;

/// Frames reconstructed by [`CallerAnalyzer::stack_trace`] unless told otherwise.
pub const DEFAULT_STACK_DEPTH: usize = 10;

/// Frames whose callers are looked up in one stack reconstruction.
const MAX_STACK_EXPANSIONS: usize = 256;

/// The function or method a line sits in.
#[derive(Debug, Clone, PartialEq)]
pub struct EnclosingFunction {
    pub name: String,
    pub range: Range,
    pub selection_range: Range,
    pub strategy: SymbolStrategy,
}

impl EnclosingFunction {
    fn from_symbol(symbol: &DocumentSymbol, strategy: SymbolStrategy) -> Self {
        Self {
            name: symbol.name.clone(),
            range: symbol.range,
            selection_range: symbol.selection_range,
            strategy,
        }
    }

    pub fn function_range(&self) -> FunctionRange {
        FunctionRange::new(self.range.start.line, self.range.end.line)
    }
}

/// Finds the function around a line and the call sites that reach it.
pub struct CallerAnalyzer {
    backend: Arc<dyn SymbolBackend>,
    text: Arc<dyn TextBackend>,
    cascade: SymbolCascade,
}

impl CallerAnalyzer {
    pub fn new(backend: Arc<dyn SymbolBackend>, text: Arc<dyn TextBackend>) -> Self {
        Self {
            cascade: SymbolCascade::new(Arc::clone(&backend)),
            backend,
            text,
        }
    }

    /// Enclosing function of `line` in `path`, via the full cascade.
    pub async fn enclosing_function(&self, path: &Path, line: u32) -> Result<Option<EnclosingFunction>, EngineError> {
        let document = self.text.open_document(path).await?;
        Ok(self
            .cascade
            .resolve(&document)
            .await
            .and_then(|symbols| enclosing_in(&symbols, line)))
    }

    /// Call sites that may lead to `line` in `source_file` (0-based).
    ///
    /// Never empty on success: with no symbols at all the result is the raw
    /// line under [`UNKNOWN_FUNCTION`]; with a function but no usable
    /// references it is the function's own start line.
    #[instrument(skip(self), fields(file = %source_file.display()), level = "debug")]
    pub async fn find_potential_callers(
        &self,
        source_file: &Path,
        line: u32,
    ) -> Result<Vec<CallerCandidate>, EngineError> {
        let start = Instant::now();
        let found = self.discover(source_file, line).await?;

        let Some(target) = found.target else {
            debug!(line, "no enclosing function; returning the raw line");
            return Ok(vec![degenerate_candidate(&found.document, line)]);
        };

        #[cfg(feature = "telemetry")]
        GLOBAL_METRICS.record_operation("symbols.find_potential_callers", start.elapsed());
        debug!(
            function = %target.name,
            callers = found.call_sites.len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "found potential callers"
        );

        if found.call_sites.is_empty() {
            debug!(function = %target.name, "no references; returning the function itself");
            let start_line = target.range.start.line;
            return Ok(vec![CallerCandidate {
                file_path: source_file.to_path_buf(),
                line_number: start_line,
                code: found.document.snippet(start_line, CALL_CONTEXT_RADIUS),
                function_name: target.name.clone(),
                function_range: Some(target.function_range()),
            }]);
        }
        Ok(found.call_sites)
    }

    /// Probable call stack ending at `line` in `source_file`, outermost frame
    /// first. The last frame is the line itself; every other frame is a call
    /// site of the frame after it.
    ///
    /// Callers are followed until a function has none, until the stack holds
    /// `max_depth` frames, or until a call site already on the stack comes up
    /// again. Of every chain explored the longest is returned, the first one
    /// found on ties.
    #[instrument(skip(self), fields(file = %source_file.display()), level = "debug")]
    pub async fn stack_trace(
        &self,
        source_file: &Path,
        line: u32,
        max_depth: usize,
    ) -> Result<Vec<CallerCandidate>, EngineError> {
        let start = Instant::now();
        let max_depth = max_depth.max(1);

        let origin = self.discover(source_file, line).await?;
        let origin_frame = CallerCandidate {
            file_path: source_file.to_path_buf(),
            line_number: line,
            code: origin.document.snippet(line, CALL_CONTEXT_RADIUS),
            function_name: origin
                .target
                .as_ref()
                .map_or_else(|| UNKNOWN_FUNCTION.to_string(), |t| t.name.clone()),
            function_range: origin.target.as_ref().map(EnclosingFunction::function_range),
        };

        let mut known: HashMap<(PathBuf, u32), Vec<CallerCandidate>> = HashMap::new();
        known.insert((source_file.to_path_buf(), line), origin.call_sites);

        // Chains are innermost first while exploring
        let mut best = vec![origin_frame.clone()];
        let mut pending = vec![vec![origin_frame]];
        let mut expansions = 0usize;

        while let Some(chain) = pending.pop() {
            if chain.len() > best.len() {
                best = chain.clone();
            }
            if chain.len() >= max_depth {
                continue;
            }
            let Some(frame) = chain.last() else {
                continue;
            };

            let key = (frame.file_path.clone(), frame.line_number);
            let sites = match known.get(&key) {
                Some(sites) => sites.clone(),
                None if expansions >= MAX_STACK_EXPANSIONS => {
                    debug!(expansions, "stack exploration limit reached");
                    continue;
                }
                None => {
                    expansions += 1;
                    let sites = match self.discover(&frame.file_path, frame.line_number).await {
                        Ok(found) => found.call_sites,
                        Err(e) => {
                            warn!(file = %frame.file_path.display(), error = %e, "cannot expand stack frame");
                            Vec::new()
                        }
                    };
                    known.insert(key, sites.clone());
                    sites
                }
            };

            // Reversed so the first call site is explored first
            for site in sites.into_iter().rev() {
                let on_chain = chain
                    .iter()
                    .any(|f| f.file_path == site.file_path && f.line_number == site.line_number);
                if on_chain {
                    debug!(site = %site.key(), "skipping call cycle");
                    continue;
                }
                let mut next = chain.clone();
                next.push(site);
                pending.push(next);
            }
        }

        #[cfg(feature = "telemetry")]
        GLOBAL_METRICS.record_operation("symbols.stack_trace", start.elapsed());
        debug!(
            frames = best.len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "reconstructed call stack"
        );

        best.reverse();
        Ok(best)
    }

    /// The function around `line` and the real call sites of it, without
    /// any fallback candidates.
    async fn discover(&self, source_file: &Path, line: u32) -> Result<Discovery, EngineError> {
        let document = self.text.open_document(source_file).await?;

        let source_symbols = self.cascade.resolve(&document).await;
        let Some(target) = source_symbols.as_ref().and_then(|s| enclosing_in(s, line)) else {
            return Ok(Discovery {
                document,
                target: None,
                call_sites: Vec::new(),
            });
        };

        let references = self
            .backend
            .references(source_file, target.selection_range.start)
            .await
            .unwrap_or_else(|e| {
                warn!(backend = self.backend.name(), error = %e, "reference lookup failed");
                Vec::new()
            });

        let mut files: HashMap<PathBuf, Option<(Document, Option<FileSymbols>)>> = HashMap::new();
        files.insert(source_file.to_path_buf(), Some((document.clone(), source_symbols)));

        let mut call_sites = Vec::new();
        for site in references
            .into_iter()
            .filter(|r| !is_declaration(r, source_file, &target))
        {
            let Some(path) = site.file_path() else {
                warn!(uri = %site.uri, "skipping reference outside the filesystem");
                continue;
            };

            if !files.contains_key(&path) {
                let loaded = match self.text.open_document(&path).await {
                    Ok(doc) => {
                        let symbols = self.cascade.resolve(&doc).await;
                        Some((doc, symbols))
                    }
                    Err(e) => {
                        warn!(file = %path.display(), error = %e, "cannot read caller file");
                        None
                    }
                };
                files.insert(path.clone(), loaded);
            }
            let Some(Some((doc, symbols))) = files.get(&path) else {
                continue;
            };

            let call_line = site.range.start.line;
            let caller = symbols.as_ref().and_then(|s| enclosing_in(s, call_line));
            call_sites.push(CallerCandidate {
                file_path: path,
                line_number: call_line,
                code: doc.snippet(call_line, CALL_CONTEXT_RADIUS),
                function_name: caller
                    .as_ref()
                    .map_or_else(|| UNKNOWN_FUNCTION.to_string(), |c| c.name.clone()),
                function_range: caller.as_ref().map(EnclosingFunction::function_range),
            });
        }

        Ok(Discovery {
            document,
            target: Some(target),
            call_sites,
        })
    }
}

struct Discovery {
    document: Document,
    target: Option<EnclosingFunction>,
    call_sites: Vec<CallerCandidate>,
}

fn enclosing_in(symbols: &FileSymbols, line: u32) -> Option<EnclosingFunction> {
    symbols
        .enclosing_function(line)
        .map(|s| EnclosingFunction::from_symbol(s, symbols.strategy))
}

/// A reference at the declaration's own name is not a call.
fn is_declaration(reference: &Location, source_file: &Path, target: &EnclosingFunction) -> bool {
    reference.range.start.line == target.selection_range.start.line
        && reference.file_path().as_deref() == Some(source_file)
}

fn degenerate_candidate(document: &Document, line: u32) -> CallerCandidate {
    CallerCandidate {
        file_path: document.path().to_path_buf(),
        line_number: line,
        code: document.line_at(line).unwrap_or_default().to_string(),
        function_name: UNKNOWN_FUNCTION.to_string(),
        function_range: None,
    }
}

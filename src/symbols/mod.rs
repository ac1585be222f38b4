// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Enclosing-function lookup and caller discovery.
//!
//! Symbols come from a [`SymbolBackend`] (normally a language server) through
//! an ordered [`SymbolCascade`]; when every provider comes back empty the
//! [`brace_scan`] reads function bodies out of the text directly.

mod analyzer;
mod backend;
pub mod brace_scan;
mod cascade;
mod text;

pub use analyzer::{CallerAnalyzer, EnclosingFunction, DEFAULT_STACK_DEPTH, UNKNOWN_FUNCTION};
pub use backend::{NullSymbolBackend, SymbolBackend};
pub use cascade::{enclosing_function, FileSymbols, SymbolCascade, SymbolStrategy};
pub use text::{Document, FsTextBackend, TextBackend};

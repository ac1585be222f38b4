// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Protocol shapes for symbol and reference queries.
//!
//! These cover only what caller discovery reads from a language server.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Position in a text document (0-indexed).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub struct Position {
    pub line: u32,
    /// UTF-16 code units.
    pub character: u32,
}

impl Position {
    pub fn new(line: u32, character: u32) -> Self {
        Self { line, character }
    }
}

impl std::fmt::Display for Position {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.line + 1, self.character + 1)
    }
}

/// A range in a text document; `end` is exclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub struct Range {
    pub start: Position,
    pub end: Position,
}

impl Range {
    pub fn new(start: Position, end: Position) -> Self {
        Self { start, end }
    }

    /// Range covering whole lines `start_line..=end_line`.
    pub fn lines(start_line: u32, end_line: u32) -> Self {
        Self {
            start: Position::new(start_line, 0),
            end: Position::new(end_line, u32::MAX),
        }
    }

    /// Whether `line` falls inside the range, ignoring columns.
    pub fn contains_line(&self, line: u32) -> bool {
        line >= self.start.line && line <= self.end.line
    }

    pub fn line_span(&self) -> u32 {
        self.end.line.saturating_sub(self.start.line)
    }
}

/// A location in a document.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Location {
    pub uri: String,
    pub range: Range,
}

impl Location {
    pub fn new(uri: impl Into<String>, range: Range) -> Self {
        Self {
            uri: uri.into(),
            range,
        }
    }

    /// Filesystem path behind a `file://` URI.
    pub fn file_path(&self) -> Option<PathBuf> {
        uri_to_path(&self.uri)
    }
}

impl std::fmt::Display for Location {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.file_path() {
            Some(path) => write!(f, "{}:{}", path.display(), self.range.start),
            None => write!(f, "{}:{}", self.uri, self.range.start),
        }
    }
}

pub fn path_to_uri(path: &Path) -> String {
    format!("file://{}", path.display())
}

pub fn uri_to_path(uri: &str) -> Option<PathBuf> {
    uri.strip_prefix("file://").map(|p| PathBuf::from(percent_decode(p)))
}

fn percent_decode(s: &str) -> String {
    let bytes = s.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' && i + 2 < bytes.len() {
            let decoded = std::str::from_utf8(&bytes[i + 1..i + 3])
                .ok()
                .and_then(|hex| u8::from_str_radix(hex, 16).ok());
            if let Some(byte) = decoded {
                out.push(byte);
                i += 3;
                continue;
            }
        }
        out.push(bytes[i]);
        i += 1;
    }
    String::from_utf8_lossy(&out).into_owned()
}

/// Symbol kind for document/workspace symbols.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum SymbolKind {
    File = 1,
    Module = 2,
    Namespace = 3,
    Package = 4,
    Class = 5,
    Method = 6,
    Property = 7,
    Field = 8,
    Constructor = 9,
    Enum = 10,
    Interface = 11,
    Function = 12,
    Variable = 13,
    Constant = 14,
    String = 15,
    Number = 16,
    Boolean = 17,
    Array = 18,
    Object = 19,
    Key = 20,
    Null = 21,
    EnumMember = 22,
    Struct = 23,
    Event = 24,
    Operator = 25,
    TypeParameter = 26,
}

impl SymbolKind {
    pub fn from_lsp(value: i64) -> Option<Self> {
        use SymbolKind::*;
        const KINDS: [SymbolKind; 26] = [
            File, Module, Namespace, Package, Class, Method, Property, Field, Constructor, Enum,
            Interface, Function, Variable, Constant, String, Number, Boolean, Array, Object, Key,
            Null, EnumMember, Struct, Event, Operator, TypeParameter,
        ];
        usize::try_from(value)
            .ok()
            .and_then(|v| v.checked_sub(1))
            .and_then(|i| KINDS.get(i).copied())
    }

    /// Kinds that can be the answer to "which function is this line in".
    pub fn is_callable(self) -> bool {
        matches!(self, Self::Function | Self::Method | Self::Constructor)
    }
}

/// Hierarchical symbol inside one document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentSymbol {
    pub name: String,
    pub kind: SymbolKind,
    /// Full extent, body included.
    pub range: Range,
    /// Extent of the name alone.
    pub selection_range: Range,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<DocumentSymbol>,
}

impl DocumentSymbol {
    pub fn new(name: impl Into<String>, kind: SymbolKind, range: Range, selection_range: Range) -> Self {
        Self {
            name: name.into(),
            kind,
            range,
            selection_range,
            children: Vec::new(),
        }
    }

    pub fn with_children(mut self, children: Vec<DocumentSymbol>) -> Self {
        self.children = children;
        self
    }
}

/// Flat symbol from a workspace query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkspaceSymbol {
    pub name: String,
    pub kind: SymbolKind,
    pub location: Location,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub container_name: Option<String>,
}

impl WorkspaceSymbol {
    /// Whether the symbol lives in `path`.
    pub fn is_in(&self, path: &Path) -> bool {
        self.location.file_path().as_deref() == Some(path)
    }

    /// Flat symbols carry only a location; it serves as both ranges.
    pub fn to_document_symbol(&self) -> DocumentSymbol {
        DocumentSymbol::new(
            self.name.clone(),
            self.kind,
            self.location.range,
            self.location.range,
        )
    }
}

/// LSP server state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ServerState {
    #[default]
    Starting,
    Ready,
    Error,
    Shutdown,
}

impl std::fmt::Display for ServerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            Self::Starting => "starting",
            Self::Ready => "ready",
            Self::Error => "error",
            Self::Shutdown => "shutdown",
        };
        f.write_str(label)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_range_contains_line() {
        let range = Range::lines(5, 10);
        assert!(range.contains_line(5));
        assert!(range.contains_line(10));
        assert!(!range.contains_line(11));
        assert_eq!(range.line_span(), 5);
    }

    #[test]
    fn test_symbol_kind_from_lsp() {
        assert_eq!(SymbolKind::from_lsp(12), Some(SymbolKind::Function));
        assert_eq!(SymbolKind::from_lsp(6), Some(SymbolKind::Method));
        assert_eq!(SymbolKind::from_lsp(26), Some(SymbolKind::TypeParameter));
        assert_eq!(SymbolKind::from_lsp(0), None);
        assert_eq!(SymbolKind::from_lsp(27), None);
        assert!(SymbolKind::Constructor.is_callable());
        assert!(!SymbolKind::Class.is_callable());
    }

    #[test]
    fn test_uri_roundtrip() {
        let path = Path::new("/home/user/my project/src/main.rs");
        let loc = Location::new("file:///home/user/my%20project/src/main.rs", Range::default());
        assert_eq!(loc.file_path().as_deref(), Some(path));
        assert_eq!(uri_to_path(&path_to_uri(Path::new("/a/b.rs"))), Some(PathBuf::from("/a/b.rs")));
        assert_eq!(Location::new("untitled:1", Range::default()).file_path(), None);
    }

    #[test]
    fn test_workspace_symbol_conversion() {
        let sym = WorkspaceSymbol {
            name: "dispatch".to_string(),
            kind: SymbolKind::Function,
            location: Location::new("file:///repo/src/net.rs", Range::lines(3, 9)),
            container_name: None,
        };
        assert!(sym.is_in(Path::new("/repo/src/net.rs")));
        let doc = sym.to_document_symbol();
        assert_eq!(doc.range, doc.selection_range);
        assert!(doc.children.is_empty());
    }
}

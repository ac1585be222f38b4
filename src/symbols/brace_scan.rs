// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Textual fallback for finding function bodies.
//!
//! This is a degraded mode, not a parser. It recognizes common
//! function-header shapes line by line and tracks brace depth to find where
//! each body closes. Brace-less languages (Python) yield nothing, macros and
//! unusual formatting can confuse it, and it should stay this simple: files
//! that need better answers need a language server.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::lsp::{DocumentSymbol, Position, Range, SymbolKind};

/// A header with no `{` within this many lines is dropped.
const MAX_HEADER_LINES: usize = 6;

static HEADER_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        // Rust
        r#"^\s*(?:pub(?:\([^)]*\))?\s+)?(?:(?:const|async|unsafe|extern\s+"[^"]*")\s+)*fn\s+(?P<name>[A-Za-z_]\w*)"#,
        // Go
        r"^\s*func\s+(?:\([^)]*\)\s*)?(?P<name>[A-Za-z_]\w*)\s*\(",
        // Kotlin
        r"^\s*(?:\w+\s+)*fun\s+(?:<[^>]*>\s*)?(?:[\w.]+\.)?(?P<name>[A-Za-z_]\w*)\s*\(",
        // JavaScript / TypeScript function declarations
        r"^\s*(?:export\s+)?(?:default\s+)?(?:async\s+)?function\s*\*?\s*(?P<name>[A-Za-z_$][\w$]*)\s*[<(]",
        // Functions bound to a name
        r"^\s*(?:export\s+)?(?:const|let|var)\s+(?P<name>[A-Za-z_$][\w$]*)\s*(?::[^=]+)?=\s*(?:async\s+)?(?:function\b|\([^)]*\)\s*(?::[^=]+)?=>|[A-Za-z_$][\w$]*\s*=>)",
        // Methods and C-family definitions: optional modifiers and return type, name, parameters
        r"^\s*(?:(?:public|private|protected|internal|static|final|abstract|override|virtual|async|synchronized|inline|extern|export|default)\s+)*(?:[\w<>\[\],.*&:?]+\s+)*(?P<name>[A-Za-z_~][\w]*)\s*\([^;]*\)?\s*(?:const\s*)?(?:throws\s+[\w., ]+)?(?::\s*[\w<>\[\], .|?]+)?\s*\{?\s*$",
    ]
    .iter()
    .map(|p| Regex::new(p).expect("valid regex"))
    .collect()
});

const CONTROL_KEYWORDS: &[&str] = &[
    "if", "else", "for", "foreach", "while", "do", "switch", "match", "catch", "try", "return",
    "new", "sizeof", "loop", "with", "using", "lock", "fixed", "unsafe", "when", "elif", "until",
    "defer", "go", "select", "synchronized", "typeof", "await", "throw", "yield", "delete",
];

/// First words of statements that can look like `name(...) {`.
const STATEMENT_STARTS: &[&str] = &["let", "var", "case", "break", "continue"];

/// A function found by the scan. Lines are 0-based and inclusive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScannedFunction {
    pub name: String,
    pub start_line: u32,
    pub end_line: u32,
    /// Column of the name on `start_line`.
    pub name_column: u32,
}

impl ScannedFunction {
    pub fn contains(&self, line: u32) -> bool {
        line >= self.start_line && line <= self.end_line
    }

    pub fn to_symbol(&self) -> DocumentSymbol {
        let name_start = Position::new(self.start_line, self.name_column);
        let name_end = Position::new(self.start_line, self.name_column + self.name.len() as u32);
        DocumentSymbol::new(
            self.name.clone(),
            SymbolKind::Function,
            Range::lines(self.start_line, self.end_line),
            Range::new(name_start, name_end),
        )
    }
}

/// Match a function header on one line; returns the name and its column.
pub fn header_name(line: &str) -> Option<(String, u32)> {
    match_header(line).map(|p| (p.name, p.column))
}

fn match_header(line: &str) -> Option<Pending> {
    let last = HEADER_PATTERNS.len() - 1;
    HEADER_PATTERNS.iter().enumerate().find_map(|(i, re)| {
        let caps = re.captures(line)?;
        let name = caps.name("name")?;
        if CONTROL_KEYWORDS.contains(&name.as_str()) {
            return None;
        }
        if i == last && is_statement(line, name.start()) {
            return None;
        }
        Some(Pending {
            name: name.as_str().to_string(),
            line: 0,
            column: line[..name.start()].encode_utf16().count() as u32,
            keyword: i != last,
        })
    })
}

/// A keyword-less header candidate that is really control flow, a binding
/// or a match arm: `if let Some(x) = f(y) {`, `match parse(s) {`,
/// `Err(e) => {`.
fn is_statement(line: &str, name_start: usize) -> bool {
    let first = line
        .trim_start_matches(|c: char| c.is_whitespace() || c == '}')
        .split(|c: char| !(c.is_alphanumeric() || c == '_'))
        .next()
        .unwrap_or_default();
    CONTROL_KEYWORDS.contains(&first)
        || STATEMENT_STARTS.contains(&first)
        || line[..name_start].contains('=')
        || line.contains("=>")
}

struct Pending {
    name: String,
    line: usize,
    column: u32,
    /// Introduced by a keyword (`fn`, `func`, `function`). Keyword-less
    /// headers must open their body on the same or the next line.
    keyword: bool,
}

struct Open {
    pending: Pending,
    depth: usize,
}

/// Every function body in `text`, in the order their bodies close.
pub fn scan_functions(text: &str) -> Vec<ScannedFunction> {
    let mut found = Vec::new();
    let mut open: Vec<Open> = Vec::new();
    let mut pending: Option<Pending> = None;
    let mut depth = 0usize;
    let mut in_block_comment = false;

    for (idx, line) in text.lines().enumerate() {
        if let Some(header) = match_header(line) {
            pending = Some(Pending { line: idx, ..header });
        } else if pending
            .as_ref()
            .is_some_and(|p| idx - p.line >= MAX_HEADER_LINES || (!p.keyword && idx > p.line + 1))
        {
            pending = None;
        }

        for ch in code_chars(line, &mut in_block_comment) {
            match ch {
                '{' => {
                    depth += 1;
                    if let Some(p) = pending.take() {
                        open.push(Open { pending: p, depth });
                    }
                }
                '}' => {
                    pending = None;
                    if open.last().is_some_and(|top| top.depth == depth) {
                        if let Some(done) = open.pop() {
                            found.push(ScannedFunction {
                                name: done.pending.name,
                                start_line: done.pending.line as u32,
                                end_line: idx as u32,
                                name_column: done.pending.column,
                            });
                        }
                    }
                    depth = depth.saturating_sub(1);
                }
                // A declaration without a body
                ';' => pending = None,
                _ => {}
            }
        }
    }
    found
}

/// Innermost scanned function containing `line`.
pub fn enclosing_function(text: &str, line: u32) -> Option<ScannedFunction> {
    scan_functions(text)
        .into_iter()
        .filter(|f| f.contains(line))
        .min_by_key(|f| f.end_line - f.start_line)
}

/// Scan results in the shared symbol shape.
pub fn scan_symbols(text: &str) -> Vec<DocumentSymbol> {
    scan_functions(text).iter().map(ScannedFunction::to_symbol).collect()
}

/// Structural characters of `line`, skipping comments, string literals and
/// character literals.
fn code_chars(line: &str, in_block_comment: &mut bool) -> Vec<char> {
    let chars: Vec<char> = line.chars().collect();
    let mut out = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        if *in_block_comment {
            if chars[i] == '*' && chars.get(i + 1) == Some(&'/') {
                *in_block_comment = false;
                i += 2;
            } else {
                i += 1;
            }
            continue;
        }

        match chars[i] {
            '/' if chars.get(i + 1) == Some(&'/') => break,
            '/' if chars.get(i + 1) == Some(&'*') => {
                *in_block_comment = true;
                i += 2;
            }
            quote @ ('"' | '`') => {
                i += 1;
                while i < chars.len() && chars[i] != quote {
                    if chars[i] == '\\' {
                        i += 1;
                    }
                    i += 1;
                }
                i += 1;
            }
            '\'' => {
                // 'x' and '\x' are literals; anything else is a lifetime or label
                if chars.get(i + 1) == Some(&'\\') {
                    let close = chars[i + 2..].iter().take(8).position(|c| *c == '\'');
                    i += close.map_or(1, |p| p + 3);
                } else if chars.get(i + 2) == Some(&'\'') {
                    i += 3;
                } else {
                    i += 1;
                }
            }
            c @ ('{' | '}' | ';') => {
                out.push(c);
                i += 1;
            }
            _ => i += 1,
        }
    }
    out
}

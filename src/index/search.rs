// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Line scoring shared by both search modes.

use std::collections::HashSet;

use super::types::{CodeChunk, ContextLine, SearchHit};

/// Exact-mode results below this similarity are dropped.
pub const EXACT_THRESHOLD: f64 = 0.99;

/// Ceiling for non-verbatim exact-mode scores, so only verbatim lines clear
/// [`EXACT_THRESHOLD`].
const NON_VERBATIM_CEILING: f64 = 0.98;

/// Lowercased word tokens (alphanumeric runs plus `_`).
pub fn tokenize(text: &str) -> HashSet<String> {
    text.split(|c: char| !(c.is_alphanumeric() || c == '_'))
        .filter(|w| !w.is_empty())
        .map(str::to_lowercase)
        .collect()
}

/// Fraction of query words present in `line`.
pub fn token_overlap(query_words: &HashSet<String>, line: &str) -> f64 {
    if query_words.is_empty() {
        return 0.0;
    }
    let line_words = tokenize(line);
    let shared = query_words.iter().filter(|w| line_words.contains(*w)).count();
    shared as f64 / query_words.len() as f64
}

/// Line in the chunk's window with the highest overlap. The anchor line
/// wins ties, then the earliest line.
pub fn best_line<'a>(chunk: &'a CodeChunk, query_words: &HashSet<String>) -> Option<(&'a ContextLine, f64)> {
    let mut best = chunk
        .context_lines
        .iter()
        .find(|l| l.line_number == chunk.line)
        .or_else(|| chunk.context_lines.first())
        .map(|l| (l, token_overlap(query_words, &l.content)))?;

    for line in &chunk.context_lines {
        let score = token_overlap(query_words, &line.content);
        if score > best.1 {
            best = (line, score);
        }
    }
    Some(best)
}

/// Exact-mode scoring of one chunk: a verbatim line scores 1.0 and stops the
/// scan; otherwise the best token overlap, kept below the threshold.
pub fn exact_match(chunk: &CodeChunk, query: &str, query_words: &HashSet<String>) -> Option<SearchHit> {
    let verbatim = (!query.is_empty())
        .then(|| chunk.context_lines.iter().find(|l| l.content.contains(query)))
        .flatten();
    if let Some(line) = verbatim {
        return Some(SearchHit {
            file: chunk.file.clone(),
            line: line.line_number,
            similarity: 1.0,
            text: line.content.clone(),
        });
    }

    let (line, overlap) = best_line(chunk, query_words)?;
    Some(SearchHit {
        file: chunk.file.clone(),
        line: line.line_number,
        similarity: overlap.min(NON_VERBATIM_CEILING),
        text: line.content.clone(),
    })
}

/// De-duplicate by `(file, line)` keeping the best score, sort descending
/// (stable for equal scores) and truncate.
pub fn finalize_hits(mut hits: Vec<SearchHit>, top_k: usize) -> Vec<SearchHit> {
    hits.sort_by(|a, b| b.similarity.total_cmp(&a.similarity));

    let mut seen = HashSet::new();
    hits.retain(|h| seen.insert((h.file.clone(), h.line)));
    hits.truncate(top_k);
    hits
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::chunker::chunk_lines;

    fn hit(file: &str, line: u32, similarity: f64) -> SearchHit {
        SearchHit {
            file: file.to_string(),
            line,
            similarity,
            text: String::new(),
        }
    }

    #[test]
    fn test_tokenize() {
        let words = tokenize("Failed to open user_db: code=42");
        assert!(words.contains("failed"));
        assert!(words.contains("user_db"));
        assert!(words.contains("42"));
        assert!(!words.contains(""));
    }

    #[test]
    fn test_token_overlap_ratio() {
        let q = tokenize("connection refused by peer");
        assert!((token_overlap(&q, "error: connection refused") - 0.5).abs() < 1e-9);
        assert_eq!(token_overlap(&q, "all good"), 0.0);
        assert_eq!(token_overlap(&HashSet::new(), "anything"), 0.0);
    }

    #[test]
    fn test_best_line_prefers_overlap_then_anchor() {
        let src = "fn a() {\n    warn!(\"disk full\");\n    x();\n}";
        let chunks = chunk_lines("a.rs", src, 2);
        let anchor_on_x = chunks.iter().find(|c| c.line == 2).unwrap();

        let (line, score) = best_line(anchor_on_x, &tokenize("disk full")).unwrap();
        assert_eq!(line.line_number, 1);
        assert!((score - 1.0).abs() < 1e-9);

        let (line, _) = best_line(anchor_on_x, &tokenize("nothing matches")).unwrap();
        assert_eq!(line.line_number, 2);
    }

    #[test]
    fn test_exact_match_verbatim_only_clears_threshold() {
        let src = "let a = 1;\nlog(\"user login failed\");\nlog(\"failed login user\");";
        let chunks = chunk_lines("a.rs", src, 0);
        let q = "user login failed";
        let words = tokenize(q);

        let verbatim = exact_match(&chunks[1], q, &words).unwrap();
        assert_eq!(verbatim.similarity, 1.0);
        assert_eq!(verbatim.line, 1);

        let shuffled = exact_match(&chunks[2], q, &words).unwrap();
        assert!(shuffled.similarity < EXACT_THRESHOLD);

        let blank = exact_match(&chunks[1], "", &tokenize("")).unwrap();
        assert_eq!(blank.similarity, 0.0);
    }

    #[test]
    fn test_finalize_dedupes_sorts_truncates() {
        let hits = vec![
            hit("a.rs", 1, 0.5),
            hit("b.rs", 2, 0.9),
            hit("a.rs", 1, 0.7),
            hit("c.rs", 3, 0.9),
            hit("d.rs", 4, 0.1),
        ];
        let out = finalize_hits(hits, 3);
        let keys: Vec<(&str, u32)> = out.iter().map(|h| (h.file.as_str(), h.line)).collect();
        assert_eq!(keys, vec![("b.rs", 2), ("c.rs", 3), ("a.rs", 1)]);
        assert!((out[2].similarity - 0.7).abs() < 1e-9);
    }
}

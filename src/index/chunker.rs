// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Line-anchored chunking.

use super::types::{CodeChunk, ContextLine};

/// Produce one chunk per non-blank line, each carrying `radius` lines of
/// context on either side (clipped at file boundaries).
pub fn chunk_lines(file: &str, content: &str, radius: usize) -> Vec<CodeChunk> {
    let lines: Vec<&str> = content.lines().collect();
    let mut chunks = Vec::new();

    for (anchor, line) in lines.iter().enumerate() {
        if line.trim().is_empty() {
            continue;
        }

        let start = anchor.saturating_sub(radius);
        let end = (anchor + radius).min(lines.len() - 1);

        let context_lines: Vec<ContextLine> = (start..=end)
            .map(|i| ContextLine {
                line_number: i as u32,
                content: lines[i].to_string(),
            })
            .collect();

        chunks.push(CodeChunk {
            file: file.to_string(),
            line: anchor as u32,
            content: lines[start..=end].join("\n"),
            embedding: Vec::new(),
            context_lines,
        });
    }

    chunks
}

#[cfg(test)]
mod tests {
    use super::*;

    const SOURCE: &str = "fn main() {\n\n    let x = 1;\n    println!(\"{}\", x);\n}\n";

    #[test]
    fn test_one_chunk_per_non_blank_line() {
        let chunks = chunk_lines("src/main.rs", SOURCE, 2);
        let non_blank = SOURCE.lines().filter(|l| !l.trim().is_empty()).count();
        assert_eq!(chunks.len(), non_blank);
        let anchors: Vec<u32> = chunks.iter().map(|c| c.line).collect();
        assert_eq!(anchors, vec![0, 2, 3, 4]);
    }

    #[test]
    fn test_context_clipped_at_boundaries() {
        let chunks = chunk_lines("src/main.rs", SOURCE, 2);
        let first = &chunks[0];
        assert_eq!(first.context_lines.first().map(|l| l.line_number), Some(0));
        assert_eq!(first.context_lines.len(), 3);

        let last = chunks.last().unwrap();
        assert_eq!(last.context_lines.last().map(|l| l.line_number), Some(4));
        assert_eq!(last.content, "    let x = 1;\n    println!(\"{}\", x);\n}");
    }

    #[test]
    fn test_lines_in_range() {
        let line_count = SOURCE.lines().count() as u32;
        for chunk in chunk_lines("src/main.rs", SOURCE, 2) {
            assert!(chunk.line < line_count);
            assert!(chunk.context_lines.iter().all(|l| l.line_number < line_count));
        }
    }

    #[test]
    fn test_empty_file() {
        assert!(chunk_lines("empty.rs", "", 2).is_empty());
        assert!(chunk_lines("blank.rs", "\n\n  \n", 2).is_empty());
    }
}

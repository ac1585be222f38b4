// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Finding and weighing variable occurrences in source text.

use std::path::PathBuf;

use serde::Serialize;

use crate::config::VariableWeights;

/// Keywords that declare the name that follows them.
const DECLARATION_KEYWORDS: &[&str] = &[
    "let", "mut", "const", "var", "val", "static", "auto", "final", "local", "my", "our",
];

/// Line openers that make the line a condition.
const CONDITIONAL_KEYWORDS: &[&str] = &[
    "if", "elif", "while", "match", "when", "unless", "switch", "case", "assert", "until",
];

const COMPARISON_OPERATORS: &[&str] = &["==", "!=", "<=", ">=", " < ", " > "];

/// One whole-word appearance of a variable.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Occurrence {
    pub file: PathBuf,
    /// 0-based.
    pub line: u32,
    /// Character offset of the name within the line.
    pub column: u32,
    pub line_text: String,
    pub score: i32,
}

/// Which patterns an occurrence's line matched.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OccurrenceTraits {
    pub assignment: bool,
    pub declaration: bool,
    pub argument: bool,
    pub returned: bool,
    pub conditional: bool,
}

impl OccurrenceTraits {
    /// Classify the occurrence of `name` starting at byte offset `start`.
    pub fn classify(line: &str, start: usize, name: &str) -> Self {
        let before = &line[..start];
        let after = &line[start + name.len()..];

        Self {
            assignment: is_assignment(after),
            declaration: last_word(before).is_some_and(|w| DECLARATION_KEYWORDS.contains(&w)),
            argument: open_parens(before) > 0,
            returned: words(before).any(|w| w == "return"),
            conditional: is_conditional(line),
        }
    }

    pub fn score(&self, weights: &VariableWeights) -> i32 {
        [
            (self.assignment, weights.assignment),
            (self.declaration, weights.declaration),
            (self.argument, weights.argument),
            (self.returned, weights.returned),
            (self.conditional, weights.conditional),
        ]
        .iter()
        .filter(|(hit, _)| *hit)
        .map(|(_, weight)| weight)
        .sum()
    }
}

/// `max(0, base - decay * distance)`.
pub fn proximity_score(line: u32, anchor: u32, weights: &VariableWeights) -> i32 {
    let distance = i64::from(line.abs_diff(anchor));
    let score = i64::from(weights.proximity_base) - i64::from(weights.proximity_decay) * distance;
    score.max(0) as i32
}

fn is_identifier_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '$'
}

/// Byte offsets of whole-word matches of `name` in `line`.
pub fn word_matches(line: &str, name: &str) -> Vec<usize> {
    if name.is_empty() {
        return Vec::new();
    }
    line.match_indices(name)
        .map(|(start, _)| start)
        .filter(|&start| {
            let before_ok = line[..start].chars().next_back().map_or(true, |c| !is_identifier_char(c));
            let after_ok = line[start + name.len()..]
                .chars()
                .next()
                .map_or(true, |c| !is_identifier_char(c));
            before_ok && after_ok
        })
        .collect()
}

/// Every scored occurrence of `name` in `text`, in reading order.
///
/// Proximity applies only when `anchor` is given.
pub fn scan_text(
    file: impl Into<PathBuf>,
    text: &str,
    name: &str,
    anchor: Option<u32>,
    weights: &VariableWeights,
) -> Vec<Occurrence> {
    let file = file.into();
    let mut occurrences = Vec::new();

    for (idx, line) in text.lines().enumerate() {
        let line_no = idx as u32;
        for start in word_matches(line, name) {
            let traits = OccurrenceTraits::classify(line, start, name);
            let proximity = anchor.map_or(0, |a| proximity_score(line_no, a, weights));
            occurrences.push(Occurrence {
                file: file.clone(),
                line: line_no,
                column: line[..start].chars().count() as u32,
                line_text: line.to_string(),
                score: traits.score(weights) + proximity,
            });
        }
    }
    occurrences
}

/// Highest score; the earliest wins a tie.
pub fn best_occurrence(occurrences: &[Occurrence]) -> Option<&Occurrence> {
    occurrences.iter().fold(None, |best: Option<&Occurrence>, o| match best {
        Some(b) if b.score >= o.score => Some(b),
        _ => Some(o),
    })
}

/// `name = ...` or `name: Type = ...`, but not `==` or `=>`.
fn is_assignment(after: &str) -> bool {
    let rest = after.trim_start();
    let rest = match rest.strip_prefix(':') {
        // Rust/TypeScript annotation: look for the `=` after the type
        Some(annotated) if !annotated.starts_with(':') => match annotated.find('=') {
            Some(pos) => &annotated[pos..],
            None => return false,
        },
        _ => rest,
    };
    let rest = ["+=", "-=", "*=", "/=", "|=", "&=", ":="]
        .iter()
        .find_map(|op| rest.strip_prefix(op))
        .map_or(rest, |_| "=");
    rest.starts_with('=') && !rest.starts_with("==") && !rest.starts_with("=>")
}

fn is_conditional(line: &str) -> bool {
    let first = words(line).next();
    first.is_some_and(|w| CONDITIONAL_KEYWORDS.contains(&w))
        || line.trim_start().starts_with("} else if")
        || COMPARISON_OPERATORS.iter().any(|op| line.contains(op))
}

fn words(text: &str) -> impl Iterator<Item = &str> {
    text.split(|c: char| !is_identifier_char(c)).filter(|w| !w.is_empty())
}

fn last_word(text: &str) -> Option<&str> {
    let trimmed = text.trim_end();
    // `let x`, not `foo.x` or `(x`
    if trimmed.len() == text.len() && !text.is_empty() {
        return None;
    }
    words(trimmed).last().filter(|w| trimmed.ends_with(w))
}

fn open_parens(before: &str) -> i32 {
    before.chars().fold(0, |depth, c| match c {
        '(' => depth + 1,
        ')' => depth - 1,
        _ => depth,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn weights() -> VariableWeights {
        VariableWeights::default()
    }

    fn traits(line: &str, name: &str) -> OccurrenceTraits {
        let start = word_matches(line, name)[0];
        OccurrenceTraits::classify(line, start, name)
    }

    #[test]
    fn test_whole_word_only() {
        assert_eq!(word_matches("let blkno = req.blkno_hi + blkno;", "blkno"), vec![4, 27]);
        assert!(word_matches("my_blkno", "blkno").is_empty());
        assert!(word_matches("blkno2", "blkno").is_empty());
        assert!(word_matches("anything", "").is_empty());
    }

    #[test]
    fn test_traits() {
        let t = traits("    let blkno = req.blkno;", "blkno");
        assert!(t.assignment && t.declaration);
        assert!(!t.argument && !t.returned && !t.conditional);

        assert!(traits("let mut count: usize = 0;", "count").declaration);
        assert!(traits("let mut count: usize = 0;", "count").assignment);
        assert!(traits("total += 1;", "total").assignment);
        assert!(!traits("if total == 3 {", "total").assignment);
        assert!(traits("if total == 3 {", "total").conditional);
        assert!(traits("read_page(dev, blkno, buf)", "blkno").argument);
        assert!(!traits("read_page(dev); blkno", "blkno").argument);
        assert!(traits("    return blkno;", "blkno").returned);
        assert!(traits("while blkno < limit {", "blkno").conditional);
        assert!(!traits("req.blkno = 4;", "blkno").declaration);
        assert!(!traits("Some(x) => x,", "x").assignment);
    }

    #[test]
    fn test_additive_score() {
        let w = weights();
        // assignment + declaration
        assert_eq!(traits("let blkno = 1;", "blkno").score(&w), 70);
        // argument + returned
        assert_eq!(traits("return parse(blkno);", "blkno").score(&w), 55);
        assert_eq!(traits("blkno;", "blkno").score(&w), 0);
    }

    #[test]
    fn test_proximity_decays_linearly() {
        let w = weights();
        assert_eq!(proximity_score(412, 412, &w), 50);
        assert_eq!(proximity_score(405, 412, &w), 36);
        assert_eq!(proximity_score(430, 412, &w), 14);
        assert_eq!(proximity_score(500, 412, &w), 0);
    }

    #[test]
    fn test_declaration_near_anchor_beats_declaration_alone() {
        let mut lines = vec![String::new(); 31];
        lines[0] = "let blkno = 1;".to_string();
        lines[30] = "let blkno = 2;".to_string();
        let text = lines.join("\n");
        let occurrences = scan_text("a.rs", &text, "blkno", Some(30), &weights());
        assert_eq!(occurrences.len(), 2);
        assert!(occurrences[1].score > occurrences[0].score);
        assert_eq!(best_occurrence(&occurrences).unwrap().line, 30);
    }

    #[test]
    fn test_assignment_near_anchor_beats_bare_reference() {
        let mut lines = vec!["".to_string(); 421];
        lines[405] = "    let blkno = req.blkno;".to_string();
        lines[420] = "    blkno;".to_string();
        let occurrences = scan_text("page_service.rs", &lines.join("\n"), "blkno", Some(412), &weights());

        let best = best_occurrence(&occurrences).unwrap();
        assert_eq!(best.line, 405);
        assert_eq!(best.score, 40 + 30 + 36);
        assert_eq!(occurrences.last().unwrap().score, 34);
    }

    #[test]
    fn test_ties_keep_first() {
        let occurrences = scan_text("a.rs", "x;\nx;\n", "x", None, &weights());
        assert_eq!(best_occurrence(&occurrences).unwrap().line, 0);
        assert!(best_occurrence(&[]).is_none());
    }
}

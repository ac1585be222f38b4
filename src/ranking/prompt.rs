// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Prompt construction for caller ranking.

use std::fmt::Write;

use serde::Serialize;

use super::types::CallerCandidate;

/// Everything the scorer sees for one ranking.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RankingRequest {
    /// The log line being explained.
    pub log_line: String,
    /// The source line that emitted it.
    pub anchor: String,
    /// Surrounding log lines, oldest first.
    pub history: Vec<String>,
    pub candidates: Vec<CallerCandidate>,
}

/// At most `window` log lines centred on `current`.
///
/// When `current` is not among `all` the most recent lines are used.
pub fn history_window(all: &[String], current: &str, window: usize) -> Vec<String> {
    if window == 0 || all.is_empty() {
        return Vec::new();
    }
    let end = match all.iter().position(|l| l.trim() == current.trim()) {
        Some(i) => (i + window / 2 + 1).min(all.len()),
        None => all.len(),
    };
    let start = end.saturating_sub(window);
    all[start..end].to_vec()
}

pub const SYSTEM_PROMPT: &str = "You are an expert debugging assistant. Given a log line, \
the source line that emitted it and the call sites that can reach that line, estimate how \
likely each call site is to be the one that actually led to this log line. Use the \
surrounding log lines as evidence of what the program was doing.";

/// The user message for a ranking request.
pub fn build_prompt(request: &RankingRequest) -> String {
    let mut prompt = String::new();

    let _ = writeln!(prompt, "LOG LINE:\n```\n{}\n```\n", request.log_line.trim_end());
    let _ = writeln!(prompt, "EMITTED BY:\n```\n{}\n```\n", request.anchor.trim_end());

    if !request.history.is_empty() {
        let _ = writeln!(prompt, "SURROUNDING LOGS:\n```");
        for line in &request.history {
            let _ = writeln!(prompt, "{}", line.trim_end());
        }
        let _ = writeln!(prompt, "```\n");
    }

    let _ = writeln!(prompt, "CANDIDATE CALLERS:");
    for (i, candidate) in request.candidates.iter().enumerate() {
        let _ = writeln!(
            prompt,
            "{}. {} in `{}`\n```\n{}\n```",
            i + 1,
            candidate.key(),
            candidate.function_name,
            candidate.code.trim_end()
        );
    }

    let _ = write!(
        prompt,
        "\nRank every candidate with the rank_callers tool. Give each a confidence between 0 and 1 \
and a one-sentence explanation, and identify it by its location exactly as written above."
    );
    prompt
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn lines(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("line {}", i)).collect()
    }

    #[test]
    fn test_history_window_centred() {
        let all = lines(100);
        let window = history_window(&all, "line 50", 10);
        assert_eq!(window.len(), 10);
        assert_eq!(window.first().unwrap(), "line 46");
        assert_eq!(window.last().unwrap(), "line 55");
    }

    #[test]
    fn test_history_window_edges() {
        let all = lines(5);
        assert_eq!(history_window(&all, "line 0", 4), lines(3));
        assert_eq!(history_window(&all, "not there", 2), vec!["line 3", "line 4"]);
        assert!(history_window(&all, "line 1", 0).is_empty());
        assert_eq!(history_window(&all, "line 2", 50).len(), 5);
    }

    #[test]
    fn test_prompt_lists_candidates_by_key() {
        let request = RankingRequest {
            log_line: "ERROR Operation canceled (os error 125)".to_string(),
            anchor: "error!(\"Operation canceled\");".to_string(),
            history: vec!["INFO start".to_string()],
            candidates: vec![CallerCandidate {
                file_path: PathBuf::from("src/net.rs"),
                line_number: 9,
                code: "handle(req);".to_string(),
                function_name: "dispatch".to_string(),
                function_range: None,
            }],
        };
        let prompt = build_prompt(&request);
        assert!(prompt.contains("1. src/net.rs:10 in `dispatch`"));
        assert!(prompt.contains("SURROUNDING LOGS"));
        assert!(prompt.contains("INFO start"));
        assert!(prompt.contains("rank_callers"));
    }
}

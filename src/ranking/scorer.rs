// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! The scoring seam and alignment of scores to candidates.

use std::collections::HashMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::prompt::RankingRequest;
use super::types::{CallerCandidate, RankedCaller};
use crate::error::ProviderError;

/// One verdict from the scorer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredCandidate {
    /// `path:line` of the candidate, when the scorer names it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    pub confidence: f64,
    #[serde(default)]
    pub explanation: String,
}

impl ScoredCandidate {
    pub fn new(confidence: f64, explanation: impl Into<String>) -> Self {
        Self {
            key: None,
            confidence,
            explanation: explanation.into(),
        }
    }

    pub fn keyed(key: impl Into<String>, confidence: f64, explanation: impl Into<String>) -> Self {
        Self {
            key: Some(key.into()),
            ..Self::new(confidence, explanation)
        }
    }
}

/// Assigns a confidence to each caller candidate.
#[async_trait]
pub trait CallerScorer: Send + Sync {
    fn name(&self) -> &str;

    /// Verdicts, in candidate order or keyed by `path:line`.
    async fn rank_callers(&self, request: &RankingRequest) -> Result<Vec<ScoredCandidate>, ProviderError>;
}

const UNRANKED: &str = "not ranked";

/// Pair scores with candidates.
///
/// When every score carries a key that matches a candidate, keys decide;
/// otherwise scores apply in order. Candidates left without a score get
/// confidence 0. Confidences are clamped to `[0, 1]`.
pub fn align_scores(candidates: Vec<CallerCandidate>, scores: Vec<ScoredCandidate>) -> Vec<RankedCaller> {
    let keys: Vec<String> = candidates.iter().map(CallerCandidate::key).collect();
    let keyed = !scores.is_empty()
        && scores
            .iter()
            .all(|s| s.key.as_ref().is_some_and(|k| keys.iter().any(|c| c == k.trim())));

    if keyed {
        debug!(scores = scores.len(), "aligning scores by key");
        let mut by_key: HashMap<String, ScoredCandidate> = HashMap::new();
        for score in scores {
            if let Some(key) = score.key.clone() {
                by_key.entry(key.trim().to_string()).or_insert(score);
            }
        }
        candidates
            .into_iter()
            .zip(keys)
            .map(|(candidate, key)| ranked(candidate, by_key.remove(&key)))
            .collect()
    } else {
        debug!(scores = scores.len(), "aligning scores by order");
        let mut scores = scores.into_iter();
        candidates
            .into_iter()
            .map(|candidate| ranked(candidate, scores.next()))
            .collect()
    }
}

fn ranked(candidate: CallerCandidate, score: Option<ScoredCandidate>) -> RankedCaller {
    match score {
        Some(score) => RankedCaller {
            candidate,
            confidence: clamp_confidence(score.confidence),
            explanation: score.explanation,
        },
        None => RankedCaller {
            candidate,
            confidence: 0.0,
            explanation: UNRANKED.to_string(),
        },
    }
}

fn clamp_confidence(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn candidate(file: &str, line: u32) -> CallerCandidate {
        CallerCandidate {
            file_path: PathBuf::from(file),
            line_number: line,
            code: String::new(),
            function_name: "f".to_string(),
            function_range: None,
        }
    }

    #[test]
    fn test_align_by_order() {
        let ranked = align_scores(
            vec![candidate("a.rs", 0), candidate("b.rs", 1), candidate("c.rs", 2)],
            vec![ScoredCandidate::new(0.4, "x"), ScoredCandidate::new(1.7, "y")],
        );
        assert_eq!(ranked[0].confidence, 0.4);
        assert_eq!(ranked[1].confidence, 1.0);
        assert_eq!(ranked[2].confidence, 0.0);
        assert_eq!(ranked[2].explanation, UNRANKED);
    }

    #[test]
    fn test_align_by_key() {
        let ranked = align_scores(
            vec![candidate("a.rs", 0), candidate("b.rs", 4)],
            vec![
                ScoredCandidate::keyed("b.rs:5", 0.9, "direct"),
                ScoredCandidate::keyed(" a.rs:1 ", 0.2, "unlikely"),
            ],
        );
        assert_eq!(ranked[0].candidate.file_path, PathBuf::from("a.rs"));
        assert_eq!(ranked[0].confidence, 0.2);
        assert_eq!(ranked[1].confidence, 0.9);
        assert_eq!(ranked[1].explanation, "direct");
    }

    #[test]
    fn test_unknown_key_falls_back_to_order() {
        let ranked = align_scores(
            vec![candidate("a.rs", 0), candidate("b.rs", 4)],
            vec![
                ScoredCandidate::keyed("elsewhere.rs:3", 0.6, "?"),
                ScoredCandidate::new(f64::NAN, "nan"),
            ],
        );
        assert_eq!(ranked[0].confidence, 0.6);
        assert_eq!(ranked[1].confidence, 0.0);
    }
}

// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Caller candidates and their ranked form.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// 0-based, inclusive line span of a function.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FunctionRange {
    pub start_line: u32,
    pub end_line: u32,
}

impl FunctionRange {
    pub fn new(start_line: u32, end_line: u32) -> Self {
        Self { start_line, end_line }
    }

    pub fn contains(&self, line: u32) -> bool {
        line >= self.start_line && line <= self.end_line
    }
}

/// A call site that may have led to the log-emitting function.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallerCandidate {
    pub file_path: PathBuf,
    /// 0-based.
    pub line_number: u32,
    /// Call site with one line of context on each side.
    pub code: String,
    pub function_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub function_range: Option<FunctionRange>,
}

impl CallerCandidate {
    /// `path:line` with a 1-based line, as shown to the scorer.
    pub fn key(&self) -> String {
        format!("{}:{}", self.file_path.display(), self.line_number + 1)
    }
}

/// A candidate with the scorer's verdict.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RankedCaller {
    #[serde(flatten)]
    pub candidate: CallerCandidate,
    /// In `[0, 1]`.
    pub confidence: f64,
    pub explanation: String,
}

/// Ranked callers for one log entry, highest confidence first.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallerAnalysis {
    pub ranked_callers: Vec<RankedCaller>,
}

impl CallerAnalysis {
    /// Sort descending by confidence. Equal confidences keep input order.
    pub fn from_unsorted(mut ranked_callers: Vec<RankedCaller>) -> Self {
        ranked_callers.sort_by(|a, b| {
            b.confidence
                .partial_cmp(&a.confidence)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        Self { ranked_callers }
    }

    pub fn top(&self) -> Option<&RankedCaller> {
        self.ranked_callers.first()
    }

    /// Callers strictly above `threshold`.
    pub fn focused(&self, threshold: f64) -> impl Iterator<Item = &RankedCaller> {
        self.ranked_callers
            .iter()
            .filter(move |caller| caller.confidence > threshold)
    }

    pub fn is_empty(&self) -> bool {
        self.ranked_callers.is_empty()
    }
}

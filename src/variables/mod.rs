// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Variable occurrence lookup.
//!
//! Candidate files are tried in order (the active file, files matching the
//! log's module hint, files the index suggests) and the first one that
//! mentions the variable wins. Within it every whole-word occurrence is
//! scored with additive weights from [`VariableWeights`](crate::config::VariableWeights).

mod locator;
mod scoring;

pub use locator::{hint_segments, VariableLocator, VariableMatch, VariableQuery, SEARCH_TOP_K};
pub use scoring::{
    best_occurrence, proximity_score, scan_text, word_matches, Occurrence, OccurrenceTraits,
};

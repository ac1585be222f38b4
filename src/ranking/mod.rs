// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Caller ranking.
//!
//! A [`CallerScorer`] (Claude, via [`AnthropicScorer`]) assigns each caller
//! candidate a confidence; [`CallerRanker`] builds the request, aligns and
//! sorts the answers and caches them by log fingerprint.

mod anthropic;
mod prompt;
mod ranker;
mod scorer;
mod types;

pub use anthropic::AnthropicScorer;
pub use prompt::{build_prompt, history_window, RankingRequest, SYSTEM_PROMPT};
pub use ranker::CallerRanker;
pub use scorer::{align_scores, CallerScorer, ScoredCandidate};
pub use types::{CallerAnalysis, CallerCandidate, FunctionRange, RankedCaller};

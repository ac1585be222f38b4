// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Cached LLM ranking of caller candidates.

use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, info, instrument, warn};

#[cfg(feature = "telemetry")]
use crate::telemetry::metrics::GLOBAL_METRICS;

use super::prompt::{history_window, RankingRequest};
use super::scorer::{align_scores, CallerScorer};
use super::types::{CallerAnalysis, CallerCandidate};
use crate::error::EngineError;
use crate::logs::fingerprint;
use crate::state::StateStore;

/// Ranks caller candidates for a log line, caching by fingerprint.
pub struct CallerRanker {
    scorer: Arc<dyn CallerScorer>,
    store: Arc<StateStore>,
    history_window: usize,
}

impl CallerRanker {
    pub fn new(scorer: Arc<dyn CallerScorer>, store: Arc<StateStore>, history_window: usize) -> Self {
        Self {
            scorer,
            store,
            history_window,
        }
    }

    /// Rank `candidates` as callers of the code that emitted `current_log_line`.
    ///
    /// A cached analysis for the same `(log line, anchor)` fingerprint is
    /// returned without contacting the scorer. A scorer failure is an
    /// [`EngineError::Analysis`] and leaves the cache as it was.
    #[instrument(skip_all, fields(candidates = candidates.len()))]
    pub async fn analyze_callers(
        &self,
        current_log_line: &str,
        anchor: &str,
        all_log_lines: &[String],
        candidates: Vec<CallerCandidate>,
    ) -> Result<CallerAnalysis, EngineError> {
        let key = fingerprint(current_log_line, anchor);

        if let Some(cached) = self.cached(&key) {
            debug!(fingerprint = %key, "using cached caller analysis");
            return Ok(cached);
        }
        if candidates.is_empty() {
            return Ok(CallerAnalysis::default());
        }

        let request = RankingRequest {
            log_line: current_log_line.to_string(),
            anchor: anchor.to_string(),
            history: history_window(all_log_lines, current_log_line, self.history_window),
            candidates,
        };

        let start = Instant::now();
        let scores = self.scorer.rank_callers(&request).await.map_err(|e| {
            warn!(scorer = self.scorer.name(), error = %e, "caller ranking failed");
            EngineError::Analysis(e.to_string())
        })?;
        #[cfg(feature = "telemetry")]
        GLOBAL_METRICS.record_operation("ranking.analyze_callers", start.elapsed());

        let analysis = CallerAnalysis::from_unsorted(align_scores(request.candidates, scores));
        info!(
            fingerprint = %key,
            callers = analysis.ranked_callers.len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "ranked callers"
        );

        if let Err(e) = self.store.store_analysis(&key, &analysis) {
            warn!(fingerprint = %key, error = %e, "failed to cache caller analysis");
        }
        Ok(analysis)
    }

    fn cached(&self, key: &str) -> Option<CallerAnalysis> {
        let hit = match self.store.cached_analysis(key) {
            Ok(hit) => hit,
            Err(e) => {
                warn!(fingerprint = %key, error = %e, "caller analysis cache unavailable");
                None
            }
        };
        #[cfg(feature = "telemetry")]
        GLOBAL_METRICS.record_cache_lookup(hit.is_some());
        hit
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ProviderError;
    use crate::ranking::ScoredCandidate;
    use async_trait::async_trait;
    use std::path::PathBuf;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Scores candidates in order with preset confidences and counts calls.
    struct CountingScorer {
        confidences: Vec<f64>,
        calls: AtomicUsize,
        fail: bool,
        last_history: Mutex<Vec<String>>,
    }

    impl CountingScorer {
        fn new(confidences: Vec<f64>) -> Self {
            Self {
                confidences,
                calls: AtomicUsize::new(0),
                fail: false,
                last_history: Mutex::new(Vec::new()),
            }
        }

        fn failing() -> Self {
            Self { fail: true, ..Self::new(Vec::new()) }
        }
    }

    #[async_trait]
    impl CallerScorer for CountingScorer {
        fn name(&self) -> &str {
            "counting"
        }

        async fn rank_callers(&self, request: &RankingRequest) -> Result<Vec<ScoredCandidate>, ProviderError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            *self.last_history.lock().unwrap() = request.history.clone();
            if self.fail {
                return Err(ProviderError::RateLimited("slow down".to_string()));
            }
            Ok(self
                .confidences
                .iter()
                .map(|c| ScoredCandidate::new(*c, format!("scored {}", c)))
                .collect())
        }
    }

    fn candidates() -> Vec<CallerCandidate> {
        ["dispatch", "retry", "warmup"]
            .iter()
            .enumerate()
            .map(|(i, name)| CallerCandidate {
                file_path: PathBuf::from("src/network/dispatch.rs"),
                line_number: 10 * i as u32,
                code: format!("{}();", name),
                function_name: name.to_string(),
                function_range: None,
            })
            .collect()
    }

    fn logs() -> Vec<String> {
        (0..30).map(|i| format!("INFO step {}", i)).collect()
    }

    #[tokio::test]
    async fn test_second_call_served_from_cache() {
        let scorer = Arc::new(CountingScorer::new(vec![0.3, 0.9, 0.6]));
        let store = Arc::new(StateStore::in_memory().unwrap());
        let ranker = CallerRanker::new(scorer.clone(), store, 4);

        let first = ranker
            .analyze_callers("ERROR io failed for 1234", "error!(..)", &logs(), candidates())
            .await
            .unwrap();
        let names: Vec<&str> = first
            .ranked_callers
            .iter()
            .map(|r| r.candidate.function_name.as_str())
            .collect();
        assert_eq!(names, vec!["retry", "warmup", "dispatch"]);

        // Same static content, different id
        let second = ranker
            .analyze_callers("ERROR io failed for 9876", "error!(..)", &logs(), candidates())
            .await
            .unwrap();
        assert_eq!(first, second);
        assert_eq!(scorer.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_history_window_is_bounded() {
        let scorer = Arc::new(CountingScorer::new(vec![0.5, 0.5, 0.5]));
        let ranker = CallerRanker::new(scorer.clone(), Arc::new(StateStore::in_memory().unwrap()), 4);

        ranker
            .analyze_callers("INFO step 15", "info!(..)", &logs(), candidates())
            .await
            .unwrap();
        let history = scorer.last_history.lock().unwrap().clone();
        assert_eq!(history, vec!["INFO step 14", "INFO step 15", "INFO step 16", "INFO step 17"]);
    }

    #[tokio::test]
    async fn test_failure_keeps_cached_analysis() {
        let store = Arc::new(StateStore::in_memory().unwrap());
        let good = CallerRanker::new(Arc::new(CountingScorer::new(vec![0.8, 0.1, 0.2])), store.clone(), 4);
        let cached = good
            .analyze_callers("ERROR disk full", "error!(..)", &[], candidates())
            .await
            .unwrap();

        let failing = Arc::new(CountingScorer::failing());
        let bad = CallerRanker::new(failing.clone(), store.clone(), 4);
        let err = bad
            .analyze_callers("ERROR other failure", "error!(..)", &[], candidates())
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::Analysis(_)));
        assert!(err.is_recoverable());

        let key = fingerprint("ERROR disk full", "error!(..)");
        assert_eq!(store.cached_analysis(&key).unwrap(), Some(cached));
        assert!(store.cached_analysis(&fingerprint("ERROR other failure", "error!(..)")).unwrap().is_none());
    }

    #[tokio::test]
    async fn test_no_candidates_skips_scorer() {
        let scorer = Arc::new(CountingScorer::new(Vec::new()));
        let ranker = CallerRanker::new(scorer.clone(), Arc::new(StateStore::in_memory().unwrap()), 4);
        let analysis = ranker.analyze_callers("x", "y", &[], Vec::new()).await.unwrap();
        assert!(analysis.is_empty());
        assert_eq!(scorer.calls.load(Ordering::SeqCst), 0);
    }
}

// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! End-to-end pipeline: index, resolve, discover callers, rank, cache.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tempfile::TempDir;

use traceback::embeddings::{Embedding, EmbeddingProvider};
use traceback::engine::{Engine, EngineOptions};
use traceback::error::ProviderError;
use traceback::logs::LogEntry;
use traceback::lsp::{path_to_uri, DocumentSymbol, Location, LspResult, Position, Range, WorkspaceSymbol};
use traceback::ranking::{CallerScorer, RankingRequest, ScoredCandidate};
use traceback::resolver::Resolution;
use traceback::state::StateStore;
use traceback::symbols::{FsTextBackend, SymbolBackend};
use traceback::variables::VariableQuery;
use traceback::{EngineError, TracebackConfig};

const POOL_JS: &str = "function acquire(pool) {
  if (!pool.free) {
    log.error('pool exhausted waiting for connection');
  }
  return pool.take();
}
";

const HANDLERS_JS: &str = "function handleRequest(req) {
  const conn = acquire(req.pool);
  return conn.query(req.sql);
}

function warmUp(pool) {
  acquire(pool);
}
";

/// Bag-of-words vectors, one bucket per hashed word.
struct WordEmbedder;

#[async_trait]
impl EmbeddingProvider for WordEmbedder {
    fn name(&self) -> &str {
        "words"
    }

    fn model(&self) -> &str {
        "bag-of-words"
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Embedding>, ProviderError> {
        Ok(texts
            .iter()
            .map(|text| {
                let mut v = vec![0.0f32; 128];
                for word in text
                    .split(|c: char| !c.is_alphanumeric())
                    .filter(|w| !w.is_empty())
                {
                    let h = word
                        .to_lowercase()
                        .bytes()
                        .fold(17usize, |acc, b| acc.wrapping_mul(31).wrapping_add(b as usize));
                    v[h % 128] += 1.0;
                }
                v
            })
            .collect())
    }

    async fn is_available(&self) -> bool {
        true
    }
}

/// Knows that `acquire` is called twice from handlers.js.
struct FixtureReferences {
    root: PathBuf,
}

#[async_trait]
impl SymbolBackend for FixtureReferences {
    fn name(&self) -> &str {
        "fixture"
    }

    async fn document_symbols(&self, _path: &Path) -> LspResult<Vec<DocumentSymbol>> {
        Ok(Vec::new())
    }

    async fn workspace_symbols(&self, _query: &str) -> LspResult<Vec<WorkspaceSymbol>> {
        Ok(Vec::new())
    }

    async fn references(&self, path: &Path, position: Position) -> LspResult<Vec<Location>> {
        if !path.ends_with("src/pool.js") || position.line != 0 {
            return Ok(Vec::new());
        }
        let handlers = path_to_uri(&self.root.join("src/handlers.js"));
        Ok(vec![
            Location::new(path_to_uri(path), Range::new(Position::new(0, 9), Position::new(0, 16))),
            Location::new(handlers.clone(), Range::new(Position::new(1, 15), Position::new(1, 22))),
            Location::new(handlers, Range::new(Position::new(6, 2), Position::new(6, 9))),
        ])
    }
}

/// Confident about one function, doubtful about the rest.
struct PreferFunction {
    name: &'static str,
    calls: AtomicUsize,
}

#[async_trait]
impl CallerScorer for PreferFunction {
    fn name(&self) -> &str {
        "prefer"
    }

    async fn rank_callers(&self, request: &RankingRequest) -> Result<Vec<ScoredCandidate>, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(request
            .candidates
            .iter()
            .map(|c| {
                if c.function_name == self.name {
                    ScoredCandidate::keyed(c.key(), 0.9, "called during startup")
                } else {
                    ScoredCandidate::keyed(c.key(), 0.2, "request path")
                }
            })
            .collect())
    }
}

fn fixture() -> TempDir {
    let temp = TempDir::new().unwrap();
    std::fs::create_dir_all(temp.path().join("src")).unwrap();
    std::fs::write(temp.path().join("src/pool.js"), POOL_JS).unwrap();
    std::fs::write(temp.path().join("src/handlers.js"), HANDLERS_JS).unwrap();
    temp
}

fn engine(root: &Path, scorer: Arc<PreferFunction>) -> Engine {
    let config = TracebackConfig {
        repo_root: Some(root.to_path_buf()),
        ..TracebackConfig::default()
    };
    Engine::new(EngineOptions {
        config,
        embedding_provider: Arc::new(WordEmbedder),
        symbol_backend: Arc::new(FixtureReferences {
            root: root.to_path_buf(),
        }),
        text_backend: Arc::new(FsTextBackend),
        scorer: Some(scorer),
        state: Arc::new(StateStore::in_memory().unwrap()),
        progress: None,
    })
    .unwrap()
}

fn scorer() -> Arc<PreferFunction> {
    Arc::new(PreferFunction {
        name: "warmUp",
        calls: AtomicUsize::new(0),
    })
}

#[tokio::test]
async fn test_analyze_ranks_callers_and_caches() {
    let temp = fixture();
    let scorer = scorer();
    let engine = engine(temp.path(), scorer.clone());
    let stats = engine.build_index().await.unwrap();
    assert_eq!(stats.files_indexed, 2);

    let history = vec![
        "request started".to_string(),
        "pool exhausted waiting for connection".to_string(),
    ];
    let mut entry = LogEntry::from_raw("[ERROR] pool exhausted waiting for connection")
        .with_message("pool exhausted waiting for connection");
    let result = engine.analyze_entry(&mut entry, &history).await.unwrap().unwrap();

    assert_eq!(result.location.relative_path, "src/pool.js");
    assert_eq!(result.location.line, 2);

    let callers = &result.analysis.ranked_callers;
    assert_eq!(callers.len(), 2);
    assert_eq!(callers[0].candidate.function_name, "warmUp");
    assert_eq!(callers[0].candidate.line_number, 6);
    assert_eq!(callers[1].candidate.function_name, "handleRequest");
    assert!(callers[0].confidence > callers[1].confidence);
    assert_eq!(result.analysis.focused(0.7).count(), 1);
    assert_eq!(entry.caller_analysis(), Some(&result.analysis));

    // Same line again: served from the cache
    let mut again = LogEntry::from_raw("[ERROR] pool exhausted waiting for connection")
        .with_message("pool exhausted waiting for connection");
    let cached = engine.analyze_entry(&mut again, &history).await.unwrap().unwrap();
    assert_eq!(cached.analysis, result.analysis);
    assert_eq!(scorer.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_exact_and_ranked_locate() {
    let temp = fixture();
    let engine = engine(temp.path(), scorer());
    engine.build_index().await.unwrap();

    match engine.locate("exact: return pool.take();", false).await.unwrap() {
        Resolution::Best(Some(location)) => {
            assert_eq!(location.relative_path, "src/pool.js");
            assert_eq!(location.line, 4);
            assert_eq!(location.similarity, 1.0);
        }
        other => panic!("unexpected resolution: {:?}", other),
    }

    match engine.locate("pool exhausted", true).await.unwrap() {
        Resolution::All(locations) => {
            assert!(!locations.is_empty());
            assert!(locations
                .windows(2)
                .all(|w| w[0].similarity >= w[1].similarity));
            assert!(locations.iter().all(|l| l.preview.is_some()));
        }
        other => panic!("unexpected resolution: {:?}", other),
    }
}

#[tokio::test]
async fn test_callers_without_index() {
    let temp = fixture();
    let engine = engine(temp.path(), scorer());

    let callers = engine.find_callers(Path::new("src/pool.js"), 2).await.unwrap();
    let lines: Vec<u32> = callers.iter().map(|c| c.line_number).collect();
    assert_eq!(lines, vec![1, 6]);
    assert!(callers[0].code.contains("acquire(req.pool)"));
}

#[tokio::test]
async fn test_stack_trace_through_engine() {
    let temp = fixture();
    let engine = engine(temp.path(), scorer());

    let stack = engine.stack_trace(Path::new("src/pool.js"), 2, 10).await.unwrap();
    let frames: Vec<(&str, u32)> = stack
        .iter()
        .map(|f| (f.function_name.as_str(), f.line_number))
        .collect();
    assert_eq!(frames, vec![("handleRequest", 1), ("acquire", 2)]);
    assert!(stack[0].file_path.ends_with("src/handlers.js"));
}

#[tokio::test]
async fn test_panic_location_resolves_without_index() {
    let temp = fixture();
    let engine = engine(temp.path(), scorer());

    match engine.locate("Error: pool exhausted\n    at acquire (/srv/app/src/pool.js:3:9)", false).await.unwrap() {
        Resolution::Best(Some(location)) => {
            assert_eq!(location.relative_path, "src/pool.js");
            assert_eq!(location.line, 2);
        }
        other => panic!("unexpected resolution: {:?}", other),
    }
}

#[tokio::test]
async fn test_variable_lookup_by_hint() {
    let temp = fixture();
    let engine = engine(temp.path(), scorer());

    let found = engine
        .locate_variable(&VariableQuery::new("conn").with_hint("handlers"))
        .await
        .unwrap()
        .unwrap();
    assert!(found.best.file.ends_with("src/handlers.js"));
    assert_eq!(found.best.line, 1);
    assert_eq!(found.all.len(), 2);
}

#[tokio::test]
async fn test_locate_before_indexing_is_not_ready() {
    let temp = fixture();
    let engine = engine(temp.path(), scorer());
    let err = engine.locate("pool exhausted", false).await.unwrap_err();
    assert!(matches!(err, EngineError::NotReady(_)));
}

// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! SQLite-backed key/value state, secrets and the caller-analysis cache.

use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
#[cfg(feature = "telemetry")]
use std::time::Instant;

use rusqlite::{params, Connection, OptionalExtension};
use tracing::{debug, warn};

use crate::error::EngineError;
use crate::ranking::CallerAnalysis;

#[cfg(feature = "telemetry")]
use crate::telemetry::metrics::GLOBAL_METRICS;

/// Current schema version.
pub const SCHEMA_VERSION: u32 = 1;

/// Environment variable that overrides the stored LLM key.
pub const ANTHROPIC_API_KEY_ENV: &str = "ANTHROPIC_API_KEY";

/// Secret name for the LLM key.
pub const ANTHROPIC_API_KEY_SECRET: &str = "anthropic_api_key";

/// Well-known state entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StateKey {
    TraceId,
    Dataset,
    Endpoint,
}

impl StateKey {
    pub const ALL: [StateKey; 3] = [StateKey::TraceId, StateKey::Dataset, StateKey::Endpoint];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::TraceId => "trace_id",
            Self::Dataset => "dataset",
            Self::Endpoint => "endpoint",
        }
    }
}

impl std::str::FromStr for StateKey {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "trace_id" => Ok(Self::TraceId),
            "dataset" => Ok(Self::Dataset),
            "endpoint" => Ok(Self::Endpoint),
            other => Err(EngineError::InvalidInput(format!("unknown state key: {}", other))),
        }
    }
}

/// Persistent store. The connection is guarded so the store can be shared
/// across tasks behind an `Arc`.
pub struct StateStore {
    conn: Mutex<Connection>,
    path: Option<PathBuf>,
}

impl StateStore {
    /// Open or create a store at `db_path`.
    pub fn open_at(db_path: &Path) -> Result<Self, EngineError> {
        #[cfg(feature = "telemetry")]
        let start = Instant::now();

        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(db_path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")?;

        let store = Self {
            conn: Mutex::new(conn),
            path: Some(db_path.to_path_buf()),
        };
        store.init_schema()?;

        #[cfg(feature = "telemetry")]
        GLOBAL_METRICS.record_operation("state.open", start.elapsed());

        debug!(path = %db_path.display(), "opened state store");
        Ok(store)
    }

    /// Store that lives only as long as the process.
    pub fn in_memory() -> Result<Self, EngineError> {
        let store = Self {
            conn: Mutex::new(Connection::open_in_memory()?),
            path: None,
        };
        store.init_schema()?;
        Ok(store)
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>, EngineError> {
        self.conn
            .lock()
            .map_err(|_| EngineError::Store("state store lock poisoned".to_string()))
    }

    fn init_schema(&self) -> Result<(), EngineError> {
        let conn = self.conn()?;
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS schema_version (
                version INTEGER PRIMARY KEY
            );

            CREATE TABLE IF NOT EXISTS kv (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL,
                updated_at INTEGER NOT NULL
            );

            CREATE TABLE IF NOT EXISTS secrets (
                name TEXT PRIMARY KEY,
                value TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS caller_cache (
                fingerprint TEXT PRIMARY KEY,
                analysis TEXT NOT NULL,
                created_at INTEGER NOT NULL
            );
            "#,
        )?;

        let current_version: Option<u32> = conn
            .query_row("SELECT version FROM schema_version LIMIT 1", [], |row| row.get(0))
            .optional()?;
        if current_version.is_none() {
            conn.execute(
                "INSERT INTO schema_version (version) VALUES (?)",
                params![SCHEMA_VERSION],
            )?;
        }
        Ok(())
    }

    // === Key/value ===

    pub fn get(&self, key: &str) -> Result<Option<String>, EngineError> {
        let conn = self.conn()?;
        let value = conn
            .query_row("SELECT value FROM kv WHERE key = ?", params![key], |row| row.get(0))
            .optional()?;
        Ok(value)
    }

    pub fn set(&self, key: &str, value: &str) -> Result<(), EngineError> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO kv (key, value, updated_at) VALUES (?, ?, ?)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
            params![key, value, chrono::Utc::now().timestamp()],
        )?;
        Ok(())
    }

    /// Returns whether the key existed.
    pub fn remove(&self, key: &str) -> Result<bool, EngineError> {
        let conn = self.conn()?;
        let removed = conn.execute("DELETE FROM kv WHERE key = ?", params![key])?;
        Ok(removed > 0)
    }

    pub fn entries(&self) -> Result<Vec<(String, String)>, EngineError> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare("SELECT key, value FROM kv ORDER BY key")?;
        let rows = stmt.query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?;
        let mut entries = Vec::new();
        for row in rows {
            entries.push(row?);
        }
        Ok(entries)
    }

    pub fn get_state(&self, key: StateKey) -> Result<Option<String>, EngineError> {
        self.get(key.as_str())
    }

    pub fn set_state(&self, key: StateKey, value: &str) -> Result<(), EngineError> {
        self.set(key.as_str(), value)
    }

    // === Secrets ===

    pub fn set_secret(&self, name: &str, value: &str) -> Result<(), EngineError> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO secrets (name, value) VALUES (?, ?)
             ON CONFLICT(name) DO UPDATE SET value = excluded.value",
            params![name, value],
        )?;
        Ok(())
    }

    pub fn get_secret(&self, name: &str) -> Result<Option<String>, EngineError> {
        let conn = self.conn()?;
        let value = conn
            .query_row("SELECT value FROM secrets WHERE name = ?", params![name], |row| row.get(0))
            .optional()?;
        Ok(value)
    }

    pub fn delete_secret(&self, name: &str) -> Result<bool, EngineError> {
        let conn = self.conn()?;
        Ok(conn.execute("DELETE FROM secrets WHERE name = ?", params![name])? > 0)
    }

    /// LLM API key: the environment wins over the stored secret.
    pub fn anthropic_api_key(&self) -> Result<Option<String>, EngineError> {
        match std::env::var(ANTHROPIC_API_KEY_ENV) {
            Ok(key) if !key.trim().is_empty() => Ok(Some(key)),
            _ => self.get_secret(ANTHROPIC_API_KEY_SECRET),
        }
    }

    // === Caller-analysis cache ===

    /// Cached analysis for `fingerprint`. An unreadable row counts as a miss.
    pub fn cached_analysis(&self, fingerprint: &str) -> Result<Option<CallerAnalysis>, EngineError> {
        let conn = self.conn()?;
        let raw: Option<String> = conn
            .query_row(
                "SELECT analysis FROM caller_cache WHERE fingerprint = ?",
                params![fingerprint],
                |row| row.get(0),
            )
            .optional()?;

        Ok(raw.and_then(|json| match serde_json::from_str(&json) {
            Ok(analysis) => Some(analysis),
            Err(e) => {
                warn!(fingerprint, error = %e, "discarding unreadable cached analysis");
                None
            }
        }))
    }

    pub fn store_analysis(&self, fingerprint: &str, analysis: &CallerAnalysis) -> Result<(), EngineError> {
        let json = serde_json::to_string(analysis)
            .map_err(|e| EngineError::Store(format!("failed to encode analysis: {}", e)))?;
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO caller_cache (fingerprint, analysis, created_at) VALUES (?, ?, ?)
             ON CONFLICT(fingerprint) DO UPDATE SET analysis = excluded.analysis, created_at = excluded.created_at",
            params![fingerprint, json, chrono::Utc::now().timestamp()],
        )?;
        Ok(())
    }

    /// Drop every cached analysis. Returns how many were removed.
    pub fn clear_analysis_cache(&self) -> Result<usize, EngineError> {
        let conn = self.conn()?;
        Ok(conn.execute("DELETE FROM caller_cache", [])?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ranking::{CallerCandidate, RankedCaller};
    use tempfile::TempDir;

    fn analysis() -> CallerAnalysis {
        CallerAnalysis::from_unsorted(vec![RankedCaller {
            candidate: CallerCandidate {
                file_path: PathBuf::from("src/network/dispatch.rs"),
                line_number: 41,
                code: "handle_get_page_request(req).await?;".to_string(),
                function_name: "dispatch".to_string(),
                function_range: None,
            },
            confidence: 0.81,
            explanation: "direct call on the request path".to_string(),
        }])
    }

    #[test]
    fn test_kv_roundtrip_and_overwrite() {
        let store = StateStore::in_memory().unwrap();
        assert_eq!(store.get("trace_id").unwrap(), None);

        store.set_state(StateKey::TraceId, "abc").unwrap();
        store.set_state(StateKey::TraceId, "def").unwrap();
        assert_eq!(store.get_state(StateKey::TraceId).unwrap().as_deref(), Some("def"));

        assert!(store.remove("trace_id").unwrap());
        assert!(!store.remove("trace_id").unwrap());
    }

    #[test]
    fn test_entries_sorted() {
        let store = StateStore::in_memory().unwrap();
        store.set("endpoint", "http://localhost:16686").unwrap();
        store.set("dataset", "prod").unwrap();
        let keys: Vec<String> = store.entries().unwrap().into_iter().map(|(k, _)| k).collect();
        assert_eq!(keys, vec!["dataset", "endpoint"]);
    }

    #[test]
    fn test_secrets() {
        let store = StateStore::in_memory().unwrap();
        store.set_secret("token", "s3cret").unwrap();
        assert_eq!(store.get_secret("token").unwrap().as_deref(), Some("s3cret"));
        assert!(store.delete_secret("token").unwrap());
        assert_eq!(store.get_secret("token").unwrap(), None);
    }

    #[test]
    fn test_analysis_cache_persists_across_opens() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("nested/state.db");
        {
            let store = StateStore::open_at(&path).unwrap();
            store.store_analysis("fp1", &analysis()).unwrap();
        }
        let store = StateStore::open_at(&path).unwrap();
        assert_eq!(store.cached_analysis("fp1").unwrap(), Some(analysis()));
        assert_eq!(store.cached_analysis("fp2").unwrap(), None);
        assert_eq!(store.clear_analysis_cache().unwrap(), 1);
    }

    #[test]
    fn test_state_key_parse() {
        assert_eq!("trace-id".parse::<StateKey>().unwrap(), StateKey::TraceId);
        assert_eq!("Dataset".parse::<StateKey>().unwrap(), StateKey::Dataset);
        assert!("nope".parse::<StateKey>().is_err());
    }
}

// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! LSP client over JSON-RPC on a child process's stdio.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdout, Command};
use tokio::sync::{mpsc, oneshot, Mutex, RwLock};
use tracing::{debug, trace};

use super::config::{language_id_for_extension, LspServerConfig};
use super::error::{LspError, LspResult};
use super::types::{
    path_to_uri, DocumentSymbol, Location, Position, Range, ServerState, SymbolKind,
    WorkspaceSymbol,
};

type PendingMap = Arc<Mutex<HashMap<u64, oneshot::Sender<serde_json::Value>>>>;

/// A connection to a single language server.
pub struct LspClient {
    config: LspServerConfig,
    work_dir: PathBuf,
    process: Mutex<Option<Child>>,
    state: Arc<RwLock<ServerState>>,
    request_id: AtomicU64,
    pending_requests: PendingMap,
    open_files: RwLock<HashSet<String>>,
    tx: Mutex<Option<mpsc::Sender<String>>>,
}

impl LspClient {
    pub fn new(config: LspServerConfig, work_dir: impl Into<PathBuf>) -> Self {
        Self {
            config,
            work_dir: work_dir.into(),
            process: Mutex::new(None),
            state: Arc::new(RwLock::new(ServerState::Starting)),
            request_id: AtomicU64::new(1),
            pending_requests: Arc::new(Mutex::new(HashMap::new())),
            open_files: RwLock::new(HashSet::new()),
            tx: Mutex::new(None),
        }
    }

    pub fn name(&self) -> &str {
        &self.config.name
    }

    pub async fn state(&self) -> ServerState {
        *self.state.read().await
    }

    pub async fn is_ready(&self) -> bool {
        *self.state.read().await == ServerState::Ready
    }

    /// Spawn the server and run the initialize handshake.
    pub async fn start(&self) -> LspResult<()> {
        *self.state.write().await = ServerState::Starting;

        let mut process = Command::new(&self.config.command)
            .args(&self.config.args)
            .current_dir(&self.work_dir)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                LspError::StartupFailed(format!("failed to spawn {}: {}", self.config.command, e))
            })?;

        let mut stdin = process
            .stdin
            .take()
            .ok_or_else(|| LspError::StartupFailed("failed to get stdin".to_string()))?;
        let stdout = process
            .stdout
            .take()
            .ok_or_else(|| LspError::StartupFailed("failed to get stdout".to_string()))?;

        *self.process.lock().await = Some(process);

        let (tx, mut rx) = mpsc::channel::<String>(100);
        *self.tx.lock().await = Some(tx.clone());

        tokio::spawn(async move {
            while let Some(msg) = rx.recv().await {
                let header = format!("Content-Length: {}\r\n\r\n", msg.len());
                if stdin.write_all(header.as_bytes()).await.is_err()
                    || stdin.write_all(msg.as_bytes()).await.is_err()
                    || stdin.flush().await.is_err()
                {
                    break;
                }
            }
        });

        tokio::spawn(Self::read_messages(
            BufReader::new(stdout),
            Arc::clone(&self.pending_requests),
            tx,
            Arc::clone(&self.state),
        ));

        self.initialize().await
    }

    pub async fn stop(&self) -> LspResult<()> {
        if self.is_ready().await {
            let _ = self.request("shutdown", serde_json::Value::Null).await;
            self.notify("exit", serde_json::Value::Null).await?;
        }
        if let Some(mut process) = self.process.lock().await.take() {
            let _ = process.kill().await;
        }
        *self.state.write().await = ServerState::Shutdown;
        Ok(())
    }

    async fn initialize(&self) -> LspResult<()> {
        let root_uri = path_to_uri(&self.work_dir);
        let params = serde_json::json!({
            "processId": std::process::id(),
            "rootUri": root_uri,
            "capabilities": {
                "textDocument": {
                    "references": { "dynamicRegistration": false },
                    "documentSymbol": {
                        "dynamicRegistration": false,
                        "hierarchicalDocumentSymbolSupport": true
                    }
                },
                "workspace": {
                    "workspaceFolders": true,
                    "symbol": { "dynamicRegistration": false }
                }
            },
            "workspaceFolders": [{
                "uri": root_uri,
                "name": self.work_dir.file_name()
                    .and_then(|n| n.to_str())
                    .unwrap_or("workspace")
            }]
        });

        self.request("initialize", params).await?;
        self.notify("initialized", serde_json::json!({})).await?;
        *self.state.write().await = ServerState::Ready;
        debug!(server = %self.config.name, "language server ready");
        Ok(())
    }

    async fn request(&self, method: &str, params: serde_json::Value) -> LspResult<serde_json::Value> {
        let id = self.request_id.fetch_add(1, Ordering::SeqCst);
        let request = serde_json::json!({
            "jsonrpc": "2.0",
            "id": id,
            "method": method,
            "params": params
        });

        let (tx, rx) = oneshot::channel();
        self.pending_requests.lock().await.insert(id, tx);

        let msg = serde_json::to_string(&request)?;
        match *self.tx.lock().await {
            Some(ref sender) => sender
                .send(msg)
                .await
                .map_err(|_| LspError::CommunicationError("failed to send request".to_string()))?,
            None => return Err(LspError::NotReady("server not started".to_string())),
        }

        let timeout = tokio::time::Duration::from_millis(self.config.request_timeout_ms);
        match tokio::time::timeout(timeout, rx).await {
            Ok(Ok(response)) => {
                if let Some(error) = response.get("error") {
                    let code = error.get("code").and_then(|c| c.as_i64()).unwrap_or(-1) as i32;
                    let message = error
                        .get("message")
                        .and_then(|m| m.as_str())
                        .unwrap_or("unknown error");
                    return Err(LspError::server_error(code, message));
                }
                Ok(response.get("result").cloned().unwrap_or(serde_json::Value::Null))
            }
            Ok(Err(_)) => Err(LspError::CommunicationError("channel closed".to_string())),
            Err(_) => {
                self.pending_requests.lock().await.remove(&id);
                Err(LspError::Timeout(self.config.request_timeout_ms))
            }
        }
    }

    async fn notify(&self, method: &str, params: serde_json::Value) -> LspResult<()> {
        let notification = serde_json::json!({
            "jsonrpc": "2.0",
            "method": method,
            "params": params
        });
        let msg = serde_json::to_string(&notification)?;
        if let Some(ref sender) = *self.tx.lock().await {
            sender
                .send(msg)
                .await
                .map_err(|_| LspError::CommunicationError("failed to send notification".to_string()))?;
        }
        Ok(())
    }

    async fn read_messages(
        mut reader: BufReader<ChildStdout>,
        pending: PendingMap,
        tx: mpsc::Sender<String>,
        state: Arc<RwLock<ServerState>>,
    ) {
        let mut content_length: Option<usize> = None;
        let mut line_buf = String::new();

        loop {
            line_buf.clear();
            match reader.read_line(&mut line_buf).await {
                Ok(0) | Err(_) => break,
                Ok(_) => {
                    let line = line_buf.trim();
                    if let Some(len) = line.strip_prefix("Content-Length:") {
                        content_length = len.trim().parse().ok();
                    } else if line.is_empty() {
                        let Some(len) = content_length.take() else { continue };
                        let mut content = vec![0u8; len];
                        if reader.read_exact(&mut content).await.is_err() {
                            break;
                        }
                        if let Ok(msg) = serde_json::from_slice::<serde_json::Value>(&content) {
                            Self::handle_message(msg, &pending, &tx).await;
                        }
                    }
                }
            }
        }

        *state.write().await = ServerState::Error;
    }

    async fn handle_message(msg: serde_json::Value, pending: &PendingMap, tx: &mpsc::Sender<String>) {
        let method = msg.get("method").and_then(|m| m.as_str());
        let id = msg.get("id").cloned();

        match (method, id) {
            // Response to one of our requests
            (None, Some(id)) => {
                if let Some(id) = id.as_u64() {
                    if let Some(waiter) = pending.lock().await.remove(&id) {
                        let _ = waiter.send(msg);
                    }
                }
            }
            // Server-initiated request (configuration, progress tokens): acknowledge with null
            (Some(method), Some(id)) => {
                trace!(method, "acknowledging server request");
                let reply = serde_json::json!({ "jsonrpc": "2.0", "id": id, "result": null });
                if let Ok(reply) = serde_json::to_string(&reply) {
                    let _ = tx.send(reply).await;
                }
            }
            (Some(method), None) => trace!(method, "ignoring notification"),
            (None, None) => {}
        }
    }

    /// Open `path` with the server unless already open; returns its URI.
    pub async fn open_file_on_demand(&self, path: &Path) -> LspResult<String> {
        let uri = path_to_uri(path);
        if self.open_files.read().await.contains(&uri) {
            return Ok(uri);
        }

        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| LspError::FileNotFound(format!("{}: {}", path.display(), e)))?;
        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");

        self.notify(
            "textDocument/didOpen",
            serde_json::json!({
                "textDocument": {
                    "uri": uri,
                    "languageId": language_id_for_extension(ext),
                    "version": 0,
                    "text": content
                }
            }),
        )
        .await?;
        self.open_files.write().await.insert(uri.clone());
        Ok(uri)
    }

    async fn document_symbol_request(&self, uri: &str) -> LspResult<serde_json::Value> {
        self.request(
            "textDocument/documentSymbol",
            serde_json::json!({ "textDocument": { "uri": uri } }),
        )
        .await
    }

    /// Hierarchical document symbols.
    pub async fn document_symbols(&self, uri: &str) -> LspResult<Vec<DocumentSymbol>> {
        let result = self.document_symbol_request(uri).await?;
        Ok(parse_document_symbols(&result))
    }

    /// Flat `SymbolInformation` answers to a document-symbol request, for
    /// servers without hierarchical support.
    pub async fn symbol_information(&self, uri: &str) -> LspResult<Vec<DocumentSymbol>> {
        let result = self.document_symbol_request(uri).await?;
        Ok(parse_workspace_symbols(&result)
            .iter()
            .map(WorkspaceSymbol::to_document_symbol)
            .collect())
    }

    pub async fn workspace_symbols(&self, query: &str) -> LspResult<Vec<WorkspaceSymbol>> {
        let result = self
            .request("workspace/symbol", serde_json::json!({ "query": query }))
            .await?;
        Ok(parse_workspace_symbols(&result))
    }

    pub async fn references(
        &self,
        uri: &str,
        position: Position,
        include_declaration: bool,
    ) -> LspResult<Vec<Location>> {
        let result = self
            .request(
                "textDocument/references",
                serde_json::json!({
                    "textDocument": { "uri": uri },
                    "position": { "line": position.line, "character": position.character },
                    "context": { "includeDeclaration": include_declaration }
                }),
            )
            .await?;
        Ok(parse_locations(&result))
    }
}

// === Parsing helpers ===

fn parse_position(value: &serde_json::Value) -> Option<Position> {
    let line = value.get("line")?.as_u64()? as u32;
    let character = value.get("character")?.as_u64()? as u32;
    Some(Position::new(line, character))
}

fn parse_range(value: Option<&serde_json::Value>) -> Option<Range> {
    let obj = value?;
    Some(Range::new(
        parse_position(obj.get("start")?)?,
        parse_position(obj.get("end")?)?,
    ))
}

fn parse_location(value: &serde_json::Value) -> Option<Location> {
    let uri = value.get("uri")?.as_str()?.to_string();
    let range = parse_range(value.get("range"))?;
    Some(Location::new(uri, range))
}

fn parse_locations(value: &serde_json::Value) -> Vec<Location> {
    match value {
        serde_json::Value::Object(_) => parse_location(value).into_iter().collect(),
        serde_json::Value::Array(arr) => arr.iter().filter_map(parse_location).collect(),
        _ => Vec::new(),
    }
}

/// Hierarchical entries only; flat `SymbolInformation` items are skipped.
fn parse_document_symbols(value: &serde_json::Value) -> Vec<DocumentSymbol> {
    value
        .as_array()
        .map(|arr| arr.iter().filter_map(parse_document_symbol).collect())
        .unwrap_or_default()
}

fn parse_document_symbol(value: &serde_json::Value) -> Option<DocumentSymbol> {
    let name = value.get("name")?.as_str()?;
    let kind = SymbolKind::from_lsp(value.get("kind")?.as_i64()?)?;
    let range = parse_range(value.get("range"))?;
    let selection_range = parse_range(value.get("selectionRange")).unwrap_or(range);
    let children = value
        .get("children")
        .map(parse_document_symbols)
        .unwrap_or_default();

    Some(DocumentSymbol::new(name, kind, range, selection_range).with_children(children))
}

fn parse_workspace_symbols(value: &serde_json::Value) -> Vec<WorkspaceSymbol> {
    value
        .as_array()
        .map(|arr| arr.iter().filter_map(parse_workspace_symbol).collect())
        .unwrap_or_default()
}

fn parse_workspace_symbol(value: &serde_json::Value) -> Option<WorkspaceSymbol> {
    let name = value.get("name")?.as_str()?.to_string();
    let kind = SymbolKind::from_lsp(value.get("kind")?.as_i64()?)?;
    let location = parse_location(value.get("location")?)?;
    let container_name = value
        .get("containerName")
        .and_then(|c| c.as_str())
        .map(String::from);

    Some(WorkspaceSymbol {
        name,
        kind,
        location,
        container_name,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn range_json(start: u32, end: u32) -> serde_json::Value {
        serde_json::json!({
            "start": { "line": start, "character": 0 },
            "end": { "line": end, "character": 1 }
        })
    }

    #[test]
    fn test_parse_nested_document_symbols() {
        let json = serde_json::json!([{
            "name": "Server",
            "kind": 5,
            "range": range_json(0, 20),
            "selectionRange": range_json(0, 0),
            "children": [{
                "name": "handle",
                "kind": 6,
                "range": range_json(2, 10),
                "selectionRange": range_json(2, 2)
            }]
        }]);

        let symbols = parse_document_symbols(&json);
        assert_eq!(symbols.len(), 1);
        assert_eq!(symbols[0].kind, SymbolKind::Class);
        assert_eq!(symbols[0].children[0].name, "handle");
        assert_eq!(symbols[0].children[0].selection_range.start.line, 2);
    }

    #[test]
    fn test_flat_symbols_skipped_by_hierarchical_parser() {
        let json = serde_json::json!([{
            "name": "dispatch",
            "kind": 12,
            "location": { "uri": "file:///repo/src/net.rs", "range": range_json(4, 9) }
        }]);

        assert!(parse_document_symbols(&json).is_empty());
        let flat = parse_workspace_symbols(&json);
        assert_eq!(flat.len(), 1);
        assert_eq!(flat[0].location.range.end.line, 9);
    }

    #[test]
    fn test_parse_locations_single_and_array() {
        let loc = serde_json::json!({ "uri": "file:///a.rs", "range": range_json(1, 1) });
        assert_eq!(parse_locations(&loc).len(), 1);
        assert_eq!(parse_locations(&serde_json::json!([loc.clone(), loc])).len(), 2);
        assert!(parse_locations(&serde_json::Value::Null).is_empty());
    }

    #[test]
    fn test_unknown_symbol_kind_dropped() {
        let json = serde_json::json!([{
            "name": "x",
            "kind": 99,
            "range": range_json(0, 0)
        }]);
        assert!(parse_document_symbols(&json).is_empty());
    }

    #[tokio::test]
    async fn test_request_before_start_is_not_ready() {
        let client = LspClient::new(LspServerConfig::new("none", "none"), "/tmp");
        let result = client.workspace_symbols("x").await;
        assert!(matches!(result, Err(LspError::NotReady(_))));
        assert_eq!(client.state().await, ServerState::Starting);
    }
}

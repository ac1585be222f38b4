// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Language server integration for symbol and reference lookups.
//!
//! ```text
//! LspBackend (SymbolBackend)
//!     │  one lazily started client per configured server
//!     ▼
//! LspClient ── JSON-RPC over stdio ──▶ rust-analyzer, gopls, ...
//! ```
//!
//! Only the requests caller analysis needs are implemented: document
//! symbols, workspace symbols and references.

pub mod backend;
pub mod client;
pub mod config;
pub mod error;
pub mod types;

pub use backend::LspBackend;
pub use client::LspClient;
pub use config::{default_server_configs, language_id_for_extension, LspServerConfig};
pub use error::{LspError, LspResult, METHOD_NOT_FOUND};
pub use types::{
    path_to_uri, uri_to_path, DocumentSymbol, Location, Position, Range, ServerState, SymbolKind,
    WorkspaceSymbol,
};

// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Error types for language server operations.

use thiserror::Error;

/// Errors from a language server or the symbol backends built on it.
#[derive(Error, Debug)]
pub enum LspError {
    #[error("No language server for: {0}")]
    ServerNotFound(String),

    #[error("Failed to start language server: {0}")]
    StartupFailed(String),

    #[error("Language server not ready: {0}")]
    NotReady(String),

    #[error("Language server communication error: {0}")]
    CommunicationError(String),

    #[error("Language server request timed out after {0}ms")]
    Timeout(u64),

    /// JSON-RPC error response.
    #[error("Language server error {code}: {message}")]
    ServerError { code: i32, message: String },

    #[error("Invalid language server response: {0}")]
    InvalidResponse(String),

    #[error("File not found: {0}")]
    FileNotFound(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),
}

impl LspError {
    pub fn server_error(code: i32, message: impl Into<String>) -> Self {
        Self::ServerError {
            code,
            message: message.into(),
        }
    }

    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Timeout(_) | Self::CommunicationError(_) | Self::NotReady(_)
        )
    }
}

/// Result type for LSP operations.
pub type LspResult<T> = std::result::Result<T, LspError>;

/// JSON-RPC method-not-found code.
pub const METHOD_NOT_FOUND: i32 = -32601;

// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Document access.

use std::path::{Path, PathBuf};

use async_trait::async_trait;

use crate::error::EngineError;

/// An opened source document.
#[derive(Debug, Clone)]
pub struct Document {
    path: PathBuf,
    text: String,
    lines: Vec<String>,
}

impl Document {
    pub fn new(path: impl Into<PathBuf>, text: impl Into<String>) -> Self {
        let text = text.into();
        let lines = text.lines().map(str::to_string).collect();
        Self {
            path: path.into(),
            text,
            lines,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn line_count(&self) -> usize {
        self.lines.len()
    }

    /// 0-based line, if in range.
    pub fn line_at(&self, line: u32) -> Option<&str> {
        self.lines.get(line as usize).map(String::as_str)
    }

    /// `line` with `radius` lines either side, clipped, joined by newlines.
    pub fn snippet(&self, line: u32, radius: u32) -> String {
        let line = line as usize;
        if line >= self.lines.len() {
            return String::new();
        }
        let start = line.saturating_sub(radius as usize);
        let end = (line + radius as usize).min(self.lines.len() - 1);
        self.lines[start..=end].join("\n")
    }
}

/// Source of document text.
#[async_trait]
pub trait TextBackend: Send + Sync {
    async fn open_document(&self, path: &Path) -> Result<Document, EngineError>;
}

/// Reads documents straight from disk.
#[derive(Debug, Default, Clone, Copy)]
pub struct FsTextBackend;

#[async_trait]
impl TextBackend for FsTextBackend {
    async fn open_document(&self, path: &Path) -> Result<Document, EngineError> {
        let text = tokio::fs::read_to_string(path).await?;
        Ok(Document::new(path, text))
    }
}

// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Live reads of source lines around a location.

use std::path::Path;

use crate::error::EngineError;
use crate::index::ContextLine;

/// Lines `line - radius ..= line + radius` (0-based, clipped) read from disk.
///
/// An out-of-range `line` yields an empty list.
pub async fn code_context(path: &Path, line: u32, radius: u32) -> Result<Vec<ContextLine>, EngineError> {
    let content = tokio::fs::read_to_string(path).await?;
    Ok(context_from_text(&content, line, radius))
}

/// Text of a single line, if it exists.
pub async fn read_line(path: &Path, line: u32) -> Option<String> {
    let content = tokio::fs::read_to_string(path).await.ok()?;
    content.lines().nth(line as usize).map(str::to_string)
}

pub(crate) fn context_from_text(content: &str, line: u32, radius: u32) -> Vec<ContextLine> {
    let lines: Vec<&str> = content.lines().collect();
    let line = line as usize;
    if line >= lines.len() {
        return Vec::new();
    }
    let start = line.saturating_sub(radius as usize);
    let end = (line + radius as usize).min(lines.len() - 1);
    (start..=end)
        .map(|i| ContextLine {
            line_number: i as u32,
            content: lines[i].to_string(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_code_context_clips() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("f.rs");
        std::fs::write(&path, "a\nb\nc\nd\n").unwrap();

        let ctx = code_context(&path, 0, 2).await.unwrap();
        let nums: Vec<u32> = ctx.iter().map(|l| l.line_number).collect();
        assert_eq!(nums, vec![0, 1, 2]);

        let ctx = code_context(&path, 3, 1).await.unwrap();
        assert_eq!(ctx.last().map(|l| l.content.as_str()), Some("d"));
        assert!(code_context(&path, 10, 1).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_missing_file_is_io_error() {
        let result = code_context(Path::new("/definitely/not/here.rs"), 0, 1).await;
        assert!(matches!(result, Err(EngineError::Io(_))));
        assert!(read_line(Path::new("/definitely/not/here.rs"), 0).await.is_none());
    }
}

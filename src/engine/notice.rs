// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! User-facing notices for pipeline outcomes.

use std::fmt;

use serde::Serialize;

use crate::error::{EngineError, ProviderError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NoticeLevel {
    Info,
    Error,
}

/// A short message for whoever drives the engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UserNotice {
    pub level: NoticeLevel,
    pub message: String,
}

impl UserNotice {
    pub fn info(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Info,
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Error,
            message: message.into(),
        }
    }

    /// "Nothing found" outcomes.
    pub fn not_found(what: &str) -> Self {
        Self::info(format!("No {} found", what))
    }

    pub fn is_error(&self) -> bool {
        self.level == NoticeLevel::Error
    }
}

impl fmt::Display for UserNotice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl From<&EngineError> for UserNotice {
    fn from(err: &EngineError) -> Self {
        match err {
            EngineError::NotReady(_) => {
                Self::info("The code index is still being built. Try again when indexing finishes.")
            }
            EngineError::Configuration(msg) => Self::error(format!("Not configured: {}", msg)),
            EngineError::Backend(provider) => Self::error(backend_message(provider)),
            EngineError::Analysis(msg) => Self::error(format!(
                "Caller analysis failed: {}. Any earlier analysis is unchanged.",
                msg
            )),
            other => Self::error(other.to_string()),
        }
    }
}

fn backend_message(err: &ProviderError) -> String {
    match err {
        ProviderError::AuthError(_) => "The backend rejected the API key.".to_string(),
        ProviderError::ModelNotFound(model) => format!(
            "Model not found: {}. Pull or configure it before indexing.",
            model
        ),
        ProviderError::NotConfigured(msg) => format!("Backend not configured: {}", msg),
        e if e.is_retryable() => format!("{} Try again shortly.", e),
        e => e.to_string(),
    }
}

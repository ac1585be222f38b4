// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Normalized log records.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::span::{normalize_spans, Span};
use crate::ranking::CallerAnalysis;

/// Log severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Severity {
    Trace,
    Debug,
    Info,
    #[serde(alias = "WARNING")]
    Warn,
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Trace => "TRACE",
            Self::Debug => "DEBUG",
            Self::Info => "INFO",
            Self::Warn => "WARN",
            Self::Error => "ERROR",
        };
        f.write_str(s)
    }
}

impl FromStr for Severity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "TRACE" => Ok(Self::Trace),
            "DEBUG" => Ok(Self::Debug),
            "INFO" => Ok(Self::Info),
            "WARN" | "WARNING" => Ok(Self::Warn),
            "ERROR" | "ERR" | "FATAL" | "CRITICAL" => Ok(Self::Error),
            other => Err(format!("unknown severity: {other}")),
        }
    }
}

/// Event recorded inside a Jaeger span.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JaegerLog {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
    #[serde(default)]
    pub fields: BTreeMap<String, serde_json::Value>,
}

/// Span metadata carried by entries that came from a Jaeger trace.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JaegerSpan {
    pub operation_name: String,
    pub span_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_span_id: Option<String>,
    #[serde(default)]
    pub tags: BTreeMap<String, serde_json::Value>,
    #[serde(default)]
    pub logs: Vec<JaegerLog>,
}

/// One normalized log record.
///
/// `raw_text` is never rewritten after construction. The caller analysis is
/// an addendum that can be attached once.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogEntry {
    pub severity: Severity,
    pub timestamp: DateTime<Utc>,
    raw_text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Module path hint, e.g. `my_crate::db::pool`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service_name: Option<String>,
    #[serde(default)]
    pub fields: BTreeMap<String, serde_json::Value>,
    /// Root-first; the last span is the current execution point.
    #[serde(default)]
    pub spans: Vec<Span>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub jaeger_span: Option<JaegerSpan>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    caller_analysis: Option<CallerAnalysis>,
}

impl LogEntry {
    pub fn new(severity: Severity, timestamp: DateTime<Utc>, raw_text: impl Into<String>) -> Self {
        Self {
            severity,
            timestamp,
            raw_text: raw_text.into(),
            message: None,
            target: None,
            service_name: None,
            fields: BTreeMap::new(),
            spans: Vec::new(),
            jaeger_span: None,
            caller_analysis: None,
        }
    }

    /// Build an entry from an unstructured line. A leading `[LEVEL]` tag sets
    /// the severity; anything else is INFO stamped with the current time.
    pub fn from_raw(line: &str) -> Self {
        let severity = line
            .trim_start()
            .strip_prefix('[')
            .and_then(|rest| rest.split_once(']'))
            .and_then(|(tag, _)| tag.parse().ok())
            .unwrap_or(Severity::Info);
        Self::new(severity, Utc::now(), line)
    }

    /// Parse a JSON record and normalize its span chain.
    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        let mut entry: Self = serde_json::from_str(json)?;
        entry.spans = normalize_spans(std::mem::take(&mut entry.spans));
        Ok(entry)
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn with_target(mut self, target: impl Into<String>) -> Self {
        self.target = Some(target.into());
        self
    }

    pub fn with_spans(mut self, spans: Vec<Span>) -> Self {
        self.spans = normalize_spans(spans);
        self
    }

    pub fn raw_text(&self) -> &str {
        &self.raw_text
    }

    /// Text the engine correlates against: the message when present.
    pub fn display_text(&self) -> &str {
        self.message.as_deref().unwrap_or(&self.raw_text)
    }

    /// Innermost span, i.e. where the event was emitted.
    pub fn current_span(&self) -> Option<&Span> {
        self.spans.last()
    }

    pub fn caller_analysis(&self) -> Option<&CallerAnalysis> {
        self.caller_analysis.as_ref()
    }

    /// Attach a caller analysis. Returns false and leaves the entry unchanged
    /// if one is already attached.
    pub fn attach_caller_analysis(&mut self, analysis: CallerAnalysis) -> bool {
        if self.caller_analysis.is_some() {
            return false;
        }
        self.caller_analysis = Some(analysis);
        true
    }
}

// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Log records the engine consumes.
//!
//! Parsing of concrete log formats happens upstream; entries arrive already
//! normalized (or as JSON in the shape of [`LogEntry`]).

mod entry;
mod fingerprint;
mod span;

pub use entry::{JaegerLog, JaegerSpan, LogEntry, Severity};
pub use fingerprint::{fingerprint, mask_dynamic};
pub use span::{normalize_spans, Span};

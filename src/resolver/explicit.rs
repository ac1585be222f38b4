// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Source locations written into a log line: panic sites, stack frames,
//! compiler-style `path:line` references.

use once_cell::sync::Lazy;
use regex::Regex;

static PYTHON_FRAME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"File "(?P<path>[^"]+)", line (?P<line>\d+)"#).expect("valid regex"));

static PATH_LINE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?P<path>[\w.\-/\\]*[\w\-]\.[A-Za-z]\w*):(?P<line>\d+)(?::\d+)?").expect("valid regex")
});

/// A location named in a log line. `line` is 0-based.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExplicitLocation {
    pub path: String,
    pub line: u32,
}

/// Every `path:line` the message mentions, in order of appearance. Logged
/// line numbers are 1-based; a logged `0` maps to the first line.
pub fn explicit_locations(message: &str) -> Vec<ExplicitLocation> {
    let mut found: Vec<(usize, ExplicitLocation)> = [&*PYTHON_FRAME, &*PATH_LINE]
        .iter()
        .flat_map(|re| re.captures_iter(message))
        .filter_map(|caps| {
            let whole = caps.get(0)?;
            let line: u32 = caps.name("line")?.as_str().parse().ok()?;
            Some((
                whole.start(),
                ExplicitLocation {
                    path: caps.name("path")?.as_str().to_string(),
                    line: line.saturating_sub(1),
                },
            ))
        })
        .collect();
    found.sort_by_key(|(start, _)| *start);
    found.dedup_by(|a, b| a.1 == b.1);
    found.into_iter().map(|(_, location)| location).collect()
}

// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Strip log-line noise before similarity matching.

use once_cell::sync::Lazy;
use regex::Regex;

static LEVEL_TAG: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^\s*\[(?:trace|debug|info|warn|warning|error|err|fatal|critical)\]\s*")
        .expect("valid regex")
});

static DATETIME: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^\s*\d{4}-\d{2}-\d{2}[ T]\d{2}:\d{2}:\d{2}(?:[.,]\d+)?(?:\s*(?:Z|UTC|GMT|[+-]\d{2}:?\d{2}|[ECMP][SD]T)\b)?\s*",
    )
    .expect("valid regex")
});

static TIME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*\d{2}:\d{2}:\d{2}(?:[.,]\d+)?\s*").expect("valid regex"));

/// Remove leading severity tags and timestamps, repeatedly, in any order.
pub fn clean_message(message: &str) -> String {
    let mut current = message.trim().to_string();
    loop {
        let next = [&*LEVEL_TAG, &*DATETIME, &*TIME]
            .iter()
            .fold(current.clone(), |text, re| re.replace(&text, "").into_owned());
        if next == current {
            return current;
        }
        current = next;
    }
}

// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Stable keys for log lines.
//!
//! Two lines that differ only in ids, counters or timestamps map to the same
//! fingerprint, so a cached caller analysis is reused across occurrences.

use once_cell::sync::Lazy;
use regex::Regex;
use sha2::{Digest, Sha256};

static UUID: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b[0-9a-f]{8}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{12}\b")
        .expect("valid regex")
});
static HEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b(?:0x[0-9a-f]+|[0-9a-f]*[0-9][0-9a-f]*[a-f][0-9a-f]*)\b").expect("valid regex"));
static DIGITS: Lazy<Regex> = Lazy::new(|| Regex::new(r"\d+").expect("valid regex"));

/// Replace variable tokens with placeholders.
pub fn mask_dynamic(text: &str) -> String {
    let masked = UUID.replace_all(text, "<id>");
    let masked = HEX.replace_all(&masked, |caps: &regex::Captures<'_>| {
        let token = &caps[0];
        // Short words like "bad" or "cafe" are not ids
        if token.len() >= 6 || token.starts_with("0x") || token.starts_with("0X") {
            "<hex>".to_string()
        } else {
            token.to_string()
        }
    });
    DIGITS.replace_all(&masked, "#").trim().to_string()
}

/// Cache key for a `(log line, anchor)` pair.
pub fn fingerprint(log_line: &str, anchor: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(mask_dynamic(log_line).as_bytes());
    hasher.update([0u8]);
    hasher.update(anchor.trim().as_bytes());
    let hash = format!("{:x}", hasher.finalize());
    hash[..16].to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mask_digits_and_ids() {
        assert_eq!(mask_dynamic("user 42 failed"), "user # failed");
        assert_eq!(
            mask_dynamic("req 550e8400-e29b-41d4-a716-446655440000 done"),
            "req <id> done"
        );
        assert_eq!(mask_dynamic("ptr 0xdeadbeef"), "ptr <hex>");
        assert_eq!(mask_dynamic("span 9f86d081884c done"), "span <hex> done");
    }

    #[test]
    fn test_plain_words_untouched() {
        assert_eq!(mask_dynamic("bad cafe decade"), "bad cafe decade");
    }

    #[test]
    fn test_fingerprint_ignores_dynamic_parts() {
        let a = fingerprint("timeout after 30s for order 1182", "src/orders.rs:10");
        let b = fingerprint("timeout after 45s for order 2291", "src/orders.rs:10");
        assert_eq!(a, b);
        assert_eq!(a.len(), 16);
    }

    #[test]
    fn test_fingerprint_depends_on_anchor() {
        let a = fingerprint("timeout", "src/orders.rs:10");
        let b = fingerprint("timeout", "src/billing.rs:10");
        assert_ne!(a, b);
    }
}

// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Span chains.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

/// One span in an execution chain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Span {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub span_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,
    /// Nested form produced by `tracing` formatters; removed by normalization.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub child: Option<Box<Span>>,
    #[serde(flatten)]
    pub fields: BTreeMap<String, serde_json::Value>,
}

impl Span {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            span_id: None,
            parent_id: None,
            child: None,
            fields: BTreeMap::new(),
        }
    }

    pub fn with_ids(mut self, span_id: impl Into<String>, parent_id: Option<String>) -> Self {
        self.span_id = Some(span_id.into());
        self.parent_id = parent_id;
        self
    }

    pub fn with_child(mut self, child: Span) -> Self {
        self.child = Some(Box::new(child));
        self
    }
}

/// Flatten nested `child` chains and order id-linked spans root-first.
///
/// Spans without parent links keep their relative order.
pub fn normalize_spans(spans: Vec<Span>) -> Vec<Span> {
    let mut flat = Vec::new();
    for span in spans {
        let mut current = Some(span);
        while let Some(mut span) = current {
            current = span.child.take().map(|c| *c);
            flat.push(span);
        }
    }

    let parents: HashMap<&str, &str> = flat
        .iter()
        .filter_map(|s| Some((s.span_id.as_deref()?, s.parent_id.as_deref()?)))
        .collect();

    let depths: Vec<usize> = flat
        .iter()
        .map(|s| {
            let mut depth = 0;
            let mut id = s.span_id.as_deref();
            while let Some(parent) = id.and_then(|i| parents.get(i)) {
                depth += 1;
                // Cycles in malformed traces
                if depth > flat.len() {
                    break;
                }
                id = Some(parent);
            }
            depth
        })
        .collect();

    if depths.iter().all(|&d| d == 0) {
        return flat;
    }

    let mut indexed: Vec<(usize, Span)> = depths.into_iter().zip(flat).collect();
    indexed.sort_by_key(|(depth, _)| *depth);
    indexed.into_iter().map(|(_, span)| span).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nested_chain_flattened() {
        let chain = Span::new("a").with_child(Span::new("b").with_child(Span::new("c")));
        let spans = normalize_spans(vec![chain]);
        let names: Vec<_> = spans.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["a", "b", "c"]);
        assert!(spans.iter().all(|s| s.child.is_none()));
    }

    #[test]
    fn test_parent_links_ordered_root_first() {
        let spans = vec![
            Span::new("leaf").with_ids("3", Some("2".to_string())),
            Span::new("root").with_ids("1", None),
            Span::new("mid").with_ids("2", Some("1".to_string())),
        ];
        let names: Vec<_> = normalize_spans(spans).into_iter().map(|s| s.name).collect();
        assert_eq!(names, vec!["root", "mid", "leaf"]);
    }

    #[test]
    fn test_unlinked_keep_order() {
        let spans = vec![Span::new("x"), Span::new("y")];
        let names: Vec<_> = normalize_spans(spans).into_iter().map(|s| s.name).collect();
        assert_eq!(names, vec!["x", "y"]);
    }

    #[test]
    fn test_extra_fields_flattened() {
        let json = r#"{"name": "handle", "user_id": 42}"#;
        let span: Span = serde_json::from_str(json).unwrap();
        assert_eq!(span.fields["user_id"], 42);
    }
}

// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Bounded embedding cache for repeated query texts.

use std::collections::HashMap;
use std::sync::RwLock;

use sha2::{Digest, Sha256};

use super::base::Embedding;

const DEFAULT_MAX_SIZE: usize = 512;

struct CacheEntry {
    embedding: Embedding,
    last_used: u64,
}

/// Thread-safe least-recently-used cache keyed by provider, model and text.
pub struct EmbeddingCache {
    entries: RwLock<(u64, HashMap<String, CacheEntry>)>,
    max_size: usize,
}

impl EmbeddingCache {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_MAX_SIZE)
    }

    pub fn with_capacity(max_size: usize) -> Self {
        Self {
            entries: RwLock::new((0, HashMap::new())),
            max_size: max_size.max(1),
        }
    }

    /// Cache key for a text.
    pub fn make_key(provider: &str, model: &str, text: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(text.as_bytes());
        let hash = format!("{:x}", hasher.finalize());
        format!("{}:{}:{}", provider, model, &hash[..16])
    }

    pub fn get(&self, key: &str) -> Option<Embedding> {
        let mut guard = self.entries.write().ok()?;
        let (clock, entries) = &mut *guard;
        *clock += 1;
        let entry = entries.get_mut(key)?;
        entry.last_used = *clock;
        Some(entry.embedding.clone())
    }

    pub fn put(&self, key: String, embedding: Embedding) {
        let Ok(mut guard) = self.entries.write() else {
            return;
        };
        let (clock, entries) = &mut *guard;
        *clock += 1;

        if entries.len() >= self.max_size && !entries.contains_key(&key) {
            if let Some(oldest) = entries
                .iter()
                .min_by_key(|(_, e)| e.last_used)
                .map(|(k, _)| k.clone())
            {
                entries.remove(&oldest);
            }
        }

        entries.insert(
            key,
            CacheEntry {
                embedding,
                last_used: *clock,
            },
        );
    }

    pub fn len(&self) -> usize {
        self.entries.read().map(|g| g.1.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for EmbeddingCache {
    fn default() -> Self {
        Self::new()
    }
}

// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Base trait for embedding providers.

use async_trait::async_trait;

use crate::error::ProviderError;

/// One embedding vector.
pub type Embedding = Vec<f32>;

/// Trait for embedding providers.
///
/// Implementations return exactly one vector per input text, in input order.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Get the provider name.
    fn name(&self) -> &str;

    /// Get the model name.
    fn model(&self) -> &str;

    /// Generate embeddings for multiple texts.
    async fn embed(&self, texts: &[String]) -> Result<Vec<Embedding>, ProviderError>;

    /// Generate embedding for a single text.
    async fn embed_one(&self, text: &str) -> Result<Embedding, ProviderError> {
        let results = self.embed(&[text.to_string()]).await?;
        results
            .into_iter()
            .next()
            .ok_or_else(|| ProviderError::ParseError("no embedding returned".to_string()))
    }

    /// Check that the backend is reachable and the model exists.
    async fn is_available(&self) -> bool;
}

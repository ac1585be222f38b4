// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Embedding providers for the code index.
//!
//! Provides abstraction over different embedding APIs (Ollama, OpenAI).

mod base;
mod cache;
mod ollama;
mod openai;

use std::sync::Arc;

pub use base::{Embedding, EmbeddingProvider};
pub use cache::EmbeddingCache;
pub use ollama::OllamaEmbeddingProvider;
pub use openai::OpenAIEmbeddingProvider;

use crate::config::EmbeddingConfig;
use crate::error::ProviderError;

/// Create an embedding provider from configuration.
///
/// `auto` prefers OpenAI when `OPENAI_API_KEY` is set and reachable, then
/// falls back to a local Ollama.
pub async fn create_embedding_provider(
    config: &EmbeddingConfig,
) -> Result<Arc<dyn EmbeddingProvider>, ProviderError> {
    match config.provider.to_lowercase().as_str() {
        "openai" => Ok(Arc::new(OpenAIEmbeddingProvider::new(&config.openai_model, None)?)),
        "ollama" => Ok(Arc::new(OllamaEmbeddingProvider::new(
            &config.ollama_model,
            Some(&config.ollama_base_url),
        ))),
        "auto" => detect_and_create_provider(config).await,
        other => Err(ProviderError::NotConfigured(format!(
            "unknown embedding provider: {}",
            other
        ))),
    }
}

async fn detect_and_create_provider(
    config: &EmbeddingConfig,
) -> Result<Arc<dyn EmbeddingProvider>, ProviderError> {
    if std::env::var("OPENAI_API_KEY").is_ok() {
        let provider = OpenAIEmbeddingProvider::new(&config.openai_model, None)?;
        if provider.is_available().await {
            return Ok(Arc::new(provider));
        }
        tracing::debug!("OpenAI embeddings unavailable, trying Ollama");
    }

    let provider =
        OllamaEmbeddingProvider::new(&config.ollama_model, Some(&config.ollama_base_url));
    if provider.is_available().await {
        return Ok(Arc::new(provider));
    }

    Err(ProviderError::NotConfigured(format!(
        "no embedding provider available: set OPENAI_API_KEY or run Ollama with `{}` pulled",
        config.ollama_model
    )))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_unknown_provider_rejected() {
        let config = EmbeddingConfig {
            provider: "cohere".to_string(),
            ..Default::default()
        };
        let result = create_embedding_provider(&config).await;
        assert!(matches!(result, Err(ProviderError::NotConfigured(_))));
    }

    #[tokio::test]
    async fn test_explicit_ollama_skips_availability_check() {
        let config = EmbeddingConfig {
            provider: "ollama".to_string(),
            ollama_base_url: "http://127.0.0.1:9".to_string(),
            ..Default::default()
        };
        let provider = create_embedding_provider(&config).await.unwrap();
        assert_eq!(provider.name(), "ollama");
    }
}

// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Ollama embedding provider.

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use tokio::sync::Semaphore;

use crate::error::ProviderError;

#[cfg(feature = "telemetry")]
use crate::telemetry::metrics::GLOBAL_METRICS;

use super::base::{Embedding, EmbeddingProvider};
use super::cache::EmbeddingCache;

#[derive(Debug, Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    prompt: &'a str,
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    embedding: Vec<f32>,
}

#[derive(Debug, Deserialize)]
struct TagsResponse {
    models: Vec<ModelInfo>,
}

#[derive(Debug, Deserialize)]
struct ModelInfo {
    name: String,
}

/// Ollama embedding provider.
#[derive(Clone)]
pub struct OllamaEmbeddingProvider {
    client: Client,
    model: String,
    base_url: String,
    cache: Arc<EmbeddingCache>,
    request_semaphore: Arc<Semaphore>,
}

impl OllamaEmbeddingProvider {
    /// Max concurrent requests to Ollama.
    const MAX_CONCURRENT_REQUESTS: usize = 5;

    pub fn new(model: &str, base_url: Option<&str>) -> Self {
        let base_url = base_url
            .unwrap_or("http://localhost:11434")
            .trim_end_matches('/');

        Self {
            client: Client::new(),
            model: model.to_string(),
            base_url: base_url.to_string(),
            cache: Arc::new(EmbeddingCache::new()),
            request_semaphore: Arc::new(Semaphore::new(Self::MAX_CONCURRENT_REQUESTS)),
        }
    }

    async fn request_embedding(&self, text: &str) -> Result<Embedding, ProviderError> {
        let start = Instant::now();

        let _permit = self
            .request_semaphore
            .acquire()
            .await
            .map_err(|e| ProviderError::NetworkError(format!("request permit: {}", e)))?;

        let response = self
            .client
            .post(format!("{}/api/embeddings", self.base_url))
            .json(&EmbeddingRequest {
                model: &self.model,
                prompt: text,
            })
            .send()
            .await
            .map_err(|e| ProviderError::NetworkError(format!("Ollama unreachable: {}", e)))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| ProviderError::NetworkError(e.to_string()))?;

        #[cfg(feature = "telemetry")]
        GLOBAL_METRICS.record_backend("ollama.embeddings", start.elapsed(), status.is_success());

        if status == StatusCode::NOT_FOUND || (!status.is_success() && body.contains("not found")) {
            return Err(ProviderError::ModelNotFound(format!(
                "{} (run `ollama pull {}`)",
                self.model, self.model
            )));
        }
        if !status.is_success() {
            return Err(ProviderError::api(
                format!("Ollama error: {}", body),
                status.as_u16(),
            ));
        }

        let parsed: EmbeddingResponse = serde_json::from_str(&body)
            .map_err(|e| ProviderError::ParseError(format!("embedding response: {}", e)))?;

        if parsed.embedding.is_empty() {
            return Err(ProviderError::ParseError("empty embedding".to_string()));
        }

        tracing::trace!(elapsed_ms = start.elapsed().as_millis() as u64, "ollama embedding");
        Ok(parsed.embedding)
    }
}

#[async_trait]
impl EmbeddingProvider for OllamaEmbeddingProvider {
    fn name(&self) -> &str {
        "ollama"
    }

    fn model(&self) -> &str {
        &self.model
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Embedding>, ProviderError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let mut results: Vec<Option<Embedding>> = vec![None; texts.len()];
        let mut handles = Vec::new();

        for (i, text) in texts.iter().enumerate() {
            let key = EmbeddingCache::make_key(self.name(), &self.model, text);
            if let Some(cached) = self.cache.get(&key) {
                results[i] = Some(cached);
                continue;
            }

            let provider = self.clone();
            let text = text.clone();
            handles.push(tokio::spawn(async move {
                let result = provider.request_embedding(&text).await;
                (i, key, result)
            }));
        }

        // First failure fails the whole batch; remaining tasks finish in the background
        for handle in handles {
            let (i, key, result) = handle
                .await
                .map_err(|e| ProviderError::NetworkError(format!("embedding task failed: {}", e)))?;
            let embedding = result?;
            self.cache.put(key, embedding.clone());
            results[i] = Some(embedding);
        }

        results
            .into_iter()
            .map(|r| r.ok_or_else(|| ProviderError::ParseError("missing embedding".to_string())))
            .collect()
    }

    async fn is_available(&self) -> bool {
        let response = self
            .client
            .get(format!("{}/api/tags", self.base_url))
            .send()
            .await;

        match response {
            Ok(resp) if resp.status().is_success() => match resp.json::<TagsResponse>().await {
                Ok(tags) => tags.models.iter().any(|m| {
                    // Model name might have a :latest suffix
                    m.name == self.model || m.name.starts_with(&format!("{}:", self.model))
                }),
                Err(_) => true,
            },
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_custom_base_url() {
        let provider = OllamaEmbeddingProvider::new("test", Some("http://custom:8080/"));
        assert_eq!(provider.base_url, "http://custom:8080");
        assert_eq!(provider.model(), "test");
    }

    #[tokio::test]
    async fn test_empty_input_skips_network() {
        let provider = OllamaEmbeddingProvider::new("nomic-embed-text", Some("http://127.0.0.1:9"));
        let result = provider.embed(&[]).await.unwrap();
        assert!(result.is_empty());
    }

    #[tokio::test]
    async fn test_unreachable_backend_is_error() {
        let provider = OllamaEmbeddingProvider::new("nomic-embed-text", Some("http://127.0.0.1:9"));
        let result = provider.embed(&["fn main() {}".to_string()]).await;
        assert!(matches!(result, Err(ProviderError::NetworkError(_))));
        assert!(!provider.is_available().await);
    }
}

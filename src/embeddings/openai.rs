// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! OpenAI embedding provider.

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};

use crate::error::ProviderError;

#[cfg(feature = "telemetry")]
use crate::telemetry::metrics::GLOBAL_METRICS;

use super::base::{Embedding, EmbeddingProvider};
use super::cache::EmbeddingCache;

#[derive(Debug, Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
    index: usize,
}

#[derive(Debug, Deserialize)]
struct ErrorResponse {
    error: ErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ErrorDetail {
    message: String,
}

/// OpenAI embedding provider.
pub struct OpenAIEmbeddingProvider {
    client: Client,
    api_key: String,
    model: String,
    base_url: String,
    cache: Arc<EmbeddingCache>,
}

impl OpenAIEmbeddingProvider {
    /// Requests per batch (OpenAI caps input arrays well above this).
    const BATCH_SIZE: usize = 100;

    /// Create a provider; the key falls back to `OPENAI_API_KEY`.
    pub fn new(model: &str, api_key: Option<&str>) -> Result<Self, ProviderError> {
        let api_key = match api_key {
            Some(key) => key.to_string(),
            None => std::env::var("OPENAI_API_KEY").map_err(|_| {
                ProviderError::NotConfigured("OPENAI_API_KEY environment variable not set".to_string())
            })?,
        };
        Ok(Self::with_base_url(model, &api_key, "https://api.openai.com/v1"))
    }

    /// Create with custom base URL (for Azure or proxies).
    pub fn with_base_url(model: &str, api_key: &str, base_url: &str) -> Self {
        Self {
            client: Client::new(),
            api_key: api_key.to_string(),
            model: model.to_string(),
            base_url: base_url.trim_end_matches('/').to_string(),
            cache: Arc::new(EmbeddingCache::new()),
        }
    }

    async fn request_embeddings(&self, texts: &[String]) -> Result<Vec<Embedding>, ProviderError> {
        let start = Instant::now();

        let response = self
            .client
            .post(format!("{}/embeddings", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&EmbeddingRequest {
                model: &self.model,
                input: texts,
            })
            .send()
            .await
            .map_err(|e| ProviderError::NetworkError(format!("OpenAI unreachable: {}", e)))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| ProviderError::NetworkError(e.to_string()))?;

        #[cfg(feature = "telemetry")]
        GLOBAL_METRICS.record_backend("openai.embeddings", start.elapsed(), status.is_success());

        if !status.is_success() {
            let message = serde_json::from_str::<ErrorResponse>(&body)
                .map(|e| e.error.message)
                .unwrap_or(body);
            return Err(match status {
                StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => ProviderError::AuthError(message),
                StatusCode::NOT_FOUND => ProviderError::ModelNotFound(self.model.clone()),
                StatusCode::TOO_MANY_REQUESTS => ProviderError::RateLimited(message),
                _ => ProviderError::api(message, status.as_u16()),
            });
        }

        let parsed: EmbeddingResponse = serde_json::from_str(&body)
            .map_err(|e| ProviderError::ParseError(format!("embedding response: {}", e)))?;

        let mut data = parsed.data;
        if data.len() != texts.len() {
            return Err(ProviderError::ParseError(format!(
                "expected {} embeddings, got {}",
                texts.len(),
                data.len()
            )));
        }
        data.sort_by_key(|d| d.index);

        tracing::trace!(count = texts.len(), elapsed_ms = start.elapsed().as_millis() as u64, "openai embeddings");
        Ok(data.into_iter().map(|d| d.embedding).collect())
    }
}

#[async_trait]
impl EmbeddingProvider for OpenAIEmbeddingProvider {
    fn name(&self) -> &str {
        "openai"
    }

    fn model(&self) -> &str {
        &self.model
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Embedding>, ProviderError> {
        let mut results: Vec<Option<Embedding>> = vec![None; texts.len()];
        let mut uncached: Vec<(usize, String)> = Vec::new();

        for (i, text) in texts.iter().enumerate() {
            let key = EmbeddingCache::make_key(self.name(), &self.model, text);
            match self.cache.get(&key) {
                Some(cached) => results[i] = Some(cached),
                None => uncached.push((i, text.clone())),
            }
        }

        for batch in uncached.chunks(Self::BATCH_SIZE) {
            let inputs: Vec<String> = batch.iter().map(|(_, t)| t.clone()).collect();
            let embeddings = self.request_embeddings(&inputs).await?;
            for ((i, text), embedding) in batch.iter().zip(embeddings) {
                self.cache
                    .put(EmbeddingCache::make_key(self.name(), &self.model, text), embedding.clone());
                results[*i] = Some(embedding);
            }
        }

        results
            .into_iter()
            .map(|r| r.ok_or_else(|| ProviderError::ParseError("missing embedding".to_string())))
            .collect()
    }

    async fn is_available(&self) -> bool {
        self.request_embeddings(&["ping".to_string()]).await.is_ok()
    }
}

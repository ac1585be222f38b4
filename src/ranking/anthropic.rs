// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Anthropic Claude scorer.
//!
//! Uses the Messages API with a single forced tool call (`rank_callers`) so
//! the model answers with structured rankings instead of prose.
//!
//! See [Anthropic Messages API](https://docs.anthropic.com/en/api/messages).

use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

#[cfg(feature = "telemetry")]
use crate::telemetry::metrics::GLOBAL_METRICS;

use super::prompt::{build_prompt, RankingRequest, SYSTEM_PROMPT};
use super::scorer::{CallerScorer, ScoredCandidate};
use crate::config::LlmConfig;
use crate::error::ProviderError;

/// Anthropic API version header value.
const ANTHROPIC_VERSION: &str = "2023-06-01";

const RANK_TOOL: &str = "rank_callers";

/// Caller scorer backed by Claude.
pub struct AnthropicScorer {
    client: Client,
    api_key: String,
    model: String,
    base_url: String,
    max_tokens: u32,
}

impl AnthropicScorer {
    pub fn new(api_key: impl Into<String>, config: &LlmConfig) -> Result<Self, ProviderError> {
        let api_key = api_key.into();
        if api_key.trim().is_empty() {
            return Err(ProviderError::NotConfigured("Anthropic API key is empty".to_string()));
        }

        let client = Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()
            .map_err(|e| ProviderError::NotConfigured(format!("HTTP client: {}", e)))?;

        Ok(Self {
            client,
            api_key,
            model: config.model.clone(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            max_tokens: config.max_tokens,
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn build_request(&self, request: &RankingRequest) -> AnthropicRequest {
        AnthropicRequest {
            model: self.model.clone(),
            max_tokens: self.max_tokens,
            system: SYSTEM_PROMPT.to_string(),
            messages: vec![ApiMessage {
                role: "user".to_string(),
                content: build_prompt(request),
            }],
            tools: vec![rank_tool()],
            tool_choice: ToolChoice {
                choice_type: "tool".to_string(),
                name: RANK_TOOL.to_string(),
            },
        }
    }

    /// Handle an error response from the API.
    fn handle_error_response(&self, status_code: u16, body: &str) -> ProviderError {
        if let Ok(error) = serde_json::from_str::<ApiError>(body) {
            match error.error.error_type.as_str() {
                "authentication_error" => ProviderError::AuthError(error.error.message),
                "rate_limit_error" => ProviderError::RateLimited(error.error.message),
                "invalid_request_error" => {
                    if error.error.message.contains("model") {
                        ProviderError::ModelNotFound(error.error.message)
                    } else {
                        ProviderError::api(error.error.message, status_code)
                    }
                }
                "overloaded_error" => ProviderError::RateLimited("API overloaded".to_string()),
                _ => ProviderError::api(error.error.message, status_code),
            }
        } else {
            ProviderError::api(body.to_string(), status_code)
        }
    }
}

#[async_trait]
impl CallerScorer for AnthropicScorer {
    fn name(&self) -> &str {
        "anthropic"
    }

    async fn rank_callers(&self, request: &RankingRequest) -> Result<Vec<ScoredCandidate>, ProviderError> {
        let body = self.build_request(request);
        let start = Instant::now();
        debug!(model = %self.model, candidates = request.candidates.len(), "Sending ranking request");

        let response = self
            .client
            .post(format!("{}/v1/messages", self.base_url))
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .header("content-type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ProviderError::Timeout(start.elapsed().as_millis() as u64)
                } else {
                    ProviderError::NetworkError(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            #[cfg(feature = "telemetry")]
            GLOBAL_METRICS.record_backend("anthropic", start.elapsed(), false);
            return Err(self.handle_error_response(status.as_u16(), &error_text));
        }

        let api_response: ApiResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::ParseError(e.to_string()))?;

        #[cfg(feature = "telemetry")]
        {
            GLOBAL_METRICS.record_backend("anthropic", start.elapsed(), true);
            GLOBAL_METRICS.record_tokens(
                api_response.usage.input_tokens as u64,
                api_response.usage.output_tokens as u64,
            );
        }

        parse_rankings(api_response)
    }
}

fn rank_tool() -> ApiTool {
    ApiTool {
        name: RANK_TOOL.to_string(),
        description: "Report a likelihood ranking for every candidate caller.".to_string(),
        input_schema: serde_json::json!({
            "type": "object",
            "properties": {
                "rankings": {
                    "type": "array",
                    "items": {
                        "type": "object",
                        "properties": {
                            "location": {
                                "type": "string",
                                "description": "The candidate's path:line exactly as listed"
                            },
                            "confidence": { "type": "number", "minimum": 0, "maximum": 1 },
                            "explanation": { "type": "string" }
                        },
                        "required": ["location", "confidence", "explanation"]
                    }
                }
            },
            "required": ["rankings"]
        }),
    }
}

/// Rankings from the forced tool call.
fn parse_rankings(response: ApiResponse) -> Result<Vec<ScoredCandidate>, ProviderError> {
    let input = response
        .content
        .into_iter()
        .find(|b| b.block_type == "tool_use" && b.name.as_deref() == Some(RANK_TOOL))
        .and_then(|b| b.input)
        .ok_or_else(|| ProviderError::ParseError(format!("response has no {} tool call", RANK_TOOL)))?;

    let parsed: RankCallersInput =
        serde_json::from_value(input).map_err(|e| ProviderError::ParseError(e.to_string()))?;

    Ok(parsed
        .rankings
        .into_iter()
        .map(|r| ScoredCandidate {
            key: r.location,
            confidence: r.confidence,
            explanation: r.explanation,
        })
        .collect())
}

// ============================================================================
// API Types
// ============================================================================

#[derive(Debug, Serialize)]
struct AnthropicRequest {
    model: String,
    max_tokens: u32,
    system: String,
    messages: Vec<ApiMessage>,
    tools: Vec<ApiTool>,
    tool_choice: ToolChoice,
}

#[derive(Debug, Serialize)]
struct ApiMessage {
    role: String,
    content: String,
}

#[derive(Debug, Serialize)]
struct ApiTool {
    name: String,
    description: String,
    input_schema: serde_json::Value,
}

#[derive(Debug, Serialize)]
struct ToolChoice {
    #[serde(rename = "type")]
    choice_type: String,
    name: String,
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    content: Vec<ApiContentBlock>,
    usage: ApiUsage,
}

#[derive(Debug, Deserialize)]
struct ApiContentBlock {
    #[serde(rename = "type")]
    block_type: String,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    input: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct ApiUsage {
    input_tokens: u32,
    output_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct RankCallersInput {
    rankings: Vec<ApiRanking>,
}

#[derive(Debug, Deserialize)]
struct ApiRanking {
    #[serde(default)]
    location: Option<String>,
    confidence: f64,
    #[serde(default)]
    explanation: String,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    error: ApiErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ApiErrorDetail {
    #[serde(rename = "type")]
    error_type: String,
    message: String,
}

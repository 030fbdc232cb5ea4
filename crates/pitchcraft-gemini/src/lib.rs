// SPDX-FileCopyrightText: 2026 Pitchcraft Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Google Gemini generation adapter for Pitchcraft.
//!
//! Implements [`GenerationAdapter`] over the `generateContent` REST endpoint.

pub mod client;
pub mod types;

use std::time::Duration;

use async_trait::async_trait;
use pitchcraft_config::model::GenerationConfig;
use pitchcraft_core::{
    AdapterType, GenerationAdapter, GenerationFailureKind, GenerationRequest, GenerationResponse,
    HealthStatus, PitchcraftError, PluginAdapter, TokenUsage,
};
use tracing::{debug, info};

use crate::client::GeminiClient;
use crate::types::{Content, GenerateContentRequest, GenerationSettings, Part};

/// Environment variable consulted when `generation.api_key` is unset.
pub const API_KEY_ENV: &str = "GEMINI_API_KEY";

/// Gemini generator implementing [`GenerationAdapter`].
///
/// API key resolution order: config -> `GEMINI_API_KEY` env var -> error.
pub struct GeminiGenerator {
    client: GeminiClient,
    model: String,
}

impl GeminiGenerator {
    pub fn new(config: &GenerationConfig) -> Result<Self, PitchcraftError> {
        let api_key = resolve_api_key(&config.api_key)?;
        let client = GeminiClient::new(
            &api_key,
            &config.base_url,
            Duration::from_secs(config.timeout_secs),
            config.max_retries,
        )?;
        info!(model = config.model.as_str(), "Gemini generator initialized");
        Ok(Self {
            client,
            model: config.model.clone(),
        })
    }

    #[cfg(test)]
    fn with_client(client: GeminiClient, model: &str) -> Self {
        Self {
            client,
            model: model.to_string(),
        }
    }
}

/// Resolves the API key from config, then the environment.
pub fn resolve_api_key(config_key: &Option<String>) -> Result<String, PitchcraftError> {
    if let Some(key) = config_key
        && !key.is_empty()
    {
        return Ok(key.clone());
    }

    std::env::var(API_KEY_ENV)
        .ok()
        .filter(|key| !key.is_empty())
        .ok_or_else(|| {
            PitchcraftError::Config(format!(
                "Gemini API key not found. Set generation.api_key in config or the {API_KEY_ENV} \
                 environment variable."
            ))
        })
}

#[async_trait]
impl PluginAdapter for GeminiGenerator {
    fn name(&self) -> &str {
        "gemini"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Generation
    }

    async fn health_check(&self) -> Result<HealthStatus, PitchcraftError> {
        // No test request: a health check should not spend quota.
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), PitchcraftError> {
        debug!("Gemini generator shutting down");
        Ok(())
    }
}

#[async_trait]
impl GenerationAdapter for GeminiGenerator {
    async fn complete(
        &self,
        request: GenerationRequest,
    ) -> Result<GenerationResponse, PitchcraftError> {
        let api_request = GenerateContentRequest {
            contents: vec![Content {
                role: Some("user".to_string()),
                parts: vec![Part {
                    text: Some(request.prompt),
                }],
            }],
            generation_config: Some(GenerationSettings {
                max_output_tokens: request.max_output_tokens,
                temperature: request.temperature,
            }),
        };

        let response = self.client.generate_content(&self.model, &api_request).await?;

        if let Some(reason) = response
            .prompt_feedback
            .as_ref()
            .and_then(|f| f.block_reason.as_deref())
        {
            return Err(PitchcraftError::generation(
                GenerationFailureKind::Rejected,
                format!("prompt blocked: {reason}"),
            ));
        }

        let text = response.text();
        if text.trim().is_empty() {
            return Err(PitchcraftError::generation(
                GenerationFailureKind::EmptyOutput,
                format!(
                    "model returned no text (finish reason: {})",
                    response.finish_reason().unwrap_or_else(|| "unknown".into())
                ),
            ));
        }

        Ok(GenerationResponse {
            text,
            model: response.model_version.clone().unwrap_or_else(|| self.model.clone()),
            finish_reason: response.finish_reason(),
            usage: response.usage_metadata.map(|u| TokenUsage {
                input_tokens: u.prompt_token_count,
                output_tokens: u.candidates_token_count,
            }),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const MODEL: &str = "gemini-2.5-flash-lite";

    fn generator(server: &MockServer) -> GeminiGenerator {
        let client = GeminiClient::new("k", &server.uri(), Duration::from_secs(5), 0).unwrap();
        GeminiGenerator::with_client(client, MODEL)
    }

    fn request(prompt: &str) -> GenerationRequest {
        GenerationRequest {
            prompt: prompt.into(),
            max_output_tokens: 256,
            temperature: Some(0.4),
        }
    }

    #[test]
    fn config_key_wins() {
        assert_eq!(resolve_api_key(&Some("abc".into())).unwrap(), "abc");
    }

    #[test]
    fn missing_key_names_the_env_var() {
        // Only meaningful when the variable is unset in the test environment.
        if let Err(e) = resolve_api_key(&None) {
            assert!(e.to_string().contains(API_KEY_ENV), "got: {e}");
        }
    }

    #[tokio::test]
    async fn complete_maps_text_and_usage() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(format!("/v1beta/models/{MODEL}:generateContent")))
            .and(body_partial_json(serde_json::json!({
                "contents": [{"role": "user", "parts": [{"text": "Write a tagline"}]}],
                "generationConfig": {"maxOutputTokens": 256}
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "candidates": [{"content": {"parts": [{"text": "Reach orbit [F1]."}]}, "finishReason": "STOP"}],
                "usageMetadata": {"promptTokenCount": 40, "candidatesTokenCount": 5},
                "modelVersion": "gemini-2.5-flash-lite-001"
            })))
            .mount(&server)
            .await;

        let response = generator(&server)
            .complete(request("Write a tagline"))
            .await
            .unwrap();
        assert_eq!(response.text, "Reach orbit [F1].");
        assert_eq!(response.model, "gemini-2.5-flash-lite-001");
        assert_eq!(
            response.usage,
            Some(TokenUsage {
                input_tokens: 40,
                output_tokens: 5
            })
        );
    }

    #[tokio::test]
    async fn empty_candidate_is_empty_output() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "candidates": [{"content": {"parts": []}, "finishReason": "MAX_TOKENS"}]
            })))
            .mount(&server)
            .await;

        let err = generator(&server).complete(request("x")).await.unwrap_err();
        assert!(matches!(
            err,
            PitchcraftError::GenerationFailed {
                kind: GenerationFailureKind::EmptyOutput,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn blocked_prompt_is_rejected() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "promptFeedback": {"blockReason": "SAFETY"}
            })))
            .mount(&server)
            .await;

        let err = generator(&server).complete(request("x")).await.unwrap_err();
        assert!(matches!(
            err,
            PitchcraftError::GenerationFailed {
                kind: GenerationFailureKind::Rejected,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn user_message_hides_upstream_detail() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500).set_body_string("secret stack trace"))
            .mount(&server)
            .await;

        let err = generator(&server).complete(request("private prompt")).await.unwrap_err();
        let shown = err.user_message();
        assert!(!shown.contains("secret"));
        assert!(!shown.contains("private prompt"));
    }
}

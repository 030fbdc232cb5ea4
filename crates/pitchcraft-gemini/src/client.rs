// SPDX-FileCopyrightText: 2026 Pitchcraft Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP client for the Gemini `generateContent` API.
//!
//! Handles authentication, request construction and retry of transient
//! errors (429, 500, 503) with exponential backoff that honours `Retry-After`.

use std::time::Duration;

use pitchcraft_core::{GenerationFailureKind, PitchcraftError};
use reqwest::StatusCode;
use reqwest::header::{HeaderMap, HeaderValue, RETRY_AFTER};
use tracing::{debug, warn};

use crate::types::{ApiErrorResponse, GenerateContentRequest, GenerateContentResponse};

const INITIAL_BACKOFF: Duration = Duration::from_secs(1);
const MAX_BACKOFF: Duration = Duration::from_secs(30);

#[derive(Debug, Clone)]
pub struct GeminiClient {
    client: reqwest::Client,
    base_url: String,
    max_retries: u32,
    initial_backoff: Duration,
}

impl GeminiClient {
    pub fn new(
        api_key: &str,
        base_url: &str,
        timeout: Duration,
        max_retries: u32,
    ) -> Result<Self, PitchcraftError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            "x-goog-api-key",
            HeaderValue::from_str(api_key)
                .map_err(|e| PitchcraftError::Config(format!("invalid API key header value: {e}")))?,
        );
        headers.insert("content-type", HeaderValue::from_static("application/json"));

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .build()
            .map_err(|e| PitchcraftError::GenerationFailed {
                kind: GenerationFailureKind::Upstream,
                message: format!("failed to build HTTP client: {e}"),
                source: Some(Box::new(e)),
            })?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            max_retries,
            initial_backoff: INITIAL_BACKOFF,
        })
    }

    /// Overrides the first retry delay (for testing with wiremock).
    #[cfg(test)]
    pub fn with_backoff(mut self, initial: Duration) -> Self {
        self.initial_backoff = initial;
        self
    }

    fn endpoint(&self, model: &str) -> String {
        format!("{}/v1beta/models/{model}:generateContent", self.base_url)
    }

    /// Sends one request, retrying transient failures up to `max_retries` times.
    pub async fn generate_content(
        &self,
        model: &str,
        request: &GenerateContentRequest,
    ) -> Result<GenerateContentResponse, PitchcraftError> {
        let url = self.endpoint(model);
        let mut attempt = 0u32;

        loop {
            let response = self
                .client
                .post(&url)
                .json(request)
                .send()
                .await
                .map_err(transport_error)?;

            let status = response.status();
            debug!(status = %status, attempt, model, "generateContent response received");

            if status.is_success() {
                let body = response.text().await.map_err(transport_error)?;
                return serde_json::from_str(&body).map_err(|e| PitchcraftError::GenerationFailed {
                    kind: GenerationFailureKind::Upstream,
                    message: format!("failed to parse API response: {e}"),
                    source: Some(Box::new(e)),
                });
            }

            if is_transient_error(status) && attempt < self.max_retries {
                let delay = retry_after(response.headers())
                    .unwrap_or_else(|| self.backoff(attempt))
                    .min(MAX_BACKOFF);
                warn!(status = %status, attempt, delay_ms = delay.as_millis() as u64, "transient error, will retry");
                tokio::time::sleep(delay).await;
                attempt += 1;
                continue;
            }

            let body = response.text().await.unwrap_or_default();
            return Err(status_error(status, &body));
        }
    }

    fn backoff(&self, attempt: u32) -> Duration {
        self.initial_backoff
            .saturating_mul(2u32.saturating_pow(attempt))
    }
}

/// Returns true for HTTP status codes that indicate transient errors worth retrying.
fn is_transient_error(status: StatusCode) -> bool {
    matches!(status.as_u16(), 429 | 500 | 503)
}

fn retry_after(headers: &HeaderMap) -> Option<Duration> {
    headers
        .get(RETRY_AFTER)?
        .to_str()
        .ok()?
        .trim()
        .parse::<u64>()
        .ok()
        .map(Duration::from_secs)
}

fn transport_error(e: reqwest::Error) -> PitchcraftError {
    let kind = if e.is_timeout() {
        GenerationFailureKind::Timeout
    } else {
        GenerationFailureKind::Upstream
    };
    PitchcraftError::GenerationFailed {
        kind,
        message: format!("HTTP request failed: {e}"),
        source: Some(Box::new(e)),
    }
}

fn status_error(status: StatusCode, body: &str) -> PitchcraftError {
    let detail = match serde_json::from_str::<ApiErrorResponse>(body) {
        Ok(api) => format!("Gemini API error ({} {}): {}", api.error.code, api.error.status, api.error.message),
        Err(_) => format!("API returned {status}"),
    };
    let kind = match status.as_u16() {
        429 => GenerationFailureKind::RateLimited,
        500..=599 => GenerationFailureKind::Upstream,
        _ => GenerationFailureKind::Rejected,
    };
    PitchcraftError::generation(kind, detail)
}

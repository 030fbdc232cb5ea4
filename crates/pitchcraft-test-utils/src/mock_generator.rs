// SPDX-FileCopyrightText: 2026 Pitchcraft Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Mock generation adapter for deterministic testing.
//!
//! `MockGenerator` implements `GenerationAdapter` with pre-configured
//! responses, enabling fast, CI-runnable tests without external API calls.

use std::collections::VecDeque;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex;

use pitchcraft_core::{
    AdapterType, GenerationAdapter, GenerationFailureKind, GenerationRequest, GenerationResponse,
    HealthStatus, PitchcraftError, PluginAdapter, TokenUsage,
};

enum Scripted {
    Text(String),
    Fail(GenerationFailureKind),
}

#[derive(Default)]
struct State {
    script: VecDeque<Scripted>,
    prompts: Vec<String>,
    delay: Option<Duration>,
}

/// A mock generator that returns pre-configured responses.
///
/// Responses are popped from a FIFO queue. When the queue is empty,
/// a default "mock response" text is returned.
#[derive(Default)]
pub struct MockGenerator {
    state: Mutex<State>,
}

impl MockGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_responses(responses: Vec<String>) -> Self {
        Self {
            state: Mutex::new(State {
                script: responses.into_iter().map(Scripted::Text).collect(),
                ..State::default()
            }),
        }
    }

    pub async fn push_response(&self, text: impl Into<String>) {
        self.state
            .lock()
            .await
            .script
            .push_back(Scripted::Text(text.into()));
    }

    /// Queues a failure of the given kind.
    pub async fn fail_next(&self, kind: GenerationFailureKind) {
        self.state.lock().await.script.push_back(Scripted::Fail(kind));
    }

    pub async fn set_delay(&self, delay: Duration) {
        self.state.lock().await.delay = Some(delay);
    }

    /// Every prompt received so far, oldest first.
    pub async fn prompts(&self) -> Vec<String> {
        self.state.lock().await.prompts.clone()
    }

    pub async fn call_count(&self) -> usize {
        self.state.lock().await.prompts.len()
    }
}

#[async_trait]
impl PluginAdapter for MockGenerator {
    fn name(&self) -> &str {
        "mock-generator"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Generation
    }

    async fn health_check(&self) -> Result<HealthStatus, PitchcraftError> {
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), PitchcraftError> {
        Ok(())
    }
}

#[async_trait]
impl GenerationAdapter for MockGenerator {
    async fn complete(
        &self,
        request: GenerationRequest,
    ) -> Result<GenerationResponse, PitchcraftError> {
        let (next, delay) = {
            let mut state = self.state.lock().await;
            state.prompts.push(request.prompt.clone());
            (state.script.pop_front(), state.delay)
        };

        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let text = match next {
            Some(Scripted::Fail(kind)) => {
                return Err(PitchcraftError::generation(kind, "scripted mock failure"));
            }
            Some(Scripted::Text(text)) => text,
            None => "mock response".to_string(),
        };

        Ok(GenerationResponse {
            usage: Some(TokenUsage {
                input_tokens: (request.prompt.len() / 4) as u32,
                output_tokens: (text.len() / 4) as u32,
            }),
            text,
            model: "mock-model".to_string(),
            finish_reason: Some("STOP".to_string()),
        })
    }
}

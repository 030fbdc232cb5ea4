// SPDX-FileCopyrightText: 2026 Pitchcraft Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Grounded generation: retrieve, window, prompt, generate, persist.

use std::sync::Arc;
use std::time::Duration;

use pitchcraft_config::model::{GenerationConfig, RetrievalConfig};
use pitchcraft_core::{
    ConversationId, GeneratedResponse, GenerationAdapter, GenerationFailureKind,
    GenerationRequest, GenerationResponse, PitchcraftError, RetrievalResult, UserScope,
};
use pitchcraft_knowledge::Retriever;
use pitchcraft_memory::ConversationMemory;
use strum::Display;
use tracing::{debug, trace, warn};

use crate::prompt::{PromptBuilder, render_grounding, render_memory, render_query};

/// Stages of one `generate` call, logged as they are entered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum GenerationStage {
    Retrieving,
    Windowing,
    Prompting,
    Generating,
    Persisting,
    Done,
    Failed,
}

pub struct GenerationOrchestrator {
    retriever: Retriever,
    memory: Arc<ConversationMemory>,
    generator: Arc<dyn GenerationAdapter>,
    prompt: PromptBuilder,
    top_k: usize,
    max_output_tokens: u32,
    temperature: Option<f32>,
    timeout: Duration,
}

impl GenerationOrchestrator {
    pub fn new(
        retriever: Retriever,
        memory: Arc<ConversationMemory>,
        generator: Arc<dyn GenerationAdapter>,
        prompt: PromptBuilder,
        retrieval: &RetrievalConfig,
        generation: &GenerationConfig,
    ) -> Self {
        Self {
            retriever,
            memory,
            generator,
            prompt,
            top_k: retrieval.top_k,
            max_output_tokens: generation.max_output_tokens,
            temperature: generation.temperature,
            timeout: Duration::from_secs(generation.timeout_secs),
        }
    }

    /// Answers `query` for `scope` inside `conversation_id`.
    ///
    /// Nothing is written unless generation succeeds; the query and the reply
    /// are then stored together as the next two turns. A scope with no
    /// knowledge still gets an (ungrounded) answer.
    pub async fn generate(
        &self,
        scope: &UserScope,
        conversation_id: &ConversationId,
        query: &str,
    ) -> Result<GeneratedResponse, PitchcraftError> {
        if query.trim().is_empty() {
            return Err(PitchcraftError::InvalidInput("query must not be empty".into()));
        }

        let result = self.run(scope, conversation_id, query).await;
        if let Err(ref e) = result {
            debug!(
                scope = %scope,
                conversation_id = %conversation_id,
                stage = %GenerationStage::Failed,
                error = %e,
                "generation stage"
            );
        }
        result
    }

    async fn run(
        &self,
        scope: &UserScope,
        conversation_id: &ConversationId,
        query: &str,
    ) -> Result<GeneratedResponse, PitchcraftError> {
        let enter = |stage: GenerationStage| {
            debug!(
                scope = %scope,
                conversation_id = %conversation_id,
                stage = %stage,
                "generation stage"
            );
        };

        enter(GenerationStage::Retrieving);
        let retrieval = match self.retriever.retrieve(scope, query, self.top_k).await {
            Ok(retrieval) => retrieval,
            Err(PitchcraftError::ScopeNotFound { .. }) => {
                warn!(scope = %scope, "no knowledge for scope, answering ungrounded");
                RetrievalResult::empty(scope.clone())
            }
            Err(e) => return Err(e),
        };

        enter(GenerationStage::Windowing);
        let grounding = render_grounding(&retrieval);
        let query_segment = render_query(query);
        let budget = self.prompt.memory_budget(&grounding, &query_segment);
        let window = self.memory.window(conversation_id, budget).await?;
        debug!(
            conversation_id = %conversation_id,
            budget,
            turns = window.turns.len(),
            omitted = window.omitted,
            truncated = window.truncated,
            "memory window built"
        );

        enter(GenerationStage::Prompting);
        let prompt = self
            .prompt
            .build(&grounding, &render_memory(&window), &query_segment);
        trace!(conversation_id = %conversation_id, prompt = %prompt, "assembled prompt");

        enter(GenerationStage::Generating);
        let request = GenerationRequest {
            prompt,
            max_output_tokens: self.max_output_tokens,
            temperature: self.temperature,
        };
        let response = complete_within(self.generator.as_ref(), request, self.timeout).await?;

        enter(GenerationStage::Persisting);
        let (user, assistant) = self
            .memory
            .append_exchange(conversation_id, query, response.text.clone())
            .await?;

        enter(GenerationStage::Done);
        Ok(GeneratedResponse {
            conversation_id: conversation_id.clone(),
            text: response.text,
            user_sequence: user.sequence_number,
            assistant_sequence: assistant.sequence_number,
            grounded: !retrieval.is_empty(),
            fragment_ids: retrieval.ids(),
        })
    }
}

/// Runs one generation call under `timeout`.
///
/// Every failure comes back as `GenerationFailed`, and a reply with no text
/// is `EmptyOutput`.
pub(crate) async fn complete_within(
    generator: &dyn GenerationAdapter,
    request: GenerationRequest,
    timeout: Duration,
) -> Result<GenerationResponse, PitchcraftError> {
    let response = match tokio::time::timeout(timeout, generator.complete(request)).await {
        Ok(Ok(response)) => response,
        Ok(Err(e @ PitchcraftError::GenerationFailed { .. })) => return Err(e),
        Ok(Err(e)) => {
            return Err(PitchcraftError::GenerationFailed {
                kind: GenerationFailureKind::Upstream,
                message: "generation adapter failed".into(),
                source: Some(Box::new(e)),
            });
        }
        Err(_) => {
            return Err(PitchcraftError::generation(
                GenerationFailureKind::Timeout,
                format!("no response within {}s", timeout.as_secs()),
            ));
        }
    };
    if response.text.trim().is_empty() {
        return Err(PitchcraftError::generation(
            GenerationFailureKind::EmptyOutput,
            "generation returned no text",
        ));
    }
    if let Some(usage) = response.usage {
        debug!(
            model = response.model.as_str(),
            input_tokens = usage.input_tokens,
            output_tokens = usage.output_tokens,
            "generation usage"
        );
    }
    Ok(response)
}

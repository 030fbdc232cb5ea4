// SPDX-FileCopyrightText: 2026 Pitchcraft Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Discovery questions: web research prompts derived from a scope's profile.
//!
//! Stateless. Nothing is written to the conversation log.

use std::sync::Arc;
use std::time::Duration;

use pitchcraft_config::model::GenerationConfig;
use pitchcraft_core::{
    GenerationAdapter, GenerationFailureKind, GenerationRequest, PitchcraftError, UserScope,
    VectorStoreAdapter,
};
use tracing::{debug, trace};

use crate::orchestrator::complete_within;
use crate::prompt::{PromptBuilder, render_discovery_request, render_profile};

/// Fewest questions a usable reply may contain.
pub const MIN_QUESTIONS: usize = 5;
/// Questions beyond this are dropped.
pub const MAX_QUESTIONS: usize = 12;

pub struct DiscoveryPlanner {
    store: Arc<dyn VectorStoreAdapter>,
    generator: Arc<dyn GenerationAdapter>,
    prompt: PromptBuilder,
    max_output_tokens: u32,
    temperature: Option<f32>,
    timeout: Duration,
}

impl DiscoveryPlanner {
    pub fn new(
        store: Arc<dyn VectorStoreAdapter>,
        generator: Arc<dyn GenerationAdapter>,
        prompt: PromptBuilder,
        generation: &GenerationConfig,
    ) -> Self {
        Self {
            store,
            generator,
            prompt,
            max_output_tokens: generation.max_output_tokens,
            temperature: generation.temperature,
            timeout: Duration::from_secs(generation.timeout_secs),
        }
    }

    /// Between [`MIN_QUESTIONS`] and [`MAX_QUESTIONS`] research questions
    /// for `scope`.
    ///
    /// Fails with `ScopeNotFound` when the scope has no profile, and with
    /// `GenerationFailed { kind: MalformedOutput }` when the reply is not a
    /// JSON array holding enough questions.
    pub async fn questions(&self, scope: &UserScope) -> Result<Vec<String>, PitchcraftError> {
        let fragments = self.store.fragments_for_scope(scope).await?;
        if fragments.is_empty() {
            return Err(PitchcraftError::ScopeNotFound {
                scope: scope.to_string(),
            });
        }

        let prompt = self.prompt.build_standalone(
            &render_profile(&fragments),
            &render_discovery_request(MIN_QUESTIONS, MAX_QUESTIONS),
        );
        trace!(scope = %scope, prompt = %prompt, "assembled discovery prompt");

        let request = GenerationRequest {
            prompt,
            max_output_tokens: self.max_output_tokens,
            temperature: self.temperature,
        };
        let response = complete_within(self.generator.as_ref(), request, self.timeout).await?;
        let questions = parse_questions(&response.text)?;
        debug!(
            scope = %scope,
            facts = fragments.len(),
            questions = questions.len(),
            "discovery questions generated"
        );
        Ok(questions)
    }
}

/// Parses a model reply into a cleaned question list.
///
/// Accepts the array bare or inside a single fenced code block. Questions are
/// trimmed, blanks and case-insensitive duplicates dropped, and the list is
/// capped at [`MAX_QUESTIONS`].
pub fn parse_questions(text: &str) -> Result<Vec<String>, PitchcraftError> {
    let raw: Vec<String> = serde_json::from_str(strip_fence(text)).map_err(|e| {
        PitchcraftError::GenerationFailed {
            kind: GenerationFailureKind::MalformedOutput,
            message: "expected a JSON array of question strings".into(),
            source: Some(Box::new(e)),
        }
    })?;

    let mut questions: Vec<String> = Vec::with_capacity(raw.len());
    for question in raw {
        let question = question.trim();
        if question.is_empty()
            || questions
                .iter()
                .any(|q| q.to_lowercase() == question.to_lowercase())
        {
            continue;
        }
        questions.push(question.to_string());
    }

    if questions.len() < MIN_QUESTIONS {
        return Err(PitchcraftError::generation(
            GenerationFailureKind::MalformedOutput,
            format!(
                "reply held {} usable questions, at least {MIN_QUESTIONS} required",
                questions.len()
            ),
        ));
    }
    if questions.len() > MAX_QUESTIONS {
        debug!(
            returned = questions.len(),
            kept = MAX_QUESTIONS,
            "dropping surplus discovery questions"
        );
        questions.truncate(MAX_QUESTIONS);
    }
    Ok(questions)
}

fn strip_fence(text: &str) -> &str {
    let text = text.trim();
    let Some(rest) = text.strip_prefix("```") else {
        return text;
    };
    // Drop the info string (`json`) on the opening line.
    let body = rest.split_once('\n').map_or("", |(_, body)| body);
    body.trim_end().strip_suffix("```").unwrap_or(body).trim()
}

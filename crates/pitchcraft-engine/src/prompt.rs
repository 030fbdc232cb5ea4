// SPDX-FileCopyrightText: 2026 Pitchcraft Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Deterministic prompt assembly.
//!
//! A prompt is the system instruction followed by three segments in a fixed
//! order: business facts, the conversation window (oldest to newest) and the
//! current request. Facts are tagged `[F1]`, `[F2]`... in retrieval order and
//! turns `[T<sequence> <role>]`, so the generated text can cite what it used.

use std::fmt::Write;

use pitchcraft_config::model::{MemoryConfig, PromptConfig};
use pitchcraft_core::{KnowledgeFragment, MemoryWindow, RetrievalResult};
use pitchcraft_memory::TokenEstimator;
use tracing::debug;

const NO_FACTS: &str = "No business profile is on file for this user. Answer from general \
                        marketing knowledge and say which specifics would help.";
const NO_HISTORY: &str = "(this is the start of the conversation)";
const CITATION_RULE: &str =
    "Cite the facts you rely on by their tag, for example [F1]. Never state business details \
     that are not in the facts above.";

/// Renders a scope's whole profile, in canonical field order, for prompts
/// that are not driven by a query.
pub fn render_profile(fragments: &[KnowledgeFragment]) -> String {
    let mut out = String::from("## Business profile\n");
    for fragment in fragments {
        let _ = writeln!(out, "- {}", fragment.text);
    }
    out
}

/// Renders the instructions for a discovery-question request.
pub fn render_discovery_request(min: usize, max: usize) -> String {
    format!(
        "## Request\nGenerate between {min} and {max} web search questions that would help \
         research this business and sharpen its marketing strategy. Questions must be relevant \
         to the business and search-engine friendly.\n\nReturn ONLY a JSON array of strings, \
         for example [\"Question 1\", \"Question 2\"]. No markdown, no extra text.\n"
    )
}

/// Renders the business-facts segment.
pub fn render_grounding(retrieval: &RetrievalResult) -> String {
    let mut out = String::from("## Business facts\n");
    if retrieval.is_empty() {
        out.push_str(NO_FACTS);
        out.push('\n');
        return out;
    }
    for (index, scored) in retrieval.fragments.iter().enumerate() {
        let _ = writeln!(out, "[F{}] {}", index + 1, scored.fragment.text);
    }
    out
}

/// Renders the conversation segment.
pub fn render_memory(window: &MemoryWindow) -> String {
    let mut out = String::from("## Conversation so far\n");
    if window.omitted > 0 {
        let _ = writeln!(out, "({} earlier turns omitted)", window.omitted);
    }
    if window.is_empty() {
        out.push_str(NO_HISTORY);
        out.push('\n');
        return out;
    }
    let last = window.turns.len() - 1;
    for (index, turn) in window.turns.iter().enumerate() {
        let marker = if window.truncated && index == last {
            " (truncated)"
        } else {
            ""
        };
        let _ = writeln!(
            out,
            "[T{} {}]{marker} {}",
            turn.sequence_number,
            turn.role.as_str(),
            turn.text
        );
    }
    out
}

/// Renders the current-request segment.
pub fn render_query(query: &str) -> String {
    format!("## Request\n{}\n\n{CITATION_RULE}\n", query.trim())
}

/// Assembles prompts under a token budget.
#[derive(Debug, Clone)]
pub struct PromptBuilder {
    instruction: String,
    estimator: TokenEstimator,
    budget_tokens: usize,
    min_window_tokens: usize,
    max_window_tokens: usize,
}

impl PromptBuilder {
    pub fn new(instruction: String, prompt: &PromptConfig, memory: &MemoryConfig) -> Self {
        Self {
            instruction,
            estimator: TokenEstimator::from_config(memory),
            budget_tokens: prompt.budget_tokens,
            min_window_tokens: memory.min_window_tokens,
            max_window_tokens: memory.max_window_tokens.max(memory.min_window_tokens),
        }
    }

    pub fn instruction(&self) -> &str {
        &self.instruction
    }

    /// Tokens left for the conversation window once the instruction, the
    /// facts and the request are paid for, clamped to the configured bounds.
    ///
    /// The `min_window_tokens` floor wins over `budget_tokens`: when the fixed
    /// segments leave less than the floor, the window still gets the floor and
    /// the assembled prompt exceeds `budget_tokens`. That case is logged at
    /// debug.
    pub fn memory_budget(&self, grounding: &str, query_segment: &str) -> usize {
        let fixed = self.estimator.estimate(&self.instruction)
            + self.estimator.estimate(grounding)
            + self.estimator.estimate(query_segment);
        let remaining = self.budget_tokens.saturating_sub(fixed);
        if remaining < self.min_window_tokens {
            debug!(
                budget_tokens = self.budget_tokens,
                fixed,
                remaining,
                floor = self.min_window_tokens,
                "window floor exceeds remaining prompt budget"
            );
        }
        remaining
            .max(self.min_window_tokens)
            .min(self.max_window_tokens)
    }

    /// Joins the instruction, the profile and a standalone request.
    pub fn build_standalone(&self, profile: &str, request: &str) -> String {
        format!("{}\n\n{profile}\n{request}", self.instruction)
    }

    /// Joins the instruction and the three segments.
    pub fn build(&self, grounding: &str, memory: &str, query_segment: &str) -> String {
        format!(
            "{}\n\n{grounding}\n{memory}\n{query_segment}",
            self.instruction
        )
    }
}

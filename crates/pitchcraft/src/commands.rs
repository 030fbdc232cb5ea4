// SPDX-FileCopyrightText: 2026 Pitchcraft Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! One-shot subcommands: ingest, ask, questions, history, forget.

use std::path::Path;

use colored::Colorize;
use pitchcraft_config::PitchcraftConfig;
use pitchcraft_core::{
    ConversationId, ConversationTurn, FragmentId, GeneratedResponse, IngestReport,
    PitchcraftError, RawProfile, Role, UserScope,
};
use pitchcraft_engine::Engine;
use pitchcraft_knowledge::extractor::resolve_field;
use pitchcraft_memory::ConversationMemory;

use crate::runtime;

/// Splits a `field=value` argument. The value may itself contain `=`.
pub fn parse_pair(raw: &str) -> Result<(String, String), PitchcraftError> {
    match raw.split_once('=') {
        Some((key, value)) if !key.trim().is_empty() => {
            Ok((key.trim().to_string(), value.to_string()))
        }
        _ => Err(PitchcraftError::InvalidInput(format!(
            "expected field=value, got `{raw}`"
        ))),
    }
}

/// Merges a JSON answers file with command-line pairs; pairs win.
pub fn load_profile(pairs: &[String], file: Option<&Path>) -> Result<RawProfile, PitchcraftError> {
    let mut profile = match file {
        Some(path) => {
            let content = std::fs::read_to_string(path).map_err(|e| {
                PitchcraftError::InvalidInput(format!("cannot read {}: {e}", path.display()))
            })?;
            serde_json::from_str::<RawProfile>(&content).map_err(|e| {
                PitchcraftError::InvalidInput(format!(
                    "{} is not a JSON object of strings: {e}",
                    path.display()
                ))
            })?
        }
        None => RawProfile::new(),
    };
    for raw in pairs {
        let (key, value) = parse_pair(raw)?;
        profile.insert(key, value);
    }
    if profile.is_empty() {
        return Err(PitchcraftError::InvalidInput(
            "no onboarding answers given (pass field=value pairs or --file)".into(),
        ));
    }
    Ok(profile)
}

pub async fn ingest(
    config: &PitchcraftConfig,
    scope: &str,
    pairs: &[String],
    file: Option<&Path>,
) -> Result<(), PitchcraftError> {
    let scope = UserScope::new(scope)?;
    let profile = load_profile(pairs, file)?;
    let pipeline = runtime::build_ingestion(config).await?;
    let report = pipeline.ingest(&scope, &profile).await?;
    print!("{}", format_report(&report));
    Ok(())
}

pub fn format_report(report: &IngestReport) -> String {
    let join = |fields: &[pitchcraft_core::SourceField]| {
        fields
            .iter()
            .map(|f| f.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    };
    let mut out = format!("{} fragment(s) written\n", report.count());
    if !report.created.is_empty() {
        out.push_str(&format!("  created:   {}\n", join(&report.created)));
    }
    if !report.updated.is_empty() {
        out.push_str(&format!("  updated:   {}\n", join(&report.updated)));
    }
    if !report.unchanged.is_empty() {
        out.push_str(&format!("  unchanged: {}\n", join(&report.unchanged)));
    }
    if !report.skipped.is_empty() {
        out.push_str(&format!("  skipped:   {}\n", report.skipped.join(", ")));
    }
    out
}

pub async fn ask(
    config: &PitchcraftConfig,
    scope: &str,
    conversation: &str,
    query: &str,
) -> Result<(), PitchcraftError> {
    let scope = UserScope::new(scope)?;
    let conversation = ConversationId::new(conversation)?;
    let engine = runtime::build_engine(config).await?;
    let result = engine.generate(&scope, &conversation, query).await;
    engine.shutdown().await;
    print_response(&result?);
    Ok(())
}

pub async fn questions(
    config: &PitchcraftConfig,
    scope: &str,
    answer: bool,
    conversation: &str,
) -> Result<(), PitchcraftError> {
    let scope = UserScope::new(scope)?;
    let conversation = ConversationId::new(conversation)?;
    let engine = runtime::build_engine(config).await?;
    let result = research(&engine, &scope, answer, &conversation).await;
    engine.shutdown().await;
    result
}

async fn research(
    engine: &Engine,
    scope: &UserScope,
    answer: bool,
    conversation: &ConversationId,
) -> Result<(), PitchcraftError> {
    let questions = engine.discovery_questions(scope).await?;
    for (index, question) in questions.iter().enumerate() {
        println!("{}", format_question(index, question).bold());
        if answer {
            let response = engine.generate(scope, conversation, question).await?;
            println!("{}\n", response.text);
        }
    }
    Ok(())
}

pub fn format_question(index: usize, question: &str) -> String {
    format!("{:>2}. {question}", index + 1)
}

pub fn print_response(response: &GeneratedResponse) {
    println!("{}", response.text);
    if response.grounded {
        println!(
            "{}",
            format!("(grounded in {} fact(s))", response.fragment_ids.len()).dimmed()
        );
    } else {
        println!(
            "{}",
            "(no business profile found; answer is not grounded)".yellow()
        );
    }
}

pub async fn history(config: &PitchcraftConfig, conversation: &str) -> Result<(), PitchcraftError> {
    let conversation = ConversationId::new(conversation)?;
    let storage = runtime::open_storage(config).await?;
    let memory = ConversationMemory::new(storage, &config.memory);
    let turns = memory.turns(&conversation).await?;
    if turns.is_empty() {
        println!("no turns recorded for {conversation}");
    }
    for turn in &turns {
        println!("{}", format_turn(turn));
    }
    Ok(())
}

pub fn format_turn(turn: &ConversationTurn) -> String {
    let role = match turn.role {
        Role::User => turn.role.as_str().cyan(),
        Role::Assistant => turn.role.as_str().green(),
    };
    format!("[{}] {role}: {}", turn.sequence_number, turn.text)
}

pub async fn forget(config: &PitchcraftConfig, scope: &str, field: &str) -> Result<(), PitchcraftError> {
    let scope = UserScope::new(scope)?;
    let field = resolve_field(field)
        .ok_or_else(|| PitchcraftError::InvalidInput(format!("unknown onboarding field `{field}`")))?;
    let storage = runtime::open_storage(config).await?;
    let store = runtime::open_vector_store(config, &storage).await?;
    if store.delete(&FragmentId::derive(&scope, field)).await? {
        println!("forgot {field} for {scope}");
    } else {
        println!("{scope} has no {field} fragment");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pitchcraft_core::SourceField;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn parse_pair_round_trips(key in "[a-z_]{1,16}", value in "[^\\n]{0,40}") {
            let (k, v) = parse_pair(&format!("{key}={value}")).unwrap();
            prop_assert_eq!(k, key);
            prop_assert_eq!(v, value);
        }
    }

    #[test]
    fn parse_pair_splits_on_first_equals() {
        let (key, value) = parse_pair("tone = playful=bold").unwrap();
        assert_eq!(key, "tone");
        assert_eq!(value, " playful=bold");
    }

    #[test]
    fn parse_pair_rejects_missing_key() {
        assert!(matches!(
            parse_pair("=Rockets"),
            Err(PitchcraftError::InvalidInput(_))
        ));
        assert!(parse_pair("no separator").is_err());
    }

    #[test]
    fn pairs_override_file_answers() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("answers.json");
        std::fs::write(&path, r#"{"company_name": "Acme", "product": "Anvils"}"#).unwrap();

        let profile = load_profile(&["product=Rockets".to_string()], Some(&path)).unwrap();
        let collected: Vec<_> = profile.iter().collect();
        assert_eq!(collected, vec![("company_name", "Acme"), ("product", "Rockets")]);
    }

    #[test]
    fn empty_profile_is_rejected() {
        assert!(matches!(
            load_profile(&[], None),
            Err(PitchcraftError::InvalidInput(_))
        ));
    }

    #[test]
    fn malformed_file_is_invalid_input() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("answers.json");
        std::fs::write(&path, "[1, 2]").unwrap();
        assert!(matches!(
            load_profile(&[], Some(&path)),
            Err(PitchcraftError::InvalidInput(_))
        ));
    }

    #[test]
    fn questions_are_numbered_from_one() {
        assert_eq!(format_question(0, "Who buys rockets?"), " 1. Who buys rockets?");
        assert_eq!(format_question(11, "Why?"), "12. Why?");
    }

    #[test]
    fn report_lists_each_outcome() {
        let report = IngestReport {
            created: vec![SourceField::CompanyName],
            updated: vec![SourceField::Product],
            unchanged: vec![],
            skipped: vec!["favourite_colour".into()],
        };
        let text = format_report(&report);
        assert!(text.starts_with("2 fragment(s) written"));
        assert!(text.contains("created:   company_name"));
        assert!(text.contains("updated:   product"));
        assert!(!text.contains("unchanged"));
        assert!(text.contains("skipped:   favourite_colour"));
    }
}

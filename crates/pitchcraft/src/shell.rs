// SPDX-FileCopyrightText: 2026 Pitchcraft Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `pitchcraft shell`: an interactive conversation against one scope.

use colored::Colorize;
use pitchcraft_config::PitchcraftConfig;
use pitchcraft_core::{ConversationId, PitchcraftError, UserScope};
use pitchcraft_engine::Engine;
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;

use crate::commands::{format_question, format_turn, print_response};
use crate::runtime;

/// Shell input after trimming.
#[derive(Debug, PartialEq, Eq)]
enum ShellInput<'a> {
    Quit,
    History,
    Profile,
    Questions,
    Empty,
    Query(&'a str),
}

fn classify(line: &str) -> ShellInput<'_> {
    match line.trim() {
        "/quit" | "/exit" => ShellInput::Quit,
        "/history" => ShellInput::History,
        "/profile" => ShellInput::Profile,
        "/questions" => ShellInput::Questions,
        "" => ShellInput::Empty,
        query => ShellInput::Query(query),
    }
}

pub async fn run_shell(
    config: &PitchcraftConfig,
    scope: &str,
    conversation: &str,
) -> Result<(), PitchcraftError> {
    let scope = UserScope::new(scope)?;
    let conversation = ConversationId::new(conversation)?;
    let engine = runtime::build_engine(config).await?;

    let mut rl = DefaultEditor::new()
        .map_err(|e| PitchcraftError::Internal(format!("failed to initialize readline: {e}")))?;

    println!("{}", "pitchcraft shell".bold().green());
    println!(
        "scope {} / conversation {}",
        scope.as_str().cyan(),
        conversation.as_str().cyan()
    );
    println!(
        "Type {}, {} or {} to inspect, {} to exit.\n",
        "/history".yellow(),
        "/profile".yellow(),
        "/questions".yellow(),
        "/quit".yellow()
    );

    let prompt = format!("{}> ", config.agent.name.green());
    loop {
        match rl.readline(&prompt) {
            Ok(line) => match classify(&line) {
                ShellInput::Quit => break,
                ShellInput::Empty => continue,
                ShellInput::History => {
                    if let Err(e) = show_history(&engine, &conversation).await {
                        eprintln!("{}: {}", "error".red(), e.user_message());
                    }
                }
                ShellInput::Profile => {
                    if let Err(e) = show_profile(&engine, &scope).await {
                        eprintln!("{}: {}", "error".red(), e.user_message());
                    }
                }
                ShellInput::Questions => match engine.discovery_questions(&scope).await {
                    Ok(questions) => {
                        for (index, question) in questions.iter().enumerate() {
                            println!("{}", format_question(index, question));
                        }
                    }
                    Err(e) => {
                        tracing::debug!(error = ?e, "discovery questions failed");
                        eprintln!("{}: {}", "error".red(), e.user_message());
                    }
                },
                ShellInput::Query(query) => {
                    let _ = rl.add_history_entry(query);
                    match engine.generate(&scope, &conversation, query).await {
                        Ok(response) => {
                            print_response(&response);
                            println!();
                        }
                        Err(e) => {
                            tracing::debug!(error = ?e, "shell generation failed");
                            eprintln!("{}: {}", "error".red(), e.user_message());
                        }
                    }
                }
            },
            Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => break,
            Err(e) => {
                eprintln!("{}: {e}", "error".red());
                break;
            }
        }
    }

    engine.shutdown().await;
    println!("{}", "goodbye".dimmed());
    Ok(())
}

async fn show_history(engine: &Engine, conversation: &ConversationId) -> Result<(), PitchcraftError> {
    let turns = engine.history(conversation).await?;
    if turns.is_empty() {
        println!("{}", "(no turns yet)".dimmed());
    }
    for turn in &turns {
        println!("{}", format_turn(turn));
    }
    Ok(())
}

async fn show_profile(engine: &Engine, scope: &UserScope) -> Result<(), PitchcraftError> {
    let fragments = engine.knowledge(scope).await?;
    if fragments.is_empty() {
        println!("{}", "(no business profile ingested)".dimmed());
    }
    for fragment in &fragments {
        println!(
            "{} {}",
            format!("v{}", fragment.version).dimmed(),
            fragment.text
        );
    }
    Ok(())
}

// SPDX-FileCopyrightText: 2026 Pitchcraft Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Pitchcraft command-line interface.
//!
//! Onboards a business profile, answers marketing requests grounded in it and
//! keeps per-conversation history.

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: tikv_jemallocator::Jemalloc = tikv_jemallocator::Jemalloc;

mod commands;
mod doctor;
mod runtime;
mod shell;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use pitchcraft_config::PitchcraftConfig;
use pitchcraft_core::PitchcraftError;

/// Pitchcraft - grounded marketing content generation.
#[derive(Parser, Debug)]
#[command(name = "pitchcraft", version, about)]
struct Cli {
    /// Load configuration from this file instead of the XDG hierarchy.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Ingest onboarding answers for a user scope.
    Ingest {
        /// Tenant the profile belongs to.
        scope: String,
        /// Answers as `field=value` pairs.
        pairs: Vec<String>,
        /// JSON object of answers (`{"company_name": "..."}`).
        #[arg(long)]
        file: Option<PathBuf>,
    },
    /// Ask a single question grounded in a scope's profile.
    Ask {
        scope: String,
        /// Conversation to continue.
        #[arg(short, long, default_value = "cli")]
        conversation: String,
        query: String,
    },
    /// Draft web research questions from a scope's profile.
    Questions {
        scope: String,
        /// Also answer each question, grounded in the profile.
        #[arg(long)]
        answer: bool,
        /// Conversation the answers are recorded in.
        #[arg(short, long, default_value = "research")]
        conversation: String,
    },
    /// Interactive conversation against a scope.
    Shell {
        scope: String,
        /// Conversation to continue; a new one is started when omitted.
        #[arg(short, long)]
        conversation: Option<String>,
    },
    /// Print a conversation's full history.
    History { conversation: String },
    /// Delete the fragment for one onboarding field.
    Forget { scope: String, field: String },
    /// Run environment diagnostics.
    Doctor {
        /// Disable colored output.
        #[arg(long)]
        plain: bool,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let loaded = match &cli.config {
        Some(path) => pitchcraft_config::load_and_validate_path(path),
        None => pitchcraft_config::load_and_validate(),
    };
    let config = match loaded {
        Ok(config) => config,
        Err(errors) => {
            pitchcraft_config::render_errors(&errors);
            std::process::exit(1);
        }
    };

    runtime::init_tracing(&config.agent.log_level);

    if let Err(e) = run(cli.command, &config).await {
        report_error(&e);
        std::process::exit(1);
    }
}

async fn run(command: Commands, config: &PitchcraftConfig) -> Result<(), PitchcraftError> {
    match command {
        Commands::Ingest { scope, pairs, file } => {
            commands::ingest(config, &scope, &pairs, file.as_deref()).await
        }
        Commands::Ask {
            scope,
            conversation,
            query,
        } => commands::ask(config, &scope, &conversation, &query).await,
        Commands::Questions {
            scope,
            answer,
            conversation,
        } => commands::questions(config, &scope, answer, &conversation).await,
        Commands::Shell {
            scope,
            conversation,
        } => {
            let conversation =
                conversation.unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
            shell::run_shell(config, &scope, &conversation).await
        }
        Commands::History { conversation } => commands::history(config, &conversation).await,
        Commands::Forget { scope, field } => commands::forget(config, &scope, &field).await,
        Commands::Doctor { plain } => doctor::run_doctor(config, plain).await,
    }
}

fn report_error(e: &PitchcraftError) {
    use colored::Colorize;

    tracing::debug!(error = ?e, "command failed");
    let message = match e {
        PitchcraftError::Config(_) | PitchcraftError::Storage { .. } => e.to_string(),
        _ => e.user_message(),
    };
    eprintln!("{}: {message}", "error".red());
}

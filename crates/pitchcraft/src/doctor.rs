// SPDX-FileCopyrightText: 2026 Pitchcraft Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `pitchcraft doctor` command implementation.
//!
//! Quick checks that each configured backend is usable before the first
//! ingest or ask.

use std::io::IsTerminal;
use std::time::{Duration, Instant};

use pitchcraft_config::{PitchcraftConfig, VectorBackend};
use pitchcraft_core::PitchcraftError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckStatus {
    Pass,
    Warn,
    Fail,
}

/// Result of a single diagnostic check.
#[derive(Debug, Clone)]
pub struct CheckResult {
    pub name: String,
    pub status: CheckStatus,
    pub message: String,
    pub duration: Duration,
}

impl CheckResult {
    fn new(name: &str, status: CheckStatus, message: impl Into<String>, start: Instant) -> Self {
        Self {
            name: name.to_string(),
            status,
            message: message.into(),
            duration: start.elapsed(),
        }
    }
}

pub async fn run_doctor(config: &PitchcraftConfig, plain: bool) -> Result<(), PitchcraftError> {
    let use_color = !plain && std::io::stdout().is_terminal();

    let results = vec![
        check_config(config),
        check_database(&config.storage.database_path).await,
        check_vector_store(config).await,
        check_embedding_model(config),
        check_generation_key(config),
    ];

    println!();
    println!("  pitchcraft doctor");
    println!("  {}", "-".repeat(50));

    for result in &results {
        println!("{}", format_line(result, use_color));
    }
    println!();

    let issues = results
        .iter()
        .filter(|r| r.status != CheckStatus::Pass)
        .count();
    if issues > 0 {
        let issue_word = if issues == 1 { "issue" } else { "issues" };
        println!("  {issues} {issue_word} found.");
    } else {
        println!("  All checks passed.");
    }
    println!();

    Ok(())
}

fn format_line(result: &CheckResult, use_color: bool) -> String {
    let duration_ms = result.duration.as_millis();
    if use_color {
        use colored::Colorize;
        let (symbol, message) = match result.status {
            CheckStatus::Pass => ("✓".green(), result.message.normal()),
            CheckStatus::Warn => ("!".yellow(), result.message.yellow()),
            CheckStatus::Fail => ("✗".red(), result.message.red()),
        };
        format!(
            "    {symbol} {:<20} {message} ({duration_ms}ms)",
            result.name
        )
    } else {
        let tag = match result.status {
            CheckStatus::Pass => "[OK]  ",
            CheckStatus::Warn => "[WARN]",
            CheckStatus::Fail => "[FAIL]",
        };
        format!(
            "    {tag} {:<20} {} ({duration_ms}ms)",
            result.name, result.message
        )
    }
}

/// The config was already loaded and validated by `main`; report what it selects.
fn check_config(config: &PitchcraftConfig) -> CheckResult {
    let start = Instant::now();
    let backend = match config.vector_store.backend {
        VectorBackend::Sqlite => "sqlite",
        VectorBackend::Qdrant => "qdrant",
    };
    CheckResult::new(
        "Configuration",
        CheckStatus::Pass,
        format!(
            "valid (vector store: {backend}, model: {})",
            config.generation.model
        ),
        start,
    )
}

async fn check_database(db_path: &str) -> CheckResult {
    let start = Instant::now();
    let name = "Database";

    if !std::path::Path::new(db_path).exists() {
        return CheckResult::new(
            name,
            CheckStatus::Warn,
            format!("not found: {db_path} (will be created on first run)"),
            start,
        );
    }

    let conn = match tokio_rusqlite::Connection::open(db_path).await {
        Ok(conn) => conn,
        Err(e) => return CheckResult::new(name, CheckStatus::Fail, format!("open failed: {e}"), start),
    };
    let count = conn
        .call(|conn| -> Result<i64, rusqlite::Error> {
            conn.query_row(
                "SELECT count(*) FROM knowledge_fragments",
                [],
                |row| row.get(0),
            )
        })
        .await;
    match count {
        Ok(count) => CheckResult::new(
            name,
            CheckStatus::Pass,
            format!("connected ({count} fragment(s))"),
            start,
        ),
        Err(e) => CheckResult::new(name, CheckStatus::Fail, format!("query failed: {e}"), start),
    }
}

async fn check_vector_store(config: &PitchcraftConfig) -> CheckResult {
    let start = Instant::now();
    let name = "Vector store";
    match config.vector_store.backend {
        VectorBackend::Sqlite => CheckResult::new(
            name,
            CheckStatus::Pass,
            "sqlite (shares the database)",
            start,
        ),
        VectorBackend::Qdrant => check_qdrant(config, start).await,
    }
}

#[cfg(feature = "qdrant")]
async fn check_qdrant(config: &PitchcraftConfig, start: Instant) -> CheckResult {
    use pitchcraft_qdrant::client::QdrantClient;

    let name = "Vector store";
    let vs = &config.vector_store;
    let api_key = pitchcraft_qdrant::resolve_api_key(&vs.api_key);
    let client = match QdrantClient::new(
        &vs.url,
        &vs.collection,
        api_key.as_deref(),
        Duration::from_secs(5),
    ) {
        Ok(client) => client,
        Err(e) => return CheckResult::new(name, CheckStatus::Fail, e.to_string(), start),
    };
    if let Err(e) = client.ready().await {
        return CheckResult::new(name, CheckStatus::Fail, e.to_string(), start);
    }
    match client.collection_vector_size().await {
        Ok(Some(size)) if size == config.embedding.dimensions => CheckResult::new(
            name,
            CheckStatus::Pass,
            format!("qdrant ready, collection `{}` ({size} dims)", vs.collection),
            start,
        ),
        Ok(Some(size)) => CheckResult::new(
            name,
            CheckStatus::Fail,
            format!(
                "collection `{}` has {size} dims, embedding produces {}",
                vs.collection, config.embedding.dimensions
            ),
            start,
        ),
        Ok(None) => CheckResult::new(
            name,
            CheckStatus::Warn,
            format!("qdrant ready, collection `{}` will be created", vs.collection),
            start,
        ),
        Err(e) => CheckResult::new(name, CheckStatus::Fail, e.to_string(), start),
    }
}

#[cfg(not(feature = "qdrant"))]
async fn check_qdrant(_config: &PitchcraftConfig, start: Instant) -> CheckResult {
    CheckResult::new(
        "Vector store",
        CheckStatus::Fail,
        "qdrant selected but this build lacks the `qdrant` feature",
        start,
    )
}

#[cfg(feature = "onnx")]
fn check_embedding_model(config: &PitchcraftConfig) -> CheckResult {
    let start = Instant::now();
    let manager = pitchcraft_embedding::ModelManager::from_config(&config.embedding);
    if manager.is_model_available() {
        CheckResult::new(
            "Embedding model",
            CheckStatus::Pass,
            format!("{} present", manager.model_dir().display()),
            start,
        )
    } else {
        CheckResult::new(
            "Embedding model",
            CheckStatus::Warn,
            format!("{} missing (downloaded on first use)", config.embedding.model_name),
            start,
        )
    }
}

#[cfg(not(feature = "onnx"))]
fn check_embedding_model(_config: &PitchcraftConfig) -> CheckResult {
    CheckResult::new(
        "Embedding model",
        CheckStatus::Fail,
        "this build lacks the `onnx` feature",
        Instant::now(),
    )
}

fn check_generation_key(config: &PitchcraftConfig) -> CheckResult {
    let start = Instant::now();
    match pitchcraft_gemini::resolve_api_key(&config.generation.api_key) {
        Ok(_) => CheckResult::new("Generation API", CheckStatus::Pass, "API key configured", start),
        Err(_) => CheckResult::new(
            "Generation API",
            CheckStatus::Warn,
            format!(
                "no API key (set generation.api_key or {})",
                pitchcraft_gemini::API_KEY_ENV
            ),
            start,
        ),
    }
}

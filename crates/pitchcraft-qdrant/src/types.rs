// SPDX-FileCopyrightText: 2026 Pitchcraft Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Qdrant REST payloads.

use pitchcraft_core::SourceField;
use serde::{Deserialize, Serialize};

/// Standard `{ "result": ..., "status": ... }` envelope.
#[derive(Debug, Deserialize)]
pub struct ApiResponse<T> {
    pub result: T,
}

/// Fields stored alongside each point.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FragmentPayload {
    pub user_scope: String,
    pub source_field: SourceField,
    pub text: String,
    pub created_at: String,
    pub version: u64,
}

#[derive(Debug, Serialize)]
pub struct PointStruct {
    pub id: String,
    pub vector: Vec<f32>,
    pub payload: FragmentPayload,
}

#[derive(Debug, Serialize)]
pub struct UpsertPoints {
    pub points: Vec<PointStruct>,
}

/// A point as returned by retrieve and scroll.
#[derive(Debug, Deserialize)]
pub struct Record {
    pub id: serde_json::Value,
    pub payload: Option<FragmentPayload>,
    #[serde(default)]
    pub vector: Option<Vec<f32>>,
}

#[derive(Debug, Deserialize)]
pub struct ScoredPoint {
    pub id: serde_json::Value,
    pub score: f32,
    pub payload: Option<FragmentPayload>,
}

#[derive(Debug, Deserialize)]
pub struct ScrollResult {
    pub points: Vec<Record>,
    pub next_page_offset: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
pub struct CountResult {
    pub count: u64,
}

/// `must: [{ key: "user_scope", match: { value } }]`.
pub fn scope_filter(scope: &str) -> serde_json::Value {
    serde_json::json!({
        "must": [{ "key": "user_scope", "match": { "value": scope } }]
    })
}

/// Point ids come back as strings for UUID ids and numbers otherwise.
pub fn point_id(id: &serde_json::Value) -> String {
    match id {
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

// SPDX-FileCopyrightText: 2026 Pitchcraft Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! ONNX embedding adapter for local inference using all-MiniLM-L6-v2.
//!
//! Produces 384-dimensional embeddings on CPU with zero external API calls.
//! Inference runs on the blocking pool so callers' timeouts stay effective.

use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use ndarray::Array2;
use ort::session::Session;
use ort::session::builder::GraphOptimizationLevel;
use ort::value::TensorRef;
use tokenizers::{Tokenizer, TruncationParams};
use tracing::{debug, info};

use pitchcraft_config::model::EmbeddingConfig;
use pitchcraft_core::{
    AdapterType, EmbeddingAdapter, EmbeddingInput, EmbeddingOutput, HealthStatus,
    PitchcraftError, PluginAdapter,
};

use crate::model_manager::ModelManager;

/// Embedding dimensions for all-MiniLM-L6-v2.
pub const EMBEDDING_DIM: usize = 384;

/// Longest token sequence the model was trained on.
const MAX_SEQUENCE_LEN: usize = 256;

struct Inner {
    session: Mutex<Session>,
    tokenizer: Tokenizer,
}

/// ONNX-based embedding adapter.
///
/// Cheap to clone; clones share one session.
#[derive(Clone)]
pub struct OnnxEmbedder {
    inner: Arc<Inner>,
    dimensions: usize,
}

impl OnnxEmbedder {
    /// Downloads the model if needed and loads it.
    pub async fn from_config(config: &EmbeddingConfig) -> Result<Self, PitchcraftError> {
        let manager = ModelManager::from_config(config);
        let model_path = manager.ensure_model().await?;
        let tokenizer_path = manager.tokenizer_path();
        tokio::task::spawn_blocking(move || Self::load(&model_path, &tokenizer_path))
            .await
            .map_err(|e| PitchcraftError::Internal(format!("model load task failed: {e}")))?
    }

    /// Loads the model and tokenizer from disk and measures the output width.
    pub fn load(model_path: &Path, tokenizer_path: &Path) -> Result<Self, PitchcraftError> {
        let mut tokenizer = Tokenizer::from_file(tokenizer_path).map_err(|e| {
            PitchcraftError::embedding(format!(
                "failed to load tokenizer from {}: {e}",
                tokenizer_path.display()
            ))
        })?;
        tokenizer
            .with_truncation(Some(TruncationParams {
                max_length: MAX_SEQUENCE_LEN,
                ..TruncationParams::default()
            }))
            .map_err(|e| PitchcraftError::embedding(format!("failed to set truncation: {e}")))?;

        let session = Session::builder()
            .map_err(|e| onnx_err("failed to create ONNX session builder", e))?
            .with_optimization_level(GraphOptimizationLevel::Level3)
            .map_err(|e| onnx_err("failed to set optimization level", e))?
            .with_intra_threads(1)
            .map_err(|e| onnx_err("failed to set thread count", e))?
            .commit_from_file(model_path)
            .map_err(|e| {
                onnx_err(&format!("failed to load ONNX model from {}", model_path.display()), e)
            })?;

        let inner = Inner {
            session: Mutex::new(session),
            tokenizer,
        };
        let dimensions = inner.embed_text("dimension check")?.len();
        info!(model = %model_path.display(), dimensions, "ONNX embedder loaded");

        Ok(Self {
            inner: Arc::new(inner),
            dimensions,
        })
    }
}

fn onnx_err(context: &str, e: impl std::fmt::Display) -> PitchcraftError {
    PitchcraftError::embedding(format!("{context}: {e}"))
}

impl Inner {
    fn embed_text(&self, text: &str) -> Result<Vec<f32>, PitchcraftError> {
        let encoding = self
            .tokenizer
            .encode(text, true)
            .map_err(|e| PitchcraftError::embedding(format!("tokenization failed: {e}")))?;

        let input_ids: Vec<i64> = encoding.get_ids().iter().map(|&id| id as i64).collect();
        let attention_mask: Vec<i64> = encoding
            .get_attention_mask()
            .iter()
            .map(|&m| m as i64)
            .collect();
        let token_type_ids: Vec<i64> = encoding.get_type_ids().iter().map(|&t| t as i64).collect();
        let seq_len = input_ids.len();

        let input_ids = Array2::from_shape_vec((1, seq_len), input_ids)
            .map_err(|e| onnx_err("failed to shape input_ids", e))?;
        let mask = Array2::from_shape_vec((1, seq_len), attention_mask.clone())
            .map_err(|e| onnx_err("failed to shape attention_mask", e))?;
        let token_type_ids = Array2::from_shape_vec((1, seq_len), token_type_ids)
            .map_err(|e| onnx_err("failed to shape token_type_ids", e))?;

        let mut session = self
            .session
            .lock()
            .map_err(|e| PitchcraftError::embedding(format!("ONNX session lock poisoned: {e}")))?;

        let outputs = session
            .run(ort::inputs![
                "input_ids" => TensorRef::from_array_view(&input_ids)
                    .map_err(|e| onnx_err("failed to bind input_ids", e))?,
                "attention_mask" => TensorRef::from_array_view(&mask)
                    .map_err(|e| onnx_err("failed to bind attention_mask", e))?,
                "token_type_ids" => TensorRef::from_array_view(&token_type_ids)
                    .map_err(|e| onnx_err("failed to bind token_type_ids", e))?
            ])
            .map_err(|e| onnx_err("ONNX inference failed", e))?;

        // [1, seq_len, hidden]
        let (shape, data) = outputs[0]
            .try_extract_tensor::<f32>()
            .map_err(|e| onnx_err("failed to extract output tensor", e))?;
        let hidden_size = shape
            .last()
            .copied()
            .ok_or_else(|| PitchcraftError::embedding("ONNX output has no dimensions"))?
            as usize;

        let pooled = mean_pool_with_attention(data, &attention_mask, seq_len, hidden_size);
        Ok(l2_normalize(&pooled))
    }
}

/// Attention-masked mean pooling over token embeddings.
fn mean_pool_with_attention(
    embeddings: &[f32],
    attention_mask: &[i64],
    seq_len: usize,
    hidden_size: usize,
) -> Vec<f32> {
    let mut sum = vec![0.0f32; hidden_size];
    let mut count = 0.0f32;

    for (token, &mask) in attention_mask.iter().enumerate().take(seq_len) {
        if mask > 0 {
            let row = &embeddings[token * hidden_size..(token + 1) * hidden_size];
            for (acc, value) in sum.iter_mut().zip(row) {
                *acc += value;
            }
            count += 1.0;
        }
    }

    if count > 0.0 {
        for val in &mut sum {
            *val /= count;
        }
    }
    sum
}

fn l2_normalize(vec: &[f32]) -> Vec<f32> {
    let norm: f32 = vec.iter().map(|v| v * v).sum::<f32>().sqrt();
    if norm > f32::EPSILON {
        vec.iter().map(|v| v / norm).collect()
    } else {
        vec.to_vec()
    }
}

#[async_trait]
impl PluginAdapter for OnnxEmbedder {
    fn name(&self) -> &str {
        "onnx-embedder"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Embedding
    }

    async fn health_check(&self) -> Result<HealthStatus, PitchcraftError> {
        match self.inner.session.lock() {
            Ok(_) => Ok(HealthStatus::Healthy),
            Err(e) => Ok(HealthStatus::Unhealthy(format!("session lock poisoned: {e}"))),
        }
    }

    async fn shutdown(&self) -> Result<(), PitchcraftError> {
        Ok(())
    }
}

#[async_trait]
impl EmbeddingAdapter for OnnxEmbedder {
    async fn embed(&self, input: EmbeddingInput) -> Result<EmbeddingOutput, PitchcraftError> {
        let inner = self.inner.clone();
        let count = input.texts.len();
        let embeddings = tokio::task::spawn_blocking(move || {
            input
                .texts
                .iter()
                .map(|text| inner.embed_text(text))
                .collect::<Result<Vec<_>, _>>()
        })
        .await
        .map_err(|e| PitchcraftError::embedding(format!("embedding task failed: {e}")))??;

        debug!(count, "embedded texts");
        Ok(EmbeddingOutput {
            embeddings,
            dimensions: self.dimensions,
        })
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn l2_normalize_general_vector() {
        let n = l2_normalize(&[3.0, 4.0]);
        assert!((n[0] - 0.6).abs() < 0.001);
        assert!((n[1] - 0.8).abs() < 0.001);
    }

    #[test]
    fn l2_normalize_zero_vector() {
        assert_eq!(l2_normalize(&[0.0, 0.0, 0.0]), vec![0.0, 0.0, 0.0]);
    }

    #[test]
    fn padding_is_excluded_from_the_mean() {
        let embeddings = vec![
            0.0, 0.0, 0.0, // padding
            1.0, 2.0, 3.0,
        ];
        let result = mean_pool_with_attention(&embeddings, &[0, 1], 2, 3);
        assert_eq!(result, vec![1.0, 2.0, 3.0]);
    }

    #[test]
    fn mean_over_real_tokens() {
        let embeddings = vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0];
        let result = mean_pool_with_attention(&embeddings, &[1, 1, 1], 3, 2);
        assert!((result[0] - 3.0).abs() < f32::EPSILON);
        assert!((result[1] - 4.0).abs() < f32::EPSILON);
    }

    #[test]
    fn missing_tokenizer_is_embedding_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        let err = OnnxEmbedder::load(&dir.path().join("model.onnx"), &dir.path().join("tokenizer.json"))
            .err()
            .expect("no files on disk");
        assert!(matches!(err, PitchcraftError::EmbeddingUnavailable { .. }));
    }
}

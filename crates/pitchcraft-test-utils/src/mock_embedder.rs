// SPDX-FileCopyrightText: 2026 Pitchcraft Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Deterministic embedding adapter for tests.
//!
//! Text is embedded as a hashed bag of lower-cased words, L2-normalised, so
//! texts sharing words score higher than unrelated ones. Specific texts can be
//! pinned to exact vectors, made to fail, or slowed down.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use sha2::{Digest, Sha256};

use pitchcraft_core::{
    AdapterType, EmbeddingAdapter, EmbeddingInput, EmbeddingOutput, HealthStatus,
    PitchcraftError, PluginAdapter,
};

#[derive(Default)]
struct Behaviour {
    overrides: HashMap<String, Vec<f32>>,
    failing: HashSet<String>,
    fail_all: bool,
    delay: Option<Duration>,
}

pub struct MockEmbedder {
    dimensions: usize,
    behaviour: Mutex<Behaviour>,
    calls: AtomicUsize,
}

impl MockEmbedder {
    pub fn new(dimensions: usize) -> Self {
        Self {
            dimensions: dimensions.max(1),
            behaviour: Mutex::new(Behaviour::default()),
            calls: AtomicUsize::new(0),
        }
    }

    /// Pins `text` to `vector`.
    pub fn set_vector(&self, text: &str, vector: Vec<f32>) {
        self.with(|b| {
            b.overrides.insert(text.to_string(), vector);
        });
    }

    /// Makes every embed call containing `text` fail.
    pub fn fail_on(&self, text: &str) {
        self.with(|b| {
            b.failing.insert(text.to_string());
        });
    }

    pub fn set_fail_all(&self, fail: bool) {
        self.with(|b| b.fail_all = fail);
    }

    /// Sleeps this long (on the tokio clock) before answering.
    pub fn set_delay(&self, delay: Duration) {
        self.with(|b| b.delay = Some(delay));
    }

    /// Number of `embed` calls so far.
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn with<R>(&self, f: impl FnOnce(&mut Behaviour) -> R) -> R {
        let mut guard = self
            .behaviour
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        f(&mut guard)
    }

    /// The vector produced for `text` absent any override.
    pub fn hashed_vector(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0f32; self.dimensions];
        let lowered = text.to_lowercase();
        let mut words = lowered
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
            .peekable();
        if words.peek().is_none() {
            vector[bucket(&lowered, self.dimensions).0] = 1.0;
            return vector;
        }
        for word in words {
            let (index, sign) = bucket(word, self.dimensions);
            vector[index] += sign;
        }
        let norm = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            vector.iter_mut().for_each(|x| *x /= norm);
        } else {
            vector[0] = 1.0;
        }
        vector
    }
}

fn bucket(word: &str, dimensions: usize) -> (usize, f32) {
    let digest = Sha256::digest(word.as_bytes());
    let mut raw = [0u8; 8];
    raw.copy_from_slice(&digest[..8]);
    let value = u64::from_le_bytes(raw);
    let sign = if digest[8] & 1 == 0 { 1.0 } else { -1.0 };
    ((value % dimensions as u64) as usize, sign)
}

#[async_trait]
impl PluginAdapter for MockEmbedder {
    fn name(&self) -> &str {
        "mock-embedder"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Embedding
    }

    async fn health_check(&self) -> Result<HealthStatus, PitchcraftError> {
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), PitchcraftError> {
        Ok(())
    }
}

#[async_trait]
impl EmbeddingAdapter for MockEmbedder {
    async fn embed(&self, input: EmbeddingInput) -> Result<EmbeddingOutput, PitchcraftError> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        let delay = self.with(|b| b.delay);
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let embeddings = self.with(|b| {
            input
                .texts
                .iter()
                .map(|text| {
                    if b.fail_all || b.failing.contains(text) {
                        return Err(PitchcraftError::embedding("mock embedder failure"));
                    }
                    Ok(b.overrides
                        .get(text)
                        .cloned()
                        .unwrap_or_else(|| self.hashed_vector(text)))
                })
                .collect::<Result<Vec<_>, _>>()
        })?;

        Ok(EmbeddingOutput {
            dimensions: embeddings.first().map_or(self.dimensions, Vec::len),
            embeddings,
        })
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }
}

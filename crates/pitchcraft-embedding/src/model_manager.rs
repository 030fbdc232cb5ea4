// SPDX-FileCopyrightText: 2026 Pitchcraft Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Model download manager for first-run ONNX embedding model setup.
//!
//! Downloads the all-MiniLM-L6-v2 INT8 quantized model from HuggingFace on
//! first run and caches it under `embedding.model_dir`.

use std::path::{Path, PathBuf};
use std::time::Duration;

use pitchcraft_config::model::EmbeddingConfig;
use pitchcraft_core::PitchcraftError;
use sha2::{Digest, Sha256};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::info;

const MODEL_URL: &str = "https://huggingface.co/onnx-community/all-MiniLM-L6-v2-ONNX/resolve/main/onnx/model_quantized.onnx";
const TOKENIZER_URL: &str =
    "https://huggingface.co/sentence-transformers/all-MiniLM-L6-v2/resolve/main/tokenizer.json";

const DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(300);

/// Manages ONNX model download and path resolution.
pub struct ModelManager {
    model_dir: PathBuf,
    model_url: String,
    tokenizer_url: String,
    /// Serialises downloads between concurrent callers.
    download_lock: Mutex<()>,
}

impl ModelManager {
    /// `model_dir` is the root; files land in `<model_dir>/<model_name>/`.
    pub fn new(model_dir: impl Into<PathBuf>, model_name: &str) -> Self {
        Self {
            model_dir: model_dir.into().join(model_name),
            model_url: MODEL_URL.to_string(),
            tokenizer_url: TOKENIZER_URL.to_string(),
            download_lock: Mutex::new(()),
        }
    }

    pub fn from_config(config: &EmbeddingConfig) -> Self {
        Self::new(&config.model_dir, &config.model_name)
    }

    /// Overrides the download sources.
    pub fn with_urls(mut self, model_url: impl Into<String>, tokenizer_url: impl Into<String>) -> Self {
        self.model_url = model_url.into();
        self.tokenizer_url = tokenizer_url.into();
        self
    }

    pub fn model_dir(&self) -> &Path {
        &self.model_dir
    }

    pub fn model_path(&self) -> PathBuf {
        self.model_dir.join("model.onnx")
    }

    pub fn tokenizer_path(&self) -> PathBuf {
        self.model_dir.join("tokenizer.json")
    }

    /// Returns true if both model and tokenizer files exist.
    pub fn is_model_available(&self) -> bool {
        self.model_path().exists() && self.tokenizer_path().exists()
    }

    /// Ensures the model is downloaded and returns the model file path.
    pub async fn ensure_model(&self) -> Result<PathBuf, PitchcraftError> {
        if self.is_model_available() {
            return Ok(self.model_path());
        }

        let _guard = self.download_lock.lock().await;
        if self.is_model_available() {
            return Ok(self.model_path());
        }

        info!(dir = %self.model_dir.display(), "embedding model not found, downloading");
        tokio::fs::create_dir_all(&self.model_dir)
            .await
            .map_err(|e| {
                PitchcraftError::embedding(format!("failed to create model directory: {e}"))
            })?;

        let client = reqwest::Client::builder()
            .timeout(DOWNLOAD_TIMEOUT)
            .build()
            .map_err(|e| PitchcraftError::Internal(format!("failed to build HTTP client: {e}")))?;

        for (dest, url) in [
            (self.model_path(), self.model_url.as_str()),
            (self.tokenizer_path(), self.tokenizer_url.as_str()),
        ] {
            if dest.exists() {
                continue;
            }
            let (size, digest) = download_file(&client, url, &dest).await?;
            info!(file = %dest.display(), size, sha256 = %digest, "downloaded model file");
        }

        info!(dir = %self.model_dir.display(), "embedding model ready");
        Ok(self.model_path())
    }
}

/// Streams `url` into `dest` via a `.part` file, renaming on success.
async fn download_file(
    client: &reqwest::Client,
    url: &str,
    dest: &Path,
) -> Result<(usize, String), PitchcraftError> {
    let partial = dest.with_extension("part");
    let result = stream_to(client, url, &partial).await;
    match result {
        Ok(done) => {
            tokio::fs::rename(&partial, dest).await.map_err(|e| {
                PitchcraftError::embedding(format!("failed to move {}: {e}", dest.display()))
            })?;
            Ok(done)
        }
        Err(e) => {
            let _ = tokio::fs::remove_file(&partial).await;
            Err(e)
        }
    }
}

async fn stream_to(
    client: &reqwest::Client,
    url: &str,
    path: &Path,
) -> Result<(usize, String), PitchcraftError> {
    let mut response = client
        .get(url)
        .send()
        .await
        .map_err(|e| PitchcraftError::embedding(format!("failed to download {url}: {e}")))?;

    if !response.status().is_success() {
        return Err(PitchcraftError::embedding(format!(
            "download failed with status {}: {url}",
            response.status()
        )));
    }

    let mut file = tokio::fs::File::create(path)
        .await
        .map_err(|e| PitchcraftError::embedding(format!("failed to create {}: {e}", path.display())))?;
    let mut hasher = Sha256::new();
    let mut size = 0usize;

    while let Some(chunk) = response
        .chunk()
        .await
        .map_err(|e| PitchcraftError::embedding(format!("failed to read body from {url}: {e}")))?
    {
        hasher.update(&chunk);
        size += chunk.len();
        file.write_all(&chunk).await.map_err(|e| {
            PitchcraftError::embedding(format!("failed to write {}: {e}", path.display()))
        })?;
    }
    file.flush()
        .await
        .map_err(|e| PitchcraftError::embedding(format!("failed to flush {}: {e}", path.display())))?;

    Ok((size, hex::encode(hasher.finalize())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn paths_live_under_model_name() {
        let mgr = ModelManager::new("/data/models", "all-MiniLM-L6-v2");
        assert_eq!(
            mgr.model_path(),
            PathBuf::from("/data/models/all-MiniLM-L6-v2/model.onnx")
        );
        assert_eq!(
            mgr.tokenizer_path(),
            PathBuf::from("/data/models/all-MiniLM-L6-v2/tokenizer.json")
        );
    }

    #[test]
    fn model_not_available_when_missing() {
        let mgr = ModelManager::new("/nonexistent/path", "m");
        assert!(!mgr.is_model_available());
    }

    #[tokio::test]
    async fn downloads_both_files_once() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/model.onnx"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"onnx-bytes".to_vec()))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/tokenizer.json"))
            .respond_with(ResponseTemplate::new(200).set_body_string("{}"))
            .expect(1)
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let mgr = ModelManager::new(dir.path(), "mini").with_urls(
            format!("{}/model.onnx", server.uri()),
            format!("{}/tokenizer.json", server.uri()),
        );

        let model = mgr.ensure_model().await.unwrap();
        assert_eq!(std::fs::read(&model).unwrap(), b"onnx-bytes");
        assert!(mgr.is_model_available());

        // Second call is served from disk; `expect(1)` verifies on drop.
        mgr.ensure_model().await.unwrap();
    }

    #[tokio::test]
    async fn failed_download_leaves_no_partial_file() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let mgr = ModelManager::new(dir.path(), "mini").with_urls(
            format!("{}/model.onnx", server.uri()),
            format!("{}/tokenizer.json", server.uri()),
        );

        let err = mgr.ensure_model().await.unwrap_err();
        assert!(matches!(err, PitchcraftError::EmbeddingUnavailable { .. }));
        assert!(!mgr.model_path().exists());
        assert!(!mgr.model_path().with_extension("part").exists());
    }
}

// SPDX-FileCopyrightText: 2026 Pitchcraft Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Thin HTTP client for the Qdrant REST API.

use std::time::Duration;

use pitchcraft_core::PitchcraftError;
use reqwest::header::{HeaderMap, HeaderValue};
use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;
use tracing::{debug, info, warn};

use crate::types::{
    ApiResponse, CountResult, Record, ScoredPoint, ScrollResult, UpsertPoints,
};

#[derive(Debug, Clone)]
pub struct QdrantClient {
    client: reqwest::Client,
    base_url: String,
    collection: String,
}

impl QdrantClient {
    pub fn new(
        base_url: &str,
        collection: &str,
        api_key: Option<&str>,
        timeout: Duration,
    ) -> Result<Self, PitchcraftError> {
        let mut headers = HeaderMap::new();
        if let Some(key) = api_key {
            headers.insert(
                "api-key",
                HeaderValue::from_str(key)
                    .map_err(|e| PitchcraftError::Config(format!("invalid Qdrant API key: {e}")))?,
            );
        }

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .build()
            .map_err(|e| unavailable("failed to build HTTP client", e))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            collection: collection.to_string(),
        })
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }

    fn collection_url(&self, suffix: &str) -> String {
        format!("{}/collections/{}{suffix}", self.base_url, self.collection)
    }

    /// One `/readyz` request.
    pub async fn ready(&self) -> Result<(), PitchcraftError> {
        let url = format!("{}/readyz", self.base_url);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| unavailable("Qdrant not reachable", e))?;
        if response.status().is_success() {
            Ok(())
        } else {
            Err(PitchcraftError::VectorStoreUnavailable {
                message: format!("Qdrant not ready: {}", response.status()),
                source: None,
            })
        }
    }

    /// Polls `/readyz` until it answers 2xx, up to `retries` attempts.
    pub async fn wait_for_ready(&self, retries: u32, delay: Duration) -> Result<(), PitchcraftError> {
        let attempts = retries.max(1);
        for attempt in 1..=attempts {
            match self.ready().await {
                Ok(()) => {
                    info!(attempt, "Qdrant is ready");
                    return Ok(());
                }
                Err(e) => warn!(attempt, error = %e, "Qdrant not ready yet"),
            }
            if attempt < attempts {
                tokio::time::sleep(delay).await;
            }
        }
        Err(PitchcraftError::VectorStoreUnavailable {
            message: format!("Qdrant at {} not ready after {attempts} attempts", self.base_url),
            source: None,
        })
    }

    /// Configured vector size of the collection, or `None` if it does not exist.
    pub async fn collection_vector_size(&self) -> Result<Option<usize>, PitchcraftError> {
        let response = self
            .client
            .get(self.collection_url(""))
            .send()
            .await
            .map_err(|e| unavailable("collection lookup failed", e))?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let info: ApiResponse<serde_json::Value> = parse(response).await?;
        let size = info.result["config"]["params"]["vectors"]["size"]
            .as_u64()
            .ok_or_else(|| {
                PitchcraftError::Config(format!(
                    "Qdrant collection `{}` does not use a single unnamed vector",
                    self.collection
                ))
            })?;
        Ok(Some(size as usize))
    }

    pub async fn create_collection(&self, dimensions: usize) -> Result<(), PitchcraftError> {
        let body = serde_json::json!({
            "vectors": { "size": dimensions, "distance": "Cosine" }
        });
        self.request::<serde_json::Value>(Method::PUT, "", &body).await?;
        info!(collection = self.collection.as_str(), dimensions, "Qdrant collection created");
        Ok(())
    }

    /// Keyword payload index on `user_scope`, idempotent on the server side.
    pub async fn create_scope_index(&self) -> Result<(), PitchcraftError> {
        let body = serde_json::json!({ "field_name": "user_scope", "field_schema": "keyword" });
        self.request::<serde_json::Value>(Method::PUT, "/index?wait=true", &body)
            .await?;
        Ok(())
    }

    pub async fn retrieve(&self, ids: &[String]) -> Result<Vec<Record>, PitchcraftError> {
        let body = serde_json::json!({ "ids": ids, "with_payload": true, "with_vector": false });
        self.request(Method::POST, "/points", &body).await
    }

    pub async fn upsert(&self, points: &UpsertPoints) -> Result<(), PitchcraftError> {
        self.request::<serde_json::Value>(Method::PUT, "/points?wait=true", points)
            .await?;
        Ok(())
    }

    pub async fn search(
        &self,
        vector: &[f32],
        filter: serde_json::Value,
        limit: usize,
    ) -> Result<Vec<ScoredPoint>, PitchcraftError> {
        let body = serde_json::json!({
            "vector": vector,
            "filter": filter,
            "limit": limit,
            "with_payload": true,
        });
        self.request(Method::POST, "/points/search", &body).await
    }

    pub async fn scroll(
        &self,
        filter: serde_json::Value,
        offset: Option<serde_json::Value>,
        limit: usize,
    ) -> Result<ScrollResult, PitchcraftError> {
        let mut body = serde_json::json!({
            "filter": filter,
            "limit": limit,
            "with_payload": true,
            "with_vector": true,
        });
        if let Some(offset) = offset {
            body["offset"] = offset;
        }
        self.request(Method::POST, "/points/scroll", &body).await
    }

    pub async fn count(&self, filter: serde_json::Value) -> Result<u64, PitchcraftError> {
        let body = serde_json::json!({ "filter": filter, "exact": true });
        let result: CountResult = self.request(Method::POST, "/points/count", &body).await?;
        Ok(result.count)
    }

    pub async fn delete(&self, ids: &[String]) -> Result<(), PitchcraftError> {
        let body = serde_json::json!({ "points": ids });
        self.request::<serde_json::Value>(Method::POST, "/points/delete?wait=true", &body)
            .await?;
        Ok(())
    }

    async fn request<T: DeserializeOwned>(
        &self,
        method: Method,
        suffix: &str,
        body: &(impl serde::Serialize + ?Sized),
    ) -> Result<T, PitchcraftError> {
        let url = self.collection_url(suffix);
        let response = self
            .client
            .request(method.clone(), &url)
            .json(body)
            .send()
            .await
            .map_err(|e| unavailable("request failed", e))?;
        debug!(method = %method, url = url.as_str(), status = %response.status(), "Qdrant response");
        let envelope: ApiResponse<T> = parse(response).await?;
        Ok(envelope.result)
    }
}

async fn parse<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, PitchcraftError> {
    let status = response.status();
    let body = response
        .text()
        .await
        .map_err(|e| unavailable("failed to read response body", e))?;
    if !status.is_success() {
        return Err(PitchcraftError::VectorStoreUnavailable {
            message: format!("Qdrant returned {status}: {}", truncate(&body, 200)),
            source: None,
        });
    }
    serde_json::from_str(&body).map_err(|e| unavailable("malformed Qdrant response", e))
}

fn unavailable(
    context: &str,
    e: impl std::error::Error + Send + Sync + 'static,
) -> PitchcraftError {
    PitchcraftError::VectorStoreUnavailable {
        message: format!("{context}: {e}"),
        source: Some(Box::new(e)),
    }
}

fn truncate(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client(server: &MockServer, key: Option<&str>) -> QdrantClient {
        QdrantClient::new(&server.uri(), "marketing_data", key, Duration::from_secs(5)).unwrap()
    }

    #[tokio::test]
    async fn ready_after_retries() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/readyz"))
            .respond_with(ResponseTemplate::new(503))
            .up_to_n_times(2)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/readyz"))
            .respond_with(ResponseTemplate::new(200).set_body_string("all shards are ready"))
            .mount(&server)
            .await;

        client(&server, None)
            .wait_for_ready(5, Duration::from_millis(5))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn gives_up_after_bounded_retries() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/readyz"))
            .respond_with(ResponseTemplate::new(503))
            .expect(3)
            .mount(&server)
            .await;

        let err = client(&server, None)
            .wait_for_ready(3, Duration::from_millis(5))
            .await
            .unwrap_err();
        assert!(matches!(err, PitchcraftError::VectorStoreUnavailable { .. }));
    }

    #[tokio::test]
    async fn missing_collection_is_none() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/collections/marketing_data"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        assert_eq!(client(&server, None).collection_vector_size().await.unwrap(), None);
    }

    #[tokio::test]
    async fn api_key_header_is_sent() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/collections/marketing_data/points/count"))
            .and(header("api-key", "secret"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "result": {"count": 3}, "status": "ok", "time": 0.001
            })))
            .mount(&server)
            .await;

        let count = client(&server, Some("secret"))
            .count(crate::types::scope_filter("acme"))
            .await
            .unwrap();
        assert_eq!(count, 3);
    }

    #[tokio::test]
    async fn server_error_is_unavailable() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
            .mount(&server)
            .await;

        let err = client(&server, None)
            .count(crate::types::scope_filter("acme"))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("500"), "got: {err}");
    }
}

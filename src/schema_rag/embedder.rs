//! Schema Embedder
//!
//! Turns schema chunks and user questions into vectors through an
//! OpenAI-compatible embeddings endpoint.

use crate::config::EmbeddingConfig;
use crate::error::{AgentError, Result};
use crate::schema_rag::vector_store::Embedding;
use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;
use tracing::debug;

#[async_trait]
pub trait Embedder: Send + Sync {
    /// Embed each input; output order matches input order.
    async fn embed(&self, texts: &[String]) -> Result<Vec<Embedding>>;

    async fn embed_text(&self, text: &str) -> Result<Embedding> {
        self.embed(&[text.to_string()])
            .await?
            .pop()
            .ok_or_else(|| AgentError::Llm("No embedding returned".to_string()))
    }
}

pub struct OpenAiEmbedder {
    api_key: String,
    base_url: String,
    model: String,
    client: Client,
}

impl OpenAiEmbedder {
    pub fn new(api_key: String, base_url: String, model: String) -> Self {
        Self {
            api_key,
            base_url: base_url.trim_end_matches('/').to_string(),
            model,
            client: Client::builder()
                .timeout(Duration::from_secs(60))
                .build()
                .unwrap_or_else(|_| Client::new()),
        }
    }

    pub fn from_config(config: &EmbeddingConfig) -> Self {
        Self::new(config.api_key.clone(), config.base_url.clone(), config.model.clone())
    }
}

#[async_trait]
impl Embedder for OpenAiEmbedder {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Embedding>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let body = serde_json::json!({
            "model": self.model,
            "input": texts,
        });

        let response = self
            .client
            .post(format!("{}/embeddings", self.base_url))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| AgentError::Llm(format!("Embedding API call failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_else(|_| "Unknown error".to_string());
            return Err(AgentError::Llm(format!("Embedding API error ({}): {}", status, error_text)));
        }

        let response_json: serde_json::Value = response
            .json()
            .await
            .map_err(|e| AgentError::Llm(format!("Failed to parse embedding response: {}", e)))?;

        let data = response_json
            .get("data")
            .and_then(|d| d.as_array())
            .ok_or_else(|| AgentError::Llm("No embedding data in response".to_string()))?;

        let mut indexed: Vec<(usize, Embedding)> = Vec::with_capacity(data.len());
        for (position, item) in data.iter().enumerate() {
            let index = item
                .get("index")
                .and_then(|i| i.as_u64())
                .map(|i| i as usize)
                .unwrap_or(position);
            let embedding: Embedding = item
                .get("embedding")
                .and_then(|e| e.as_array())
                .ok_or_else(|| AgentError::Llm("No embedding vector in response".to_string()))?
                .iter()
                .filter_map(|v| v.as_f64().map(|f| f as f32))
                .collect();
            indexed.push((index, embedding));
        }
        indexed.sort_by_key(|(index, _)| *index);

        if indexed.len() != texts.len() {
            return Err(AgentError::Llm(format!(
                "Expected {} embeddings, got {}",
                texts.len(),
                indexed.len()
            )));
        }

        debug!(model = %self.model, count = indexed.len(), "Embeddings received");
        Ok(indexed.into_iter().map(|(_, e)| e).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_batch_is_reordered_by_index() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/embeddings"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "data": [
                    {"index": 1, "embedding": [0.0, 1.0]},
                    {"index": 0, "embedding": [1.0, 0.0]}
                ]
            })))
            .mount(&server)
            .await;

        let embedder = OpenAiEmbedder::new("k".to_string(), server.uri(), "text-embedding-3-small".to_string());
        let vectors = embedder
            .embed(&["partners".to_string(), "trades".to_string()])
            .await
            .unwrap();

        assert_eq!(vectors, vec![vec![1.0, 0.0], vec![0.0, 1.0]]);
    }

    #[tokio::test]
    async fn test_http_error_maps_to_llm_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/embeddings"))
            .respond_with(ResponseTemplate::new(401).set_body_string("invalid api key"))
            .mount(&server)
            .await;

        let embedder = OpenAiEmbedder::new("bad".to_string(), server.uri(), "m".to_string());
        let err = embedder.embed_text("partners").await.unwrap_err();
        assert!(matches!(err, AgentError::Llm(m) if m.contains("401")));
    }

    #[tokio::test]
    async fn test_empty_input_skips_request() {
        let embedder = OpenAiEmbedder::new("k".to_string(), "http://127.0.0.1:9".to_string(), "m".to_string());
        assert!(embedder.embed(&[]).await.unwrap().is_empty());
    }
}

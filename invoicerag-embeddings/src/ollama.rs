use async_trait::async_trait;
use invoicerag_core::{Embedding, EmbeddingError};
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::error::{check_count, check_dimension};
use crate::EmbeddingProviderError;

/// Embeddings served by a local Ollama daemon through `/api/embed`.
#[derive(Clone)]
pub struct OllamaEmbedding {
    base_url: String,
    model: String,
    dimension: usize,
    http: Client,
}

impl OllamaEmbedding {
    pub fn new(base_url: impl Into<String>, model: impl Into<String>, dimension: usize) -> Self {
        Self {
            base_url: base_url.into(),
            model: model.into(),
            dimension,
            http: Client::new(),
        }
    }

    async fn request(&self, input: Vec<String>) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        let url = format!("{}/api/embed", self.base_url.trim_end_matches('/'));
        let expected = input.len();
        let req = OllamaEmbedRequest {
            model: self.model.clone(),
            input,
        };

        let response: OllamaEmbedResponse = self
            .http
            .post(url)
            .json(&req)
            .send()
            .await
            .map_err(|err| EmbeddingProviderError::Request(err.to_string()))?
            .error_for_status()
            .map_err(|err| EmbeddingProviderError::Request(err.to_string()))?
            .json()
            .await
            .map_err(|err| EmbeddingProviderError::Request(err.to_string()))?;

        check_count(expected, response.embeddings.len())?;
        for embedding in &response.embeddings {
            check_dimension(self.dimension, embedding.len())?;
        }

        Ok(response.embeddings)
    }
}

#[derive(Serialize)]
struct OllamaEmbedRequest {
    model: String,
    input: Vec<String>,
}

#[derive(Deserialize)]
struct OllamaEmbedResponse {
    embeddings: Vec<Vec<f32>>,
}

#[async_trait]
impl Embedding for OllamaEmbedding {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        let mut out = self.request(vec![text.to_string()]).await?;
        out.pop().ok_or_else(|| {
            EmbeddingProviderError::InvalidResponse("missing embedding".to_string()).into()
        })
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        self.request(texts.to_vec()).await
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn model_id(&self) -> &str {
        &self.model
    }
}

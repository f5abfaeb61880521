use async_trait::async_trait;
use invoicerag_core::{Embedding, EmbeddingError};
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

use crate::error::{check_count, check_dimension};
use crate::EmbeddingProviderError;

const GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com";
const API_KEY_HEADER: &str = "x-goog-api-key";

/// Gemini tunes embeddings for the side of the search they are used on.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskType {
    RetrievalDocument,
    RetrievalQuery,
}

#[derive(Clone)]
pub struct GoogleEmbedding {
    base_url: String,
    api_key: SecretString,
    model: String,
    dimension: usize,
    task_type: Option<TaskType>,
    http: Client,
}

impl GoogleEmbedding {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>, dimension: usize) -> Self {
        Self {
            base_url: GEMINI_BASE_URL.to_string(),
            api_key: SecretString::new(api_key.into()),
            model: model.into(),
            dimension,
            task_type: None,
            http: Client::new(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_task_type(mut self, task_type: TaskType) -> Self {
        self.task_type = Some(task_type);
        self
    }

    pub fn task_type(&self) -> Option<TaskType> {
        self.task_type
    }

    fn model_name(&self) -> &str {
        self.model
            .strip_prefix("models/")
            .unwrap_or(self.model.as_str())
    }

    fn embed_url(&self) -> String {
        format!(
            "{}/v1beta/models/{}:embedContent",
            self.base_url.trim_end_matches('/'),
            self.model_name()
        )
    }

    fn batch_embed_url(&self) -> String {
        format!(
            "{}/v1beta/models/{}:batchEmbedContents",
            self.base_url.trim_end_matches('/'),
            self.model_name()
        )
    }

    fn post(&self, url: String) -> RequestBuilder {
        self.http
            .post(url)
            .header(API_KEY_HEADER, self.api_key.expose_secret().as_str())
    }

    fn request_for(&self, text: &str) -> EmbedContentRequest {
        EmbedContentRequest {
            model: format!("models/{}", self.model_name()),
            content: Content {
                parts: vec![Part {
                    text: text.to_string(),
                }],
            },
            task_type: self.task_type,
        }
    }
}

#[derive(Debug, Serialize)]
struct Part {
    text: String,
}

#[derive(Debug, Serialize)]
struct Content {
    parts: Vec<Part>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct EmbedContentRequest {
    model: String,
    content: Content,
    #[serde(skip_serializing_if = "Option::is_none")]
    task_type: Option<TaskType>,
}

#[derive(Debug, Serialize)]
struct BatchEmbedContentsRequest {
    requests: Vec<EmbedContentRequest>,
}

#[derive(Debug, Deserialize)]
struct EmbedContentResponse {
    embedding: ContentEmbedding,
}

#[derive(Debug, Deserialize)]
struct BatchEmbedContentsResponse {
    embeddings: Vec<ContentEmbedding>,
}

#[derive(Debug, Deserialize)]
struct ContentEmbedding {
    #[serde(alias = "value")]
    values: Vec<f32>,
}

#[derive(Debug, Deserialize)]
struct GoogleErrorResponse {
    error: GoogleErrorDetail,
}

#[derive(Debug, Deserialize)]
struct GoogleErrorDetail {
    message: String,
}

async fn error_for_status(response: Response) -> Result<Response, EmbeddingError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    if status == StatusCode::TOO_MANY_REQUESTS {
        return Err(EmbeddingError::RateLimited { retry_after: None });
    }
    let body = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<GoogleErrorResponse>(&body)
        .map(|e| e.error.message)
        .unwrap_or_else(|_| format!("HTTP {}: {}", status, body));
    Err(EmbeddingProviderError::Request(message).into())
}

/// Transport errors carry the request URL; it is dropped from the message.
fn request_error(err: reqwest::Error) -> EmbeddingProviderError {
    EmbeddingProviderError::Request(err.without_url().to_string())
}

#[async_trait]
impl Embedding for GoogleEmbedding {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        let response = self
            .post(self.embed_url())
            .json(&self.request_for(text))
            .send()
            .await
            .map_err(request_error)?;

        let response = error_for_status(response)
            .await?
            .json::<EmbedContentResponse>()
            .await
            .map_err(request_error)?;

        check_dimension(self.dimension, response.embedding.values.len())?;
        Ok(response.embedding.values)
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let request = BatchEmbedContentsRequest {
            requests: texts.iter().map(|text| self.request_for(text)).collect(),
        };

        let response = self
            .post(self.batch_embed_url())
            .json(&request)
            .send()
            .await
            .map_err(request_error)?;

        let response = error_for_status(response)
            .await?
            .json::<BatchEmbedContentsResponse>()
            .await
            .map_err(request_error)?;

        check_count(texts.len(), response.embeddings.len())?;

        let mut output = Vec::with_capacity(response.embeddings.len());
        for embedding in response.embeddings {
            check_dimension(self.dimension, embedding.values.len())?;
            output.push(embedding.values);
        }

        Ok(output)
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn model_id(&self) -> &str {
        self.model_name()
    }
}

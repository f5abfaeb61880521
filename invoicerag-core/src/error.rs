use std::{error::Error as StdError, time::Duration};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum InvoiceRagError {
    #[error("LLM provider failed: {0}")]
    LlmProvider(String),
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

#[derive(Debug, Error)]
pub enum EmbeddingError {
    #[error("Embedding invalid response: {0}")]
    InvalidResponse(String),
    #[error("Embedding rate limited (retry_after={})", format_retry_after(.retry_after))]
    RateLimited { retry_after: Option<Duration> },
    #[error("Embedding provider error: {0}")]
    Provider(String),
}

fn format_retry_after(retry_after: &Option<Duration>) -> String {
    match retry_after {
        Some(duration) => format!("{duration:?}"),
        None => "unknown".to_string(),
    }
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("dimension mismatch: expected {expected}, got {got}")]
    DimensionMismatch { expected: usize, got: usize },
    #[error("invalid document id: {0}")]
    InvalidId(String),
    #[error("invalid collection name: {0:?}")]
    InvalidCollection(String),
    #[error("collection '{0}' does not exist")]
    CollectionNotFound(String),
    #[error("document '{0}' is missing embedding")]
    MissingEmbedding(String),
    #[error("Store error: {0}")]
    Internal(#[source] Box<dyn StdError + Send + Sync>),
}

impl From<std::io::Error> for StoreError {
    fn from(err: std::io::Error) -> Self {
        StoreError::Internal(Box::new(err))
    }
}

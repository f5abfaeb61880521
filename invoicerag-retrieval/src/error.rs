use thiserror::Error;
use invoicerag_core::{EmbeddingError, StoreError};

#[derive(Debug, Error)]
pub enum RetrievalError {
    #[error("invalid document id: {0:?}")]
    InvalidId(String),
    #[error("query must not be empty")]
    InvalidQuery,
    #[error("k must be at least 1, got {0}")]
    InvalidTopK(usize),
    #[error("batch size must be at least 1, got {0}")]
    InvalidBatchSize(usize),
    #[error("embedding provider returned {got} vectors for {expected} texts")]
    EmbeddingCount { expected: usize, got: usize },
    #[error("embedding error: {0}")]
    Embedding(#[from] EmbeddingError),
    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

mod chunk;
mod collection;
mod document;
mod embedding;
mod error;
mod llm;
mod value;
mod vector_store;

pub use chunk::{is_scalar, scalar_metadata, Chunk, Metadata};
pub use collection::{
    Collection, CollectionSpec, CollectionStore, DistanceMetric, EMBEDDING_DIMENSION_KEY,
    EMBEDDING_MODEL_KEY,
};
pub use document::Document;
pub use embedding::Embedding;
pub use error::{EmbeddingError, InvoiceRagError, StoreError};
pub use llm::{Llm, LlmRequest, LlmResponse, Message, Role};
pub use value::Value;
pub use vector_store::{SearchResult, VectorStore};

mod error;
mod hash_embedder;
mod indexer;
mod local;
mod retriever;

pub use error::RetrievalError;
pub use hash_embedder::HashEmbedder;
pub use indexer::{BuiltIndex, Indexer, DEFAULT_BATCH_SIZE};
pub use local::{LocalCollectionStore, LocalVectorStore};
pub use retriever::{RetrievalResult, RetrievedMatch, Retriever};

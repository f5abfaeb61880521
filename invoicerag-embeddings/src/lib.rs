mod error;

#[cfg(feature = "google")]
mod google;

#[cfg(feature = "ollama")]
mod ollama;

pub use error::EmbeddingProviderError;

#[cfg(feature = "google")]
pub use google::{GoogleEmbedding, TaskType};

#[cfg(feature = "ollama")]
pub use ollama::OllamaEmbedding;

// Provider-specific clients (feature-gated)
pub mod providers;

pub use invoicerag_core::{Llm, LlmRequest, LlmResponse, Message, Role};

#[cfg(feature = "google")]
pub use providers::google::GoogleClient;

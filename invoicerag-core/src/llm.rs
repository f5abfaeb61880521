use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::InvoiceRagError;

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }
}

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
pub struct LlmRequest {
    /// Empty means the client's configured model.
    pub model: String,
    pub messages: Vec<Message>,
}

impl LlmRequest {
    pub fn prompt(prompt: impl Into<String>) -> Self {
        Self {
            model: String::new(),
            messages: vec![Message::user(prompt)],
        }
    }
}

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
pub struct LlmResponse {
    pub content: String,
}

#[async_trait::async_trait]
pub trait Llm: Send + Sync + 'static {
    async fn invoke(&self, request: LlmRequest) -> Result<LlmResponse, InvoiceRagError>;
}

#[async_trait::async_trait]
impl<T> Llm for Arc<T>
where
    T: Llm + ?Sized,
{
    async fn invoke(&self, request: LlmRequest) -> Result<LlmResponse, InvoiceRagError> {
        (**self).invoke(request).await
    }
}

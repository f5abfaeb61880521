use std::collections::HashMap;

use async_trait::async_trait;
use serde::Serialize;
use invoicerag_core::{CollectionSpec, Embedding, Llm, LlmRequest, Value, VectorStore};
use invoicerag_retrieval::{RetrievalResult, RetrievedMatch, Retriever};

use crate::{ContextAssembler, PromptTemplate, RagError};

pub const DEFAULT_TOP_K: usize = 5;

/// Returned verbatim, without a generation call, when retrieval finds nothing.
pub const NO_RESULTS_MESSAGE: &str = "No relevant invoices found in the database.";

/// Anything that can answer a free-text question using the `k` best matches.
#[async_trait]
pub trait AnswerQuery: Send + Sync {
    async fn answer(&self, query: &str, k: usize) -> Result<String, RagError>;
}

/// One retrieved invoice in machine-readable form.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct InvoiceHit {
    pub file_name: Option<String>,
    pub content: String,
    pub source_index: Option<Value>,
    pub score: f32,
}

impl From<RetrievedMatch> for InvoiceHit {
    fn from(m: RetrievedMatch) -> Self {
        Self {
            file_name: m.metadata_str("file_name").map(str::to_string),
            source_index: m.metadata.get("source_index").cloned(),
            content: m.document,
            score: m.score,
        }
    }
}

pub struct InvoiceRag<E, S, L> {
    retriever: Retriever<E, S>,
    llm: L,
    template: PromptTemplate,
    assembler: ContextAssembler,
}

impl<E, S, L> InvoiceRag<E, S, L>
where
    E: Embedding,
    S: VectorStore,
    L: Llm,
{
    pub fn new(retriever: Retriever<E, S>, llm: L) -> Self {
        Self {
            retriever,
            llm,
            template: PromptTemplate::default(),
            assembler: ContextAssembler,
        }
    }

    pub fn with_template(mut self, template: PromptTemplate) -> Self {
        self.template = template;
        self
    }

    /// See [`Retriever::verify_model`].
    pub fn verify_collection(&self, spec: &CollectionSpec) -> bool {
        self.retriever.verify_model(spec)
    }

    pub async fn retrieve(&self, query: &str, k: usize) -> Result<RetrievalResult, RagError> {
        Ok(self.retriever.retrieve(query, k).await?)
    }

    pub fn build_prompt(&self, query: &str, result: &RetrievalResult) -> Result<String, RagError> {
        let mut vars = HashMap::new();
        vars.insert(
            "context".to_string(),
            Value::String(self.assembler.assemble(result)),
        );
        vars.insert("query".to_string(), Value::String(query.to_string()));
        self.template.render(&vars)
    }

    pub async fn answer(&self, query: &str, k: usize) -> Result<String, RagError> {
        let result = self.retrieve(query, k).await?;
        if result.is_empty() {
            return Ok(NO_RESULTS_MESSAGE.to_string());
        }
        tracing::info!(matches = result.len(), "retrieved relevant invoices");

        let prompt = self.build_prompt(query, &result)?;
        let response = self.llm.invoke(LlmRequest::prompt(prompt)).await?;
        Ok(response.content)
    }

    pub async fn search_invoices(&self, query: &str, k: usize) -> Result<Vec<InvoiceHit>, RagError> {
        let result = self.retrieve(query, k).await?;
        Ok(result.matches.into_iter().map(InvoiceHit::from).collect())
    }
}

#[async_trait]
impl<E, S, L> AnswerQuery for InvoiceRag<E, S, L>
where
    E: Embedding,
    S: VectorStore,
    L: Llm,
{
    async fn answer(&self, query: &str, k: usize) -> Result<String, RagError> {
        InvoiceRag::answer(self, query, k).await
    }
}

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::json;
use invoicerag_core::{
    Chunk, Embedding, EmbeddingError, InvoiceRagError, Llm, LlmRequest, LlmResponse,
};
use invoicerag_retrieval::{Indexer, LocalCollectionStore, LocalVectorStore, Retriever};

const VOCABULARY: &[&str] = &["acme", "globex", "initech"];

/// Counts vendor names; the last dimension is a constant so no vector is zero.
#[derive(Clone, Debug, Default)]
pub struct KeywordEmbedder;

impl KeywordEmbedder {
    fn vector(text: &str) -> Vec<f32> {
        let lower = text.to_lowercase();
        let tokens: Vec<&str> = lower
            .split(|c: char| !c.is_alphanumeric())
            .filter(|token| !token.is_empty())
            .collect();
        let mut vector: Vec<f32> = VOCABULARY
            .iter()
            .map(|word| tokens.iter().filter(|token| *token == word).count() as f32)
            .collect();
        vector.push(0.1);
        vector
    }
}

#[async_trait]
impl Embedding for KeywordEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        Ok(Self::vector(text))
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        Ok(texts.iter().map(|text| Self::vector(text)).collect())
    }

    fn dimension(&self) -> usize {
        VOCABULARY.len() + 1
    }

    fn model_id(&self) -> &str {
        "keyword"
    }
}

/// Records every prompt and replies with a fixed answer or error.
#[derive(Clone, Default)]
pub struct RecordingLlm {
    calls: Arc<AtomicUsize>,
    prompts: Arc<Mutex<Vec<String>>>,
    fail_with: Option<String>,
}

impl RecordingLlm {
    pub fn failing(message: &str) -> Self {
        Self {
            fail_with: Some(message.to_string()),
            ..Self::default()
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl Llm for RecordingLlm {
    async fn invoke(&self, request: LlmRequest) -> Result<LlmResponse, InvoiceRagError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let prompt = request
            .messages
            .iter()
            .map(|message| message.content.clone())
            .collect::<Vec<_>>()
            .join("\n");
        self.prompts.lock().unwrap().push(prompt);
        match &self.fail_with {
            Some(message) => Err(InvoiceRagError::LlmProvider(message.clone())),
            None => Ok(LlmResponse {
                content: "  Acme billed 100 and 250.\n".to_string(),
            }),
        }
    }
}

pub fn invoice_chunks() -> Vec<Chunk> {
    let chunk = |id: &str, file: &str, vendor: &str, total: u32, idx: u32| Chunk {
        id: id.to_string(),
        text: format!("Invoice: {file}\nVendor: {vendor}\nTotal Amount: {total}"),
        metadata: json!({"file_name": file, "source_index": idx})
            .as_object()
            .cloned()
            .unwrap(),
    };
    vec![
        chunk("inv_1", "A.pdf", "Acme", 100, 0),
        chunk("inv_2", "B.pdf", "Globex", 75, 1),
        chunk("inv_3", "C.pdf", "Acme", 250, 2),
    ]
}

pub async fn indexed_retriever(
    dir: &tempfile::TempDir,
    chunks: Vec<Chunk>,
) -> Retriever<KeywordEmbedder, LocalVectorStore> {
    let built = Indexer::new(KeywordEmbedder, LocalCollectionStore::new(dir.path()))
        .build_index(chunks, "invoices_collection", 2)
        .await
        .unwrap();
    Retriever::new(KeywordEmbedder, built.collection.store)
}

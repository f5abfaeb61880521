//! Chroma backend for invoicerag collections.
//!
//! Metadata is restricted to flat scalars, matching what the indexer writes.

use std::collections::HashMap;

use chroma::client::{ChromaAuthMethod, ChromaHttpClientError, ChromaHttpClientOptions};
use chroma::types::{
    IncludeList, Metadata as ChromaMetadata, MetadataValue, QueryResponse, UpdateMetadata,
    UpdateMetadataValue,
};
use chroma::{ChromaCollection, ChromaHttpClient};
use thiserror::Error;
use invoicerag_core::{
    Collection, CollectionSpec, CollectionStore, DistanceMetric, Document, SearchResult,
    StoreError, Value, VectorStore,
};

const HNSW_SPACE_KEY: &str = "hnsw:space";

#[derive(Debug, Error)]
pub enum ChromaStoreError {
    #[error("invalid endpoint URL: {0}")]
    InvalidEndpoint(String),
    #[error("chroma client error: {0}")]
    Client(#[from] ChromaHttpClientError),
    #[error("metadata key '{0}' is invalid for Chroma")]
    InvalidMetadataKey(String),
    #[error("unsupported metadata value for '{key}': {reason}")]
    UnsupportedMetadataValue { key: String, reason: String },
}

impl From<ChromaStoreError> for StoreError {
    fn from(value: ChromaStoreError) -> Self {
        StoreError::Internal(Box::new(value))
    }
}

/// Collections on a Chroma server.
pub struct ChromaCollectionStore {
    client: ChromaHttpClient,
}

impl ChromaCollectionStore {
    /// Tenant and database come from `CHROMA_TENANT` and `CHROMA_DATABASE`.
    pub fn new(endpoint: impl AsRef<str>) -> Result<Self, ChromaStoreError> {
        let tenant_id =
            std::env::var("CHROMA_TENANT").unwrap_or_else(|_| "default_tenant".to_string());
        let database_name =
            std::env::var("CHROMA_DATABASE").unwrap_or_else(|_| "default_database".to_string());

        let options = ChromaHttpClientOptions {
            endpoint: endpoint
                .as_ref()
                .parse::<reqwest::Url>()
                .map_err(|err| ChromaStoreError::InvalidEndpoint(err.to_string()))?,
            auth_method: ChromaAuthMethod::None,
            tenant_id: Some(tenant_id),
            database_name: Some(database_name),
            ..Default::default()
        };

        Ok(Self::with_client(ChromaHttpClient::new(options)))
    }

    pub fn with_client(client: ChromaHttpClient) -> Self {
        Self { client }
    }
}

#[async_trait::async_trait]
impl CollectionStore for ChromaCollectionStore {
    type Store = ChromaVectorStore;

    async fn create_or_replace(
        &self,
        spec: CollectionSpec,
    ) -> Result<Collection<ChromaVectorStore>, StoreError> {
        CollectionSpec::validate_name(&spec.name)?;
        if self.delete_collection(&spec.name).await? {
            tracing::debug!(collection = %spec.name, "replaced existing chroma collection");
        }

        let metadata = collection_metadata(&spec)?;
        let collection = self
            .client
            .create_collection(spec.name.clone(), None, Some(metadata))
            .await
            .map_err(ChromaStoreError::from)?;

        Ok(Collection {
            store: ChromaVectorStore {
                collection,
                metric: spec.metric,
            },
            spec,
        })
    }

    async fn open(&self, name: &str) -> Result<Collection<ChromaVectorStore>, StoreError> {
        CollectionSpec::validate_name(name)?;
        let collection = self
            .client
            .get_collection(name)
            .await
            .map_err(|err| {
                tracing::debug!(collection = name, error = %err, "chroma get_collection failed");
                StoreError::CollectionNotFound(name.to_string())
            })?;

        let spec = spec_from_metadata(name, collection.metadata().as_ref());
        Ok(Collection {
            store: ChromaVectorStore {
                collection,
                metric: spec.metric,
            },
            spec,
        })
    }

    async fn delete_collection(&self, name: &str) -> Result<bool, StoreError> {
        CollectionSpec::validate_name(name)?;
        if self.client.get_collection(name).await.is_err() {
            return Ok(false);
        }
        self.client
            .delete_collection(name)
            .await
            .map_err(ChromaStoreError::from)?;
        Ok(true)
    }
}

pub struct ChromaVectorStore {
    collection: ChromaCollection,
    metric: DistanceMetric,
}

impl ChromaVectorStore {
    pub fn collection_name(&self) -> &str {
        self.collection.name()
    }

    /// Chroma reports distances; scores are flipped so that higher is better.
    fn score(&self, distance: f32) -> f32 {
        match self.metric {
            DistanceMetric::Cosine | DistanceMetric::InnerProduct => 1.0 - distance,
            DistanceMetric::L2 => -distance,
        }
    }
}

#[async_trait::async_trait]
impl VectorStore for ChromaVectorStore {
    async fn add(&self, docs: Vec<Document>) -> Result<(), StoreError> {
        if docs.is_empty() {
            return Ok(());
        }

        let mut ids = Vec::with_capacity(docs.len());
        let mut embeddings = Vec::with_capacity(docs.len());
        let mut documents = Vec::with_capacity(docs.len());
        let mut metadatas = Vec::with_capacity(docs.len());
        let mut expected_dimension: Option<usize> = None;

        for mut doc in docs {
            if doc.id.trim().is_empty() {
                return Err(StoreError::InvalidId(doc.id));
            }

            let embedding = doc
                .embedding
                .take()
                .ok_or_else(|| StoreError::MissingEmbedding(doc.id.clone()))?;

            match expected_dimension {
                Some(expected) if expected != embedding.len() => {
                    return Err(StoreError::DimensionMismatch {
                        expected,
                        got: embedding.len(),
                    });
                }
                None => expected_dimension = Some(embedding.len()),
                _ => {}
            }

            let metadata = to_update_metadata(doc.metadata)?;

            ids.push(doc.id);
            embeddings.push(embedding);
            documents.push(Some(doc.content));
            metadatas.push(Some(metadata));
        }

        self.collection
            .upsert(ids, embeddings, Some(documents), None, Some(metadatas))
            .await
            .map_err(ChromaStoreError::from)?;
        Ok(())
    }

    async fn search(
        &self,
        query_embedding: &[f32],
        top_k: usize,
    ) -> Result<Vec<SearchResult>, StoreError> {
        if query_embedding.is_empty() || top_k == 0 {
            return Ok(Vec::new());
        }

        let top_k_u32 = top_k.min(u32::MAX as usize) as u32;

        let response = self
            .collection
            .query(
                vec![query_embedding.to_vec()],
                Some(top_k_u32),
                None,
                None,
                Some(IncludeList::default_query()),
            )
            .await
            .map_err(ChromaStoreError::from)?;

        Ok(self.query_response_to_results(response))
    }

    async fn delete(&self, ids: &[String]) -> Result<(), StoreError> {
        if ids.is_empty() {
            return Ok(());
        }

        self.collection
            .delete(Some(ids.to_vec()), None, None)
            .await
            .map_err(ChromaStoreError::from)?;
        Ok(())
    }

    async fn count(&self) -> Result<usize, StoreError> {
        let count = self
            .collection
            .count()
            .await
            .map_err(ChromaStoreError::from)?;
        Ok(count as usize)
    }
}

impl ChromaVectorStore {
    fn query_response_to_results(&self, response: QueryResponse) -> Vec<SearchResult> {
        let ids = response.ids.into_iter().next().unwrap_or_default();
        let documents = response
            .documents
            .and_then(|mut batches| batches.pop())
            .unwrap_or_default();
        let metadatas = response
            .metadatas
            .and_then(|mut batches| batches.pop())
            .unwrap_or_default();
        let distances = response
            .distances
            .and_then(|mut batches| batches.pop())
            .unwrap_or_default();

        ids.into_iter()
            .enumerate()
            .map(|(idx, id)| {
                let content = documents
                    .get(idx)
                    .and_then(|value| value.clone())
                    .unwrap_or_default();

                let metadata: HashMap<String, Value> = metadatas
                    .get(idx)
                    .cloned()
                    .flatten()
                    .unwrap_or_default()
                    .into_iter()
                    .map(|(key, value)| (key, Value::from(value)))
                    .collect();

                let score = distances
                    .get(idx)
                    .copied()
                    .flatten()
                    .map(|distance| self.score(distance))
                    .unwrap_or(0.0);

                SearchResult {
                    document: Document {
                        id,
                        content,
                        metadata,
                        embedding: None,
                    },
                    score,
                }
            })
            .collect()
    }
}

fn collection_metadata(spec: &CollectionSpec) -> Result<ChromaMetadata, ChromaStoreError> {
    let mut out = ChromaMetadata::new();
    out.insert(
        HNSW_SPACE_KEY.to_string(),
        MetadataValue::Str(spec.metric.as_str().to_string()),
    );
    for (key, value) in &spec.metadata {
        let value = match value {
            Value::Bool(value) => MetadataValue::Bool(*value),
            Value::String(value) => MetadataValue::Str(value.clone()),
            Value::Number(number) => match number.as_i64() {
                Some(int_value) => MetadataValue::Int(int_value),
                None => MetadataValue::Float(number.as_f64().unwrap_or_default()),
            },
            _ => return Err(unsupported_metadata(key, "collection metadata must be scalar")),
        };
        out.insert(key.clone(), value);
    }
    Ok(out)
}

fn spec_from_metadata(name: &str, metadata: Option<&ChromaMetadata>) -> CollectionSpec {
    let mut spec = CollectionSpec::new(name);
    let Some(metadata) = metadata else {
        return spec;
    };
    for (key, value) in metadata {
        if key == HNSW_SPACE_KEY {
            if let MetadataValue::Str(space) = value {
                spec.metric = space.parse().unwrap_or_default();
            }
            continue;
        }
        spec.metadata.insert(key.clone(), Value::from(value.clone()));
    }
    spec
}

fn to_update_metadata(metadata: HashMap<String, Value>) -> Result<UpdateMetadata, ChromaStoreError> {
    let mut out = UpdateMetadata::new();

    for (key, value) in metadata {
        if key.starts_with('$') || key.starts_with('#') {
            return Err(ChromaStoreError::InvalidMetadataKey(key));
        }

        let value = match value {
            Value::Bool(value) => UpdateMetadataValue::Bool(value),
            Value::String(value) => UpdateMetadataValue::Str(value),
            Value::Number(number) => {
                if let Some(int_value) = json_number_to_i64(&number) {
                    UpdateMetadataValue::Int(int_value)
                } else if let Some(float_value) = number.as_f64() {
                    UpdateMetadataValue::Float(float_value)
                } else {
                    return Err(unsupported_metadata(&key, "number cannot be represented"));
                }
            }
            Value::Null | Value::Array(_) | Value::Object(_) => {
                return Err(unsupported_metadata(&key, "only scalar metadata is stored"));
            }
        };
        out.insert(key, value);
    }

    Ok(out)
}

fn json_number_to_i64(number: &serde_json::Number) -> Option<i64> {
    if let Some(value) = number.as_i64() {
        return Some(value);
    }

    number.as_u64().and_then(|value| i64::try_from(value).ok())
}

fn unsupported_metadata(key: &str, reason: &str) -> ChromaStoreError {
    ChromaStoreError::UnsupportedMetadataValue {
        key: key.to_string(),
        reason: reason.to_string(),
    }
}

//! File-persisted vector collections.
//!
//! Each collection lives in `<root>/<name>.json`. Every mutation rewrites the
//! whole file through a temporary sibling and a rename, so a reader never sees a
//! half-written collection. Search is an exhaustive scan.

use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use invoicerag_core::{
    Collection, CollectionSpec, CollectionStore, DistanceMetric, Document, Metadata,
    SearchResult, StoreError, Value, VectorStore,
};

#[derive(Debug, Serialize, Deserialize)]
struct CollectionFile {
    #[serde(flatten)]
    spec: CollectionSpec,
    #[serde(default)]
    records: Vec<StoredRecord>,
}

#[derive(Debug, Serialize, Deserialize)]
struct StoredRecord {
    id: String,
    document: String,
    #[serde(default)]
    metadata: Metadata,
    embedding: Vec<f32>,
}

#[derive(Clone, Default)]
struct StoreInner {
    docs: Vec<Option<Document>>,
    embeddings: Vec<Option<Vec<f32>>>,
    id_map: HashMap<String, usize>,
    dimension: Option<usize>,
}

impl StoreInner {
    fn from_records(records: Vec<StoredRecord>) -> Result<Self, StoreError> {
        let mut inner = StoreInner::default();
        for record in records {
            let doc = Document {
                id: record.id,
                content: record.document,
                metadata: record.metadata.into_iter().collect(),
                embedding: None,
            };
            inner.upsert(doc, record.embedding)?;
        }
        Ok(inner)
    }

    fn upsert(&mut self, doc: Document, embedding: Vec<f32>) -> Result<(), StoreError> {
        let dimension = embedding.len();
        match self.dimension {
            Some(expected) if expected != dimension => {
                return Err(StoreError::DimensionMismatch {
                    expected,
                    got: dimension,
                });
            }
            None => self.dimension = Some(dimension),
            _ => {}
        }

        if let Some(&index) = self.id_map.get(&doc.id) {
            self.docs[index] = Some(doc);
            self.embeddings[index] = Some(embedding);
        } else {
            let index = self.docs.len();
            self.id_map.insert(doc.id.clone(), index);
            self.docs.push(Some(doc));
            self.embeddings.push(Some(embedding));
        }
        Ok(())
    }

    fn records(&self) -> Vec<StoredRecord> {
        self.docs
            .iter()
            .zip(self.embeddings.iter())
            .filter_map(|(doc, embedding)| {
                let (doc, embedding) = (doc.as_ref()?, embedding.as_ref()?);
                let mut metadata: Vec<(&String, &Value)> = doc.metadata.iter().collect();
                metadata.sort_by(|a, b| a.0.cmp(b.0));
                Some(StoredRecord {
                    id: doc.id.clone(),
                    document: doc.content.clone(),
                    metadata: metadata
                        .into_iter()
                        .map(|(key, value)| (key.clone(), value.clone()))
                        .collect(),
                    embedding: embedding.clone(),
                })
            })
            .collect()
    }
}

/// Directory of persisted collections.
#[derive(Clone, Debug)]
pub struct LocalCollectionStore {
    root: PathBuf,
}

impl LocalCollectionStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn collection_path(&self, name: &str) -> Result<PathBuf, StoreError> {
        CollectionSpec::validate_name(name)?;
        Ok(self.root.join(format!("{name}.json")))
    }
}

#[async_trait::async_trait]
impl CollectionStore for LocalCollectionStore {
    type Store = LocalVectorStore;

    async fn create_or_replace(
        &self,
        spec: CollectionSpec,
    ) -> Result<Collection<LocalVectorStore>, StoreError> {
        let path = self.collection_path(&spec.name)?;
        tokio::fs::create_dir_all(&self.root).await?;
        if self.delete_collection(&spec.name).await? {
            tracing::debug!(collection = %spec.name, "replaced existing collection");
        }

        let store = LocalVectorStore {
            path,
            spec: spec.clone(),
            inner: Arc::new(RwLock::new(StoreInner::default())),
        };
        store.persist(&StoreInner::default()).await?;
        Ok(Collection { spec, store })
    }

    async fn open(&self, name: &str) -> Result<Collection<LocalVectorStore>, StoreError> {
        let path = self.collection_path(name)?;
        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == ErrorKind::NotFound => {
                return Err(StoreError::CollectionNotFound(name.to_string()));
            }
            Err(err) => return Err(err.into()),
        };
        let file: CollectionFile =
            serde_json::from_slice(&bytes).map_err(|err| StoreError::Internal(Box::new(err)))?;
        let inner = StoreInner::from_records(file.records)?;
        let spec = file.spec;

        Ok(Collection {
            spec: spec.clone(),
            store: LocalVectorStore {
                path,
                spec,
                inner: Arc::new(RwLock::new(inner)),
            },
        })
    }

    async fn delete_collection(&self, name: &str) -> Result<bool, StoreError> {
        let path = self.collection_path(name)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(true),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(false),
            Err(err) => Err(err.into()),
        }
    }
}

/// One open collection. Clones share state.
#[derive(Clone)]
pub struct LocalVectorStore {
    path: PathBuf,
    spec: CollectionSpec,
    inner: Arc<RwLock<StoreInner>>,
}

impl LocalVectorStore {
    pub fn spec(&self) -> &CollectionSpec {
        &self.spec
    }

    async fn persist(&self, inner: &StoreInner) -> Result<(), StoreError> {
        let file = CollectionFile {
            spec: self.spec.clone(),
            records: inner.records(),
        };
        let bytes =
            serde_json::to_vec(&file).map_err(|err| StoreError::Internal(Box::new(err)))?;
        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, bytes).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        Ok(())
    }
}

#[async_trait::async_trait]
impl VectorStore for LocalVectorStore {
    /// All or nothing: the batch is staged on a copy, persisted, then swapped in.
    async fn add(&self, docs: Vec<Document>) -> Result<(), StoreError> {
        let mut inner = self.inner.write().await;
        let mut staged = inner.clone();
        for mut doc in docs {
            if doc.id.trim().is_empty() {
                return Err(StoreError::InvalidId(doc.id));
            }
            let embedding = doc
                .embedding
                .take()
                .ok_or_else(|| StoreError::MissingEmbedding(doc.id.clone()))?;
            staged.upsert(doc, embedding)?;
        }
        self.persist(&staged).await?;
        *inner = staged;
        Ok(())
    }

    async fn search(
        &self,
        query_embedding: &[f32],
        top_k: usize,
    ) -> Result<Vec<SearchResult>, StoreError> {
        let inner = self.inner.read().await;
        let expected = inner.dimension.unwrap_or(query_embedding.len());
        if expected != query_embedding.len() {
            return Err(StoreError::DimensionMismatch {
                expected,
                got: query_embedding.len(),
            });
        }

        let mut scored = Vec::with_capacity(inner.id_map.len());
        for (doc, embedding) in inner.docs.iter().zip(inner.embeddings.iter()) {
            let (Some(doc), Some(embedding)) = (doc, embedding) else {
                continue;
            };
            let mut score = similarity(self.spec.metric, query_embedding, embedding);
            if score.is_nan() {
                score = f32::NEG_INFINITY;
            }
            scored.push(SearchResult {
                document: doc.clone(),
                score,
            });
        }

        scored.sort_by(|a, b| b.score.total_cmp(&a.score));
        scored.truncate(top_k);
        Ok(scored)
    }

    async fn delete(&self, ids: &[String]) -> Result<(), StoreError> {
        let mut inner = self.inner.write().await;
        if !ids.iter().any(|id| inner.id_map.contains_key(id)) {
            return Ok(());
        }
        let mut staged = inner.clone();
        for id in ids {
            if let Some(idx) = staged.id_map.remove(id) {
                staged.docs[idx] = None;
                staged.embeddings[idx] = None;
            }
        }
        self.persist(&staged).await?;
        *inner = staged;
        Ok(())
    }

    async fn count(&self) -> Result<usize, StoreError> {
        Ok(self.inner.read().await.id_map.len())
    }
}

/// Higher is more similar for every metric; `l2` is the negated euclidean distance.
fn similarity(metric: DistanceMetric, a: &[f32], b: &[f32]) -> f32 {
    match metric {
        DistanceMetric::Cosine => cosine_similarity(a, b),
        DistanceMetric::InnerProduct => a.iter().zip(b).map(|(x, y)| x * y).sum(),
        DistanceMetric::L2 => -a
            .iter()
            .zip(b)
            .map(|(x, y)| (x - y) * (x - y))
            .sum::<f32>()
            .sqrt(),
    }
}

fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let mut dot = 0.0;
    let mut norm_a = 0.0;
    let mut norm_b = 0.0;
    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a.sqrt() * norm_b.sqrt())
}

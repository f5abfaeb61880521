use std::fmt;
use std::str::FromStr;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::{Metadata, StoreError, Value, VectorStore};

pub const EMBEDDING_MODEL_KEY: &str = "embedding_model";
pub const EMBEDDING_DIMENSION_KEY: &str = "embedding_dimension";

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum DistanceMetric {
    #[default]
    #[serde(rename = "cosine")]
    Cosine,
    #[serde(rename = "l2")]
    L2,
    #[serde(rename = "ip")]
    InnerProduct,
}

impl DistanceMetric {
    pub fn as_str(&self) -> &'static str {
        match self {
            DistanceMetric::Cosine => "cosine",
            DistanceMetric::L2 => "l2",
            DistanceMetric::InnerProduct => "ip",
        }
    }
}

impl fmt::Display for DistanceMetric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DistanceMetric {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "cosine" => Ok(DistanceMetric::Cosine),
            "l2" => Ok(DistanceMetric::L2),
            "ip" | "inner_product" => Ok(DistanceMetric::InnerProduct),
            other => Err(format!("unknown distance metric '{other}'")),
        }
    }
}

/// Name, metric and collection-level metadata of a vector collection.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CollectionSpec {
    pub name: String,
    #[serde(default)]
    pub metric: DistanceMetric,
    #[serde(default)]
    pub metadata: Metadata,
}

impl CollectionSpec {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            metric: DistanceMetric::default(),
            metadata: Metadata::new(),
        }
    }

    pub fn with_metric(mut self, metric: DistanceMetric) -> Self {
        self.metric = metric;
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    pub fn embedding_model(&self) -> Option<&str> {
        self.metadata.get(EMBEDDING_MODEL_KEY).and_then(Value::as_str)
    }

    /// Names end up as file names and URL segments, so only `[A-Za-z0-9._-]` is accepted.
    pub fn validate_name(name: &str) -> Result<(), StoreError> {
        let valid = !name.is_empty()
            && !name.starts_with('.')
            && name
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'));
        if valid {
            Ok(())
        } else {
            Err(StoreError::InvalidCollection(name.to_string()))
        }
    }
}

/// An opened collection together with the spec it was created with.
pub struct Collection<S> {
    pub spec: CollectionSpec,
    pub store: S,
}

/// Owns named collections. Rebuilding is always delete + recreate.
#[async_trait]
pub trait CollectionStore: Send + Sync {
    type Store: VectorStore + 'static;

    async fn create_or_replace(
        &self,
        spec: CollectionSpec,
    ) -> Result<Collection<Self::Store>, StoreError>;

    async fn open(&self, name: &str) -> Result<Collection<Self::Store>, StoreError>;

    /// Returns `false` when no collection with that name existed.
    async fn delete_collection(&self, name: &str) -> Result<bool, StoreError>;
}

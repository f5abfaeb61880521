use serde::{Deserialize, Serialize};

use crate::{Document, Value};

/// Ordered field map; insertion order is kept so files round-trip unchanged.
pub type Metadata = serde_json::Map<String, Value>;

/// The atomic indexed unit: one record's text plus its id and flat metadata.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Chunk {
    pub id: String,
    pub text: String,
    #[serde(default)]
    pub metadata: Metadata,
}

impl Chunk {
    /// Converts into a store document, keeping only scalar metadata.
    pub fn into_document(self) -> Document {
        Document {
            id: self.id,
            content: self.text,
            metadata: scalar_metadata(self.metadata).into_iter().collect(),
            embedding: None,
        }
    }
}

/// Strings, numbers and booleans. Null, arrays and objects are not scalars.
pub fn is_scalar(value: &Value) -> bool {
    matches!(value, Value::String(_) | Value::Number(_) | Value::Bool(_))
}

pub fn scalar_metadata(metadata: Metadata) -> Metadata {
    metadata
        .into_iter()
        .filter(|(_, value)| is_scalar(value))
        .collect()
}

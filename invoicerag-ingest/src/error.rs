use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("input file not found: {}", .0.display())]
    MissingFile(PathBuf),
    #[error("i/o error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid JSON in {}: {source}", .path.display())]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("Serialization/deserialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

#[derive(Debug, Error)]
pub enum DatasetError {
    #[error("dataset request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("dataset server returned {status}: {body}")]
    Status { status: u16, body: String },
    #[error("invalid dataset response: {0}")]
    InvalidResponse(String),
    #[error(transparent)]
    Ingest(#[from] IngestError),
}

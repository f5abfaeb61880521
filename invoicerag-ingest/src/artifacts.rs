//! Pipeline artifacts on disk: UTF-8, pretty-printed JSON.

use std::io::ErrorKind;
use std::path::Path;

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::IngestError;

pub const DEFAULT_RAW_RECORDS_PATH: &str = "data/invoices_data.json";
pub const DEFAULT_CHUNKS_PATH: &str = "data/chunks.json";

pub async fn read_json<T: DeserializeOwned>(path: impl AsRef<Path>) -> Result<T, IngestError> {
    let path = path.as_ref();
    let bytes = match tokio::fs::read(path).await {
        Ok(bytes) => bytes,
        Err(err) if err.kind() == ErrorKind::NotFound => {
            return Err(IngestError::MissingFile(path.to_path_buf()));
        }
        Err(source) => {
            return Err(IngestError::Io {
                path: path.to_path_buf(),
                source,
            })
        }
    };
    serde_json::from_slice(&bytes).map_err(|source| IngestError::Json {
        path: path.to_path_buf(),
        source,
    })
}

/// Creates missing parent directories.
pub async fn write_json_pretty<T: Serialize + ?Sized>(
    path: impl AsRef<Path>,
    value: &T,
) -> Result<(), IngestError> {
    let path = path.as_ref();
    let io_err = |source| IngestError::Io {
        path: path.to_path_buf(),
        source,
    };
    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await.map_err(io_err)?;
    }
    let mut bytes = serde_json::to_vec_pretty(value)?;
    bytes.push(b'\n');
    tokio::fs::write(path, bytes).await.map_err(io_err)?;
    Ok(())
}

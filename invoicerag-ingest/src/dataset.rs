//! Invoice dataset download through the Hugging Face datasets-server rows API.

use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use invoicerag_core::Value;

use crate::{DatasetError, IngestError, InvoiceRecord};

pub const DEFAULT_DATASET: &str = "katanaml-org/invoices-donut-data-v1";
/// The rows API rejects pages longer than 100.
pub const DEFAULT_PAGE_SIZE: usize = 100;

const DATASETS_SERVER_URL: &str = "https://datasets-server.huggingface.co";
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RawInvoiceMetadata {
    pub source_index: usize,
    pub has_image: bool,
}

/// One downloaded invoice, as stored in the raw records file.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RawInvoice {
    pub id: String,
    pub file_name: String,
    #[serde(default)]
    pub data: InvoiceRecord,
    pub metadata: RawInvoiceMetadata,
}

#[derive(Clone, Debug, Deserialize)]
pub struct DatasetRow {
    #[serde(default)]
    pub row_idx: Option<usize>,
    pub row: serde_json::Map<String, Value>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct RowsPage {
    pub rows: Vec<DatasetRow>,
    pub num_rows_total: usize,
}

/// A paged source of dataset rows.
#[async_trait]
pub trait DatasetSource: Send + Sync {
    async fn fetch_page(&self, offset: usize, length: usize) -> Result<RowsPage, DatasetError>;

    async fn fetch_bytes(&self, url: &str) -> Result<Vec<u8>, DatasetError>;
}

#[derive(Clone)]
pub struct HuggingFaceDataset {
    base_url: String,
    dataset: String,
    config: String,
    split: String,
    token: Option<SecretString>,
    http: Client,
}

impl std::fmt::Debug for HuggingFaceDataset {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HuggingFaceDataset")
            .field("base_url", &self.base_url)
            .field("dataset", &self.dataset)
            .field("config", &self.config)
            .field("split", &self.split)
            .field("token", &self.token.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

impl HuggingFaceDataset {
    pub fn new(dataset: impl Into<String>) -> Result<Self, DatasetError> {
        let http = Client::builder().timeout(DEFAULT_TIMEOUT).build()?;
        Ok(Self {
            base_url: DATASETS_SERVER_URL.to_string(),
            dataset: dataset.into(),
            config: "default".to_string(),
            split: "train".to_string(),
            token: None,
            http,
        })
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_split(mut self, split: impl Into<String>) -> Self {
        self.split = split.into();
        self
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(SecretString::new(token.into()));
        self
    }

    pub fn dataset(&self) -> &str {
        &self.dataset
    }

    fn get(&self, url: &str) -> reqwest::RequestBuilder {
        let request = self.http.get(url);
        match &self.token {
            Some(token) => request.bearer_auth(token.expose_secret()),
            None => request,
        }
    }
}

async fn error_for_status(response: reqwest::Response) -> Result<reqwest::Response, DatasetError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(DatasetError::Status {
        status: status.as_u16(),
        body,
    })
}

#[async_trait]
impl DatasetSource for HuggingFaceDataset {
    async fn fetch_page(&self, offset: usize, length: usize) -> Result<RowsPage, DatasetError> {
        let url = format!("{}/rows", self.base_url.trim_end_matches('/'));
        let offset = offset.to_string();
        let length = length.to_string();
        let response = self
            .get(&url)
            .query(&[
                ("dataset", self.dataset.as_str()),
                ("config", self.config.as_str()),
                ("split", self.split.as_str()),
                ("offset", offset.as_str()),
                ("length", length.as_str()),
            ])
            .send()
            .await?;
        let response = error_for_status(response).await?;
        response
            .json::<RowsPage>()
            .await
            .map_err(|err| DatasetError::InvalidResponse(err.to_string()))
    }

    async fn fetch_bytes(&self, url: &str) -> Result<Vec<u8>, DatasetError> {
        let response = error_for_status(self.get(url).send().await?).await?;
        Ok(response.bytes().await?.to_vec())
    }
}

#[derive(Clone, Debug)]
pub struct DownloadOptions {
    pub page_size: usize,
    /// When set, each row's image is written to `<dir>/invoice_<idx>.png`.
    pub image_dir: Option<PathBuf>,
}

impl Default for DownloadOptions {
    fn default() -> Self {
        Self {
            page_size: DEFAULT_PAGE_SIZE,
            image_dir: None,
        }
    }
}

/// Pages through the whole split and converts every row into a [`RawInvoice`].
pub async fn download_records<S>(
    source: &S,
    options: &DownloadOptions,
) -> Result<Vec<RawInvoice>, DatasetError>
where
    S: DatasetSource + ?Sized,
{
    if options.page_size == 0 {
        return Err(DatasetError::InvalidResponse(
            "page size must be at least 1".to_string(),
        ));
    }
    if let Some(dir) = &options.image_dir {
        tokio::fs::create_dir_all(dir)
            .await
            .map_err(|source| IngestError::Io {
                path: dir.clone(),
                source,
            })?;
    }

    let mut invoices = Vec::new();
    let mut offset = 0;
    loop {
        let page = source.fetch_page(offset, options.page_size).await?;
        let fetched = page.rows.len();
        tracing::info!(offset, fetched, total = page.num_rows_total, "fetched dataset page");

        for row in page.rows {
            let idx = invoices.len();
            if let Some(dir) = &options.image_dir {
                save_image(source, &row, dir.join(format!("invoice_{idx}.png"))).await?;
            }
            invoices.push(convert_row(idx, row));
        }

        offset += fetched;
        if fetched == 0 || offset >= page.num_rows_total {
            break;
        }
    }

    Ok(invoices)
}

fn convert_row(idx: usize, row: DatasetRow) -> RawInvoice {
    let mut cells = row.row;
    let file_name = cells
        .get("file_name")
        .and_then(Value::as_str)
        .map(str::to_string)
        .unwrap_or_else(|| format!("invoice_{idx}"));
    let has_image = cells.contains_key("image");
    let data = match cells.remove("ground_truth") {
        Some(ground_truth) => parse_ground_truth(idx, &ground_truth),
        None => {
            tracing::warn!(idx, "row has no ground_truth cell");
            InvoiceRecord::new()
        }
    };

    RawInvoice {
        id: format!("invoice_{idx}"),
        file_name,
        data,
        metadata: RawInvoiceMetadata {
            source_index: idx,
            has_image,
        },
    }
}

/// `ground_truth` is a JSON document in a string cell; the record is its `gt_parse` object.
fn parse_ground_truth(idx: usize, cell: &Value) -> InvoiceRecord {
    let parsed = match cell {
        Value::String(text) => serde_json::from_str::<Value>(text),
        other => Ok(other.clone()),
    };
    match parsed {
        Ok(Value::Object(mut ground_truth)) => match ground_truth.remove("gt_parse") {
            Some(Value::Object(record)) => record,
            _ => InvoiceRecord::new(),
        },
        Ok(_) => {
            tracing::warn!(idx, "ground_truth is not a JSON object");
            InvoiceRecord::new()
        }
        Err(err) => {
            tracing::warn!(idx, error = %err, "malformed ground_truth");
            InvoiceRecord::new()
        }
    }
}

async fn save_image<S>(source: &S, row: &DatasetRow, path: PathBuf) -> Result<(), DatasetError>
where
    S: DatasetSource + ?Sized,
{
    let Some(src) = row
        .row
        .get("image")
        .and_then(|image| image.get("src"))
        .and_then(Value::as_str)
    else {
        return Ok(());
    };
    let bytes = source.fetch_bytes(src).await?;
    if let Err(source) = tokio::fs::write(&path, bytes).await {
        return Err(IngestError::Io { path, source }.into());
    }
    tracing::debug!(path = %path.display(), "saved invoice image");
    Ok(())
}

//! Build-time stages: fetch the invoice dataset, format records and build chunks.

pub mod artifacts;
mod chunk_builder;
mod dataset;
mod error;
mod formatter;

pub use chunk_builder::{ChunkBuilder, STRUCTURED_DATA_KEY};
pub use dataset::{
    download_records, DatasetRow, DatasetSource, DownloadOptions, HuggingFaceDataset,
    RawInvoice, RawInvoiceMetadata, RowsPage, DEFAULT_DATASET, DEFAULT_PAGE_SIZE,
};
pub use error::{DatasetError, IngestError};
pub use formatter::{InvoiceRecord, RecordFormatter, PREFERRED_FIELDS};

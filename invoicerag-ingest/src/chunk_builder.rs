use invoicerag_core::{scalar_metadata, Chunk, Metadata, Value};

use crate::{IngestError, InvoiceRecord, RawInvoice, RecordFormatter};

pub const STRUCTURED_DATA_KEY: &str = "structured_data";

/// Turns records into chunks, one chunk per record.
#[derive(Clone, Debug, Default)]
pub struct ChunkBuilder {
    formatter: RecordFormatter,
}

impl ChunkBuilder {
    pub fn new(formatter: RecordFormatter) -> Self {
        Self { formatter }
    }

    /// Non-scalar entries of `extra_metadata` are dropped.
    pub fn build(
        &self,
        record: &InvoiceRecord,
        id: impl Into<String>,
        source_label: &str,
        extra_metadata: Metadata,
    ) -> Chunk {
        let header = format!("Invoice: {source_label}");
        let body = self.formatter.format(record);
        let text = if body.is_empty() {
            header
        } else {
            format!("{header}\n\n{body}")
        };

        Chunk {
            id: id.into(),
            text,
            metadata: scalar_metadata(extra_metadata),
        }
    }

    /// Chunks for a downloaded dataset. The full record is kept as a JSON string
    /// under `structured_data`.
    pub fn build_all(&self, invoices: &[RawInvoice]) -> Result<Vec<Chunk>, IngestError> {
        invoices
            .iter()
            .map(|invoice| {
                let mut metadata = Metadata::new();
                metadata.insert("file_name".to_string(), Value::from(invoice.file_name.as_str()));
                metadata.insert(
                    "source_index".to_string(),
                    Value::from(invoice.metadata.source_index),
                );
                metadata.insert("has_image".to_string(), Value::from(invoice.metadata.has_image));
                metadata.insert(
                    STRUCTURED_DATA_KEY.to_string(),
                    Value::String(serde_json::to_string(&invoice.data)?),
                );
                Ok(self.build(&invoice.data, invoice.id.as_str(), &invoice.file_name, metadata))
            })
            .collect()
    }
}

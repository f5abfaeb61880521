use invoicerag_core::{Metadata, Value};

/// One invoice's parsed fields. Field order is the order they were read in.
pub type InvoiceRecord = Metadata;

/// Known invoice fields and their labels, in output order.
pub const PREFERRED_FIELDS: &[(&str, &str)] = &[
    ("company", "Company"),
    ("vendor", "Vendor"),
    ("invoice_number", "Invoice Number"),
    ("invoice_date", "Date"),
    ("due_date", "Due Date"),
    ("total", "Total Amount"),
    ("subtotal", "Subtotal"),
    ("tax", "Tax"),
    ("address", "Address"),
    ("items", "Line Items"),
];

/// Flattens a record into `Label: value` lines for embedding.
#[derive(Clone, Debug)]
pub struct RecordFormatter {
    fields: Vec<(String, String)>,
}

impl Default for RecordFormatter {
    fn default() -> Self {
        Self::with_fields(
            PREFERRED_FIELDS
                .iter()
                .map(|(field, label)| (field.to_string(), label.to_string())),
        )
    }
}

impl RecordFormatter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_fields<I, K, L>(fields: I) -> Self
    where
        I: IntoIterator<Item = (K, L)>,
        K: Into<String>,
        L: Into<String>,
    {
        Self {
            fields: fields
                .into_iter()
                .map(|(field, label)| (field.into(), label.into()))
                .collect(),
        }
    }

    /// Preferred fields first, then every other field in record order. Falsy
    /// values are skipped; an empty record formats to `""`.
    pub fn format(&self, record: &InvoiceRecord) -> String {
        let mut lines = Vec::new();

        for (field, label) in &self.fields {
            if let Some(value) = record.get(field) {
                if !is_falsy(value) {
                    lines.push(format!("{label}: {}", render_value(value)));
                }
            }
        }

        for (key, value) in record {
            if self.is_preferred(key) || is_falsy(value) {
                continue;
            }
            lines.push(format!("{key}: {}", render_value(value)));
        }

        lines.join("\n")
    }

    fn is_preferred(&self, key: &str) -> bool {
        self.fields.iter().any(|(field, _)| field == key)
    }
}

fn is_falsy(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Bool(flag) => !flag,
        Value::Number(number) => number.as_f64() == Some(0.0),
        Value::String(text) => text.is_empty(),
        Value::Array(items) => items.is_empty(),
        Value::Object(fields) => fields.is_empty(),
    }
}

fn render_value(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        Value::Array(items) => items
            .iter()
            .map(|item| match item {
                Value::String(text) => text.clone(),
                other => other.to_string(),
            })
            .collect::<Vec<_>>()
            .join(", "),
        other => other.to_string(),
    }
}

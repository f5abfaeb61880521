use std::collections::HashMap;

use regex::Regex;
use invoicerag_core::Value;

use crate::RagError;

/// Instruction template for invoice questions. Expects `context` and `query`.
pub const INVOICE_QA_TEMPLATE: &str = "You are an invoice analysis assistant. Answer questions based on the invoice data provided.

Invoice Data:
{{context}}

Question: {{query}}

Provide a clear, concise answer based on the invoice information above. If the answer requires specific amounts or dates, include them in your response.

Answer:";

/// `{{name}}` placeholders; unknown names render empty. Substituted values are
/// never re-expanded.
#[derive(Debug, Clone)]
pub struct PromptTemplate {
    template: String,
}

impl Default for PromptTemplate {
    fn default() -> Self {
        Self::new(INVOICE_QA_TEMPLATE)
    }
}

impl PromptTemplate {
    pub fn new(template: impl Into<String>) -> Self {
        Self {
            template: template.into(),
        }
    }

    pub fn render(&self, vars: &HashMap<String, Value>) -> Result<String, RagError> {
        let pattern = Regex::new(r"\{\{\s*(\w+)\s*\}\}")
            .map_err(|e| RagError::Template(e.to_string()))?;
        let rendered = pattern.replace_all(&self.template, |caps: &regex::Captures| {
            let key = &caps[1];
            match vars.get(key) {
                Some(value) => value
                    .as_str()
                    .map(|s| s.to_string())
                    .unwrap_or_else(|| value.to_string()),
                None => "".to_string(),
            }
        });
        Ok(rendered.to_string())
    }
}

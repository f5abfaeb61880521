use invoicerag_retrieval::RetrievalResult;

/// Renders retrieved invoices as numbered blocks for the prompt.
#[derive(Clone, Copy, Debug, Default)]
pub struct ContextAssembler;

impl ContextAssembler {
    /// `--- Invoice <n> (<file_name>) ---` followed by the document, blocks
    /// separated by a blank line. Falls back to the match id when a match has
    /// no `file_name`.
    pub fn assemble(&self, result: &RetrievalResult) -> String {
        result
            .iter()
            .enumerate()
            .map(|(idx, m)| {
                let label = m.metadata_str("file_name").unwrap_or(&m.id);
                format!("--- Invoice {} ({}) ---\n{}", idx + 1, label, m.document)
            })
            .collect::<Vec<_>>()
            .join("\n\n")
    }
}

use invoicerag_core::InvoiceRagError;
use invoicerag_retrieval::RetrievalError;

#[derive(Debug, thiserror::Error)]
pub enum RagError {
    #[error(transparent)]
    Retrieval(#[from] RetrievalError),
    #[error(transparent)]
    Generation(#[from] InvoiceRagError),
    #[error("invalid prompt template: {0}")]
    Template(String),
    #[error("input error: {0}")]
    Input(#[from] std::io::Error),
}

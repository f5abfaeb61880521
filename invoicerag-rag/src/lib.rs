//! Query-time side of the pipeline: retrieval, prompt assembly, generation and
//! the interactive question loop.

mod context;
mod error;
mod generator;
mod prompt;
mod session;

pub use context::ContextAssembler;
pub use error::RagError;
pub use generator::{AnswerQuery, InvoiceHit, InvoiceRag, DEFAULT_TOP_K, NO_RESULTS_MESSAGE};
pub use prompt::{PromptTemplate, INVOICE_QA_TEMPLATE};
pub use session::{
    is_exit_command, BufReadPrompt, LinePrompt, Session, SessionState, EXAMPLE_QUERIES,
};

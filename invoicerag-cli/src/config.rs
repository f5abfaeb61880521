//! Command-line surface. Every option has a default, most with an env fallback
//! that `.env` can populate.

use std::path::PathBuf;

use anyhow::{bail, Context};
use clap::{Args, Parser, Subcommand, ValueEnum};
use invoicerag_core::{CollectionSpec, DistanceMetric};
use invoicerag_ingest::artifacts::{DEFAULT_CHUNKS_PATH, DEFAULT_RAW_RECORDS_PATH};
use invoicerag_ingest::{DEFAULT_DATASET, DEFAULT_PAGE_SIZE};
use secrecy::SecretString;

pub const DEFAULT_COLLECTION: &str = "invoices_collection";
pub const DEFAULT_GEMINI_MODEL: &str = "gemini-2.5-flash";

const OLLAMA_MODEL: &str = "all-minilm";
const OLLAMA_DIMENSION: usize = 384;
const GOOGLE_EMBEDDING_MODEL: &str = "text-embedding-004";
const GOOGLE_EMBEDDING_DIMENSION: usize = 768;

#[derive(Debug, Parser)]
#[command(
    name = "invoicerag",
    version,
    about = "Question answering over a downloaded invoice dataset"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Gemini API key, used for generation and for Google embeddings
    #[arg(long, env = "GEMINI_API_KEY", hide_env_values = true, global = true)]
    pub gemini_api_key: Option<String>,

    /// Debug logging unless RUST_LOG says otherwise
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Download the invoice dataset into a raw records file
    Download(DownloadArgs),
    /// Turn raw records into one text chunk per invoice
    Chunk(ChunkArgs),
    /// Embed chunks into a fresh collection
    Build(BuildArgs),
    /// Interactive question loop
    Query(QueryArgs),
    /// Answer a single question and exit
    Ask(AskArgs),
    /// Print the best matching invoices as JSON
    Search(SearchArgs),
}

#[derive(Debug, Args)]
pub struct DownloadArgs {
    #[arg(long, default_value = DEFAULT_DATASET)]
    pub dataset: String,

    #[arg(long, default_value = "train")]
    pub split: String,

    /// Directory receiving the raw records file and, optionally, images
    #[arg(long, default_value = "data")]
    pub data_dir: PathBuf,

    /// Also save each invoice image under <data-dir>/images
    #[arg(long)]
    pub save_images: bool,

    #[arg(long, default_value_t = DEFAULT_PAGE_SIZE, value_parser = parse_positive)]
    pub page_size: usize,

    #[arg(long, env = "HF_DATASETS_SERVER_URL")]
    pub datasets_server_url: Option<String>,

    #[arg(long, env = "HF_TOKEN", hide_env_values = true)]
    pub hf_token: Option<String>,
}

impl DownloadArgs {
    pub fn output_path(&self) -> PathBuf {
        self.data_dir.join("invoices_data.json")
    }

    pub fn image_dir(&self) -> Option<PathBuf> {
        self.save_images.then(|| self.data_dir.join("images"))
    }
}

#[derive(Debug, Args)]
pub struct ChunkArgs {
    #[arg(long, default_value = DEFAULT_RAW_RECORDS_PATH)]
    pub input: PathBuf,

    #[arg(long, default_value = DEFAULT_CHUNKS_PATH)]
    pub output: PathBuf,
}

#[derive(Debug, Args)]
pub struct BuildArgs {
    #[arg(long, default_value = DEFAULT_CHUNKS_PATH)]
    pub chunks: PathBuf,

    #[arg(long, default_value_t = invoicerag_retrieval::DEFAULT_BATCH_SIZE, value_parser = parse_positive)]
    pub batch_size: usize,

    #[arg(long, default_value = "cosine")]
    pub metric: DistanceMetric,

    #[command(flatten)]
    pub store: StoreArgs,

    #[command(flatten)]
    pub embedding: EmbeddingArgs,
}

#[derive(Debug, Args)]
pub struct QueryArgs {
    #[arg(short, long, default_value_t = invoicerag_rag::DEFAULT_TOP_K, value_parser = parse_positive)]
    pub k: usize,

    #[command(flatten)]
    pub store: StoreArgs,

    #[command(flatten)]
    pub embedding: EmbeddingArgs,

    #[command(flatten)]
    pub llm: LlmArgs,
}

#[derive(Debug, Args)]
pub struct AskArgs {
    pub question: String,

    #[command(flatten)]
    pub query: QueryArgs,
}

#[derive(Debug, Args)]
pub struct SearchArgs {
    pub query: String,

    #[arg(short, long, default_value_t = invoicerag_rag::DEFAULT_TOP_K, value_parser = parse_positive)]
    pub k: usize,

    #[command(flatten)]
    pub store: StoreArgs,

    #[command(flatten)]
    pub embedding: EmbeddingArgs,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum StoreBackend {
    /// JSON collections in a local directory
    Local,
    /// A Chroma server
    Chroma,
}

#[derive(Debug, Args)]
pub struct StoreArgs {
    #[arg(long, env = "INVOICERAG_BACKEND", value_enum, default_value = "local")]
    pub backend: StoreBackend,

    #[arg(long, env = "INVOICERAG_DB_PATH", default_value = "./vector_db")]
    pub db_path: PathBuf,

    #[arg(long, env = "CHROMA_ENDPOINT", default_value = "http://localhost:8000")]
    pub chroma_url: String,

    #[arg(long, env = "INVOICERAG_COLLECTION", default_value = DEFAULT_COLLECTION, value_parser = parse_collection_name)]
    pub collection: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum EmbeddingProvider {
    Ollama,
    Google,
}

#[derive(Debug, Args)]
pub struct EmbeddingArgs {
    #[arg(long, env = "INVOICERAG_EMBEDDINGS", value_enum, default_value = "ollama")]
    pub embedding_provider: EmbeddingProvider,

    /// Defaults to all-minilm for Ollama and text-embedding-004 for Google
    #[arg(long, env = "INVOICERAG_EMBEDDING_MODEL")]
    pub embedding_model: Option<String>,

    #[arg(long, value_parser = parse_positive)]
    pub embedding_dimension: Option<usize>,

    #[arg(long, env = "OLLAMA_HOST", default_value = "http://localhost:11434")]
    pub ollama_url: String,
}

impl EmbeddingArgs {
    pub fn model(&self) -> &str {
        match (&self.embedding_model, self.embedding_provider) {
            (Some(model), _) => model,
            (None, EmbeddingProvider::Ollama) => OLLAMA_MODEL,
            (None, EmbeddingProvider::Google) => GOOGLE_EMBEDDING_MODEL,
        }
    }

    pub fn dimension(&self) -> usize {
        self.embedding_dimension
            .unwrap_or(match self.embedding_provider {
                EmbeddingProvider::Ollama => OLLAMA_DIMENSION,
                EmbeddingProvider::Google => GOOGLE_EMBEDDING_DIMENSION,
            })
    }
}

#[derive(Debug, Args)]
pub struct LlmArgs {
    #[arg(long, env = "GEMINI_MODEL", default_value = DEFAULT_GEMINI_MODEL)]
    pub model: String,

    #[arg(long)]
    pub temperature: Option<f32>,
}

pub fn parse_positive(value: &str) -> Result<usize, String> {
    match value.parse::<usize>() {
        Ok(0) => Err("must be at least 1".to_string()),
        Ok(n) => Ok(n),
        Err(err) => Err(err.to_string()),
    }
}

pub fn parse_collection_name(value: &str) -> Result<String, String> {
    CollectionSpec::validate_name(value)
        .map(|()| value.to_string())
        .map_err(|err| err.to_string())
}

/// Blank keys count as missing.
pub fn require_api_key(key: Option<&str>) -> anyhow::Result<SecretString> {
    let key = key
        .map(str::trim)
        .filter(|key| !key.is_empty())
        .context("GEMINI_API_KEY not found in environment or .env file")?;
    if key.chars().any(char::is_whitespace) {
        bail!("GEMINI_API_KEY must not contain whitespace");
    }
    Ok(SecretString::new(key.to_string()))
}

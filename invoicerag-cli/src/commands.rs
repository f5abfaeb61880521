use std::io;
use std::sync::Arc;

use anyhow::Context;
use invoicerag_chroma::ChromaCollectionStore;
use invoicerag_core::{Chunk, Collection, CollectionStore, Embedding, VectorStore};
use invoicerag_embeddings::{GoogleEmbedding, OllamaEmbedding, TaskType};
use invoicerag_ingest::artifacts::{read_json, write_json_pretty};
use invoicerag_ingest::{download_records, ChunkBuilder, DownloadOptions, HuggingFaceDataset, RawInvoice};
use invoicerag_llm::GoogleClient;
use invoicerag_rag::{InvoiceHit, InvoiceRag, Session};
use invoicerag_retrieval::{Indexer, LocalCollectionStore, Retriever};
use secrecy::ExposeSecret;

use crate::config::{
    require_api_key, AskArgs, BuildArgs, ChunkArgs, Cli, Command, DownloadArgs, EmbeddingArgs,
    EmbeddingProvider, LlmArgs, QueryArgs, SearchArgs, StoreArgs, StoreBackend,
};
use crate::line_editor::EditorPrompt;

const SAMPLE_PREVIEW_CHARS: usize = 500;

type SharedEmbedder = Arc<dyn Embedding>;

pub async fn run(cli: Cli) -> anyhow::Result<()> {
    let api_key = cli.gemini_api_key.as_deref();
    match cli.command {
        Command::Download(args) => download(args).await,
        Command::Chunk(args) => chunk(args).await,
        Command::Build(args) => build(args, api_key).await,
        Command::Query(args) => query(args, api_key, None).await,
        Command::Ask(AskArgs { question, query: args }) => {
            query(args, api_key, Some(question)).await
        }
        Command::Search(args) => search(args, api_key).await,
    }
}

async fn download(args: DownloadArgs) -> anyhow::Result<()> {
    let mut dataset = HuggingFaceDataset::new(&args.dataset)?.with_split(&args.split);
    if let Some(url) = &args.datasets_server_url {
        dataset = dataset.with_base_url(url);
    }
    if let Some(token) = args.hf_token.as_deref().filter(|token| !token.trim().is_empty()) {
        dataset = dataset.with_token(token);
    }

    let options = DownloadOptions {
        page_size: args.page_size,
        image_dir: args.image_dir(),
    };
    let invoices = download_records(&dataset, &options)
        .await
        .with_context(|| format!("failed to download dataset {}", args.dataset))?;

    let output = args.output_path();
    write_json_pretty(&output, &invoices).await?;
    println!("Processed {} invoices", invoices.len());
    println!("Saved to {}", output.display());
    if let Some(first) = invoices.first() {
        println!("\nSample invoice:\n{}", serde_json::to_string_pretty(first)?);
    }
    Ok(())
}

async fn chunk(args: ChunkArgs) -> anyhow::Result<()> {
    let invoices: Vec<RawInvoice> = read_json(&args.input)
        .await
        .context("could not load raw records, run `invoicerag download` first")?;
    let chunks = ChunkBuilder::default().build_all(&invoices)?;
    write_json_pretty(&args.output, &chunks).await?;

    println!("Created {} invoice chunks", chunks.len());
    println!("Saved to {}", args.output.display());
    if let Some(first) = chunks.first() {
        let preview: String = first.text.chars().take(SAMPLE_PREVIEW_CHARS).collect();
        println!("\nSample chunk:\n{preview}");
    }
    Ok(())
}

async fn build(args: BuildArgs, api_key: Option<&str>) -> anyhow::Result<()> {
    let embedder = embedder(&args.embedding, api_key, TaskType::RetrievalDocument)?;
    let chunks: Vec<Chunk> = read_json(&args.chunks)
        .await
        .context("could not load chunks, run `invoicerag chunk` first")?;

    let count = match args.store.backend {
        StoreBackend::Local => {
            build_into(LocalCollectionStore::new(args.store.db_path.clone()), embedder, chunks, &args)
                .await?
        }
        StoreBackend::Chroma => {
            build_into(chroma(&args.store)?, embedder, chunks, &args).await?
        }
    };
    println!("Indexed {count} invoices into '{}'", args.store.collection);
    Ok(())
}

async fn build_into<C: CollectionStore>(
    collections: C,
    embedder: SharedEmbedder,
    chunks: Vec<Chunk>,
    args: &BuildArgs,
) -> anyhow::Result<usize> {
    let built = Indexer::new(embedder, collections)
        .with_metric(args.metric)
        .build_index(chunks, &args.store.collection, args.batch_size)
        .await
        .with_context(|| format!("failed to build collection '{}'", args.store.collection))?;
    Ok(built.count)
}

/// `question` set means answer once and exit; otherwise run the interactive loop.
async fn query(args: QueryArgs, api_key: Option<&str>, question: Option<String>) -> anyhow::Result<()> {
    let llm = gemini(&args.llm, api_key)?;
    let embedder = embedder(&args.embedding, api_key, TaskType::RetrievalQuery)?;
    match args.store.backend {
        StoreBackend::Local => {
            let collections = LocalCollectionStore::new(args.store.db_path.clone());
            answer_with(collections, &args, embedder, llm, question).await
        }
        StoreBackend::Chroma => {
            answer_with(chroma(&args.store)?, &args, embedder, llm, question).await
        }
    }
}

async fn answer_with<C: CollectionStore>(
    collections: C,
    args: &QueryArgs,
    embedder: SharedEmbedder,
    llm: GoogleClient,
    question: Option<String>,
) -> anyhow::Result<()> {
    let collection = open(&collections, &args.store.collection).await?;
    let count = collection.store.count().await?;
    let rag = InvoiceRag::new(Retriever::new(embedder, collection.store), llm);
    rag.verify_collection(&collection.spec);

    match question {
        Some(question) => {
            let answer = rag.answer(&question, args.k).await?;
            println!("{answer}");
        }
        None => {
            println!("Invoice RAG ready! ({count} invoices indexed)");
            let mut prompt = EditorPrompt::new().context("failed to start line editor")?;
            let mut out = io::stdout();
            Session::new(rag, args.k).run(&mut prompt, &mut out).await?;
        }
    }
    Ok(())
}

async fn search(args: SearchArgs, api_key: Option<&str>) -> anyhow::Result<()> {
    let embedder = embedder(&args.embedding, api_key, TaskType::RetrievalQuery)?;
    let hits = match args.store.backend {
        StoreBackend::Local => {
            let collections = LocalCollectionStore::new(args.store.db_path.clone());
            search_in(collections, &args, embedder).await?
        }
        StoreBackend::Chroma => search_in(chroma(&args.store)?, &args, embedder).await?,
    };
    println!("{}", serde_json::to_string_pretty(&hits)?);
    Ok(())
}

async fn search_in<C: CollectionStore>(
    collections: C,
    args: &SearchArgs,
    embedder: SharedEmbedder,
) -> anyhow::Result<Vec<InvoiceHit>> {
    let collection = open(&collections, &args.store.collection).await?;
    let retriever = Retriever::new(embedder, collection.store);
    retriever.verify_model(&collection.spec);
    let result = retriever.retrieve(&args.query, args.k).await?;
    Ok(result.matches.into_iter().map(InvoiceHit::from).collect())
}

async fn open<C: CollectionStore>(collections: &C, name: &str) -> anyhow::Result<Collection<C::Store>> {
    collections
        .open(name)
        .await
        .with_context(|| format!("cannot open collection '{name}', run `invoicerag build` first"))
}

fn chroma(store: &StoreArgs) -> anyhow::Result<ChromaCollectionStore> {
    ChromaCollectionStore::new(&store.chroma_url)
        .with_context(|| format!("invalid Chroma endpoint {}", store.chroma_url))
}

/// `task` only affects Google embeddings: documents at build time, queries otherwise.
fn embedder(
    args: &EmbeddingArgs,
    api_key: Option<&str>,
    task: TaskType,
) -> anyhow::Result<SharedEmbedder> {
    let embedder: SharedEmbedder = match args.embedding_provider {
        EmbeddingProvider::Ollama => Arc::new(OllamaEmbedding::new(
            args.ollama_url.clone(),
            args.model(),
            args.dimension(),
        )),
        EmbeddingProvider::Google => Arc::new(google_embedding(args, api_key, task)?),
    };
    tracing::debug!(
        model = embedder.model_id(),
        dimension = embedder.dimension(),
        "embedding provider ready"
    );
    Ok(embedder)
}

fn google_embedding(
    args: &EmbeddingArgs,
    api_key: Option<&str>,
    task: TaskType,
) -> anyhow::Result<GoogleEmbedding> {
    let key = require_api_key(api_key)?;
    Ok(
        GoogleEmbedding::new(key.expose_secret().clone(), args.model(), args.dimension())
            .with_task_type(task),
    )
}

fn gemini(args: &LlmArgs, api_key: Option<&str>) -> anyhow::Result<GoogleClient> {
    let key = require_api_key(api_key)?;
    let mut client = GoogleClient::new(key.expose_secret().clone(), &args.model)?;
    if let Some(temperature) = args.temperature {
        client = client.with_temperature(temperature);
    }
    Ok(client)
}

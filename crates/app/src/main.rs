use chrono::Utc;
use clap::{Parser, Subcommand};
use semantic_index_core::{
    EmbeddingModelRegistry, FolderCorpus, IndexCoordinator, IndexOptions, IndexOutcome,
    IndexProgress, IndexerConfig, JsonFileStore, ProviderSettings, QueryEngine, SearchOptions,
    SearchScope,
};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "semantic-index", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Folder of markdown notes to index.
    #[arg(long, env = "SEMANTIC_INDEX_FOLDER", default_value = ".")]
    folder: PathBuf,

    /// JSON file holding the persisted vectors.
    #[arg(long, env = "SEMANTIC_INDEX_STORE", default_value = ".semantic-index/vectors.json")]
    store: PathBuf,

    /// Embedding model name (see `models`).
    #[arg(long, default_value = "text-embedding-3-small")]
    model: String,

    /// OpenAI API key
    #[arg(long, env = "OPENAI_API_KEY", default_value = "", hide_env_values = true)]
    openai_api_key: String,

    /// Ollama base URL, e.g. http://localhost:11434
    #[arg(long, env = "OLLAMA_BASE_URL", default_value = "")]
    ollama_base_url: String,

    /// Per-request timeout for embedding calls, in seconds.
    #[arg(long)]
    request_timeout_secs: Option<u64>,
}

#[derive(Subcommand)]
enum Command {
    /// Bring the index up to date with the folder.
    Index {
        /// Maximum characters per chunk.
        #[arg(long, default_value = "1000")]
        chunk_size: usize,
        /// Drop every stored vector for the model and index from scratch.
        #[arg(long, default_value_t = false)]
        reindex_all: bool,
        /// Embedding calls allowed in flight at once.
        #[arg(long, default_value_t = semantic_index_core::DEFAULT_MAX_CONCURRENCY)]
        concurrency: usize,
        /// Chunks persisted per store insert.
        #[arg(long, default_value_t = semantic_index_core::DEFAULT_BATCH_SIZE)]
        batch_size: usize,
    },
    /// Find the chunks most similar to a query.
    Search {
        /// Search query
        #[arg(long)]
        query: String,
        /// Number of results to return.
        #[arg(long, default_value = "10")]
        limit: usize,
        /// Drop results below this cosine similarity.
        #[arg(long, default_value = "0.0")]
        min_similarity: f32,
        /// Restrict to this file (repeatable).
        #[arg(long = "file")]
        files: Vec<String>,
        /// Restrict to this folder (repeatable).
        #[arg(long = "in-folder")]
        folders: Vec<String>,
    },
    /// List the embedding models that can be selected with --model.
    Models,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let app_version = env!("CARGO_PKG_VERSION");

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(fmt::layer())
        .init();

    let cli = Cli::parse();
    info!(
        version = app_version,
        started_at = %Utc::now().to_rfc3339(),
        "semantic-index boot"
    );

    let registry = EmbeddingModelRegistry::default();
    let settings = ProviderSettings {
        openai_api_key: cli.openai_api_key.clone(),
        ollama_base_url: cli.ollama_base_url.clone(),
        request_timeout: cli.request_timeout_secs.map(Duration::from_secs),
    };

    match cli.command {
        Command::Models => {
            for (name, dimension) in registry.model_names() {
                println!("{name}\t{dimension}");
            }
        }
        Command::Index {
            chunk_size,
            reindex_all,
            concurrency,
            batch_size,
        } => {
            let model = registry.get(&cli.model, &settings)?;
            let store = Arc::new(JsonFileStore::open(&cli.store).await?);
            let corpus = FolderCorpus::new(&cli.folder)?;
            let config = IndexerConfig {
                max_concurrency: concurrency,
                batch_size,
                ..IndexerConfig::default()
            };
            let coordinator = IndexCoordinator::new(Arc::clone(&store), corpus).with_config(config);

            let mut last_percent = None;
            let mut on_progress = |progress: IndexProgress| {
                let percent = (progress.completed_chunks * 100)
                    .checked_div(progress.total_chunks)
                    .unwrap_or(100);
                if last_percent != Some(percent) {
                    last_percent = Some(percent);
                    info!(
                        completed = progress.completed_chunks,
                        total = progress.total_chunks,
                        files = progress.total_files,
                        "indexing {percent}%"
                    );
                }
            };

            let outcome = coordinator
                .reindex(
                    &model,
                    IndexOptions {
                        chunk_size,
                        reindex_all,
                    },
                    Some(&mut on_progress),
                )
                .await?;

            match outcome {
                IndexOutcome::UpToDate => println!("index is already up to date"),
                IndexOutcome::Completed(stats) => println!(
                    "{} chunks from {} files indexed with {} in {:.1}s at {}",
                    stats.chunks,
                    stats.files,
                    model.name(),
                    stats.duration.as_secs_f64(),
                    Utc::now().to_rfc3339()
                ),
                IndexOutcome::ConfigurationRequired { message } => {
                    warn!(model = model.name(), "provider settings required");
                    eprintln!("{message}");
                    std::process::exit(2);
                }
            }
        }
        Command::Search {
            query,
            limit,
            min_similarity,
            files,
            folders,
        } => {
            let model = registry.get(&cli.model, &settings)?;
            let store = JsonFileStore::open(&cli.store).await?;
            let engine = QueryEngine::new(store);

            let scope = SearchScope { files, folders };
            let options = SearchOptions {
                min_similarity,
                limit,
                scope: (!scope.is_empty()).then_some(scope),
            };

            let hits = match engine.search(&query, &model, &options).await {
                Ok(hits) => hits,
                Err(semantic_index_core::SearchError::Configuration(error)) => {
                    eprintln!("{error}");
                    std::process::exit(2);
                }
                Err(error) => return Err(error.into()),
            };

            println!("query: {query}");
            for hit in hits {
                println!(
                    "[{:.4}] {}:{}-{}",
                    hit.similarity,
                    hit.record.path,
                    hit.record.metadata.start_line,
                    hit.record.metadata.end_line
                );
                println!("{}", hit.record.content);
            }
        }
    }

    Ok(())
}

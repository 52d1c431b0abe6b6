//! Incremental semantic indexing for a corpus of markdown notes.
//!
//! Documents are split into line-addressed chunks, embedded through a named
//! [`EmbeddingModel`] under a global concurrency cap with rate-limit retries,
//! and persisted to a [`VectorStore`] in batches while the run progresses.
//! [`QueryEngine`] answers cosine-similarity queries over what was stored.

pub mod chunking;
pub mod config;
pub mod corpus;
pub mod embeddings;
pub mod error;
pub mod models;
pub mod orchestrator;
pub mod providers;
pub mod query;
pub mod retry;
pub mod store;
pub mod stores;
pub mod traits;

pub use chunking::{ChunkSplitter, MarkdownSplitter, TextSpan};
pub use config::{IndexerConfig, DEFAULT_BATCH_SIZE, DEFAULT_MAX_CONCURRENCY};
pub use corpus::{discover_markdown_files, FolderCorpus};
pub use embeddings::{
    CharacterNgramEmbedder, EmbeddingModel, EmbeddingModelRegistry, EmbeddingProvider,
    ProviderSettings, NGRAM_EMBEDDING_DIMENSIONS,
};
pub use error::{EmbeddingError, IndexError, SearchError, StoreError};
pub use models::{
    Chunk, ChunkMetadata, Document, IndexOptions, IndexOutcome, IndexProgress, IndexStats,
    IndexedVector, SearchHit, SearchOptions, SearchScope, VectorRecord,
};
pub use orchestrator::{AbortSignal, IndexCoordinator, ProgressCallback};
pub use providers::OpenAiCompatibleProvider;
pub use query::QueryEngine;
pub use retry::{Jitter, RetryPolicy};
pub use store::{cosine_similarity, rank_by_similarity};
pub use stores::JsonFileStore;
pub use traits::{DocumentSource, VectorStore};

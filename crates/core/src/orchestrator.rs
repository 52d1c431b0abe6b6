use crate::chunking::{ChunkSplitter, MarkdownSplitter};
use crate::config::IndexerConfig;
use crate::embeddings::EmbeddingModel;
use crate::error::{EmbeddingError, IndexError, Result};
use crate::models::{
    Chunk, ChunkMetadata, Document, IndexOptions, IndexOutcome, IndexProgress, IndexStats,
    IndexedVector,
};
use crate::traits::{DocumentSource, VectorStore};
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{mpsc, Semaphore};
use tokio::task::JoinSet;

pub type ProgressCallback<'a> = &'a mut (dyn FnMut(IndexProgress) + Send);

/// Shared flag telling not-yet-started embedding tasks to give up.
#[derive(Debug, Clone, Default)]
pub struct AbortSignal(Arc<AtomicBool>);

impl AbortSignal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` for the caller that flipped the flag first.
    pub fn abort(&self) -> bool {
        !self.0.swap(true, Ordering::SeqCst)
    }

    pub fn is_aborted(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

enum TaskFailure {
    /// The task never called the provider because the run was already aborted.
    Skipped,
    Failed { error: EmbeddingError, first: bool },
}

/// Keeps the vector store in sync with a document corpus for one model at a time.
pub struct IndexCoordinator<S, D, C = MarkdownSplitter> {
    store: S,
    corpus: D,
    splitter: C,
    config: IndexerConfig,
}

impl<S, D> IndexCoordinator<S, D, MarkdownSplitter>
where
    S: VectorStore,
    D: DocumentSource,
{
    pub fn new(store: S, corpus: D) -> Self {
        Self {
            store,
            corpus,
            splitter: MarkdownSplitter,
            config: IndexerConfig::default(),
        }
    }
}

impl<S, D, C> IndexCoordinator<S, D, C>
where
    S: VectorStore,
    D: DocumentSource,
    C: ChunkSplitter,
{
    pub fn with_splitter<T: ChunkSplitter>(self, splitter: T) -> IndexCoordinator<S, D, T> {
        IndexCoordinator {
            store: self.store,
            corpus: self.corpus,
            splitter,
            config: self.config,
        }
    }

    pub fn with_config(mut self, config: IndexerConfig) -> Self {
        self.config = config;
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn corpus(&self) -> &D {
        &self.corpus
    }

    pub async fn reindex(
        &self,
        model: &EmbeddingModel,
        options: IndexOptions,
        on_progress: Option<ProgressCallback<'_>>,
    ) -> Result<IndexOutcome> {
        self.reindex_with_signal(model, options, on_progress, &AbortSignal::new())
            .await
    }

    /// Like [`reindex`](Self::reindex), but lets the caller abort the run
    /// by setting `signal` from outside.
    pub async fn reindex_with_signal(
        &self,
        model: &EmbeddingModel,
        options: IndexOptions,
        on_progress: Option<ProgressCallback<'_>>,
        signal: &AbortSignal,
    ) -> Result<IndexOutcome> {
        self.config.validate()?;
        if options.chunk_size == 0 {
            return Err(IndexError::InvalidOptions(
                "chunk_size must be at least 1".to_string(),
            ));
        }

        let started = Instant::now();
        let documents = self.corpus.list_documents().await?;
        tracing::info!(
            model = model.name(),
            documents = documents.len(),
            reindex_all = options.reindex_all,
            "updating index"
        );

        let (selected, reconciled) = if options.reindex_all {
            self.store.delete_all(model.name()).await?;
            let selected = documents
                .into_iter()
                .map(|document| (document, None))
                .collect::<Vec<_>>();
            (selected, true)
        } else {
            let removed = self.delete_orphans(model.name(), &documents).await?;
            let selected = self.collect_stale(model.name(), documents).await?;
            let paths = selected
                .iter()
                .map(|(document, _)| document.path.clone())
                .collect::<Vec<_>>();
            if !paths.is_empty() {
                self.store.delete_for_paths(&paths, model.name()).await?;
            }
            (selected, removed > 0)
        };

        if selected.is_empty() {
            if reconciled {
                self.store.save().await?;
            }
            tracing::info!(model = model.name(), "index is up to date");
            return Ok(IndexOutcome::UpToDate);
        }

        let outcome = self
            .embed_documents(model, options, selected, on_progress, signal, started)
            .await;
        let saved = self.store.save().await;

        match (outcome, saved) {
            (Ok(stats), Ok(())) => {
                tracing::info!(
                    model = model.name(),
                    files = stats.files,
                    chunks = stats.chunks,
                    batches = stats.batches,
                    elapsed_ms = stats.duration.as_millis() as u64,
                    "index updated"
                );
                Ok(IndexOutcome::Completed(stats))
            }
            (Ok(_), Err(error)) => {
                tracing::error!(error = %error, "failed to save vector store");
                Err(error.into())
            }
            (Err(IndexError::Embedding(error)), saved) if error.is_configuration() => {
                if let Err(save_error) = saved {
                    tracing::error!(error = %save_error, "failed to save vector store");
                }
                tracing::warn!(model = model.name(), error = %error, "embedding provider needs configuration");
                Ok(IndexOutcome::ConfigurationRequired {
                    message: error.to_string(),
                })
            }
            (Err(error), saved) => {
                if let Err(save_error) = saved {
                    tracing::error!(error = %save_error, "failed to save vector store");
                }
                tracing::error!(model = model.name(), error = %error, "error embedding chunks");
                Err(error)
            }
        }
    }

    async fn delete_orphans(&self, model: &str, documents: &[Document]) -> Result<usize> {
        let live: HashSet<&str> = documents
            .iter()
            .map(|document| document.path.as_str())
            .collect();
        let mut orphans = self
            .store
            .list_indexed_paths(model)
            .await?
            .into_iter()
            .filter(|path| !live.contains(path.as_str()))
            .collect::<Vec<_>>();

        if orphans.is_empty() {
            return Ok(0);
        }
        orphans.sort_unstable();
        tracing::debug!(model, count = orphans.len(), "removing vectors of deleted documents");
        self.store.delete_for_paths(&orphans, model).await?;
        Ok(orphans.len())
    }

    /// Documents that were never indexed (and have text) or changed since.
    /// Content read while checking for text is kept for chunking.
    async fn collect_stale(
        &self,
        model: &str,
        documents: Vec<Document>,
    ) -> Result<Vec<(Document, Option<String>)>> {
        let mut selected = Vec::new();
        for document in documents {
            let stored = self.store.get_by_path(&document.path, model).await?;
            match stored.first() {
                None => {
                    let Some(content) = self.read_document(&document).await else {
                        continue;
                    };
                    if content.trim().is_empty() {
                        continue;
                    }
                    selected.push((document, Some(content)));
                }
                Some(existing) if document.mtime > existing.mtime => {
                    selected.push((document, None));
                }
                Some(_) => {}
            }
        }
        Ok(selected)
    }

    /// Unreadable documents (vanished, not UTF-8) are skipped so the rest
    /// of the corpus still indexes.
    async fn read_document(&self, document: &Document) -> Option<String> {
        match self.corpus.read(&document.path).await {
            Ok(content) => Some(content),
            Err(error) => {
                tracing::warn!(path = %document.path, error = %error, "skipping unreadable document");
                None
            }
        }
    }

    async fn split_documents(
        &self,
        documents: Vec<(Document, Option<String>)>,
        chunk_size: usize,
    ) -> (Vec<Chunk>, usize) {
        let mut total_files = 0;
        let mut chunks = Vec::new();
        for (document, content) in documents {
            let content = match content {
                Some(content) => content,
                None => match self.read_document(&document).await {
                    Some(content) => content,
                    None => continue,
                },
            };
            total_files += 1;
            chunks.extend(
                self.splitter
                    .split(&content, chunk_size)
                    .into_iter()
                    .map(|span| Chunk {
                        path: document.path.clone(),
                        mtime: document.mtime,
                        content: span.content,
                        metadata: ChunkMetadata {
                            start_line: span.start_line,
                            end_line: span.end_line,
                        },
                    }),
            );
        }
        (chunks, total_files)
    }

    async fn embed_documents(
        &self,
        model: &EmbeddingModel,
        options: IndexOptions,
        documents: Vec<(Document, Option<String>)>,
        mut on_progress: Option<ProgressCallback<'_>>,
        signal: &AbortSignal,
        started: Instant,
    ) -> Result<IndexStats> {
        let (chunks, total_files) = self.split_documents(documents, options.chunk_size).await;
        let total_chunks = chunks.len();
        let mut progress = IndexProgress {
            completed_chunks: 0,
            total_chunks,
            total_files,
        };
        report(&mut on_progress, progress);

        let semaphore = Arc::new(Semaphore::new(self.config.max_concurrency));
        let (sender, mut receiver) = mpsc::unbounded_channel::<IndexedVector>();
        let mut tasks = JoinSet::new();

        for chunk in chunks {
            let semaphore = Arc::clone(&semaphore);
            let sender = sender.clone();
            let model = model.clone();
            let signal = signal.clone();
            let retry = self.config.retry;

            tasks.spawn(async move {
                let Ok(_permit) = semaphore.acquire_owned().await else {
                    return Err(TaskFailure::Skipped);
                };
                if signal.is_aborted() {
                    return Err(TaskFailure::Skipped);
                }

                let embedded = retry
                    .run(|| model.embed(&chunk.content), EmbeddingError::is_rate_limited)
                    .await;
                match embedded {
                    Ok(embedding) => {
                        let record = IndexedVector::from_chunk(chunk, embedding, model.name());
                        sender.send(record).map_err(|_| TaskFailure::Skipped)
                    }
                    Err(error) => {
                        let first = signal.abort();
                        Err(TaskFailure::Failed { error, first })
                    }
                }
            });
        }
        drop(sender);

        // Single writer: owns the buffer, the counters and every store insert.
        let batch_size = self.config.batch_size;
        // Holds only records not yet persisted.
        let mut buffer: Vec<IndexedVector> = Vec::with_capacity(batch_size.min(total_chunks));
        let mut batches = 0usize;
        let mut writer_failure: Option<(IndexError, bool)> = None;

        while let Some(record) = receiver.recv().await {
            buffer.push(record);
            progress.completed_chunks += 1;
            report(&mut on_progress, progress);

            if buffer.len() >= batch_size || progress.completed_chunks == total_chunks {
                let end = batch_size.min(buffer.len());
                if let Err(error) = self
                    .store
                    .insert_batch(&buffer[..end], model.name())
                    .await
                {
                    let first = signal.abort();
                    writer_failure = Some((error.into(), first));
                    break;
                }
                tracing::debug!(
                    model = model.name(),
                    batch = batches,
                    records = end,
                    "persisted embedding batch"
                );
                buffer.drain(..end);
                batches += 1;
            }
        }
        drop(receiver);

        let mut first_failure = None;
        let mut later_failure = None;
        if let Some((error, first)) = writer_failure {
            if first {
                first_failure = Some(error);
            } else {
                later_failure = Some(error);
            }
        }
        let mut skipped = false;

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(Ok(())) => {}
                Ok(Err(TaskFailure::Skipped)) => skipped = true,
                Ok(Err(TaskFailure::Failed { error, first })) => {
                    if first && first_failure.is_none() {
                        first_failure = Some(IndexError::Embedding(error));
                    } else if later_failure.is_none() {
                        later_failure = Some(IndexError::Embedding(error));
                    }
                }
                Err(join_error) => {
                    signal.abort();
                    if later_failure.is_none() {
                        later_failure = Some(IndexError::Task(join_error.to_string()));
                    }
                }
            }
        }

        if let Some(error) = first_failure.or(later_failure) {
            return Err(error);
        }
        if skipped {
            return Err(IndexError::Aborted);
        }

        Ok(IndexStats {
            files: total_files,
            chunks: total_chunks,
            batches,
            duration: started.elapsed(),
        })
    }
}

fn report(on_progress: &mut Option<ProgressCallback<'_>>, progress: IndexProgress) {
    if let Some(callback) = on_progress.as_deref_mut() {
        callback(progress);
    }
}

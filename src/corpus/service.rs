//! Corpus service coordinating extraction, chunking, embedding, and the
//! vector index.
//!
//! All state lives behind one `tokio::sync::Mutex`: every operation, queries
//! included, holds the exclusive guard from start to finish. Deletion and
//! rebuild are multi-step reset-and-repopulate sequences and ingestion is a
//! read-modify-write across the record sequence and the index, so concurrent
//! access of any kind could observe torn positions. Extraction and embedding
//! run inside the guarded section; their requests carry timeouts so the lock
//! is never held indefinitely.

use crate::{
    config::get_config,
    corpus::{
        chunking::chunk_text,
        persistence::SnapshotStore,
        state::CorpusState,
        store::DocumentStore,
        types::{CorpusError, IngestOutcome, RetrievedChunk, SourceCount},
    },
    embedding::{EmbeddingClient, get_embedding_client},
    extract,
    metrics::{IngestMetrics, MetricsSnapshot},
};
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Owns the corpus and serializes every operation against it.
///
/// Construct the service once near process start and share it through an
/// `Arc`; the HTTP surface talks to it through [`CorpusApi`].
pub struct CorpusService {
    state: Mutex<CorpusState>,
    embedding_client: Box<dyn EmbeddingClient>,
    documents: DocumentStore,
    snapshots: SnapshotStore,
    metrics: Arc<IngestMetrics>,
}

/// Abstraction over the corpus operations consumed by the HTTP surface.
#[async_trait]
pub trait CorpusApi: Send + Sync {
    /// Extract, chunk, embed, and index an uploaded document.
    async fn ingest(
        &self,
        file_name: &str,
        bytes: Vec<u8>,
        chunk_size: Option<usize>,
    ) -> Result<IngestOutcome, CorpusError>;

    /// Remove every chunk attributed to a document, and its stored bytes.
    async fn delete_source(&self, file_name: &str) -> Result<(), CorpusError>;

    /// Re-derive the whole corpus from stored documents at a new chunk size.
    async fn rebuild(&self, chunk_size: usize) -> Result<usize, CorpusError>;

    /// Return the `top_k` chunks nearest to the query text.
    async fn query(
        &self,
        query_text: &str,
        top_k: Option<usize>,
    ) -> Result<Vec<RetrievedChunk>, CorpusError>;

    /// Chunk counts per distinct source document.
    async fn list_sources(&self) -> Result<Vec<SourceCount>, CorpusError>;

    /// Extracted text of a stored document, or `None` when unknown.
    async fn document_text(&self, file_name: &str) -> Result<Option<String>, CorpusError>;

    /// Retrieve the current metrics snapshot for diagnostics.
    fn metrics_snapshot(&self) -> MetricsSnapshot;
}

impl CorpusService {
    /// Build the service from process configuration, restoring any persisted
    /// corpus. Snapshot corruption is fatal here rather than silently
    /// truncated.
    pub fn new() -> Result<Self, CorpusError> {
        let config = get_config();
        Self::with_components(
            get_embedding_client(),
            DocumentStore::open(config.data_dir.join("uploads"))?,
            SnapshotStore::open(&config.data_dir)?,
            config.embedding_dimension,
        )
    }

    fn with_components(
        embedding_client: Box<dyn EmbeddingClient>,
        documents: DocumentStore,
        snapshots: SnapshotStore,
        dimension: usize,
    ) -> Result<Self, CorpusError> {
        let state = match snapshots.load()? {
            Some((index, records)) => {
                let state = CorpusState::from_parts(index, records, dimension)?;
                tracing::info!(chunks = state.len(), "Restored corpus snapshot");
                state
            }
            None => {
                tracing::info!("No corpus snapshot found; starting empty");
                CorpusState::new(dimension)
            }
        };

        Ok(Self {
            state: Mutex::new(state),
            embedding_client,
            documents,
            snapshots,
            metrics: Arc::new(IngestMetrics::new()),
        })
    }

    /// Ingest one uploaded document.
    ///
    /// Extraction and embedding happen before anything is stored or appended,
    /// so a failure at any step leaves the corpus, the document store, and the
    /// snapshot exactly as they were. A document with zero extracted text is
    /// a success with zero chunks; the embedding provider is never called
    /// with an empty batch.
    pub async fn ingest(
        &self,
        file_name: &str,
        bytes: Vec<u8>,
        chunk_size: Option<usize>,
    ) -> Result<IngestOutcome, CorpusError> {
        let chunk_size = chunk_size.unwrap_or_else(|| get_config().chunk_size);
        tracing::info!(file = file_name, chunk_size, "Ingesting document");

        let mut state = self.state.lock().await;

        let text = extract::extract_text(file_name, bytes.clone()).await?;
        let chunks = chunk_text(&text, chunk_size)?;
        let vectors = if chunks.is_empty() {
            Vec::new()
        } else {
            self.embedding_client.embed(&chunks).await?
        };
        debug_assert_eq!(chunks.len(), vectors.len());

        self.documents.save(file_name, &bytes)?;
        let chunks_added = state.append_document(file_name, chunks, vectors)?;
        self.persist(&state)?;

        self.metrics
            .record_document(chunks_added as u64, chunk_size as u64);
        tracing::info!(
            file = file_name,
            chunks = chunks_added,
            total = state.len(),
            "Document ingested"
        );

        Ok(IngestOutcome {
            chunks_added,
            chunk_size,
            total_chunks: state.len(),
        })
    }

    /// Remove every chunk of `file_name` and its stored raw bytes.
    ///
    /// The underlying index has no in-place delete, so survivors are staged
    /// into a fresh index (an O(corpus-size) rebuild regardless of how many
    /// chunks matched) and swapped in only once complete. Deleting an unknown
    /// source is a no-op success, which also makes the operation idempotent.
    pub async fn delete_source(&self, file_name: &str) -> Result<(), CorpusError> {
        let mut state = self.state.lock().await;

        if state.contains_source(file_name) {
            let staged = state.without_source(file_name)?;
            let removed = state.len() - staged.len();
            state.replace(staged);
            tracing::info!(
                file = file_name,
                removed,
                remaining = state.len(),
                "Source deleted"
            );
        } else {
            tracing::debug!(file = file_name, "Delete of unknown source; nothing to do");
        }

        self.documents.remove(file_name)?;
        self.persist(&state)
    }

    /// Discard the corpus and re-derive it from every stored document.
    ///
    /// The replacement is staged locally and swapped in only after every
    /// document extracted and embedded successfully; a failure part-way
    /// leaves the pre-rebuild corpus intact.
    pub async fn rebuild(&self, chunk_size: usize) -> Result<usize, CorpusError> {
        tracing::info!(chunk_size, "Rebuilding corpus");
        let mut state = self.state.lock().await;

        let mut staged = CorpusState::new(state.index().dimension());
        for name in self.documents.list()? {
            let Some(bytes) = self.documents.read(&name)? else {
                continue;
            };
            let text = extract::extract_text(&name, bytes).await?;
            let chunks = chunk_text(&text, chunk_size)?;
            if chunks.is_empty() {
                continue;
            }
            let vectors = self.embedding_client.embed(&chunks).await?;
            staged.append_document(&name, chunks, vectors)?;
        }

        state.replace(staged);
        self.persist(&state)?;
        tracing::info!(total = state.len(), "Corpus rebuilt");
        Ok(state.len())
    }

    /// Embed the query text and return the nearest chunks by squared L2
    /// distance, rank-ordered. `top_k` is clamped to the corpus size; an
    /// empty corpus yields an empty result rather than an error.
    pub async fn query(
        &self,
        query_text: &str,
        top_k: Option<usize>,
    ) -> Result<Vec<RetrievedChunk>, CorpusError> {
        let config = get_config();
        let state = self.state.lock().await;

        let k = top_k
            .unwrap_or(config.retrieval_top_k)
            .min(config.retrieval_max_top_k)
            .min(state.len());
        if k == 0 {
            return Ok(Vec::new());
        }

        let query_batch = [query_text.to_string()];
        let mut vectors = self.embedding_client.embed(&query_batch).await?;
        let vector = vectors.pop().ok_or(CorpusError::EmptyQueryEmbedding)?;

        let hits = state.index().search(&vector, k)?;
        let mut retrieved = Vec::with_capacity(hits.len());
        for (position, distance) in hits {
            let record = state.record(position).ok_or_else(|| {
                crate::index::IndexError::Corrupt(format!(
                    "search returned position {position} beyond corpus"
                ))
            })?;
            retrieved.push(RetrievedChunk {
                text: record.text.clone(),
                source: record.source.clone(),
                position,
                distance,
            });
        }
        Ok(retrieved)
    }

    /// Chunk counts per distinct source, sorted by document name.
    pub async fn list_sources(&self) -> Result<Vec<SourceCount>, CorpusError> {
        let state = self.state.lock().await;
        Ok(state.source_counts())
    }

    /// Re-extract the text of a stored document, or `None` when it was never
    /// uploaded.
    pub async fn document_text(&self, file_name: &str) -> Result<Option<String>, CorpusError> {
        let Some(bytes) = self.documents.read(file_name)? else {
            return Ok(None);
        };
        let text = extract::extract_text(file_name, bytes).await?;
        Ok(Some(text))
    }

    /// Return the current ingestion metrics snapshot.
    pub fn metrics_snapshot(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    fn persist(&self, state: &CorpusState) -> Result<(), CorpusError> {
        self.snapshots
            .save(state.index(), state.records())
            .map_err(CorpusError::from)
    }

    #[cfg(test)]
    async fn records_snapshot(&self) -> Vec<crate::corpus::types::ChunkRecord> {
        self.state.lock().await.records().to_vec()
    }

    #[cfg(test)]
    async fn aligned(&self) -> bool {
        self.state.lock().await.is_aligned()
    }
}

/// Join retrieved chunk texts into the grounding context block, separated by
/// blank lines.
pub fn build_context(hits: &[RetrievedChunk]) -> String {
    hits.iter()
        .map(|hit| hit.text.as_str())
        .collect::<Vec<_>>()
        .join("\n\n")
}

#[async_trait]
impl CorpusApi for CorpusService {
    async fn ingest(
        &self,
        file_name: &str,
        bytes: Vec<u8>,
        chunk_size: Option<usize>,
    ) -> Result<IngestOutcome, CorpusError> {
        CorpusService::ingest(self, file_name, bytes, chunk_size).await
    }

    async fn delete_source(&self, file_name: &str) -> Result<(), CorpusError> {
        CorpusService::delete_source(self, file_name).await
    }

    async fn rebuild(&self, chunk_size: usize) -> Result<usize, CorpusError> {
        CorpusService::rebuild(self, chunk_size).await
    }

    async fn query(
        &self,
        query_text: &str,
        top_k: Option<usize>,
    ) -> Result<Vec<RetrievedChunk>, CorpusError> {
        CorpusService::query(self, query_text, top_k).await
    }

    async fn list_sources(&self) -> Result<Vec<SourceCount>, CorpusError> {
        CorpusService::list_sources(self).await
    }

    async fn document_text(&self, file_name: &str) -> Result<Option<String>, CorpusError> {
        CorpusService::document_text(self, file_name).await
    }

    fn metrics_snapshot(&self) -> MetricsSnapshot {
        CorpusService::metrics_snapshot(self)
    }
}

//! Core data types and error definitions for the corpus index.

use crate::{
    embedding::EmbeddingClientError, extract::ExtractError, index::IndexError,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors produced while splitting extracted text into chunks.
#[derive(Debug, Error)]
pub enum ChunkingError {
    /// Caller supplied an impossible chunk size.
    #[error("chunk size must be greater than zero")]
    InvalidChunkSize,
}

/// Errors emitted while loading or writing corpus snapshots.
#[derive(Debug, Error)]
pub enum SnapshotError {
    /// Filesystem interaction failed.
    #[error("Snapshot I/O failed: {0}")]
    Io(#[from] std::io::Error),
    /// Snapshot artifact could not be encoded or decoded.
    #[error("Snapshot encoding failed: {0}")]
    Encode(String),
    /// Snapshot artifacts are inconsistent and must not be loaded.
    #[error("Corrupt snapshot: {0}")]
    Corrupt(String),
}

/// Errors emitted by the raw document store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Document name is empty or attempts path traversal.
    #[error("Invalid document name: '{0}'")]
    InvalidName(String),
    /// Filesystem interaction failed.
    #[error("Document store I/O failed: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors emitted by corpus operations.
#[derive(Debug, Error)]
pub enum CorpusError {
    /// Uploaded bytes could not be turned into text.
    #[error("Failed to extract document text: {0}")]
    Extraction(#[from] ExtractError),
    /// Chunking step failed to segment the document.
    #[error("Failed to chunk document: {0}")]
    Chunking(#[from] ChunkingError),
    /// Embedding provider failed to produce vectors.
    #[error("Failed to generate embeddings: {0}")]
    Embedding(#[from] EmbeddingClientError),
    /// Vector index rejected an operation.
    #[error("Vector index error: {0}")]
    Index(#[from] IndexError),
    /// Persisting or restoring the corpus snapshot failed.
    #[error("Snapshot error: {0}")]
    Snapshot(#[from] SnapshotError),
    /// Raw document storage failed.
    #[error("Document store error: {0}")]
    Store(#[from] StoreError),
    /// Embedding provider returned no vector for the query text.
    #[error("Embedding provider returned no vector for the query")]
    EmptyQueryEmbedding,
}

/// One indexed chunk: its text and the document it came from.
///
/// The record's position in the corpus sequence is the correlation key to its
/// vector in the flat index; there is no separate chunk identifier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkRecord {
    /// Verbatim chunk text.
    pub text: String,
    /// Name of the originating document.
    pub source: String,
}

/// A chunk returned by a similarity query.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RetrievedChunk {
    /// Verbatim chunk text.
    pub text: String,
    /// Name of the originating document.
    pub source: String,
    /// Position of the chunk in the corpus ordering.
    pub position: usize,
    /// Squared Euclidean distance between the query and the chunk embedding.
    pub distance: f32,
}

/// Chunk count attributed to a single source document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SourceCount {
    /// Document name.
    pub file: String,
    /// Number of chunks currently indexed for the document.
    pub chunks: usize,
}

/// Summary of a completed ingestion.
#[derive(Debug, Clone, Copy)]
pub struct IngestOutcome {
    /// Number of chunks added for this document (may be zero).
    pub chunks_added: usize,
    /// Chunk size used during processing.
    pub chunk_size: usize,
    /// Corpus size after the ingestion.
    pub total_chunks: usize,
}

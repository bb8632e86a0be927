//! The corpus index: chunking, positional state, persistence, and the service
//! that serializes every operation against them.

pub mod chunking;
pub mod persistence;
pub mod state;
pub mod store;
mod service;
pub mod types;

pub use service::{CorpusApi, CorpusService, build_context};
pub use types::{
    ChunkRecord, ChunkingError, CorpusError, IngestOutcome, RetrievedChunk, SnapshotError,
    SourceCount, StoreError,
};

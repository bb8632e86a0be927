#![deny(missing_docs)]

//! Core library for the corpusd retrieval-augmented corpus server.

/// HTTP routing and REST handlers.
pub mod api;
/// Environment-driven configuration management.
pub mod config;
/// Corpus index manager: chunking, state, persistence, and operations.
pub mod corpus;
/// Embedding client abstraction and adapters.
pub mod embedding;
/// Document text extraction (PDF and plain text).
pub mod extract;
/// Chat-completion client abstraction and adapters.
pub mod generation;
/// Flat vector index with exact nearest-neighbor search.
pub mod index;
/// Structured logging and tracing setup.
pub mod logging;
/// Ingestion metrics helpers.
pub mod metrics;

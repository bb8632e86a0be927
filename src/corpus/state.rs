//! In-memory corpus aggregate.
//!
//! The corpus correlates each chunk's text and source with its embedding by
//! position: record `i` in the ordered record sequence describes the same
//! chunk as vector `i` in the flat index. Keeping text and source inside one
//! composite [`ChunkRecord`] makes half of that invariant structural; the
//! remaining record-count/vector-count equality is checked on load and after
//! every mutation in debug builds.

use super::types::{ChunkRecord, SnapshotError, SourceCount};
use crate::index::{FlatIndex, IndexError};
use std::collections::BTreeMap;

/// The corpus: one ordered record sequence plus the vector index.
#[derive(Debug)]
pub struct CorpusState {
    records: Vec<ChunkRecord>,
    index: FlatIndex,
}

impl CorpusState {
    /// Create an empty corpus for vectors of the given dimension.
    pub fn new(dimension: usize) -> Self {
        Self {
            records: Vec::new(),
            index: FlatIndex::new(dimension),
        }
    }

    /// Assemble a corpus from restored snapshot parts, verifying alignment.
    pub fn from_parts(
        index: FlatIndex,
        records: Vec<ChunkRecord>,
        expected_dimension: usize,
    ) -> Result<Self, SnapshotError> {
        if index.dimension() != expected_dimension {
            return Err(SnapshotError::Corrupt(format!(
                "snapshot dimension {} does not match configured dimension {}",
                index.dimension(),
                expected_dimension
            )));
        }
        if index.len() != records.len() {
            return Err(SnapshotError::Corrupt(format!(
                "index holds {} vectors but metadata describes {} chunks",
                index.len(),
                records.len()
            )));
        }
        Ok(Self { records, index })
    }

    /// Number of chunks currently indexed.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether the corpus holds no chunks.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Borrow the vector index for searching.
    pub fn index(&self) -> &FlatIndex {
        &self.index
    }

    /// Borrow the full record sequence.
    pub fn records(&self) -> &[ChunkRecord] {
        &self.records
    }

    /// Record at a corpus position, if within bounds.
    pub fn record(&self, position: usize) -> Option<&ChunkRecord> {
        self.records.get(position)
    }

    /// Whether any chunk is attributed to `source`.
    pub fn contains_source(&self, source: &str) -> bool {
        self.records.iter().any(|record| record.source == source)
    }

    /// Append one document's chunks and vectors at the tail of the corpus.
    ///
    /// Vectors are added to the index first so a dimension error leaves the
    /// corpus untouched. Callers guarantee `chunks.len() == vectors.len()`.
    pub fn append_document(
        &mut self,
        source: &str,
        chunks: Vec<String>,
        vectors: Vec<Vec<f32>>,
    ) -> Result<usize, IndexError> {
        debug_assert_eq!(chunks.len(), vectors.len());
        let added = chunks.len();
        self.index.add(&vectors)?;
        self.records.extend(chunks.into_iter().map(|text| ChunkRecord {
            text,
            source: source.to_string(),
        }));
        debug_assert!(self.is_aligned());
        Ok(added)
    }

    /// Stage a copy of the corpus with every chunk of `source` removed.
    ///
    /// The flat index has no in-place delete, so survivors are reconstructed
    /// vector-by-vector in their original relative order and re-inserted into
    /// a fresh index. This is O(corpus size) whatever the match count; callers
    /// swap the staged state in atomically via [`CorpusState::replace`].
    pub fn without_source(&self, source: &str) -> Result<Self, IndexError> {
        let mut staged = Self::new(self.index.dimension());
        for (position, record) in self.records.iter().enumerate() {
            if record.source == source {
                continue;
            }
            let vector = self
                .index
                .vector_at(position)
                .ok_or_else(|| {
                    IndexError::Corrupt(format!("no vector stored at position {position}"))
                })?
                .to_vec();
            staged.index.add(&[vector])?;
            staged.records.push(record.clone());
        }
        debug_assert!(staged.is_aligned());
        Ok(staged)
    }

    /// Replace the whole corpus with a staged rebuild.
    pub fn replace(&mut self, staged: Self) {
        self.records = staged.records;
        self.index = staged.index;
    }

    /// Chunk counts per distinct source, sorted by name.
    pub fn source_counts(&self) -> Vec<SourceCount> {
        let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
        for record in &self.records {
            *counts.entry(record.source.as_str()).or_default() += 1;
        }
        counts
            .into_iter()
            .map(|(file, chunks)| SourceCount {
                file: file.to_string(),
                chunks,
            })
            .collect()
    }

    /// Alignment invariant: one vector per record.
    pub fn is_aligned(&self) -> bool {
        self.records.len() == self.index.len()
    }
}

//! Exact flat vector index with squared-L2 nearest-neighbor search.
//!
//! Vectors are stored contiguously and never mutated in place; the only
//! supported removals are a full [`FlatIndex::reset`] followed by re-insertion.
//! Search is a brute-force scan, which is exact and fast enough for corpora in
//! the tens of thousands of chunks.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised by the flat index.
#[derive(Debug, Error)]
pub enum IndexError {
    /// A vector's dimension did not match the index dimension.
    #[error("Vector dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch {
        /// Dimension the index was created with.
        expected: usize,
        /// Dimension of the offending vector.
        actual: usize,
    },
    /// A serialized index blob could not be decoded or was internally inconsistent.
    #[error("Corrupt index blob: {0}")]
    Corrupt(String),
}

/// Append-only exact nearest-neighbor index over fixed-dimension `f32` vectors.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlatIndex {
    dimension: usize,
    data: Vec<f32>,
}

impl FlatIndex {
    /// Create an empty index for vectors of the given dimension.
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension,
            data: Vec::new(),
        }
    }

    /// Dimension every stored vector must have.
    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// Number of vectors currently stored.
    pub fn len(&self) -> usize {
        if self.dimension == 0 {
            return 0;
        }
        self.data.len() / self.dimension
    }

    /// Whether the index holds no vectors.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Append vectors to the index, assigning them the next sequential positions.
    pub fn add(&mut self, vectors: &[Vec<f32>]) -> Result<(), IndexError> {
        for vector in vectors {
            if vector.len() != self.dimension {
                return Err(IndexError::DimensionMismatch {
                    expected: self.dimension,
                    actual: vector.len(),
                });
            }
        }
        for vector in vectors {
            self.data.extend_from_slice(vector);
        }
        Ok(())
    }

    /// Return the `k` nearest stored vectors to `query` by squared Euclidean
    /// distance, as `(position, distance)` pairs in ascending distance order.
    ///
    /// `k` larger than the index size is clamped; ties break toward the lower
    /// position so results are deterministic.
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<(usize, f32)>, IndexError> {
        if query.len() != self.dimension {
            return Err(IndexError::DimensionMismatch {
                expected: self.dimension,
                actual: query.len(),
            });
        }

        let mut scored: Vec<(usize, f32)> = self
            .data
            .chunks_exact(self.dimension)
            .enumerate()
            .map(|(position, stored)| (position, squared_l2(query, stored)))
            .collect();
        scored.sort_by(|a, b| {
            a.1.partial_cmp(&b.1)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.0.cmp(&b.0))
        });
        scored.truncate(k.min(self.len()));
        Ok(scored)
    }

    /// Retrieve the stored vector at a sequential position.
    pub fn vector_at(&self, position: usize) -> Option<&[f32]> {
        let start = position.checked_mul(self.dimension)?;
        let end = start + self.dimension;
        self.data.get(start..end)
    }

    /// Discard every stored vector, keeping the dimension.
    pub fn reset(&mut self) {
        self.data.clear();
    }

    /// Serialize the index into a binary blob.
    pub fn to_bytes(&self) -> Result<Vec<u8>, IndexError> {
        bincode::serialize(self).map_err(|err| IndexError::Corrupt(err.to_string()))
    }

    /// Reconstruct an index from a binary blob produced by [`FlatIndex::to_bytes`].
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, IndexError> {
        let index: Self =
            bincode::deserialize(bytes).map_err(|err| IndexError::Corrupt(err.to_string()))?;
        if index.dimension == 0 {
            return Err(IndexError::Corrupt("index dimension is zero".into()));
        }
        if index.data.len() % index.dimension != 0 {
            return Err(IndexError::Corrupt(format!(
                "data length {} is not a multiple of dimension {}",
                index.data.len(),
                index.dimension
            )));
        }
        Ok(index)
    }
}

fn squared_l2(a: &[f32], b: &[f32]) -> f32 {
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| {
            let diff = x - y;
            diff * diff
        })
        .sum()
}

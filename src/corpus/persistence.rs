//! Durable corpus snapshots.
//!
//! A snapshot is two artifacts written together after every mutating
//! operation: `corpus.index` (the binary vector-index blob) and
//! `corpus.meta.json` (the chunk records). Each file is written to a
//! temporary sibling and atomically renamed into place so a crash mid-write
//! never leaves a torn artifact. The pair is validated as a unit on load: a
//! missing pair means an empty corpus, but a half-missing pair or a vector
//! count that disagrees with the metadata length is corruption and must not
//! be silently truncated.

use super::types::{ChunkRecord, SnapshotError};
use crate::index::FlatIndex;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

const INDEX_FILE: &str = "corpus.index";
const META_FILE: &str = "corpus.meta.json";

/// Reads and writes corpus snapshots under a fixed directory.
pub struct SnapshotStore {
    dir: PathBuf,
}

impl SnapshotStore {
    /// Open the snapshot store, creating its directory if needed.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, SnapshotError> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    /// Write both snapshot artifacts atomically.
    pub fn save(&self, index: &FlatIndex, records: &[ChunkRecord]) -> Result<(), SnapshotError> {
        let index_bytes = index
            .to_bytes()
            .map_err(|err| SnapshotError::Encode(err.to_string()))?;
        let meta_bytes =
            serde_json::to_vec(records).map_err(|err| SnapshotError::Encode(err.to_string()))?;

        write_atomic(&self.dir, INDEX_FILE, &index_bytes)?;
        write_atomic(&self.dir, META_FILE, &meta_bytes)?;
        tracing::debug!(
            chunks = records.len(),
            dir = %self.dir.display(),
            "Snapshot written"
        );
        Ok(())
    }

    /// Load the snapshot pair, or `None` when no snapshot has ever been written.
    pub fn load(&self) -> Result<Option<(FlatIndex, Vec<ChunkRecord>)>, SnapshotError> {
        let index_bytes = read_optional(&self.dir.join(INDEX_FILE))?;
        let meta_bytes = read_optional(&self.dir.join(META_FILE))?;

        let (index_bytes, meta_bytes) = match (index_bytes, meta_bytes) {
            (None, None) => return Ok(None),
            (Some(index), Some(meta)) => (index, meta),
            // One artifact without the other means the pair was torn apart.
            (Some(_), None) => {
                return Err(SnapshotError::Corrupt(format!(
                    "{INDEX_FILE} exists but {META_FILE} is missing"
                )));
            }
            (None, Some(_)) => {
                return Err(SnapshotError::Corrupt(format!(
                    "{META_FILE} exists but {INDEX_FILE} is missing"
                )));
            }
        };

        let index = FlatIndex::from_bytes(&index_bytes)
            .map_err(|err| SnapshotError::Corrupt(err.to_string()))?;
        let records: Vec<ChunkRecord> = serde_json::from_slice(&meta_bytes)
            .map_err(|err| SnapshotError::Corrupt(err.to_string()))?;

        if index.len() != records.len() {
            return Err(SnapshotError::Corrupt(format!(
                "index holds {} vectors but metadata describes {} chunks",
                index.len(),
                records.len()
            )));
        }

        Ok(Some((index, records)))
    }
}

fn write_atomic(dir: &Path, file_name: &str, bytes: &[u8]) -> Result<(), SnapshotError> {
    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.write_all(bytes)?;
    tmp.persist(dir.join(file_name))
        .map_err(|err| SnapshotError::Io(err.error))?;
    Ok(())
}

fn read_optional(path: &Path) -> Result<Option<Vec<u8>>, SnapshotError> {
    match fs::read(path) {
        Ok(bytes) => Ok(Some(bytes)),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(err) => Err(err.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn sample_state() -> (FlatIndex, Vec<ChunkRecord>) {
        let mut index = FlatIndex::new(2);
        index
            .add(&[vec![1.0, 2.0], vec![3.0, 4.0]])
            .expect("add vectors");
        let records = vec![
            ChunkRecord {
                text: "first".into(),
                source: "a.txt".into(),
            },
            ChunkRecord {
                text: "second".into(),
                source: "b.txt".into(),
            },
        ];
        (index, records)
    }

    #[test]
    fn save_then_load_round_trips() {
        let dir = tempdir().expect("tempdir");
        let store = SnapshotStore::open(dir.path()).expect("open");
        let (index, records) = sample_state();

        store.save(&index, &records).expect("save");
        let (loaded_index, loaded_records) = store
            .load()
            .expect("load")
            .expect("snapshot present");

        assert_eq!(loaded_records, records);
        assert_eq!(loaded_index.len(), index.len());
        assert_eq!(loaded_index.vector_at(1), index.vector_at(1));
    }

    #[test]
    fn missing_snapshot_is_not_an_error() {
        let dir = tempdir().expect("tempdir");
        let store = SnapshotStore::open(dir.path()).expect("open");
        assert!(store.load().expect("load").is_none());
    }

    #[test]
    fn half_missing_pair_is_corrupt() {
        let dir = tempdir().expect("tempdir");
        let store = SnapshotStore::open(dir.path()).expect("open");
        let (index, records) = sample_state();
        store.save(&index, &records).expect("save");

        fs::remove_file(dir.path().join(META_FILE)).expect("remove meta");
        assert!(matches!(store.load(), Err(SnapshotError::Corrupt(_))));
    }

    #[test]
    fn length_mismatch_is_corrupt() {
        let dir = tempdir().expect("tempdir");
        let store = SnapshotStore::open(dir.path()).expect("open");
        let (index, mut records) = sample_state();
        records.pop();
        store.save(&index, &records).expect("save");

        assert!(matches!(store.load(), Err(SnapshotError::Corrupt(_))));
    }

    #[test]
    fn unreadable_blob_is_corrupt() {
        let dir = tempdir().expect("tempdir");
        let store = SnapshotStore::open(dir.path()).expect("open");
        fs::write(dir.path().join(INDEX_FILE), b"garbage").expect("write");
        fs::write(dir.path().join(META_FILE), b"[]").expect("write");

        assert!(matches!(store.load(), Err(SnapshotError::Corrupt(_))));
    }
}

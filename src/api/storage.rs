//! Append-only measurement persistence

use serde::{Deserialize, Serialize};
use std::fs::{File, OpenOptions};
use std::io::{self, BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// One persisted measurement round
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeasurementRecord {
    /// Auto-incremented row id, starting at 1
    pub id: u64,
    pub distance_one_cm: f64,
    pub distance_two_cm: f64,
    pub batch_id: u32,
}

/// Persistence errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("I/O error on '{}': {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("'{}' line {line} is not a measurement record: {source}", .path.display())]
    Corrupt {
        path: PathBuf,
        line: usize,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to encode record: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Receives the gated distances of every round
pub trait PersistenceSink {
    /// Store one round and return the stored row
    fn append(
        &mut self,
        distance_one_cm: f64,
        distance_two_cm: f64,
        batch_id: u32,
    ) -> Result<MeasurementRecord, StorageError>;
}

impl<S: PersistenceSink + ?Sized> PersistenceSink for Box<S> {
    fn append(
        &mut self,
        distance_one_cm: f64,
        distance_two_cm: f64,
        batch_id: u32,
    ) -> Result<MeasurementRecord, StorageError> {
        (**self).append(distance_one_cm, distance_two_cm, batch_id)
    }
}

/// Measurement log kept in memory
#[derive(Debug, Default)]
pub struct MemoryStore {
    records: Vec<MeasurementRecord>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> &[MeasurementRecord] {
        &self.records
    }
}

impl PersistenceSink for MemoryStore {
    fn append(
        &mut self,
        distance_one_cm: f64,
        distance_two_cm: f64,
        batch_id: u32,
    ) -> Result<MeasurementRecord, StorageError> {
        let record = MeasurementRecord {
            id: self.records.len() as u64 + 1,
            distance_one_cm,
            distance_two_cm,
            batch_id,
        };
        self.records.push(record.clone());
        Ok(record)
    }
}

/// Measurement log stored as one JSON object per line
///
/// Ids continue from the highest id already in the file. Each record is
/// flushed before `append` returns.
pub struct JsonLinesStore {
    path: PathBuf,
    file: File,
    next_id: u64,
}

impl JsonLinesStore {
    /// Open (or create) the log at `path`
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StorageError> {
        let path = path.as_ref().to_path_buf();

        let next_id = if path.exists() {
            Self::read_all(&path)?
                .iter()
                .map(|record| record.id)
                .max()
                .unwrap_or(0)
                + 1
        } else {
            1
        };

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|source| StorageError::Io {
                path: path.clone(),
                source,
            })?;

        log::debug!("measurement log {} opened, next id {}", path.display(), next_id);
        Ok(Self {
            path,
            file,
            next_id,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read every record in the log at `path`
    pub fn read_all<P: AsRef<Path>>(path: P) -> Result<Vec<MeasurementRecord>, StorageError> {
        let path = path.as_ref();
        let io_error = |source| StorageError::Io {
            path: path.to_path_buf(),
            source,
        };

        let reader = BufReader::new(File::open(path).map_err(io_error)?);
        let mut records = Vec::new();
        for (index, line) in reader.lines().enumerate() {
            let line = line.map_err(io_error)?;
            if line.trim().is_empty() {
                continue;
            }
            let record = serde_json::from_str(&line).map_err(|source| StorageError::Corrupt {
                path: path.to_path_buf(),
                line: index + 1,
                source,
            })?;
            records.push(record);
        }
        Ok(records)
    }
}

impl PersistenceSink for JsonLinesStore {
    fn append(
        &mut self,
        distance_one_cm: f64,
        distance_two_cm: f64,
        batch_id: u32,
    ) -> Result<MeasurementRecord, StorageError> {
        let record = MeasurementRecord {
            id: self.next_id,
            distance_one_cm,
            distance_two_cm,
            batch_id,
        };

        let mut line = serde_json::to_string(&record)?;
        line.push('\n');
        self.file
            .write_all(line.as_bytes())
            .and_then(|_| self.file.flush())
            .map_err(|source| StorageError::Io {
                path: self.path.clone(),
                source,
            })?;

        self.next_id += 1;
        Ok(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn temp_log(name: &str) -> PathBuf {
        let path = std::env::temp_dir().join(format!(
            "ultrasonic_locator_{}_{}.jsonl",
            name,
            std::process::id()
        ));
        let _ = fs::remove_file(&path);
        path
    }

    #[test]
    fn test_memory_store_assigns_ids() {
        let mut store = MemoryStore::new();
        store.append(10.0, 20.0, 1).unwrap();
        let second = store.append(0.0, 35.5, 1).unwrap();
        assert_eq!(second.id, 2);
        assert_eq!(store.records().len(), 2);
        assert_eq!(store.records()[0].distance_two_cm, 20.0);
    }

    #[test]
    fn test_json_lines_store_appends_and_reads_back() {
        let path = temp_log("append");
        {
            let mut store = JsonLinesStore::open(&path).unwrap();
            store.append(12.5, 40.0, 1).unwrap();
            store.append(0.0, 40.0, 1).unwrap();
        }

        let records = JsonLinesStore::read_all(&path).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].id, 1);
        assert_eq!(records[1].distance_one_cm, 0.0);

        let _ = fs::remove_file(path);
    }

    #[test]
    fn test_ids_continue_after_reopen() {
        let path = temp_log("reopen");
        {
            let mut store = JsonLinesStore::open(&path).unwrap();
            store.append(1.0, 2.0, 1).unwrap();
            store.append(3.0, 4.0, 1).unwrap();
        }
        let mut store = JsonLinesStore::open(&path).unwrap();
        let record = store.append(5.0, 6.0, 2).unwrap();
        assert_eq!(record.id, 3);
        assert_eq!(record.batch_id, 2);

        let _ = fs::remove_file(path);
    }

    #[test]
    fn test_corrupt_line_is_reported() {
        let path = temp_log("corrupt");
        fs::write(
            &path,
            "{\"id\":1,\"distance_one_cm\":1.0,\"distance_two_cm\":2.0,\"batch_id\":1}\nnot json\n",
        )
        .unwrap();

        match JsonLinesStore::open(&path) {
            Err(StorageError::Corrupt { line, .. }) => assert_eq!(line, 2),
            other => panic!("expected corrupt line error, got {:?}", other.err()),
        }

        let _ = fs::remove_file(path);
    }
}

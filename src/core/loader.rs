//! Dataset loading with an explicit, caller-owned cache
//!
//! A missing file is not a hard failure: the caller gets an empty table and
//! the `NotFound` error alongside it, so report sections can short-circuit.

use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;

use crate::core::table::DataTable;

/// Errors that can occur while loading a dataset
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("File '{}' not found. Make sure the CSV files are in the data directory", path.display())]
    NotFound { path: PathBuf },

    #[error("Failed to read '{}': {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed CSV in '{}': {source}", path.display())]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },
}

/// Result of a load request
#[derive(Debug, Clone)]
pub struct Loaded {
    /// The loaded table, empty when the file is missing
    pub table: Arc<DataTable>,
    /// SHA-256 of the file bytes (hex), absent for missing files
    pub digest: Option<String>,
    /// When the file was read from disk
    pub loaded_at: Option<DateTime<Utc>>,
    /// True when the table came out of the cache
    pub from_cache: bool,
    /// Recoverable condition to report to the user
    pub error: Option<Arc<LoadError>>,
}

impl Loaded {
    fn missing(path: &Path) -> Self {
        Self {
            table: Arc::new(DataTable::empty()),
            digest: None,
            loaded_at: None,
            from_cache: false,
            error: Some(Arc::new(LoadError::NotFound {
                path: path.to_path_buf(),
            })),
        }
    }

    /// True when the file was absent
    pub fn is_missing(&self) -> bool {
        matches!(self.error.as_deref(), Some(LoadError::NotFound { .. }))
    }
}

#[derive(Debug, Clone)]
struct CacheEntry {
    table: Arc<DataTable>,
    digest: String,
    loaded_at: DateTime<Utc>,
}

/// Memoizes parsed datasets by path for the lifetime of the cache object
///
/// There is no eviction; a cache is meant to live for one session (one CLI
/// invocation or one report build).
#[derive(Debug, Default)]
pub struct DatasetCache {
    entries: HashMap<PathBuf, CacheEntry>,
}

impl DatasetCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of cached datasets
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drop every cached dataset
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Load a CSV dataset, serving repeated requests from the cache
    pub fn load(&mut self, path: &Path) -> Result<Loaded, LoadError> {
        if let Some(entry) = self.entries.get(path) {
            log::debug!("cache hit for {}", path.display());
            return Ok(Loaded {
                table: Arc::clone(&entry.table),
                digest: Some(entry.digest.clone()),
                loaded_at: Some(entry.loaded_at),
                from_cache: true,
                error: None,
            });
        }

        let bytes = match std::fs::read(path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                log::error!("dataset {} not found", path.display());
                return Ok(Loaded::missing(path));
            }
            Err(source) => {
                return Err(LoadError::Io {
                    path: path.to_path_buf(),
                    source,
                })
            }
        };

        let table = parse_csv(&bytes).map_err(|source| LoadError::Csv {
            path: path.to_path_buf(),
            source,
        })?;
        log::info!(
            "loaded {} ({} rows, {} columns)",
            path.display(),
            table.n_rows(),
            table.n_cols()
        );

        let entry = CacheEntry {
            table: Arc::new(table),
            digest: hex_digest(&bytes),
            loaded_at: Utc::now(),
        };
        let loaded = Loaded {
            table: Arc::clone(&entry.table),
            digest: Some(entry.digest.clone()),
            loaded_at: Some(entry.loaded_at),
            from_cache: false,
            error: None,
        };
        self.entries.insert(path.to_path_buf(), entry);
        Ok(loaded)
    }
}

/// Parse CSV bytes (with a header row) into a typed table
pub fn parse_csv(bytes: &[u8]) -> Result<DataTable, csv::Error> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::Headers)
        .from_reader(bytes);

    let headers: Vec<String> = reader.headers()?.iter().map(str::to_string).collect();
    let mut records = Vec::new();
    for record in reader.records() {
        let record = record?;
        records.push(record.iter().map(str::to_string).collect::<Vec<_>>());
    }
    Ok(DataTable::from_records(&headers, &records))
}

fn hex_digest(bytes: &[u8]) -> String {
    Sha256::digest(bytes)
        .iter()
        .map(|b| format!("{:02x}", b))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    const BEHAVIORAL: &str = "id,prime,target,rt_raw,rt_log\n\
        1,Black,gun,512,6.238\n\
        1,White,tool,640,6.461\n";

    #[test]
    fn test_load_types_columns() {
        let tmp = tempdir().unwrap();
        let path = tmp.path().join("beh.csv");
        fs::write(&path, BEHAVIORAL).unwrap();

        let mut cache = DatasetCache::new();
        let loaded = cache.load(&path).unwrap();

        assert!(loaded.error.is_none());
        assert!(!loaded.from_cache);
        assert_eq!(loaded.table.n_rows(), 2);
        assert!(loaded.table.factor("id").is_ok());
        assert!(loaded.table.factor("target").is_ok());
        assert_eq!(loaded.table.numeric("rt_raw").unwrap(), &[512.0, 640.0]);
        assert_eq!(loaded.digest.as_ref().map(String::len), Some(64));
    }

    #[test]
    fn test_missing_file_returns_empty_table() {
        let tmp = tempdir().unwrap();
        let mut cache = DatasetCache::new();
        let loaded = cache.load(&tmp.path().join("absent.csv")).unwrap();

        assert!(loaded.is_missing());
        assert!(loaded.table.is_empty());
        assert_eq!(loaded.table.n_cols(), 0);
        assert!(cache.is_empty(), "missing files are not cached");
    }

    #[test]
    fn test_second_load_is_served_from_cache() {
        let tmp = tempdir().unwrap();
        let path = tmp.path().join("beh.csv");
        fs::write(&path, BEHAVIORAL).unwrap();

        let mut cache = DatasetCache::new();
        let first = cache.load(&path).unwrap();
        // Changing the file does not invalidate the entry
        fs::write(&path, "id,prime,target,rt_raw,rt_log\n").unwrap();
        let second = cache.load(&path).unwrap();

        assert!(second.from_cache);
        assert!(Arc::ptr_eq(&first.table, &second.table));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_blank_numeric_cell_keeps_column_numeric() {
        let tmp = tempdir().unwrap();
        let path = tmp.path().join("beh.csv");
        fs::write(
            &path,
            "id,prime,target,rt_raw,rt_log\n\
             1,Black,gun,512,6.238\n\
             1,White,gun,,6.3\n\
             2,White,tool,NA,6.461\n",
        )
        .unwrap();

        let mut cache = DatasetCache::new();
        let loaded = cache.load(&path).unwrap();

        let rt_raw = loaded.table.numeric("rt_raw").unwrap();
        assert_eq!(rt_raw[0], 512.0);
        assert!(rt_raw[1].is_nan());
        assert!(rt_raw[2].is_nan());
        assert_eq!(loaded.table.numeric("rt_log").unwrap().len(), 3);
    }

    #[test]
    fn test_ragged_csv_is_an_error() {
        let tmp = tempdir().unwrap();
        let path = tmp.path().join("bad.csv");
        fs::write(&path, "id,prime\n1,Black,extra\n").unwrap();

        let mut cache = DatasetCache::new();
        assert!(matches!(cache.load(&path), Err(LoadError::Csv { .. })));
    }
}

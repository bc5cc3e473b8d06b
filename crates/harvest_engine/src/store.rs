use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use engine_logging::{engine_debug, engine_info};
use harvest_core::{Cell, Snapshot, SnapshotError};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::persist::{AtomicFileWriter, PersistError};

const SNAPSHOT_EXTENSION: &str = "json";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("invalid object path {0:?}")]
    InvalidPath(String),
    #[error("failed to read {path:?}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("corrupt snapshot {path:?}: {message}")]
    Corrupt { path: PathBuf, message: String },
    #[error("failed to encode snapshot: {0}")]
    Encode(#[from] serde_json::Error),
    #[error(transparent)]
    Persist(#[from] PersistError),
    #[error("snapshots under {prefix:?} cannot be combined: {source}")]
    Concat {
        prefix: String,
        #[source]
        source: SnapshotError,
    },
}

/// Whole-object snapshot storage. There is no partial-row mutation.
pub trait SnapshotStore: Send + Sync {
    /// `Ok(None)` only when the object does not exist; any other failure is an error.
    fn read(&self, container: &str, path: &str) -> Result<Option<Snapshot>, StoreError>;

    /// Full overwrite of the object at `path`.
    fn write(&self, container: &str, path: &str, snapshot: &Snapshot) -> Result<(), StoreError>;

    /// Concatenation of every snapshot under `prefix`, in lexical path order.
    fn list_and_read_all(&self, container: &str, prefix: &str) -> Result<Snapshot, StoreError>;
}

/// Snapshot store on the local filesystem: `{root}/{container}/{path}`.
#[derive(Debug, Clone)]
pub struct FsSnapshotStore {
    root: PathBuf,
}

impl FsSnapshotStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn relative(container: &str, path: &str) -> Result<PathBuf, StoreError> {
        let mut relative = PathBuf::new();
        for part in [container, path] {
            if part.starts_with('/') || part.contains('\\') {
                return Err(StoreError::InvalidPath(format!("{container}/{path}")));
            }
            for segment in part.split('/').filter(|s| !s.is_empty()) {
                if segment == ".." || segment == "." {
                    return Err(StoreError::InvalidPath(format!("{container}/{path}")));
                }
                relative.push(segment);
            }
        }
        if relative.as_os_str().is_empty() {
            return Err(StoreError::InvalidPath(format!("{container}/{path}")));
        }
        Ok(relative)
    }

    fn read_file(path: &Path) -> Result<Option<Snapshot>, StoreError> {
        let bytes = match fs::read(path) {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(source) => {
                return Err(StoreError::Read {
                    path: path.to_path_buf(),
                    source,
                })
            }
        };
        let corrupt = |message: String| StoreError::Corrupt {
            path: path.to_path_buf(),
            message,
        };
        let file: ColumnarFile =
            serde_json::from_slice(&bytes).map_err(|e| corrupt(e.to_string()))?;
        file.into_snapshot().map(Some).map_err(corrupt)
    }
}

impl SnapshotStore for FsSnapshotStore {
    fn read(&self, container: &str, path: &str) -> Result<Option<Snapshot>, StoreError> {
        let full = self.root.join(Self::relative(container, path)?);
        let snapshot = Self::read_file(&full)?;
        match &snapshot {
            Some(s) => engine_debug!("read {} rows from {:?}", s.len(), full),
            None => engine_info!("no snapshot at {:?}", full),
        }
        Ok(snapshot)
    }

    fn write(&self, container: &str, path: &str, snapshot: &Snapshot) -> Result<(), StoreError> {
        let relative = Self::relative(container, path)?;
        let bytes = serde_json::to_vec(&ColumnarFile::from_snapshot(snapshot))?;
        let target = AtomicFileWriter::new(self.root.clone()).write(&relative, &bytes)?;
        engine_info!("wrote {} rows to {:?}", snapshot.len(), target);
        Ok(())
    }

    fn list_and_read_all(&self, container: &str, prefix: &str) -> Result<Snapshot, StoreError> {
        let dir = self.root.join(Self::relative(container, prefix)?);
        let mut files = Vec::new();
        collect_snapshot_files(&dir, &mut files)?;
        files.sort();

        let mut combined = Snapshot::default();
        for file in &files {
            if let Some(snapshot) = Self::read_file(file)? {
                combined = combined.concat(snapshot).map_err(|source| StoreError::Concat {
                    prefix: prefix.to_string(),
                    source,
                })?;
            }
        }
        engine_info!(
            "read {} rows from {} snapshots under {:?}",
            combined.len(),
            files.len(),
            dir
        );
        Ok(combined)
    }
}

fn collect_snapshot_files(dir: &Path, out: &mut Vec<PathBuf>) -> Result<(), StoreError> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(()),
        Err(source) => {
            return Err(StoreError::Read {
                path: dir.to_path_buf(),
                source,
            })
        }
    };
    for entry in entries {
        let entry = entry.map_err(|source| StoreError::Read {
            path: dir.to_path_buf(),
            source,
        })?;
        let path = entry.path();
        if path.is_dir() {
            collect_snapshot_files(&path, out)?;
        } else if path.extension().and_then(|e| e.to_str()) == Some(SNAPSHOT_EXTENSION) {
            out.push(path);
        }
    }
    Ok(())
}

/// On-disk layout: one value array per column.
#[derive(Debug, Serialize, Deserialize)]
struct ColumnarFile {
    columns: Vec<ColumnData>,
}

#[derive(Debug, Serialize, Deserialize)]
struct ColumnData {
    name: String,
    values: Vec<Cell>,
}

impl ColumnarFile {
    fn from_snapshot(snapshot: &Snapshot) -> Self {
        let columns = snapshot
            .columns()
            .iter()
            .enumerate()
            .map(|(idx, name)| ColumnData {
                name: name.clone(),
                values: snapshot.rows().iter().map(|row| row[idx].clone()).collect(),
            })
            .collect();
        Self { columns }
    }

    fn into_snapshot(self) -> Result<Snapshot, String> {
        let len = self.columns.first().map_or(0, |c| c.values.len());
        if let Some(bad) = self.columns.iter().find(|c| c.values.len() != len) {
            return Err(format!(
                "column {:?} has {} values, expected {}",
                bad.name,
                bad.values.len(),
                len
            ));
        }
        let mut names = Vec::with_capacity(self.columns.len());
        let mut values = Vec::with_capacity(self.columns.len());
        for column in self.columns {
            names.push(column.name);
            values.push(column.values.into_iter());
        }
        let rows = (0..len)
            .map(|_| values.iter_mut().filter_map(Iterator::next).collect())
            .collect();
        Snapshot::new(names, rows).map_err(|e| e.to_string())
    }
}

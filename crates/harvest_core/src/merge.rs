use std::collections::HashSet;
use std::fmt;

use thiserror::Error;

use crate::snapshot::{Cell, Snapshot};

/// Which merge input an error refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Existing,
    Incoming,
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Existing => write!(f, "existing"),
            Side::Incoming => write!(f, "incoming"),
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum MergeError {
    #[error("key column {column:?} missing from {side} snapshot")]
    MissingKeyColumn { column: String, side: Side },
    #[error("null key in {side} snapshot at row {row}")]
    NullKey { side: Side, row: usize },
    #[error("existing columns {existing:?} differ from incoming columns {incoming:?}")]
    SchemaMismatch {
        existing: Vec<String>,
        incoming: Vec<String>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeResult {
    /// Replacement for the previously persisted snapshot.
    pub combined: Snapshot,
    /// Distinct incoming keys that `existing` did not have.
    pub new_count: usize,
}

/// Last-write-wins merge keyed by `key`.
///
/// Incoming rows always win; existing rows whose key is absent from `incoming`
/// are carried forward after them. The result holds exactly one row per
/// distinct key found in either input. Duplicate keys within `incoming` keep
/// their first occurrence.
pub fn merge(
    existing: Option<Snapshot>,
    incoming: Snapshot,
    key: &str,
) -> Result<MergeResult, MergeError> {
    let incoming = dedupe(incoming, key, Side::Incoming)?;

    let existing = match existing {
        Some(existing) if !existing.is_schemaless() => existing,
        _ => {
            let new_count = incoming.len();
            return Ok(MergeResult {
                combined: incoming,
                new_count,
            });
        }
    };

    let existing_idx = key_index(&existing, key, Side::Existing)?;
    if !incoming.is_schemaless() && incoming.columns() != existing.columns() {
        return Err(MergeError::SchemaMismatch {
            existing: existing.columns().to_vec(),
            incoming: incoming.columns().to_vec(),
        });
    }

    let incoming_keys: HashSet<Cell> = match incoming.column_index(key) {
        Some(idx) => incoming.rows().iter().map(|row| row[idx].clone()).collect(),
        None => HashSet::new(),
    };

    let columns = if incoming.is_schemaless() {
        existing.columns().to_vec()
    } else {
        incoming.columns().to_vec()
    };

    let mut existing_keys = HashSet::with_capacity(existing.len());
    let mut carried = Vec::new();
    for (row_no, row) in existing.into_rows().into_iter().enumerate() {
        let cell = &row[existing_idx];
        if cell.is_null() {
            return Err(MergeError::NullKey {
                side: Side::Existing,
                row: row_no,
            });
        }
        if !existing_keys.insert(cell.clone()) {
            continue;
        }
        if !incoming_keys.contains(cell) {
            carried.push(row);
        }
    }

    let new_count = incoming_keys
        .iter()
        .filter(|k| !existing_keys.contains(*k))
        .count();

    let mut rows = incoming.into_rows();
    rows.extend(carried);
    Ok(MergeResult {
        combined: Snapshot::from_parts(columns, rows),
        new_count,
    })
}

fn key_index(snapshot: &Snapshot, key: &str, side: Side) -> Result<usize, MergeError> {
    snapshot
        .column_index(key)
        .ok_or_else(|| MergeError::MissingKeyColumn {
            column: key.to_string(),
            side,
        })
}

fn dedupe(snapshot: Snapshot, key: &str, side: Side) -> Result<Snapshot, MergeError> {
    if snapshot.is_schemaless() {
        return Ok(snapshot);
    }
    let idx = key_index(&snapshot, key, side)?;
    let columns = snapshot.columns().to_vec();
    let mut seen = HashSet::with_capacity(snapshot.len());
    let mut rows = Vec::with_capacity(snapshot.len());
    for (row_no, row) in snapshot.into_rows().into_iter().enumerate() {
        if row[idx].is_null() {
            return Err(MergeError::NullKey { side, row: row_no });
        }
        if seen.insert(row[idx].clone()) {
            rows.push(row);
        }
    }
    Ok(Snapshot::from_parts(columns, rows))
}

use std::collections::HashSet;
use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A single value in a snapshot row.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Cell {
    Null,
    Int(i64),
    Text(String),
}

impl Cell {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Cell::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Cell::Int(v) => Some(*v),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Cell::Null)
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cell::Null => write!(f, "null"),
            Cell::Int(v) => write!(f, "{v}"),
            Cell::Text(s) => write!(f, "{s:?}"),
        }
    }
}

impl From<&str> for Cell {
    fn from(value: &str) -> Self {
        Cell::Text(value.to_string())
    }
}

impl From<String> for Cell {
    fn from(value: String) -> Self {
        Cell::Text(value)
    }
}

impl From<i64> for Cell {
    fn from(value: i64) -> Self {
        Cell::Int(value)
    }
}

impl From<Option<String>> for Cell {
    fn from(value: Option<String>) -> Self {
        value.map(Cell::Text).unwrap_or(Cell::Null)
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SnapshotError {
    #[error("row {row} has {actual} cells, expected {expected}")]
    RowWidth {
        row: usize,
        expected: usize,
        actual: usize,
    },
    #[error("duplicate column name {0:?}")]
    DuplicateColumn(String),
    #[error("column {0:?} not present")]
    MissingColumn(String),
    #[error("column {column:?} in row {row} has unexpected value {found}")]
    BadCell {
        column: String,
        row: usize,
        found: String,
    },
    #[error("schemas differ: {left:?} vs {right:?}")]
    SchemaMismatch {
        left: Vec<String>,
        right: Vec<String>,
    },
}

/// Row type that can be stored in a [`Snapshot`].
pub trait Tabular: Sized {
    fn columns() -> &'static [&'static str];
    /// Cells in the order of [`Tabular::columns`].
    fn to_cells(&self) -> Vec<Cell>;
    fn from_row(row: RowView<'_>) -> Result<Self, SnapshotError>;
}

/// Borrowed view of one row with access by column name.
#[derive(Debug, Clone, Copy)]
pub struct RowView<'a> {
    index: usize,
    columns: &'a [String],
    cells: &'a [Cell],
}

impl<'a> RowView<'a> {
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn get(&self, column: &str) -> Option<&'a Cell> {
        self.columns
            .iter()
            .position(|c| c == column)
            .map(|idx| &self.cells[idx])
    }

    fn require(&self, column: &str) -> Result<&'a Cell, SnapshotError> {
        self.get(column)
            .ok_or_else(|| SnapshotError::MissingColumn(column.to_string()))
    }

    fn bad_cell(&self, column: &str, cell: &Cell) -> SnapshotError {
        SnapshotError::BadCell {
            column: column.to_string(),
            row: self.index,
            found: cell.to_string(),
        }
    }

    pub fn text(&self, column: &str) -> Result<&'a str, SnapshotError> {
        let cell = self.require(column)?;
        cell.as_text().ok_or_else(|| self.bad_cell(column, cell))
    }

    pub fn opt_text(&self, column: &str) -> Result<Option<&'a str>, SnapshotError> {
        let cell = self.require(column)?;
        match cell {
            Cell::Null => Ok(None),
            Cell::Text(s) => Ok(Some(s)),
            other => Err(self.bad_cell(column, other)),
        }
    }

    pub fn int(&self, column: &str) -> Result<i64, SnapshotError> {
        let cell = self.require(column)?;
        cell.as_int().ok_or_else(|| self.bad_cell(column, cell))
    }
}

/// Ordered, whole-file collection of rows under a named schema.
///
/// A snapshot with no columns and no rows is "schema-less"; it behaves as the
/// identity for [`Snapshot::concat`] and as an empty input for merging.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Snapshot {
    columns: Vec<String>,
    rows: Vec<Vec<Cell>>,
}

impl Snapshot {
    pub fn new(columns: Vec<String>, rows: Vec<Vec<Cell>>) -> Result<Self, SnapshotError> {
        let mut seen = HashSet::with_capacity(columns.len());
        for column in &columns {
            if !seen.insert(column.as_str()) {
                return Err(SnapshotError::DuplicateColumn(column.clone()));
            }
        }
        for (row, cells) in rows.iter().enumerate() {
            if cells.len() != columns.len() {
                return Err(SnapshotError::RowWidth {
                    row,
                    expected: columns.len(),
                    actual: cells.len(),
                });
            }
        }
        Ok(Self { columns, rows })
    }

    /// Rows must already match `columns` in width.
    pub(crate) fn from_parts(columns: Vec<String>, rows: Vec<Vec<Cell>>) -> Self {
        Self { columns, rows }
    }

    /// Empty snapshot that still carries a schema.
    pub fn with_columns(columns: &[&str]) -> Self {
        Self {
            columns: columns.iter().map(|c| c.to_string()).collect(),
            rows: Vec::new(),
        }
    }

    pub fn from_rows<'a, T, I>(rows: I) -> Self
    where
        T: Tabular + 'a,
        I: IntoIterator<Item = &'a T>,
    {
        let mut snapshot = Self::with_columns(T::columns());
        snapshot.rows = rows.into_iter().map(T::to_cells).collect();
        snapshot
    }

    pub fn decode_rows<T: Tabular>(&self) -> Result<Vec<T>, SnapshotError> {
        self.row_views().map(T::from_row).collect()
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<Cell>] {
        &self.rows
    }

    pub fn into_rows(self) -> Vec<Vec<Cell>> {
        self.rows
    }

    pub fn row_views(&self) -> impl Iterator<Item = RowView<'_>> + '_ {
        self.rows.iter().enumerate().map(|(index, cells)| RowView {
            index,
            columns: &self.columns,
            cells,
        })
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn is_schemaless(&self) -> bool {
        self.columns.is_empty() && self.rows.is_empty()
    }

    pub fn column_index(&self, column: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == column)
    }

    /// Values of `column` in row order.
    pub fn keys(&self, column: &str) -> Result<Vec<&Cell>, SnapshotError> {
        let idx = self
            .column_index(column)
            .ok_or_else(|| SnapshotError::MissingColumn(column.to_string()))?;
        Ok(self.rows.iter().map(|row| &row[idx]).collect())
    }

    /// Appends `other`'s rows. Both schemas must match unless one side is schema-less.
    pub fn concat(mut self, other: Snapshot) -> Result<Snapshot, SnapshotError> {
        if other.is_schemaless() {
            return Ok(self);
        }
        if self.is_schemaless() {
            return Ok(other);
        }
        if self.columns != other.columns {
            return Err(SnapshotError::SchemaMismatch {
                left: self.columns,
                right: other.columns,
            });
        }
        self.rows.extend(other.rows);
        Ok(self)
    }
}

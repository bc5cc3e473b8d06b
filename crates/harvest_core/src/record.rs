use chrono::{DateTime, SecondsFormat, Utc};

use crate::hash::{content_id, short_id};
use crate::snapshot::{Cell, RowView, SnapshotError, Tabular};
use crate::{FetchOutcome, FetchStatus};

/// Key column of raw record snapshots.
pub const RECORD_KEY: &str = "id";

const RECORD_COLUMNS: &[&str] = &["id", "extracted_at", "entity", "page", "payload"];

/// One fetched page, identified by the hash of its payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    pub id: String,
    pub extracted_at: DateTime<Utc>,
    pub entity: String,
    pub page: u32,
    pub payload: String,
}

impl Tabular for Record {
    fn columns() -> &'static [&'static str] {
        RECORD_COLUMNS
    }

    fn to_cells(&self) -> Vec<Cell> {
        vec![
            Cell::from(self.id.as_str()),
            Cell::Text(format_timestamp(&self.extracted_at)),
            Cell::from(self.entity.as_str()),
            Cell::Int(i64::from(self.page)),
            Cell::from(self.payload.as_str()),
        ]
    }

    fn from_row(row: RowView<'_>) -> Result<Self, SnapshotError> {
        let bad = |column: &str, found: String| SnapshotError::BadCell {
            column: column.to_string(),
            row: row.index(),
            found,
        };
        let raw_ts = row.text("extracted_at")?;
        let extracted_at = DateTime::parse_from_rfc3339(raw_ts)
            .map_err(|_| bad("extracted_at", raw_ts.to_string()))?
            .with_timezone(&Utc);
        let page = row.int("page")?;
        let page = u32::try_from(page).map_err(|_| bad("page", page.to_string()))?;
        Ok(Self {
            id: row.text("id")?.to_string(),
            extracted_at,
            entity: row.text("entity")?.to_string(),
            page,
            payload: row.text("payload")?.to_string(),
        })
    }
}

/// RFC 3339, UTC, second precision. Sorts lexically.
pub fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Turns fetch outcomes into records sharing one run timestamp.
#[derive(Debug, Clone)]
pub struct RecordBuilder {
    extracted_at: DateTime<Utc>,
    id_len: Option<usize>,
}

impl RecordBuilder {
    pub fn new(extracted_at: DateTime<Utc>) -> Self {
        Self {
            extracted_at,
            id_len: None,
        }
    }

    /// Truncate ids to `len` hex characters.
    pub fn with_id_len(mut self, len: usize) -> Self {
        self.id_len = Some(len);
        self
    }

    pub fn build(&self, outcome: FetchOutcome) -> Record {
        let payload = match outcome.status {
            FetchStatus::Success(body) => body,
            FetchStatus::HttpError(code) => {
                format!("HTTP error {code} for {} page {}", outcome.entity, outcome.page)
            }
            FetchStatus::Rejected(reason) => {
                format!("Rejected ({reason}) for {} page {}", outcome.entity, outcome.page)
            }
            FetchStatus::ExhaustedRetries => format!(
                "Failed after {} attempts for {} page {}",
                outcome.attempts, outcome.entity, outcome.page
            ),
            FetchStatus::Abandoned => format!(
                "Abandoned at run deadline after {} attempts for {} page {}",
                outcome.attempts, outcome.entity, outcome.page
            ),
        };
        let id = match self.id_len {
            Some(len) => short_id(&payload, len),
            None => content_id(&payload),
        };
        Record {
            id,
            extracted_at: self.extracted_at,
            entity: outcome.entity,
            page: outcome.page,
            payload,
        }
    }

    pub fn build_all(&self, outcomes: impl IntoIterator<Item = FetchOutcome>) -> Vec<Record> {
        outcomes.into_iter().map(|o| self.build(o)).collect()
    }
}

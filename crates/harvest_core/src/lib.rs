//! Harvest core: pure target expansion, record building and snapshot merging.
mod hash;
mod merge;
mod outcome;
mod record;
mod snapshot;
mod target;

pub use hash::{composite_id, content_id, short_id, NORMALIZED_ID_LEN};
pub use merge::{merge, MergeError, MergeResult, Side};
pub use outcome::{FetchOutcome, FetchStatus};
pub use record::{format_timestamp, Record, RecordBuilder, RECORD_KEY};
pub use snapshot::{Cell, RowView, Snapshot, SnapshotError, Tabular};
pub use target::{generate_targets, FetchTarget};

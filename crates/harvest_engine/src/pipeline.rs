use chrono::{DateTime, Datelike, Utc};
use engine_logging::{engine_error, engine_info, set_stage};
use harvest_core::{
    generate_targets, merge, MergeError, RecordBuilder, Snapshot, SnapshotError, RECORD_KEY,
};
use serde::Serialize;
use thiserror::Error;

use crate::config::{ConfigError, HarvestConfig};
use crate::engine::{FetchEngine, LogProgressSink};
use crate::extract::{ArticleExtractor, ExtractError, TitleFilter};
use crate::normalize::{normalize, ARTICLE_KEY};
use crate::store::{SnapshotStore, StoreError};

pub const RAW_STAGE: &str = "raw";
pub const NORMALIZE_STAGE: &str = "normalize";

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("snapshot store: {0}")]
    Store(#[from] StoreError),
    #[error("merge failed: {0}")]
    Merge(#[from] MergeError),
    #[error("malformed snapshot: {0}")]
    Snapshot(#[from] SnapshotError),
    #[error(transparent)]
    Extract(#[from] ExtractError),
}

/// Run metadata handed back to whoever scheduled the stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunReport {
    pub stage: &'static str,
    pub container: String,
    pub path: String,
    /// Rows in the snapshot after the merge.
    pub total_records: usize,
    pub new_records: usize,
    pub failed_targets: usize,
}

/// `{folder}/{prefix}_{YYYY_MM_DD}.json` for the run's day.
pub fn raw_snapshot_path(config: &HarvestConfig, now: &DateTime<Utc>) -> String {
    format!(
        "{}/{}_{}.json",
        config.store.folder.trim_end_matches('/'),
        config.store.raw_snapshot_prefix,
        now.format("%Y_%m_%d")
    )
}

pub fn normalized_snapshot_path(config: &HarvestConfig) -> String {
    format!(
        "{}/{}.json",
        config.store.folder.trim_end_matches('/'),
        config.store.normalized_snapshot_name
    )
}

/// Fetches every target, folds the records into the day's raw snapshot and
/// writes it back. Partial fetch failures are persisted as placeholder rows;
/// only store, merge or config problems fail the run.
pub async fn run_raw_stage(
    config: &HarvestConfig,
    engine: &FetchEngine,
    store: &dyn SnapshotStore,
    now: DateTime<Utc>,
) -> Result<RunReport, PipelineError> {
    set_stage(RAW_STAGE);
    config.validate()?;

    let targets = generate_targets(&config.entities, config.pages, &config.base_url);
    engine_info!(
        "{} entities x {} pages -> {} targets",
        config.entities.len(),
        config.pages,
        targets.len()
    );

    let outcomes = engine.run(targets, &LogProgressSink).await;
    let failed_targets = outcomes.iter().filter(|o| !o.is_success()).count();
    let records = RecordBuilder::new(now).build_all(outcomes);
    let incoming = Snapshot::from_rows(&records);

    let container = config.store.raw_container.clone();
    let path = raw_snapshot_path(config, &now);
    let (total_records, new_records) = merge_and_write(store, &container, &path, incoming, RECORD_KEY)?;

    Ok(RunReport {
        stage: RAW_STAGE,
        container,
        path,
        total_records,
        new_records,
        failed_targets,
    })
}

/// Reads every raw snapshot, extracts articles and folds them into the
/// normalized snapshot.
pub fn run_normalize_stage(
    config: &HarvestConfig,
    store: &dyn SnapshotStore,
    extractor: &dyn ArticleExtractor,
    now: DateTime<Utc>,
) -> Result<RunReport, PipelineError> {
    set_stage(NORMALIZE_STAGE);
    config.validate()?;
    let title_filter = TitleFilter::new(&config.extract.excluded_title_patterns)?;

    let raw = store.list_and_read_all(&config.store.raw_container, &config.store.folder)?;
    let incoming = normalize(&raw, extractor, now.year(), &title_filter)?;
    engine_info!("{} raw rows -> {} articles", raw.len(), incoming.len());

    let container = config.store.normalized_container.clone();
    let path = normalized_snapshot_path(config);
    let (total_records, new_records) =
        merge_and_write(store, &container, &path, incoming, ARTICLE_KEY)?;

    Ok(RunReport {
        stage: NORMALIZE_STAGE,
        container,
        path,
        total_records,
        new_records,
        failed_targets: 0,
    })
}

fn merge_and_write(
    store: &dyn SnapshotStore,
    container: &str,
    path: &str,
    incoming: Snapshot,
    key: &str,
) -> Result<(usize, usize), PipelineError> {
    let existing = store.read(container, path)?;
    if existing.is_none() {
        engine_info!("no existing snapshot at {}/{}, starting fresh", container, path);
    }
    let merged = merge(existing, incoming, key)?;
    let total = merged.combined.len();

    if let Err(err) = store.write(container, path, &merged.combined) {
        engine_error!("failed to write {}/{}: {}", container, path, err);
        return Err(err.into());
    }
    engine_info!(
        "{}/{} now holds {} rows ({} new)",
        container,
        path,
        total,
        merged.new_count
    );
    Ok((total, merged.new_count))
}

//! Harvest engine: fetching, snapshot storage and the stage pipeline.
mod config;
mod engine;
mod extract;
mod fetch;
mod normalize;
mod persist;
mod pipeline;
mod retry;
mod store;
mod types;

pub use config::{ConfigError, ExtractSettings, FetchConfig, HarvestConfig, StoreConfig};
pub use engine::{EngineSettings, FetchEngine, LogProgressSink, ProgressSink};
pub use extract::{
    ArticleExtractor, ExtractError, ExtractedArticle, SelectorExtractor, TitleFilter,
};
pub use fetch::{FetchSettings, Fetcher, ReqwestFetcher};
pub use normalize::{normalize, parse_published_date, Article, ARTICLE_KEY};
pub use persist::{ensure_dir, AtomicFileWriter, PersistError};
pub use pipeline::{
    normalized_snapshot_path, raw_snapshot_path, run_normalize_stage, run_raw_stage,
    PipelineError, RunReport, NORMALIZE_STAGE, RAW_STAGE,
};
pub use retry::{RetryPolicy, Sleeper, TokioSleeper};
pub use store::{FsSnapshotStore, SnapshotStore, StoreError};
pub use types::{EngineEvent, FailureKind, FetchError, FetchMetadata, FetchOutput};

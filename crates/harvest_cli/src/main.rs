mod config;
mod logging;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand};
use engine_logging::{engine_error, engine_info};
use harvest_engine::{
    run_normalize_stage, run_raw_stage, FetchEngine, FsSnapshotStore, HarvestConfig,
    ReqwestFetcher, RunReport, SelectorExtractor,
};

use crate::logging::LogDestination;

/// Scheduled news harvest: fetch raw pages, then normalize them into articles.
#[derive(Debug, Parser)]
#[command(name = "harvest", version, about)]
struct Cli {
    /// RON run configuration.
    #[arg(long, short, default_value = "harvest.ron")]
    config: PathBuf,

    /// Snapshot store root; overrides `store.root` from the config.
    #[arg(long, env = "HARVEST_STORE_ROOT")]
    store_root: Option<PathBuf>,

    /// Also write logs to this file.
    #[arg(long)]
    log_file: Option<PathBuf>,

    /// Log only to `--log-file`.
    #[arg(long, short, requires = "log_file")]
    quiet: bool,

    /// Repeat for more detail (-v debug, -vv trace).
    #[arg(long, short, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Clone, Copy, Subcommand)]
enum Command {
    /// Fetch every target and merge the records into today's raw snapshot.
    Raw,
    /// Extract articles from all raw snapshots into the normalized snapshot.
    Normalize,
    /// Raw stage followed by the normalize stage.
    All,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::initialize(
        &LogDestination::from_args(cli.log_file.clone(), cli.quiet),
        logging::level_for(cli.verbose),
    );

    let config = config::load_config(&cli.config, cli.store_root.clone())?;
    let reports = match run(cli.command, &config).await {
        Ok(reports) => reports,
        Err(err) => {
            engine_error!("harvest failed: {:#}", err);
            return Err(err);
        }
    };

    for report in &reports {
        println!("{}", serde_json::to_string(report)?);
    }
    Ok(())
}

async fn run(command: Command, config: &HarvestConfig) -> Result<Vec<RunReport>> {
    let store = FsSnapshotStore::new(config.store_root()?);
    engine_info!("snapshot store at {:?}", store.root());
    let mut reports = Vec::new();

    if matches!(command, Command::Raw | Command::All) {
        let fetcher = ReqwestFetcher::new(config.fetch_settings())
            .context("failed to build HTTP client")?;
        let engine = FetchEngine::new(Arc::new(fetcher), config.engine_settings());
        let report = run_raw_stage(config, &engine, &store, Utc::now())
            .await
            .context("raw stage failed")?;
        reports.push(report);
    }

    if matches!(command, Command::Normalize | Command::All) {
        let extractor =
            SelectorExtractor::new(&config.extract).context("invalid extractor selectors")?;
        let report = run_normalize_stage(config, &store, &extractor, Utc::now())
            .context("normalize stage failed")?;
        reports.push(report);
    }

    Ok(reports)
}

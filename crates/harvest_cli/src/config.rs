use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use engine_logging::engine_info;
use harvest_engine::HarvestConfig;

/// Reads a RON run configuration. `store_root`, when given, replaces the
/// file's `store.root`.
pub fn load_config(path: &Path, store_root: Option<PathBuf>) -> Result<HarvestConfig> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("failed to read config file {:?}", path))?;
    let mut config: HarvestConfig =
        ron::from_str(&text).with_context(|| format!("failed to parse config file {:?}", path))?;
    if let Some(root) = store_root {
        config.store.root = Some(root);
    }
    config
        .validate()
        .with_context(|| format!("invalid config in {:?}", path))?;
    engine_info!(
        "loaded {:?}: {} entities, {} pages each",
        path,
        config.entities.len(),
        config.pages
    );
    Ok(config)
}

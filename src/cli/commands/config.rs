//! Config command implementation

use std::path::PathBuf;

use anyhow::Result;

use crate::config::{IngestConfig, sample_config};

/// Print a commented sample `.ingest.toml`
pub fn handle_config_sample() -> Result<()> {
    print!("{}", sample_config());
    Ok(())
}

/// Print the effective configuration after file and environment overrides
pub fn handle_config_show(dir: Option<PathBuf>, file: Option<PathBuf>) -> Result<()> {
    let config = match file {
        Some(path) => IngestConfig::load_file(&path)?,
        None => IngestConfig::load(&dir.unwrap_or_else(|| PathBuf::from(".")))?,
    };
    print!("{}", config.to_toml()?);
    Ok(())
}

use anyhow::{Context, Result, ensure};
use schemars::{Schema, schema_for};
use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;
use tracing::debug;

use super::models::Settings;

/// Longest accepted `locator.timeout_ms` (one day).
pub const MAX_LOCATOR_TIMEOUT_MS: u64 = 24 * 60 * 60 * 1000;

/// Load settings from a string slice.
pub fn load_from_str(s: &str) -> Result<Settings> {
    let cfg: Settings =
        serde_json::from_str(s).context("Failed to parse JSON config string into Settings")?;
    validate_config(&cfg)?;
    Ok(cfg)
}

/// Load settings from any reader (e.g., a file).
pub fn load_from_reader<R: Read>(reader: R) -> Result<Settings> {
    let cfg: Settings =
        serde_json::from_reader(reader).context("Failed to parse JSON config from reader")?;
    validate_config(&cfg)?;
    Ok(cfg)
}

/// Load settings from a file path synchronously.
pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Settings> {
    let path_ref = path.as_ref();
    let file = File::open(path_ref)
        .with_context(|| format!("Failed to open config file {}", path_ref.display()))?;
    let cfg = load_from_reader(file)?;
    debug!("Loaded config from {}", path_ref.display());
    Ok(cfg)
}

/// Load settings from a file path asynchronously (Tokio).
pub async fn load_from_path_async<P: AsRef<Path>>(path: P) -> Result<Settings> {
    use tokio::fs;
    let path_ref = path.as_ref();
    let bytes = fs::read(path_ref)
        .await
        .with_context(|| format!("Failed to read config file {}", path_ref.display()))?;
    let cfg: Settings = serde_json::from_slice(&bytes)
        .with_context(|| format!("Failed to parse JSON config from {}", path_ref.display()))?;
    validate_config(&cfg)?;
    debug!("Loaded config from {}", path_ref.display());
    Ok(cfg)
}

/// Generate the JSON Schema for the Settings model.
pub fn generate_schema() -> Schema {
    schema_for!(Settings)
}

/// Write the JSON Schema for the Settings model to any writer (pretty-printed).
pub fn write_schema_to_writer<W: Write>(mut writer: W) -> Result<()> {
    let schema = generate_schema();
    let json = serde_json::to_string_pretty(&schema).context("Failed to serialize schema")?;
    writer
        .write_all(json.as_bytes())
        .context("Failed to write schema to writer")?;
    Ok(())
}

/// Range checks that serde alone cannot express.
pub fn validate_config(cfg: &Settings) -> Result<()> {
    let loc = &cfg.locator;
    ensure!(
        (0.0..=1.0).contains(&loc.confidence_threshold),
        "locator.confidence_threshold must be within [0, 1], got {}",
        loc.confidence_threshold
    );
    ensure!(
        loc.timeout_ms <= MAX_LOCATOR_TIMEOUT_MS,
        "locator.timeout_ms must be at most {} (one day), got {}",
        MAX_LOCATOR_TIMEOUT_MS,
        loc.timeout_ms
    );
    ensure!(
        loc.retry_interval_ms > 0,
        "locator.retry_interval_ms must be greater than zero"
    );
    ensure!(
        loc.cache_capacity > 0,
        "locator.cache_capacity must be greater than zero"
    );
    for (alias, target) in &cfg.apps {
        ensure!(
            !target.trim().is_empty(),
            "App alias '{}' maps to an empty application name",
            alias
        );
    }
    if let Some(shell) = &cfg.shell {
        ensure!(!shell.trim().is_empty(), "shell must not be empty when set");
    }
    Ok(())
}

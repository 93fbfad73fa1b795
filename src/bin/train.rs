//! Offline trainer: read the feature table, fit all three models, write artifacts.
//! The training summary is printed to stdout as one JSON document.

use std::path::PathBuf;

use superapp_ml::{config::ServiceConfig, logging::StructuredLogger, training};
use tracing::info;

fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let config_path = std::env::var("SUPERAPP_CONFIG_PATH")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("config.json"));
    let config = ServiceConfig::load(&config_path)?;

    StructuredLogger::init(config.log.json, &config.log.level);
    info!(
        database = %config.training.database_path.display(),
        artifacts_dir = %config.artifacts_dir.display(),
        "training started"
    );

    let summary = training::train_all(&config)?;
    StructuredLogger::emit_json(&summary, &mut std::io::stdout().lock())?;

    info!(users = summary.users, "training complete");
    Ok(())
}

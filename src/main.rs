//! SuperApp ML API entrypoint: load all artifacts, then serve predictions until Ctrl-C.

use std::path::PathBuf;
use std::sync::Arc;

use superapp_ml::{
    config::ServiceConfig,
    logging::StructuredLogger,
    server::{self, AppState},
    serving::Models,
};
use tracing::{error, info};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let config_path = std::env::var("SUPERAPP_CONFIG_PATH")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("config.json"));
    let mut config = ServiceConfig::load(&config_path)?;
    if let Ok(addr) = std::env::var("SUPERAPP_ADDR") {
        config.server.bind_addr = addr;
    }

    StructuredLogger::init(config.log.json, &config.log.level);

    info!(
        config = %config_path.display(),
        artifacts_dir = %config.artifacts_dir.display(),
        "SuperApp ML API starting"
    );

    // The service never starts half-loaded.
    let models = Models::load(&config).map_err(|e| {
        error!(error = %e, "failed to load model artifacts");
        e
    })?;
    let state = Arc::new(AppState::new(models));

    server::serve(
        &config.server.bind_addr,
        state,
        config.server.max_concurrent_requests,
    )
    .await
}

pub mod generate;
pub mod init;
pub mod practice;
pub mod rankings;
pub mod stats;
pub mod validate;

use std::path::PathBuf;

use anyhow::{Context, Result};

use mathdrill_core::config::{load_config_from, DrillConfig};
use mathdrill_core::service::DrillService;
use mathdrill_stores::Stores;

/// Load configuration and wire a service over the configured stores.
pub(crate) fn build_service(config_path: Option<PathBuf>) -> Result<(DrillConfig, DrillService)> {
    let config = load_config_from(config_path.as_deref())?;
    let service = Stores::from_config(&config)
        .and_then(|stores| stores.into_service(&config))
        .context("failed to set up drill service")?;
    Ok((config, service))
}

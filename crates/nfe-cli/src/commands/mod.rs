//! Subcommands and the pieces they share.

pub mod batch;
pub mod config;
pub mod process;

use std::path::Path;

use tracing::{debug, info};

use nfe_core::lookup::{BrasilApiClient, CompanyResolver, LookupCache, NoLookup};
use nfe_core::models::config::{LookupConfig, NfeConfig};

/// Load the config named by `--config`, else the default file if present,
/// else built-in defaults.
pub fn load_config(config_path: Option<&str>) -> anyhow::Result<NfeConfig> {
    if let Some(path) = config_path {
        return Ok(NfeConfig::from_file(Path::new(path))?);
    }

    let default_path = config::default_config_path();
    if default_path.exists() {
        debug!("Using config file {}", default_path.display());
        Ok(NfeConfig::from_file(&default_path)?)
    } else {
        Ok(NfeConfig::default())
    }
}

/// Registry resolver for one run. Must be called on a blocking thread, the
/// HTTP client is synchronous.
pub fn build_resolver(
    config: &LookupConfig,
    offline: bool,
) -> anyhow::Result<Box<dyn CompanyResolver>> {
    if offline || !config.enabled {
        info!("Registry lookups disabled");
        return Ok(Box::new(NoLookup));
    }

    let client = BrasilApiClient::new(config)?;
    Ok(Box::new(LookupCache::new(client, config)))
}

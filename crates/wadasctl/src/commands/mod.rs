pub mod nodes;
pub mod scrape;
pub mod select;

use std::path::Path;
use std::sync::Arc;

use tracing::info;

use wadas_cluster::StaticInventory;
use wadas_core::SchedulerConfig;

pub fn load_config(path: Option<&Path>) -> anyhow::Result<SchedulerConfig> {
    match path {
        Some(path) => {
            let config = SchedulerConfig::from_file(path)?;
            info!(path = %path.display(), nodes = config.nodes.len(), "configuration loaded");
            Ok(config)
        }
        None => Ok(SchedulerConfig::default()),
    }
}

pub fn inventory(config: &SchedulerConfig) -> Arc<StaticInventory> {
    Arc::new(StaticInventory::from_entries(&config.nodes))
}

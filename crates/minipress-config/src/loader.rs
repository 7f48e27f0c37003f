use std::fs;
use std::path::Path;

use minipress_common::{Error, Result};
use tracing::info;

use crate::model::StoreConfig;

/// Loads a [`StoreConfig`] from a YAML or TOML file, dispatching on the
/// file extension.
pub struct ConfigLoader;

impl ConfigLoader {
    pub fn load(path: &Path) -> Result<StoreConfig> {
        let raw = fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("failed to read {}: {e}", path.display())))?;

        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");
        let config: StoreConfig = match ext {
            "yaml" | "yml" => serde_yaml::from_str(&raw)
                .map_err(|e| Error::Config(format!("invalid yaml in {}: {e}", path.display())))?,
            "toml" => toml::from_str(&raw)
                .map_err(|e| Error::Config(format!("invalid toml in {}: {e}", path.display())))?,
            other => {
                return Err(Error::Config(format!(
                    "unsupported config extension {other:?} for {}",
                    path.display()
                )));
            }
        };

        config.validate()?;
        info!("loaded store config from {}", path.display());
        Ok(config)
    }
}

use std::path::Path;

use serde::{
    Deserialize,
    Serialize,
};

use crate::downsample::DownsampleConfig;
use crate::errors::{
    EngineError,
    Result,
};
use crate::ledger::LedgerConfig;
use crate::similarity::SimilarityConfig;

#[derive(Debug, Default, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct EngineConfig {
    pub downsample: DownsampleConfig,
    pub similarity: SimilarityConfig,
    pub ledger: LedgerConfig,
}

impl EngineConfig {
    pub fn from_toml(path: impl AsRef<Path>) -> Result<Self> {
        let config_str = std::fs::read_to_string(path)?;
        let config: EngineConfig = toml::from_str(&config_str)?;
        Ok(config)
    }

    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| EngineError::InvalidOption(e.to_string()))
    }

    /// Writes the config as a TOML template. Refuses to overwrite an
    /// existing file.
    pub fn write_template(
        &self,
        path: impl AsRef<Path>,
    ) -> Result<()> {
        let path = path.as_ref();
        if path.exists() {
            return Err(EngineError::InvalidOption(format!(
                "file already exists: {}",
                path.display()
            )));
        }
        std::fs::write(path, self.to_toml()?)?;
        Ok(())
    }
}

//! Ambient configuration (§2): solver timeout, default cost model, and
//! output format, loadable from a TOML file or built with [`Default`]
//! (teacher precedent: `DatabaseConfig`/`index::advisor::AdvisorConfig`).

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::error::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CostModelKind {
    EntryCount,
    FieldSize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputFormat {
    Json,
    Table,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AdvisorConfig {
    pub solver_timeout_secs: u64,
    pub cost_model: CostModelKind,
    pub output_format: OutputFormat,
}

impl Default for AdvisorConfig {
    fn default() -> Self {
        AdvisorConfig {
            solver_timeout_secs: 30,
            cost_model: CostModelKind::EntryCount,
            output_format: OutputFormat::Json,
        }
    }
}

impl AdvisorConfig {
    pub fn solver_timeout(&self) -> Duration {
        Duration::from_secs(self.solver_timeout_secs)
    }

    pub fn from_toml_file(path: &Path) -> Result<AdvisorConfig> {
        let text = std::fs::read_to_string(path)?;
        toml::from_str(&text).map_err(|e| crate::error::AdvisorError::Configuration(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_uses_entry_count_cost_model() {
        let config = AdvisorConfig::default();
        assert_eq!(config.cost_model, CostModelKind::EntryCount);
        assert_eq!(config.solver_timeout(), Duration::from_secs(30));
    }
}

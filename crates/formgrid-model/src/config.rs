use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{BindingPolicy, GridLimits};

/// Engine-wide settings shared by every template in a session.
///
/// Every field has a default, so `{}` is a valid configuration:
///
/// ```json
/// { "grid": { "minRows": 5, "maxColumns": 10 }, "bindingPolicy": "oneCellPerField" }
/// ```
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EngineConfig {
    pub grid: GridLimits,
    pub binding_policy: BindingPolicy,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid engine config: {0}")]
    Json(#[from] serde_json::Error),
    #[error("grid limits are inverted: {0}")]
    InvalidLimits(String),
}

impl EngineConfig {
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: EngineConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load_from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json(&json)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let g = &self.grid;
        if g.min_rows > g.max_rows {
            return Err(ConfigError::InvalidLimits(format!(
                "minRows {} > maxRows {}",
                g.min_rows, g.max_rows
            )));
        }
        if g.min_columns > g.max_columns {
            return Err(ConfigError::InvalidLimits(format!(
                "minColumns {} > maxColumns {}",
                g.min_columns, g.max_columns
            )));
        }
        Ok(())
    }
}

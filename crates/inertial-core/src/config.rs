//! Loading of material maps and link maps
//!
//! Everything is validated up front so that aggregation never starts on a
//! half-valid configuration.

use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::links::LinkMapping;
use crate::material::{MaterialRule, MaterialRules};

/// Prefix marking comment entries in link maps
pub const COMMENT_PREFIX: &str = "_";

/// Default density (kg/m³), PLA
pub const DEFAULT_DENSITY: f64 = 1250.0;

/// Configuration error types
#[derive(Debug, Clone, Error)]
pub enum ConfigError {
    #[error("IO error reading {path}: {reason}")]
    Io { path: String, reason: String },

    #[error("Failed to parse {what}: {reason}")]
    Parse { what: &'static str, reason: String },

    #[error("Material rule {index}: {reason}")]
    InvalidRule { index: usize, reason: String },

    #[error("Link '{link}': {reason}")]
    InvalidLink { link: String, reason: String },

    #[error("Invalid density {0} kg/m³ (must be finite and positive)")]
    InvalidDensity(f64),
}

/// Result type for configuration loading
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Material map file: `{"patterns": [...]}`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MaterialMap {
    #[serde(default)]
    pub patterns: Vec<MaterialRule>,
}

impl MaterialMap {
    /// Parse and validate a material map
    pub fn from_json_str(json: &str) -> ConfigResult<Self> {
        let map: Self = serde_json::from_str(json).map_err(|e| ConfigError::Parse {
            what: "material map",
            reason: e.to_string(),
        })?;
        map.validate()?;
        Ok(map)
    }

    pub fn load(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let path = path.as_ref();
        let map = Self::from_json_str(&read_file(path)?)?;
        tracing::info!("Loaded {} material patterns from {:?}", map.patterns.len(), path);
        Ok(map)
    }

    pub fn validate(&self) -> ConfigResult<()> {
        for (index, rule) in self.patterns.iter().enumerate() {
            if rule.pattern.is_empty() {
                return Err(ConfigError::InvalidRule {
                    index,
                    reason: "empty pattern".into(),
                });
            }
            if validate_density(rule.density).is_err() {
                return Err(ConfigError::InvalidRule {
                    index,
                    reason: format!("invalid density {}", rule.density),
                });
            }
        }
        Ok(())
    }

    pub fn into_rules(self) -> MaterialRules {
        MaterialRules::new(self.patterns)
    }
}

/// Check that a density is usable
pub fn validate_density(density: f64) -> ConfigResult<f64> {
    if density.is_finite() && density > 0.0 {
        Ok(density)
    } else {
        Err(ConfigError::InvalidDensity(density))
    }
}

/// Parse a link map: `{"link": ["part key", ...], "_comment": ...}`
///
/// Entries whose name starts with [`COMMENT_PREFIX`] are dropped whatever
/// their value. Declaration order is preserved.
pub fn parse_link_map(json: &str) -> ConfigResult<LinkMapping> {
    let value: Value = serde_json::from_str(json).map_err(|e| ConfigError::Parse {
        what: "link map",
        reason: e.to_string(),
    })?;
    let Value::Object(entries) = value else {
        return Err(ConfigError::Parse {
            what: "link map",
            reason: "expected an object of link name to part list".into(),
        });
    };

    let mut mapping = LinkMapping::new();
    for (link, keys) in entries {
        if link.starts_with(COMMENT_PREFIX) {
            continue;
        }
        let Value::Array(keys) = keys else {
            return Err(ConfigError::InvalidLink {
                link,
                reason: "expected a list of part keys".into(),
            });
        };
        let keys = keys
            .into_iter()
            .map(|key| match key {
                Value::String(key) => Ok(key),
                other => Err(other),
            })
            .collect::<Result<Vec<_>, _>>();
        match keys {
            Ok(keys) => mapping.add_link(link, keys),
            Err(other) => {
                return Err(ConfigError::InvalidLink {
                    link,
                    reason: format!("part key {} is not a string", other),
                });
            }
        }
    }
    Ok(mapping)
}

/// Load a link map file
pub fn load_link_map(path: impl AsRef<Path>) -> ConfigResult<LinkMapping> {
    let path = path.as_ref();
    let mapping = parse_link_map(&read_file(path)?)?;
    tracing::info!("Loaded {} links from {:?}", mapping.len(), path);
    Ok(mapping)
}

pub(crate) fn read_file(path: &Path) -> ConfigResult<String> {
    std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
        path: path.display().to_string(),
        reason: e.to_string(),
    })
}

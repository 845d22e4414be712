//! Integration configuration
//!
//! Read from the `home_connect_alt:` section of a YAML file:
//!
//! ```yaml
//! home_connect_alt:
//!   extra_ignore:
//!     - Cooking.Oven.Option.FastPreHeat
//!   icons:
//!     Dishwasher.Option.EcoMode: mdi:leaf
//!   option_entity_policy: recreate
//! ```

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::consts::DEFAULT_IGNORE;

/// Result type for configuration operations
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Errors that can occur during configuration loading
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read a file
    #[error("failed to read file {path}: {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Failed to parse YAML
    #[error("failed to parse YAML: {0}")]
    ParseYaml(#[from] serde_yaml::Error),

    /// Invalid configuration value
    #[error("invalid configuration value for '{key}': {reason}")]
    InvalidValue { key: String, reason: String },
}

/// What happens to an existing option entity when its appliance is rescanned
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OptionEntityPolicy {
    /// Drop the entity and register a fresh one
    Recreate,
    /// Keep the entity and re-publish its state
    #[default]
    UpdateInPlace,
}

/// Configuration of the integration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IntegrationConfig {
    /// Keys never exposed; replaces the built-in list when given
    pub ignore: Vec<String>,

    /// Keys ignored in addition to `ignore`
    pub extra_ignore: Vec<String>,

    /// Icon overrides by key
    pub icons: HashMap<String, String>,

    pub option_entity_policy: OptionEntityPolicy,
}

impl Default for IntegrationConfig {
    fn default() -> Self {
        Self {
            ignore: DEFAULT_IGNORE.iter().map(|k| k.to_string()).collect(),
            extra_ignore: Vec::new(),
            icons: HashMap::new(),
            option_entity_policy: OptionEntityPolicy::default(),
        }
    }
}

impl IntegrationConfig {
    /// Whether a key must not be exposed
    pub fn is_ignored(&self, key: &str) -> bool {
        self.ignore.iter().chain(&self.extra_ignore).any(|k| k == key)
    }

    /// Icon override for a key
    pub fn icon_for(&self, key: &str) -> Option<String> {
        self.icons.get(key).cloned()
    }

    /// Check values serde cannot check
    pub fn validate(&self) -> ConfigResult<()> {
        for (field, keys) in [("ignore", &self.ignore), ("extra_ignore", &self.extra_ignore)] {
            if keys.iter().any(|k| k.trim().is_empty()) {
                return Err(ConfigError::InvalidValue {
                    key: field.to_string(),
                    reason: "keys must not be empty".to_string(),
                });
            }
        }

        for (key, icon) in &self.icons {
            let valid = icon
                .split_once(':')
                .map(|(prefix, name)| !prefix.is_empty() && !name.is_empty())
                .unwrap_or(false);
            if !valid {
                return Err(ConfigError::InvalidValue {
                    key: format!("icons.{}", key),
                    reason: format!("'{}' is not of the form 'prefix:name'", icon),
                });
            }
        }
        Ok(())
    }
}

#[derive(Debug, Default, Deserialize)]
struct ConfigFile {
    #[serde(default)]
    home_connect_alt: Option<IntegrationConfig>,
}

/// Load the integration configuration from a YAML string
///
/// A missing or empty `home_connect_alt:` section yields the defaults.
pub fn load_config_str(content: &str) -> ConfigResult<IntegrationConfig> {
    let file: Option<ConfigFile> = serde_yaml::from_str(content)?;
    let config = file
        .and_then(|f| f.home_connect_alt)
        .unwrap_or_default();
    config.validate()?;

    debug!(
        ignored = config.ignore.len() + config.extra_ignore.len(),
        icons = config.icons.len(),
        policy = ?config.option_entity_policy,
        "Loaded integration configuration"
    );
    Ok(config)
}

/// Load the integration configuration from a YAML file
pub fn load_config_file(path: impl AsRef<Path>) -> ConfigResult<IntegrationConfig> {
    let path = path.as_ref();
    debug!("Loading configuration file: {:?}", path);

    let content = fs::read_to_string(path).map_err(|e| ConfigError::ReadFile {
        path: path.to_path_buf(),
        source: e,
    })?;
    load_config_str(&content)
}

use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

use crate::layout::SETTINGS_KEY_PREFIX;
use crate::projector::MAX_PARSE_DEPTH;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub persistence: PersistenceConfig,
    pub paging: PagingConfig,
    pub projector: ProjectorConfig,
    pub export: ExportConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PersistenceConfig {
    /// Prefix for persisted layout keys; the resource id is appended.
    pub namespace: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PagingConfig {
    /// Page sizes the size button cycles through, in order.
    pub sizes: Vec<usize>,

    /// Page size before any persisted value is loaded.
    pub default_limit: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProjectorConfig {
    /// Recursion cutoff for re-parsing nested JSON strings.
    pub max_parse_depth: usize,

    /// Rendered in place of missing/null values.
    pub placeholder: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportConfig {
    /// Spaces of label indentation per depth level.
    pub indent_width: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            persistence: PersistenceConfig::default(),
            paging: PagingConfig::default(),
            projector: ProjectorConfig::default(),
            export: ExportConfig::default(),
        }
    }
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            namespace: SETTINGS_KEY_PREFIX.to_string(),
        }
    }
}

impl Default for PagingConfig {
    fn default() -> Self {
        Self {
            sizes: vec![10, 20, 50, 100],
            default_limit: 20,
        }
    }
}

impl Default for ProjectorConfig {
    fn default() -> Self {
        Self {
            max_parse_depth: MAX_PARSE_DEPTH,
            placeholder: "-".to_string(),
        }
    }
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            indent_width: crate::pivot::export::INDENT_WIDTH,
        }
    }
}

impl EngineConfig {
    /// Load config from the default location, creating it on first run.
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path()?;

        if !config_path.exists() {
            let default_config = Self::default();
            default_config.save()?;
            return Ok(default_config);
        }

        let contents = fs::read_to_string(&config_path)?;
        let config: EngineConfig = toml::from_str(&contents)?;
        Ok(config)
    }

    pub fn save(&self) -> Result<()> {
        let config_path = Self::config_path()?;
        if let Some(parent) = config_path.parent() {
            fs::create_dir_all(parent)?;
        }
        let contents = toml::to_string_pretty(self)?;
        fs::write(&config_path, contents)?;
        Ok(())
    }

    fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow!("Could not determine config directory"))?;
        Ok(config_dir.join("datagrid-state").join("config.toml"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sensible() {
        let config = EngineConfig::default();
        assert_eq!(config.paging.sizes, vec![10, 20, 50, 100]);
        assert_eq!(config.paging.default_limit, 20);
        assert_eq!(config.persistence.namespace, "dg_settings_v1_");
        assert_eq!(config.export.indent_width, 4);
    }

    #[test]
    fn partial_toml_fills_in_defaults() {
        let config: EngineConfig = toml::from_str(
            r#"
            [paging]
            default_limit = 50
            "#,
        )
        .unwrap();
        assert_eq!(config.paging.default_limit, 50);
        assert_eq!(config.paging.sizes, vec![10, 20, 50, 100]);
        assert_eq!(config.projector.placeholder, "-");
    }

    #[test]
    fn round_trips_through_toml() {
        let config = EngineConfig::default();
        let text = toml::to_string_pretty(&config).unwrap();
        let back: EngineConfig = toml::from_str(&text).unwrap();
        assert_eq!(back.paging.sizes, config.paging.sizes);
        assert_eq!(back.persistence.namespace, config.persistence.namespace);
    }
}

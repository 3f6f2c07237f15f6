// Export settings
// Loaded from ~/.config/formulia/settings.toml, or an explicit path

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::catalog::{default_catalog, validate_catalog, TopicPrice};
use crate::cost_layout::CostLayout;
use crate::document_layout::DocumentLayout;
use crate::error::ConfigError;

/// Default template locations, used when the CLI gets no `--template`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TemplatePaths {
    pub cost: Option<PathBuf>,
    pub proposal: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ExportSettings {
    pub templates: TemplatePaths,
    pub cost: CostLayout,
    pub document: DocumentLayout,
    pub catalog: Vec<TopicPrice>,
}

impl Default for ExportSettings {
    fn default() -> Self {
        Self {
            templates: TemplatePaths::default(),
            cost: CostLayout::default(),
            document: DocumentLayout::default(),
            catalog: default_catalog(),
        }
    }
}

impl ExportSettings {
    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("formulia")
            .join("settings.toml")
    }

    pub fn from_toml(input: &str) -> Result<Self, ConfigError> {
        let settings: ExportSettings =
            toml::from_str(input).map_err(|e| ConfigError::Parse(e.to_string()))?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.cost.validate()?;
        self.document.validate()?;
        validate_catalog(&self.catalog)
    }

    /// Load from `path` when given (must exist), otherwise from the default
    /// location, falling back to built-in defaults when that file is absent.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let (path, required) = match path {
            Some(p) => (p.to_path_buf(), true),
            None => (Self::config_path(), false),
        };

        if !required && !path.exists() {
            log::debug!("no settings at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(&path)
            .map_err(|e| ConfigError::Io(format!("{}: {e}", path.display())))?;
        let settings = Self::from_toml(&contents)?;
        log::info!("loaded settings from {}", path.display());
        Ok(settings)
    }
}

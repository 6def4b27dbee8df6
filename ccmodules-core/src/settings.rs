//! Persisted connection and layout settings
//!
//! Settings live in `settings.yaml` under the platform config directory
//! (e.g. `~/.config/ccmodules/settings.yaml` on Linux). Every required field
//! must be non-empty before the manager talks to the remote directory.
//!
//! ```yaml
//! baseUrl: https://gitlab.example.com/api/v4/groups/42
//! privateToken: glpat-xxxxxxxx
//! prefixes: ccc,ui
//! moduleDirectory: modules
//! archiveFormat: zip
//! ```

use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::archive::ArchiveFormat;
use crate::error::{ModuleError, Result};

/// Environment variable that overrides the stored private token
pub const PRIVATE_TOKEN_ENV: &str = "CCMODULES_PRIVATE_TOKEN";

const SETTINGS_FILE: &str = "settings.yaml";

/// Connection and layout settings
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    /// GitLab group endpoint, e.g. `https://host/api/v4/groups/42`
    #[serde(default)]
    pub base_url: String,

    /// Token sent as `PRIVATE-TOKEN`
    #[serde(default)]
    pub private_token: String,

    /// Comma-separated project name prefixes to show
    #[serde(default)]
    pub prefixes: String,

    /// Directory under the assets root that receives installed modules
    #[serde(default)]
    pub module_directory: String,

    /// Archive format requested from the remote
    #[serde(default)]
    pub archive_format: ArchiveFormat,
}

impl Settings {
    /// Required fields in declaration order, keyed by their persisted names
    pub fn required_fields(&self) -> [(&'static str, &str); 4] {
        [
            ("baseUrl", self.base_url.as_str()),
            ("privateToken", self.private_token.as_str()),
            ("prefixes", self.prefixes.as_str()),
            ("moduleDirectory", self.module_directory.as_str()),
        ]
    }

    /// Name of the first empty required field, if any
    pub fn first_empty_field(&self) -> Option<&'static str> {
        self.required_fields()
            .into_iter()
            .find(|(_, value)| value.trim().is_empty())
            .map(|(name, _)| name)
    }

    pub fn is_configured(&self) -> bool {
        self.first_empty_field().is_none()
    }

    pub fn validate(&self) -> Result<()> {
        match self.first_empty_field() {
            Some(field) => Err(ModuleError::Configuration { field }),
            None => Ok(()),
        }
    }

    /// Allowed name prefixes, trimmed, empty entries dropped
    pub fn prefix_list(&self) -> Vec<&str> {
        self.prefixes
            .split(',')
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .collect()
    }

    /// Replace the private token with `CCMODULES_PRIVATE_TOKEN` when set
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(token) = std::env::var(PRIVATE_TOKEN_ENV) {
            if !token.trim().is_empty() {
                tracing::debug!("Using private token from {}", PRIVATE_TOKEN_ENV);
                self.private_token = token;
            }
        }
        self
    }
}

/// Durable storage for [`Settings`]
#[derive(Debug, Clone)]
pub struct SettingsStore {
    path: PathBuf,
}

impl SettingsStore {
    /// Store at the default platform location
    pub fn open_default() -> Result<Self> {
        let path = Self::default_path().map_err(|source| ModuleError::SettingsStore {
            path: PathBuf::from(SETTINGS_FILE),
            source,
        })?;
        Ok(Self { path })
    }

    /// Store at a specific file path
    pub fn at(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn default_path() -> anyhow::Result<PathBuf> {
        let config_dir = directories::ProjectDirs::from("io", "ccmodules", "ccmodules")
            .map(|dirs| dirs.config_dir().to_path_buf())
            .or_else(|| dirs::config_dir().map(|d| d.join("ccmodules")))
            .context("Could not determine config directory")?;

        Ok(config_dir.join(SETTINGS_FILE))
    }

    /// Load settings, returning defaults when nothing has been saved yet
    pub fn load(&self) -> Result<Settings> {
        if !self.path.exists() {
            return Ok(Settings::default());
        }

        let content = std::fs::read_to_string(&self.path)
            .context("Failed to read settings")
            .map_err(|source| self.store_error(source))?;

        serde_yaml_ng::from_str(&content)
            .context("Failed to parse settings")
            .map_err(|source| self.store_error(source))
    }

    /// Persist settings; callers validate first
    pub fn save(&self, settings: &Settings) -> Result<()> {
        self.write(settings)
            .map_err(|source| self.store_error(source))?;

        tracing::debug!("Saved settings to {}", self.path.display());
        Ok(())
    }

    fn write(&self, settings: &Settings) -> anyhow::Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }

        let content = serde_yaml_ng::to_string(settings).context("Failed to serialize settings")?;
        std::fs::write(&self.path, content).context("Failed to write settings")?;
        Ok(())
    }

    fn store_error(&self, source: anyhow::Error) -> ModuleError {
        ModuleError::SettingsStore {
            path: self.path.clone(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use tempfile::TempDir;

    fn complete() -> Settings {
        Settings {
            base_url: "https://gitlab.example.com/api/v4/groups/7".to_string(),
            private_token: "secret".to_string(),
            prefixes: "ccc,ui".to_string(),
            module_directory: "modules".to_string(),
            archive_format: ArchiveFormat::Zip,
        }
    }

    #[test]
    fn test_first_empty_field_follows_declaration_order() {
        let mut settings = complete();
        settings.prefixes.clear();
        settings.private_token.clear();

        assert_eq!(settings.first_empty_field(), Some("privateToken"));
        assert!(!settings.is_configured());
    }

    #[test]
    fn test_whitespace_counts_as_empty() {
        let mut settings = complete();
        settings.module_directory = "   ".to_string();

        let err = settings.validate().unwrap_err();
        assert_eq!(err.to_string(), "moduleDirectory can not be empty!");
    }

    #[test]
    fn test_prefix_list_trims_entries() {
        let mut settings = complete();
        settings.prefixes = " ccc, ui ,,net".to_string();
        assert_eq!(settings.prefix_list(), vec!["ccc", "ui", "net"]);
    }

    #[test]
    fn test_load_missing_returns_default() {
        let temp_dir = TempDir::new().unwrap();
        let store = SettingsStore::at(temp_dir.path().join("settings.yaml"));

        let settings = store.load().unwrap();
        assert_eq!(settings, Settings::default());
        assert_eq!(settings.first_empty_field(), Some("baseUrl"));
    }

    #[test]
    fn test_save_and_load() {
        let temp_dir = TempDir::new().unwrap();
        let store = SettingsStore::at(temp_dir.path().join("nested").join("settings.yaml"));

        store.save(&complete()).unwrap();

        let content = std::fs::read_to_string(store.path()).unwrap();
        assert!(content.contains("privateToken: secret"));
        assert!(content.contains("moduleDirectory: modules"));

        assert_eq!(store.load().unwrap(), complete());
    }

    #[test]
    fn test_load_rejects_corrupt_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("settings.yaml");
        std::fs::write(&path, "baseUrl: [unterminated").unwrap();

        let err = SettingsStore::at(&path).load().unwrap_err();
        assert!(matches!(err, ModuleError::SettingsStore { .. }));
    }

    #[test]
    #[serial]
    fn test_env_override_replaces_token() {
        std::env::set_var(PRIVATE_TOKEN_ENV, "from-env");
        let settings = complete().with_env_overrides();
        std::env::remove_var(PRIVATE_TOKEN_ENV);

        assert_eq!(settings.private_token, "from-env");
    }

    #[test]
    #[serial]
    fn test_empty_env_override_is_ignored() {
        std::env::set_var(PRIVATE_TOKEN_ENV, "");
        let settings = complete().with_env_overrides();
        std::env::remove_var(PRIVATE_TOKEN_ENV);

        assert_eq!(settings.private_token, "secret");
    }
}

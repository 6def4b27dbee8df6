//! Installed module manifest (package.json)
//!
//! Only the `version` field matters here; every other key is ignored.

use serde::Deserialize;
use std::path::Path;

/// Label shown when no manifest exists
pub const NOT_INSTALLED: &str = "N/A";

/// Label shown when a manifest exists but carries no usable version
pub const UNKNOWN_VERSION: &str = "unknown";

/// Manifest file name inside an installed module
pub const MANIFEST_FILE: &str = "package.json";

/// The subset of `package.json` read by the resolver
#[derive(Debug, Clone, Deserialize)]
pub struct ModuleManifest {
    #[serde(default)]
    pub version: Option<String>,
}

impl ModuleManifest {
    pub fn from_json(content: &str) -> serde_json::Result<Self> {
        serde_json::from_str(content)
    }
}

/// Version state of a locally installed module, recomputed on every lookup
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InstalledState {
    /// Manifest present with a version string
    Version(String),
    /// Manifest present but unreadable or without a version
    Unknown,
    /// No manifest file
    NotInstalled,
}

impl InstalledState {
    /// Read the state from a manifest path
    pub fn read(manifest_path: &Path) -> Self {
        if !manifest_path.exists() {
            return InstalledState::NotInstalled;
        }

        let content = match std::fs::read_to_string(manifest_path) {
            Ok(content) => content,
            Err(e) => {
                tracing::debug!("Failed to read {}: {}", manifest_path.display(), e);
                return InstalledState::Unknown;
            }
        };

        match ModuleManifest::from_json(&content) {
            Ok(ModuleManifest {
                version: Some(version),
            }) if !version.is_empty() => InstalledState::Version(version),
            Ok(_) => InstalledState::Unknown,
            Err(e) => {
                tracing::debug!("Invalid manifest {}: {}", manifest_path.display(), e);
                InstalledState::Unknown
            }
        }
    }

    /// The label a version picker shows for this state
    pub fn label(&self) -> &str {
        match self {
            InstalledState::Version(version) => version,
            InstalledState::Unknown => UNKNOWN_VERSION,
            InstalledState::NotInstalled => NOT_INSTALLED,
        }
    }
}

impl std::fmt::Display for InstalledState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// True for the placeholder labels that cannot be installed
pub fn is_sentinel(version_name: &str) -> bool {
    version_name == NOT_INSTALLED || version_name == UNKNOWN_VERSION
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn state_for(content: Option<&str>) -> InstalledState {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join(MANIFEST_FILE);
        if let Some(content) = content {
            std::fs::write(&path, content).unwrap();
        }
        InstalledState::read(&path)
    }

    #[test]
    fn test_missing_manifest() {
        assert_eq!(state_for(None), InstalledState::NotInstalled);
        assert_eq!(state_for(None).label(), "N/A");
    }

    #[test]
    fn test_manifest_with_version() {
        let state = state_for(Some(r#"{"name": "ccc-ui", "version": "1.2.0"}"#));
        assert_eq!(state, InstalledState::Version("1.2.0".to_string()));
    }

    #[test]
    fn test_manifest_without_version() {
        assert_eq!(state_for(Some(r#"{"name": "ccc-ui"}"#)), InstalledState::Unknown);
        assert_eq!(state_for(Some(r#"{"version": ""}"#)), InstalledState::Unknown);
    }

    #[test]
    fn test_unparsable_manifest() {
        assert_eq!(state_for(Some("{ not json")), InstalledState::Unknown);
        assert_eq!(state_for(Some(r#"{"version": 3}"#)), InstalledState::Unknown);
        assert_eq!(state_for(Some("[]")).label(), "unknown");
    }

    #[test]
    fn test_sentinels() {
        assert!(is_sentinel("N/A"));
        assert!(is_sentinel("unknown"));
        assert!(!is_sentinel("master"));
        assert!(!is_sentinel("v1.0.0"));
    }
}

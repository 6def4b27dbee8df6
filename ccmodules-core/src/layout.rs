//! On-disk layout of an editor project
//!
//! ```text
//! <project>/
//! ├── assets/                      ← assets root
//! │   └── <moduleDirectory>/
//! │       └── <projectName>/       ← install destination
//! │           └── package.json     ← manifest
//! └── cache/                       ← downloaded archives
//! ```

use std::path::{Path, PathBuf};

use crate::manifest::MANIFEST_FILE;

const CACHE_DIR: &str = "cache";

/// Resolves install, manifest and cache paths
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleLayout {
    assets_root: PathBuf,
    module_directory: String,
    cache_dir: PathBuf,
}

impl ModuleLayout {
    /// Layout with the cache directory beside the assets root
    pub fn new(assets_root: impl Into<PathBuf>, module_directory: impl Into<String>) -> Self {
        let assets_root = assets_root.into();
        let cache_dir = assets_root
            .parent()
            .map(|p| p.join(CACHE_DIR))
            .unwrap_or_else(|| PathBuf::from(CACHE_DIR));

        Self {
            assets_root,
            module_directory: module_directory.into(),
            cache_dir,
        }
    }

    pub fn with_cache_dir(mut self, cache_dir: impl Into<PathBuf>) -> Self {
        self.cache_dir = cache_dir.into();
        self
    }

    pub fn assets_root(&self) -> &Path {
        &self.assets_root
    }

    pub fn module_directory(&self) -> &str {
        &self.module_directory
    }

    /// Directory holding every installed module
    pub fn module_root(&self) -> PathBuf {
        self.assets_root.join(&self.module_directory)
    }

    /// Final location of an installed project
    pub fn install_path(&self, project_name: &str) -> PathBuf {
        self.module_root().join(project_name)
    }

    pub fn manifest_path(&self, project_name: &str) -> PathBuf {
        self.install_path(project_name).join(MANIFEST_FILE)
    }

    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }
}

//! Module installation from the remote directory
//!
//! Downloads a project snapshot, unpacks it into a staging directory inside
//! the module root, and renames the unpacked tree into
//! `{moduleRoot}/{projectName}`. An existing install is never overwritten;
//! the final rename is the only step that makes a module visible.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use tracing::{debug, info, warn};

use crate::archive::{ref_label, ArchiveFormat, ArchiveStore};
use crate::error::{ModuleError, Result};
use crate::layout::ModuleLayout;
use crate::manifest::{is_sentinel, MANIFEST_FILE};
use crate::remote::{BranchInfo, ProjectId, RemoteDirectory};
use crate::resolver::VersionCandidateList;

/// A user request to install one version of a project
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallRequest {
    pub project_id: ProjectId,
    pub project_name: String,
    pub version_name: String,
}

impl InstallRequest {
    pub fn new(
        project_id: ProjectId,
        project_name: impl Into<String>,
        version_name: impl Into<String>,
    ) -> Self {
        Self {
            project_id,
            project_name: project_name.into(),
            version_name: version_name.into(),
        }
    }
}

/// Result of a completed install
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallOutcome {
    pub project_name: String,
    pub version_name: String,
    pub commit_id: String,
    pub archive_path: PathBuf,
    pub install_path: PathBuf,
}

/// Receiver of "assets changed" notifications after an install
pub trait AssetRegistry: Send + Sync {
    fn refresh(&self, root: &Path);
}

/// Asset registry that ignores notifications
pub struct NoopAssetRegistry;

impl AssetRegistry for NoopAssetRegistry {
    fn refresh(&self, _root: &Path) {}
}

/// Asset registry that only logs notifications
pub struct LoggingAssetRegistry;

impl AssetRegistry for LoggingAssetRegistry {
    fn refresh(&self, root: &Path) {
        info!("Assets changed under {}", root.display());
    }
}

/// Marks a project as being installed until dropped
struct InFlightGuard {
    active: Arc<Mutex<HashSet<String>>>,
    project: String,
}

impl InFlightGuard {
    fn acquire(active: &Arc<Mutex<HashSet<String>>>, project: &str) -> Result<Self> {
        let mut set = active.lock().unwrap_or_else(PoisonError::into_inner);
        if !set.insert(project.to_string()) {
            return Err(ModuleError::InstallInProgress {
                project: project.to_string(),
            });
        }

        Ok(Self {
            active: Arc::clone(active),
            project: project.to_string(),
        })
    }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.active
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.project);
    }
}

/// Move an extracted module into place, refusing to replace anything
///
/// The destination is reserved with `create_dir` so a directory created
/// after the conflict check, even an empty one, fails the move.
pub fn place_module(from: &Path, to: &Path) -> Result<()> {
    let move_error = |source: std::io::Error| ModuleError::Move {
        from: from.to_path_buf(),
        to: to.to_path_buf(),
        source,
    };

    std::fs::create_dir(to).map_err(move_error)?;

    if let Err(e) = move_entries(from, to) {
        let _ = std::fs::remove_dir_all(to);
        return Err(move_error(e));
    }

    std::fs::remove_dir(from).map_err(move_error)
}

fn move_entries(from: &Path, to: &Path) -> std::io::Result<()> {
    for entry in std::fs::read_dir(from)? {
        let entry = entry?;
        std::fs::rename(entry.path(), to.join(entry.file_name()))?;
    }
    Ok(())
}

/// Download, extract and place pipeline
pub struct InstallPipeline {
    remote: Arc<dyn RemoteDirectory>,
    layout: ModuleLayout,
    archives: ArchiveStore,
    format: ArchiveFormat,
    registry: Arc<dyn AssetRegistry>,
    in_flight: Arc<Mutex<HashSet<String>>>,
}

impl InstallPipeline {
    pub fn new(
        remote: Arc<dyn RemoteDirectory>,
        layout: ModuleLayout,
        format: ArchiveFormat,
    ) -> Self {
        let archives = ArchiveStore::new(layout.cache_dir());
        Self {
            remote,
            layout,
            archives,
            format,
            registry: Arc::new(NoopAssetRegistry),
            in_flight: Arc::new(Mutex::new(HashSet::new())),
        }
    }

    pub fn with_asset_registry(mut self, registry: Arc<dyn AssetRegistry>) -> Self {
        self.registry = registry;
        self
    }

    pub fn layout(&self) -> &ModuleLayout {
        &self.layout
    }

    /// Install one version of a project
    ///
    /// `versions` and `branch` are the latest resolution results for the
    /// project; the commit id comes from the matching tag, falling back to
    /// the default branch.
    pub async fn install(
        &self,
        request: &InstallRequest,
        versions: Option<&VersionCandidateList>,
        branch: Option<&BranchInfo>,
    ) -> Result<InstallOutcome> {
        let name = request.project_name.as_str();
        let version = request.version_name.as_str();

        if is_sentinel(version) {
            return Err(ModuleError::Validation(
                "Please select a valid tag!".to_string(),
            ));
        }

        let _guard = InFlightGuard::acquire(&self.in_flight, name)?;

        let module_root = self.layout.module_root();
        if !module_root.exists() {
            std::fs::create_dir_all(&module_root)?;
        }

        let install_path = self.layout.install_path(name);
        if install_path.exists() {
            return Err(ModuleError::Conflict { path: install_path });
        }

        let commit_id = versions
            .and_then(|v| v.commit_for(version))
            .or_else(|| branch.map(|b| b.commit.id.as_str()))
            .map(str::to_string)
            .ok_or_else(|| ModuleError::VersionResolution {
                project: name.to_string(),
                source: anyhow::anyhow!("No commit known for '{version}'"),
            })?;

        info!("Downloading {}@{} ({})", name, version, commit_id);

        let bytes = self
            .remote
            .download_archive(request.project_id, version, self.format)
            .await
            .map_err(|source| self.download_error(request, source))?;

        let archive_path = self
            .archives
            .persist(name, version, self.format, &bytes)
            .map_err(|source| self.download_error(request, source))?;

        // Removed on drop, whatever happens below
        let staging = tempfile::Builder::new()
            .prefix(".ccmodules-")
            .tempdir_in(&module_root)?;

        let extract_error = |source: anyhow::Error| ModuleError::Extract {
            archive: archive_path.clone(),
            source,
        };

        ArchiveStore::extract(&archive_path, self.format, staging.path())
            .await
            .map_err(extract_error)?;

        let extracted_name = format!("{}-{}-{}", name, ref_label(version), commit_id);
        let extracted = staging.path().join(&extracted_name);
        if !extracted.is_dir() {
            return Err(extract_error(anyhow::anyhow!(
                "expected directory '{extracted_name}' not found in archive"
            )));
        }

        place_module(&extracted, &install_path)?;

        info!("Installed {}@{} to {}", name, version, install_path.display());
        self.registry.refresh(&module_root);

        Ok(InstallOutcome {
            project_name: name.to_string(),
            version_name: version.to_string(),
            commit_id,
            archive_path,
            install_path,
        })
    }

    fn download_error(&self, request: &InstallRequest, source: anyhow::Error) -> ModuleError {
        warn!(
            "Download of {}@{} failed: {:#}",
            request.project_name, request.version_name, source
        );
        ModuleError::Download {
            project: request.project_name.clone(),
            version: request.version_name.clone(),
            source,
        }
    }

    /// Remove an installed module
    pub fn uninstall(&self, project_name: &str) -> Result<PathBuf> {
        let install_path = self.layout.install_path(project_name);

        if !install_path.exists() {
            return Err(ModuleError::Validation(format!(
                "Module '{project_name}' is not installed"
            )));
        }

        let _guard = InFlightGuard::acquire(&self.in_flight, project_name)?;
        std::fs::remove_dir_all(&install_path)?;

        info!("Uninstalled module: {}", project_name);
        self.registry.refresh(&self.layout.module_root());
        Ok(install_path)
    }

    pub fn is_installed(&self, project_name: &str) -> bool {
        self.layout.install_path(project_name).exists()
    }

    /// Names of installed modules that carry a manifest
    pub fn list_installed(&self) -> Result<Vec<String>> {
        let module_root = self.layout.module_root();
        if !module_root.exists() {
            return Ok(Vec::new());
        }

        let mut installed = Vec::new();
        for entry in std::fs::read_dir(&module_root)? {
            let entry = entry?;
            if entry.path().is_dir() && entry.path().join(MANIFEST_FILE).exists() {
                if let Some(name) = entry.file_name().to_str() {
                    installed.push(name.to_string());
                }
            }
        }

        installed.sort();
        debug!("Found {} installed modules", installed.len());
        Ok(installed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_in_flight_guard_is_exclusive_per_project() {
        let active = Arc::new(Mutex::new(HashSet::new()));

        let guard = InFlightGuard::acquire(&active, "ccc-ui").unwrap();
        let second = InFlightGuard::acquire(&active, "ccc-ui");
        assert!(matches!(
            second,
            Err(ModuleError::InstallInProgress { ref project }) if project == "ccc-ui"
        ));

        // Other projects are unaffected
        let _other = InFlightGuard::acquire(&active, "ccc-net").unwrap();

        drop(guard);
        assert!(InFlightGuard::acquire(&active, "ccc-ui").is_ok());
    }

    #[test]
    fn test_place_module_moves_directory() {
        let temp_dir = TempDir::new().unwrap();
        let from = temp_dir.path().join("ccc-ui-master-abc");
        std::fs::create_dir_all(&from).unwrap();
        std::fs::write(from.join("package.json"), "{}").unwrap();

        std::fs::create_dir_all(from.join("src/widgets")).unwrap();
        std::fs::write(from.join("src/widgets/button.ts"), "export {};").unwrap();

        let to = temp_dir.path().join("ccc-ui");
        place_module(&from, &to).unwrap();

        assert!(to.join("package.json").exists());
        assert!(to.join("src/widgets/button.ts").exists());
        assert!(!from.exists());
    }

    #[test]
    fn test_place_module_refuses_existing_destination() {
        let temp_dir = TempDir::new().unwrap();
        let from = temp_dir.path().join("extracted");
        let to = temp_dir.path().join("ccc-ui");
        std::fs::create_dir_all(&from).unwrap();
        std::fs::write(from.join("package.json"), "{}").unwrap();
        std::fs::create_dir_all(&to).unwrap();

        let err = place_module(&from, &to).unwrap_err();
        assert!(matches!(err, ModuleError::Move { .. }));
        assert!(from.join("package.json").exists());
        // The empty directory that won the race is left alone
        assert_eq!(std::fs::read_dir(&to).unwrap().count(), 0);
    }
}

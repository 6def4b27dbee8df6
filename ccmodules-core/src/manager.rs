//! Module manager - ties catalog, resolver and installer together
//!
//! Holds the state a front end renders: the project list, per-project
//! candidate versions and branch info, per-project row state, and the last
//! error message. All user actions go through here:
//!
//! - [`ModuleManager::refresh`] re-lists projects and resolves every
//!   project's versions concurrently
//! - [`ModuleManager::request_install`] runs the install pipeline and
//!   refreshes on success
//! - [`ModuleManager::save_settings`] validates and persists settings and
//!   reconnects to the remote directory
//!
//! State is kept behind a mutex that is never held across an `.await`.

use futures::StreamExt;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, info, warn};

use crate::catalog::ProjectCatalog;
use crate::error::{ModuleError, Result};
use crate::installer::{
    AssetRegistry, InstallOutcome, InstallPipeline, InstallRequest, NoopAssetRegistry,
};
use crate::layout::ModuleLayout;
use crate::manifest::InstalledState;
use crate::remote::{BranchInfo, GitLabDirectory, Project, ProjectId, RemoteDirectory};
use crate::resolver::{ProjectResolution, VersionCandidateList, VersionResolver};
use crate::settings::{Settings, SettingsStore};

/// Builds a remote directory client from settings
pub type RemoteConnector =
    Arc<dyn Fn(&Settings) -> anyhow::Result<Arc<dyn RemoteDirectory>> + Send + Sync>;

/// Connector for the GitLab REST API
pub fn gitlab_connector() -> RemoteConnector {
    Arc::new(
        |settings: &Settings| -> anyhow::Result<Arc<dyn RemoteDirectory>> {
            let directory = GitLabDirectory::from_settings(settings)?;
            Ok(Arc::new(directory))
        },
    )
}

/// Per-project row state
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RowState {
    Unresolved,
    Resolving,
    Resolved,
    ResolutionFailed(String),
    Installing(String),
}

/// Snapshot of everything a front end renders
#[derive(Debug, Clone, Default)]
pub struct PanelState {
    pub projects: Vec<Project>,
    pub versions: HashMap<ProjectId, VersionCandidateList>,
    pub branches: HashMap<ProjectId, BranchInfo>,
    pub rows: HashMap<ProjectId, RowState>,
    pub last_error: Option<String>,
}

/// Summary of one refresh
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RefreshReport {
    pub projects: usize,
    pub resolved: usize,
    /// Projects whose tag or branch lookup failed, with the message
    pub failed: Vec<(ProjectId, String)>,
}

/// Filesystem and notification options fixed for the manager's lifetime
#[derive(Clone)]
pub struct ManagerOptions {
    pub assets_root: PathBuf,
    pub cache_dir: Option<PathBuf>,
    pub asset_registry: Arc<dyn AssetRegistry>,
}

impl ManagerOptions {
    pub fn new(assets_root: impl Into<PathBuf>) -> Self {
        Self {
            assets_root: assets_root.into(),
            cache_dir: None,
            asset_registry: Arc::new(NoopAssetRegistry),
        }
    }

    pub fn with_cache_dir(mut self, cache_dir: impl Into<PathBuf>) -> Self {
        self.cache_dir = Some(cache_dir.into());
        self
    }

    pub fn with_asset_registry(mut self, registry: Arc<dyn AssetRegistry>) -> Self {
        self.asset_registry = registry;
        self
    }

    fn layout(&self, settings: &Settings) -> ModuleLayout {
        let layout = ModuleLayout::new(&self.assets_root, settings.module_directory.trim());
        match &self.cache_dir {
            Some(dir) => layout.with_cache_dir(dir),
            None => layout,
        }
    }
}

/// Components built from one settings value
struct Components {
    catalog: ProjectCatalog,
    resolver: VersionResolver,
    installer: InstallPipeline,
}

impl Components {
    fn build(
        settings: &Settings,
        options: &ManagerOptions,
        connect: &RemoteConnector,
    ) -> Result<Self> {
        let remote =
            connect(settings).map_err(|e| ModuleError::DirectoryFetch(format!("{e:#}")))?;
        let layout = options.layout(settings);
        let prefixes = settings
            .prefix_list()
            .into_iter()
            .map(str::to_string)
            .collect();

        Ok(Self {
            catalog: ProjectCatalog::new(Arc::clone(&remote), prefixes),
            resolver: VersionResolver::new(Arc::clone(&remote), layout.clone()),
            installer: InstallPipeline::new(remote, layout, settings.archive_format)
                .with_asset_registry(Arc::clone(&options.asset_registry)),
        })
    }
}

/// Orchestrates listing, resolution and installation
pub struct ModuleManager {
    settings: Settings,
    store: SettingsStore,
    options: ManagerOptions,
    connect: RemoteConnector,
    components: Option<Components>,
    state: Mutex<PanelState>,
}

impl ModuleManager {
    /// Create a manager; components are only built once settings are complete
    pub fn new(
        settings: Settings,
        store: SettingsStore,
        options: ManagerOptions,
        connect: RemoteConnector,
    ) -> Result<Self> {
        let components = if settings.is_configured() {
            Some(Components::build(&settings, &options, &connect)?)
        } else {
            debug!("Settings incomplete; remote directory not connected");
            None
        };

        Ok(Self {
            settings,
            store,
            options,
            connect,
            components,
            state: Mutex::new(PanelState::default()),
        })
    }

    fn lock(&self) -> MutexGuard<'_, PanelState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn components(&self) -> Result<&Components> {
        self.settings.validate()?;
        self.components.as_ref().ok_or(ModuleError::Configuration {
            field: "baseUrl",
        })
    }

    fn record_error(&self, error: &ModuleError) {
        self.lock().last_error = Some(error.user_message());
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn layout(&self) -> ModuleLayout {
        self.options.layout(&self.settings)
    }

    /// Snapshot of the current state
    pub fn state(&self) -> PanelState {
        self.lock().clone()
    }

    pub fn projects(&self) -> Vec<Project> {
        self.lock().projects.clone()
    }

    pub fn candidates(&self, project_id: ProjectId) -> Option<VersionCandidateList> {
        self.lock().versions.get(&project_id).cloned()
    }

    pub fn branch(&self, project_id: ProjectId) -> Option<BranchInfo> {
        self.lock().branches.get(&project_id).cloned()
    }

    pub fn row_state(&self, project_id: ProjectId) -> RowState {
        self.lock()
            .rows
            .get(&project_id)
            .cloned()
            .unwrap_or(RowState::Unresolved)
    }

    pub fn last_error(&self) -> Option<String> {
        self.lock().last_error.clone()
    }

    pub fn clear_error(&self) {
        self.lock().last_error = None;
    }

    /// Installed state of a project, read fresh from disk
    pub fn installed_state(&self, project_name: &str) -> InstalledState {
        InstalledState::read(&self.layout().manifest_path(project_name))
    }

    /// Re-list projects and resolve each project's versions
    pub async fn refresh(&self) -> Result<RefreshReport> {
        let components = self.components().inspect_err(|e| self.record_error(e))?;

        let projects = match components.catalog.list_projects().await {
            Ok(projects) => projects,
            Err(e) => {
                warn!("Project listing failed: {}", e);
                let mut state = self.lock();
                state.projects.clear();
                state.versions.clear();
                state.branches.clear();
                state.rows.clear();
                state.last_error = Some(e.user_message());
                return Err(e);
            }
        };

        {
            let mut state = self.lock();
            state.last_error = None;
            state.projects = projects.clone();
            state.versions.clear();
            state.branches.clear();
            state.rows = projects
                .iter()
                .map(|p| (p.id, RowState::Resolving))
                .collect();
        }

        let mut report = RefreshReport {
            projects: projects.len(),
            ..Default::default()
        };

        let mut tasks = ProjectCatalog::resolution_tasks(&components.resolver, &projects);
        while let Some(resolution) = tasks.next().await {
            self.apply_resolution(resolution, &mut report);
        }

        info!(
            "Refresh complete: {} projects, {} resolved, {} failed",
            report.projects,
            report.resolved,
            report.failed.len()
        );
        Ok(report)
    }

    fn apply_resolution(&self, resolution: ProjectResolution, report: &mut RefreshReport) {
        let ProjectResolution {
            project_id,
            versions,
            branch,
        } = resolution;
        let mut state = self.lock();

        match branch {
            Ok(branch) => {
                state.branches.insert(project_id, branch);
            }
            Err(e) => {
                let message = e.user_message();
                warn!("Branch lookup failed for project {}: {}", project_id, message);
                report.failed.push((project_id, message));
            }
        }

        match versions {
            Ok(list) => {
                state.versions.insert(project_id, list);
                state.rows.insert(project_id, RowState::Resolved);
                report.resolved += 1;
            }
            Err(e) => {
                let message = e.user_message();
                warn!("Version lookup failed for project {}: {}", project_id, message);
                state
                    .rows
                    .insert(project_id, RowState::ResolutionFailed(message.clone()));
                report.failed.push((project_id, message));
            }
        }
    }

    /// Install a version of a listed project, refreshing on success
    pub async fn request_install(
        &self,
        project_id: ProjectId,
        version_name: &str,
    ) -> Result<InstallOutcome> {
        let components = self.components().inspect_err(|e| self.record_error(e))?;

        let (request, versions, branch, previous_row) = {
            let mut state = self.lock();
            let project_name = state
                .projects
                .iter()
                .find(|p| p.id == project_id)
                .map(|p| p.name.clone());
            let Some(project_name) = project_name else {
                let error = ModuleError::UnknownProject(project_id);
                state.last_error = Some(error.user_message());
                return Err(error);
            };
            let request = InstallRequest::new(project_id, project_name, version_name);

            let previous_row = state
                .rows
                .get(&project_id)
                .cloned()
                .unwrap_or(RowState::Unresolved);
            if matches!(previous_row, RowState::Installing(_)) {
                let error = ModuleError::InstallInProgress {
                    project: request.project_name,
                };
                state.last_error = Some(error.user_message());
                return Err(error);
            }

            state
                .rows
                .insert(project_id, RowState::Installing(version_name.to_string()));
            (
                request,
                state.versions.get(&project_id).cloned(),
                state.branches.get(&project_id).cloned(),
                previous_row,
            )
        };

        let result = components
            .installer
            .install(&request, versions.as_ref(), branch.as_ref())
            .await;

        match result {
            Ok(outcome) => {
                if let Err(e) = self.refresh().await {
                    warn!("Refresh after install failed: {}", e);
                }
                Ok(outcome)
            }
            Err(e) => {
                warn!(
                    "Install of {}@{} failed: {}",
                    request.project_name,
                    request.version_name,
                    e.user_message()
                );
                let mut state = self.lock();
                state.rows.insert(project_id, previous_row);
                state.last_error = Some(e.user_message());
                Err(e)
            }
        }
    }

    /// Remove an installed module and refresh
    pub async fn uninstall(&self, project_name: &str) -> Result<PathBuf> {
        let components = self.components().inspect_err(|e| self.record_error(e))?;

        let removed = components
            .installer
            .uninstall(project_name)
            .inspect_err(|e| self.record_error(e))?;

        if let Err(e) = self.refresh().await {
            warn!("Refresh after uninstall failed: {}", e);
        }
        Ok(removed)
    }

    /// Names of installed modules
    pub fn list_installed(&self) -> Result<Vec<String>> {
        self.components()?.installer.list_installed()
    }

    /// Validate, persist and apply new settings
    ///
    /// Nothing is written when a required field is empty.
    pub fn save_settings(&mut self, settings: Settings) -> Result<()> {
        settings.validate().inspect_err(|e| self.record_error(e))?;

        let components = Components::build(&settings, &self.options, &self.connect)
            .inspect_err(|e| self.record_error(e))?;
        self.store
            .save(&settings)
            .inspect_err(|e| self.record_error(e))?;

        info!("Settings saved to {}", self.store.path().display());
        self.settings = settings;
        self.components = Some(components);
        Ok(())
    }
}

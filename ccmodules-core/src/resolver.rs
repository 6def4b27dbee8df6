//! Version resolution for remote projects
//!
//! Combines the locally installed state of a project with its remote tags
//! into the ordered list a version picker offers:
//!
//! - installed `1.2.0` → `[v1.2.0, master, ...remote tags]`, each name once
//! - no manifest / unreadable manifest → `[N/A, unknown, master]`
//!
//! Full tag history is only offered once a numeric local version exists.

use once_cell::sync::Lazy;
use regex::Regex;
use std::sync::Arc;
use tracing::debug;

use crate::error::{ModuleError, Result};
use crate::layout::ModuleLayout;
use crate::manifest::{InstalledState, NOT_INSTALLED, UNKNOWN_VERSION};
use crate::remote::{BranchInfo, Project, ProjectId, RemoteDirectory, VersionRef};

/// Branch offered in every candidate list and used as the commit fallback
pub const DEFAULT_BRANCH: &str = "master";

static NUMERIC_VERSION: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[0-9.]+$").unwrap());

/// True for versions made only of digits and dots
pub fn is_numeric_version(version: &str) -> bool {
    NUMERIC_VERSION.is_match(version)
}

/// Ordered versions offered for one project
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionCandidateList {
    pub entries: Vec<VersionRef>,
    /// Entry matching the installed state
    pub selected: String,
}

impl VersionCandidateList {
    pub fn names(&self) -> Vec<&str> {
        self.entries.iter().map(|e| e.name.as_str()).collect()
    }

    pub fn find(&self, name: &str) -> Option<&VersionRef> {
        self.entries.iter().find(|e| e.name == name)
    }

    /// Commit recorded for an entry, if the remote supplied one
    pub fn commit_for(&self, name: &str) -> Option<&str> {
        self.find(name).and_then(VersionRef::commit_id)
    }
}

/// Build the candidate list from the installed state and remote tags
pub fn build_candidates(
    state: &InstalledState,
    remote_tags: Vec<VersionRef>,
) -> VersionCandidateList {
    match state {
        InstalledState::Version(version) if is_numeric_version(version) => {
            let installed = format!("v{version}");

            // A matching remote tag moves to the front, keeping its commit
            let head = remote_tags
                .iter()
                .find(|tag| tag.name == installed)
                .cloned()
                .unwrap_or_else(|| VersionRef::named(installed.clone()));

            let mut entries = Vec::with_capacity(remote_tags.len() + 2);
            entries.push(head);
            entries.push(VersionRef::named(DEFAULT_BRANCH));
            entries.extend(
                remote_tags
                    .into_iter()
                    .filter(|tag| tag.name != installed && tag.name != DEFAULT_BRANCH),
            );

            VersionCandidateList {
                entries,
                selected: installed,
            }
        }
        other => VersionCandidateList {
            entries: vec![
                VersionRef::named(NOT_INSTALLED),
                VersionRef::named(UNKNOWN_VERSION),
                VersionRef::named(DEFAULT_BRANCH),
            ],
            selected: other.label().to_string(),
        },
    }
}

/// Outcome of resolving one project; tag and branch lookups fail independently
#[derive(Debug)]
pub struct ProjectResolution {
    pub project_id: ProjectId,
    pub versions: Result<VersionCandidateList>,
    pub branch: Result<BranchInfo>,
}

/// Resolves installed state and candidate versions for projects
#[derive(Clone)]
pub struct VersionResolver {
    remote: Arc<dyn RemoteDirectory>,
    layout: ModuleLayout,
}

impl VersionResolver {
    pub fn new(remote: Arc<dyn RemoteDirectory>, layout: ModuleLayout) -> Self {
        Self { remote, layout }
    }

    /// Installed state of a project, read fresh from disk
    pub fn installed_state(&self, project_name: &str) -> InstalledState {
        InstalledState::read(&self.layout.manifest_path(project_name))
    }

    /// Fetch remote tags and build the candidate list
    pub async fn resolve_versions(&self, project: &Project) -> Result<VersionCandidateList> {
        let tags = self
            .remote
            .list_tags(project.id)
            .await
            .map_err(|source| ModuleError::VersionResolution {
                project: project.name.clone(),
                source,
            })?;

        let state = self.installed_state(&project.name);
        debug!(
            "Project '{}' installed={} remote tags={}",
            project.name,
            state,
            tags.len()
        );

        Ok(build_candidates(&state, tags))
    }

    /// Fetch default-branch metadata
    pub async fn resolve_branch(&self, project: &Project) -> Result<BranchInfo> {
        self.remote
            .default_branch(project.id)
            .await
            .map_err(|source| ModuleError::VersionResolution {
                project: project.name.clone(),
                source,
            })
    }

    /// Resolve tags and branch concurrently
    pub async fn resolve(&self, project: &Project) -> ProjectResolution {
        let (versions, branch) =
            tokio::join!(self.resolve_versions(project), self.resolve_branch(project));

        ProjectResolution {
            project_id: project.id,
            versions,
            branch,
        }
    }
}

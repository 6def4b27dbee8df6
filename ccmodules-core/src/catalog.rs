//! Project catalog
//!
//! Lists the remote group's projects, keeps those whose name prefix is
//! allowed, and hands back one resolution future per project so callers can
//! observe each completion.

use futures::stream::FuturesUnordered;
use std::future::Future;
use std::sync::Arc;
use tracing::{debug, info};

use crate::error::{ModuleError, Result};
use crate::remote::{Project, RemoteDirectory};
use crate::resolver::{ProjectResolution, VersionResolver};

/// Substring before the first `-`, or the whole name
pub fn name_prefix(name: &str) -> &str {
    name.split('-').next().unwrap_or(name)
}

/// Sort by name using byte-wise ordinal comparison
pub fn sort_projects(projects: &mut [Project]) {
    projects.sort_by(|a, b| a.name.cmp(&b.name));
}

/// Filtered view of the remote project directory
pub struct ProjectCatalog {
    remote: Arc<dyn RemoteDirectory>,
    prefixes: Vec<String>,
}

impl ProjectCatalog {
    pub fn new(remote: Arc<dyn RemoteDirectory>, prefixes: Vec<String>) -> Self {
        Self { remote, prefixes }
    }

    /// Whether a project name passes the prefix allow-list
    pub fn is_listed(&self, name: &str) -> bool {
        let prefix = name_prefix(name);
        self.prefixes.iter().any(|p| p == prefix)
    }

    /// Fetch, filter and sort the remote projects
    pub async fn list_projects(&self) -> Result<Vec<Project>> {
        let mut listing = self
            .remote
            .list_group_projects()
            .await
            .map_err(|e| ModuleError::DirectoryFetch(format!("{e:#}")))?;

        let Some(projects) = listing.projects.take() else {
            return Err(ModuleError::DirectoryFetch(listing.message_text()));
        };

        let total = projects.len();
        let mut projects: Vec<Project> = projects
            .into_iter()
            .filter(|p| self.is_listed(&p.name))
            .collect();
        sort_projects(&mut projects);

        info!(
            "Listed {} of {} projects from {}",
            projects.len(),
            total,
            self.remote.name()
        );
        debug!("Allowed prefixes: {:?}", self.prefixes);

        Ok(projects)
    }

    /// One resolution future per project, yielding in completion order
    pub fn resolution_tasks<'a>(
        resolver: &'a VersionResolver,
        projects: &'a [Project],
    ) -> FuturesUnordered<impl Future<Output = ProjectResolution> + 'a> {
        projects
            .iter()
            .map(|project| resolver.resolve(project))
            .collect()
    }
}

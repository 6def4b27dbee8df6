//! Remote project directory abstraction
//!
//! The directory lists projects, their tags and default branch, and serves
//! archive snapshots. [`GitLabDirectory`] talks to the GitLab REST API;
//! tests substitute an in-memory implementation.

mod gitlab;
mod types;

pub use gitlab::GitLabDirectory;
pub use types::{BranchInfo, Commit, GroupListing, Project, ProjectId, VersionRef};

use anyhow::Result;
use async_trait::async_trait;

use crate::archive::ArchiveFormat;

/// Trait for remote project directories
///
/// Implementations report transport failures as errors and leave retry
/// policy to the caller.
#[async_trait]
pub trait RemoteDirectory: Send + Sync {
    /// List the projects of the configured group
    async fn list_group_projects(&self) -> Result<GroupListing>;

    /// List tags of a project in server order
    async fn list_tags(&self, project_id: ProjectId) -> Result<Vec<VersionRef>>;

    /// Default branch metadata of a project
    async fn default_branch(&self, project_id: ProjectId) -> Result<BranchInfo>;

    /// Download a project snapshot at a ref
    async fn download_archive(
        &self,
        project_id: ProjectId,
        git_ref: &str,
        format: ArchiveFormat,
    ) -> Result<Vec<u8>>;

    /// Directory identifier for logging
    fn name(&self) -> &'static str;
}

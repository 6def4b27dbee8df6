//! Test helper functions for integration tests
//!
//! Shared across test files using the tests/common/ pattern.

#![allow(dead_code)]

use anyhow::Result;
use async_trait::async_trait;
use ccmodules_core::archive::{ref_label, ArchiveFormat};
use ccmodules_core::remote::{
    BranchInfo, Commit, GroupListing, Project, ProjectId, RemoteDirectory, VersionRef,
};
use std::collections::HashMap;
use std::io::Write;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, Once};
use std::time::Duration;

/// Initialize logging for tests (only once per test run)
static INIT: Once = Once::new();

pub fn init_test_logging() {
    INIT.call_once(|| {
        use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

        let _ = tracing_subscriber::registry()
            .with(
                tracing_subscriber::fmt::layer()
                    .with_test_writer()
                    .with_target(true)
                    .with_level(true),
            )
            .with(tracing_subscriber::filter::EnvFilter::from_default_env())
            .try_init();
    });
}

pub fn project(id: ProjectId, name: &str) -> Project {
    Project {
        id,
        name: name.to_string(),
        description: String::new(),
    }
}

/// In-memory remote directory
///
/// Archives are generated on demand with the `{name}-{ref}-{commit}/`
/// top-level directory the real server uses, unless a project is given
/// explicit archive bytes.
#[derive(Default)]
pub struct MockDirectory {
    listing: Mutex<GroupListing>,
    listing_error: Mutex<Option<String>>,
    tags: Mutex<HashMap<ProjectId, Vec<VersionRef>>>,
    branches: Mutex<HashMap<ProjectId, BranchInfo>>,
    failing_tags: Mutex<Vec<ProjectId>>,
    archives: Mutex<HashMap<ProjectId, Vec<u8>>>,
    failing_downloads: Mutex<Vec<ProjectId>>,
    downloads: AtomicUsize,
    downloaded_refs: Mutex<Vec<(ProjectId, String, ArchiveFormat)>>,
    download_delay: Option<Duration>,
}

impl MockDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_projects(self, projects: Vec<Project>) -> Self {
        *self.listing.lock().unwrap() = GroupListing::with_projects(projects);
        self
    }

    pub fn with_listing_message(self, message: &str) -> Self {
        *self.listing.lock().unwrap() = GroupListing::with_message(message);
        self
    }

    /// Switch the listing to an error payload after construction
    pub fn fail_listing(&self, message: &str) {
        *self.listing.lock().unwrap() = GroupListing::with_message(message);
    }

    pub fn with_listing_error(self, error: &str) -> Self {
        *self.listing_error.lock().unwrap() = Some(error.to_string());
        self
    }

    pub fn with_tags(self, project_id: ProjectId, tags: Vec<VersionRef>) -> Self {
        self.tags.lock().unwrap().insert(project_id, tags);
        self
    }

    pub fn with_branch(self, project_id: ProjectId, commit_id: &str) -> Self {
        self.branches.lock().unwrap().insert(
            project_id,
            BranchInfo {
                name: "master".to_string(),
                commit: Commit {
                    id: commit_id.to_string(),
                },
            },
        );
        self
    }

    pub fn with_failing_tags(self, project_id: ProjectId) -> Self {
        self.failing_tags.lock().unwrap().push(project_id);
        self
    }

    pub fn with_archive(self, project_id: ProjectId, bytes: Vec<u8>) -> Self {
        self.archives.lock().unwrap().insert(project_id, bytes);
        self
    }

    pub fn with_failing_download(self, project_id: ProjectId) -> Self {
        self.failing_downloads.lock().unwrap().push(project_id);
        self
    }

    /// Hold every download open for `delay` before answering
    pub fn with_download_delay(mut self, delay: Duration) -> Self {
        self.download_delay = Some(delay);
        self
    }

    pub fn download_count(&self) -> usize {
        self.downloads.load(Ordering::SeqCst)
    }

    pub fn downloaded_refs(&self) -> Vec<(ProjectId, String, ArchiveFormat)> {
        self.downloaded_refs.lock().unwrap().clone()
    }

    fn project_name(&self, project_id: ProjectId) -> Option<String> {
        self.listing
            .lock()
            .unwrap()
            .projects
            .as_ref()?
            .iter()
            .find(|p| p.id == project_id)
            .map(|p| p.name.clone())
    }

    fn commit_for(&self, project_id: ProjectId, git_ref: &str) -> Option<String> {
        let tagged = self
            .tags
            .lock()
            .unwrap()
            .get(&project_id)
            .and_then(|tags| tags.iter().find(|t| t.name == git_ref))
            .and_then(|t| t.commit_id().map(str::to_string));

        tagged.or_else(|| {
            self.branches
                .lock()
                .unwrap()
                .get(&project_id)
                .map(|b| b.commit.id.clone())
        })
    }
}

#[async_trait]
impl RemoteDirectory for MockDirectory {
    async fn list_group_projects(&self) -> Result<GroupListing> {
        if let Some(error) = self.listing_error.lock().unwrap().clone() {
            anyhow::bail!(error);
        }
        Ok(self.listing.lock().unwrap().clone())
    }

    async fn list_tags(&self, project_id: ProjectId) -> Result<Vec<VersionRef>> {
        if self.failing_tags.lock().unwrap().contains(&project_id) {
            anyhow::bail!("HTTP 500 Internal Server Error");
        }
        Ok(self
            .tags
            .lock()
            .unwrap()
            .get(&project_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn default_branch(&self, project_id: ProjectId) -> Result<BranchInfo> {
        self.branches
            .lock()
            .unwrap()
            .get(&project_id)
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("404 Branch Not Found"))
    }

    async fn download_archive(
        &self,
        project_id: ProjectId,
        git_ref: &str,
        format: ArchiveFormat,
    ) -> Result<Vec<u8>> {
        self.downloads.fetch_add(1, Ordering::SeqCst);
        self.downloaded_refs
            .lock()
            .unwrap()
            .push((project_id, git_ref.to_string(), format));

        if let Some(delay) = self.download_delay {
            tokio::time::sleep(delay).await;
        }
        if self.failing_downloads.lock().unwrap().contains(&project_id) {
            anyhow::bail!("HTTP 404 Not Found");
        }
        if let Some(bytes) = self.archives.lock().unwrap().get(&project_id) {
            return Ok(bytes.clone());
        }

        let name = self
            .project_name(project_id)
            .ok_or_else(|| anyhow::anyhow!("404 Project Not Found"))?;
        let commit = self
            .commit_for(project_id, git_ref)
            .ok_or_else(|| anyhow::anyhow!("404 Ref Not Found"))?;
        let root = format!("{}-{}-{}", name, ref_label(git_ref), commit);
        let version = git_ref.trim_start_matches('v');
        let manifest = format!(r#"{{"name": "{name}", "version": "{version}"}}"#);
        let files = [
            (format!("{root}/package.json"), manifest),
            (format!("{root}/src/index.ts"), "export {};".to_string()),
        ];

        Ok(match format {
            ArchiveFormat::Zip => zip_bytes(&files),
            ArchiveFormat::TarGz => targz_bytes(&files),
        })
    }

    fn name(&self) -> &'static str {
        "mock"
    }
}

/// Build a zip archive from (path, content) pairs
pub fn zip_bytes(files: &[(String, String)]) -> Vec<u8> {
    let mut writer = zip::ZipWriter::new(std::io::Cursor::new(Vec::new()));
    let options = zip::write::FileOptions::default();

    for (path, content) in files {
        writer.start_file(path.as_str(), options).unwrap();
        writer.write_all(content.as_bytes()).unwrap();
    }

    writer.finish().unwrap().into_inner()
}

/// Build a tar.gz archive from (path, content) pairs
pub fn targz_bytes(files: &[(String, String)]) -> Vec<u8> {
    let encoder = flate2::write::GzEncoder::new(Vec::new(), flate2::Compression::default());
    let mut builder = tar::Builder::new(encoder);

    for (path, content) in files {
        let mut header = tar::Header::new_gnu();
        header.set_size(content.len() as u64);
        header.set_mode(0o644);
        header.set_cksum();
        builder
            .append_data(&mut header, path.as_str(), content.as_bytes())
            .unwrap();
    }

    builder.into_inner().unwrap().finish().unwrap()
}

/// Write an installed module with the given manifest content
pub fn install_fixture(module_root: &Path, name: &str, manifest: &str) {
    let dir = module_root.join(name);
    std::fs::create_dir_all(&dir).unwrap();
    std::fs::write(dir.join("package.json"), manifest).unwrap();
}

//! GitLab REST backend for the remote directory

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use super::types::{BranchInfo, GroupListing, ProjectId, VersionRef};
use super::RemoteDirectory;
use crate::archive::ArchiveFormat;
use crate::resolver::DEFAULT_BRANCH;
use crate::settings::Settings;

/// Request timeout for API calls and archive downloads
const REQUEST_TIMEOUT_SECS: u64 = 60;

/// Largest page size GitLab accepts for list endpoints
const PAGE_SIZE: &str = "100";

/// GitLab API client scoped to one group
pub struct GitLabDirectory {
    client: reqwest::Client,
    group_url: String,
    api_root: String,
    private_token: String,
}

/// Error body GitLab returns on failed requests
#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: serde_json::Value,
}

impl GitLabDirectory {
    /// Create a client for a group endpoint such as `https://host/api/v4/groups/42`
    pub fn new(group_url: &str, private_token: &str) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("ccmodules/", env!("CARGO_PKG_VERSION")))
            .timeout(std::time::Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .context("Failed to create HTTP client")?;

        let group_url = group_url.trim_end_matches('/').to_string();
        let api_root = api_root(&group_url);

        Ok(Self {
            client,
            group_url,
            api_root,
            private_token: private_token.to_string(),
        })
    }

    pub fn from_settings(settings: &Settings) -> Result<Self> {
        Self::new(&settings.base_url, &settings.private_token)
    }

    pub fn api_root(&self) -> &str {
        &self.api_root
    }

    fn project_url(&self, project_id: ProjectId, path: &str) -> String {
        format!("{}/projects/{}/repository/{}", self.api_root, project_id, path)
    }

    async fn get(&self, url: &str, query: &[(&str, &str)]) -> Result<reqwest::Response> {
        debug!("GET {}", url);

        let response = self
            .client
            .get(url)
            .header("PRIVATE-TOKEN", &self.private_token)
            .query(query)
            .send()
            .await
            .with_context(|| format!("Request to {url} failed"))?;

        if response.status().is_success() {
            return Ok(response);
        }

        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        match serde_json::from_str::<ErrorBody>(&body) {
            Ok(ErrorBody {
                message: serde_json::Value::String(message),
            }) => anyhow::bail!("HTTP {} from {}: {}", status, url, message),
            Ok(ErrorBody { message }) => anyhow::bail!("HTTP {} from {}: {}", status, url, message),
            Err(_) => anyhow::bail!("HTTP {} from {}", status, url),
        }
    }
}

/// Page number from `X-Next-Page`; empty or missing on the last page
fn next_page(response: &reqwest::Response) -> Option<String> {
    response
        .headers()
        .get("X-Next-Page")
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}

/// The API root is everything before `/groups/`
fn api_root(group_url: &str) -> String {
    match group_url.find("/groups/") {
        Some(idx) => group_url[..idx].to_string(),
        None => group_url.to_string(),
    }
}

#[async_trait]
impl RemoteDirectory for GitLabDirectory {
    async fn list_group_projects(&self) -> Result<GroupListing> {
        debug!("Listing projects from {}", self.group_url);

        let response = self
            .client
            .get(&self.group_url)
            .header("PRIVATE-TOKEN", &self.private_token)
            .send()
            .await
            .with_context(|| format!("Request to {} failed", self.group_url))?;

        // Error payloads carry {message} and are handed to the caller as-is
        let status = response.status();
        let body = response
            .text()
            .await
            .context("Failed to read response body")?;

        serde_json::from_str::<GroupListing>(&body)
            .with_context(|| format!("Unexpected response (HTTP {status}) from {}", self.group_url))
    }

    async fn list_tags(&self, project_id: ProjectId) -> Result<Vec<VersionRef>> {
        let url = self.project_url(project_id, "tags");
        let mut tags = Vec::new();
        let mut page = "1".to_string();

        loop {
            let response = self
                .get(&url, &[("per_page", PAGE_SIZE), ("page", &page)])
                .await?;
            let next_page = next_page(&response);

            let batch = response
                .json::<Vec<VersionRef>>()
                .await
                .with_context(|| format!("Failed to parse tags of project {project_id}"))?;
            tags.extend(batch);

            match next_page {
                Some(next) if next != page => page = next,
                _ => break,
            }
        }

        debug!("Project {} has {} tags", project_id, tags.len());
        Ok(tags)
    }

    async fn default_branch(&self, project_id: ProjectId) -> Result<BranchInfo> {
        let url = self.project_url(project_id, &format!("branches/{DEFAULT_BRANCH}"));
        let response = self.get(&url, &[]).await?;

        response
            .json::<BranchInfo>()
            .await
            .with_context(|| format!("Failed to parse branch of project {project_id}"))
    }

    async fn download_archive(
        &self,
        project_id: ProjectId,
        git_ref: &str,
        format: ArchiveFormat,
    ) -> Result<Vec<u8>> {
        let url = self.project_url(project_id, &format!("archive.{}", format.extension()));
        let response = self.get(&url, &[("sha", git_ref)]).await?;

        let bytes = response
            .bytes()
            .await
            .context("Failed to read archive body")?;

        debug!("Downloaded {} bytes from {}", bytes.len(), url);
        Ok(bytes.to_vec())
    }

    fn name(&self) -> &'static str {
        "gitlab"
    }
}

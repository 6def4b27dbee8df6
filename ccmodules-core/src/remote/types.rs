//! Wire types shared by remote directory implementations

use serde::{Deserialize, Serialize};

/// GitLab project id
pub type ProjectId = u64;

/// A remote project, immutable for one refresh cycle
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Project {
    pub id: ProjectId,
    pub name: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub description: String,
}

/// A commit reference
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Commit {
    pub id: String,
}

/// A tag or branch name plus the commit it points to, if known
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionRef {
    pub name: String,
    #[serde(default)]
    pub commit: Option<Commit>,
}

impl VersionRef {
    /// A ref with no commit information
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            commit: None,
        }
    }

    pub fn with_commit(name: impl Into<String>, commit_id: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            commit: Some(Commit {
                id: commit_id.into(),
            }),
        }
    }

    pub fn commit_id(&self) -> Option<&str> {
        self.commit.as_ref().map(|c| c.id.as_str())
    }
}

/// Default branch metadata, the install fallback commit
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BranchInfo {
    #[serde(default)]
    pub name: String,
    pub commit: Commit,
}

/// Group listing payload: either projects or an error message
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupListing {
    #[serde(default)]
    pub projects: Option<Vec<Project>>,
    #[serde(default)]
    pub message: Option<serde_json::Value>,
}

impl GroupListing {
    pub fn with_projects(projects: Vec<Project>) -> Self {
        Self {
            projects: Some(projects),
            message: None,
        }
    }

    pub fn with_message(message: impl Into<String>) -> Self {
        Self {
            projects: None,
            message: Some(serde_json::Value::String(message.into())),
        }
    }

    /// The error message as text; GitLab sometimes sends an object here
    pub fn message_text(&self) -> String {
        match &self.message {
            Some(serde_json::Value::String(s)) => s.clone(),
            Some(other) => other.to_string(),
            None => "Remote directory returned no projects".to_string(),
        }
    }
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

//! Error types for module discovery and installation
//!
//! Every failure is scoped to the single user action that raised it.
//! [`ErrorKind`] groups the variants into the categories a front end
//! presents differently.

use std::path::PathBuf;
use thiserror::Error;

/// Module manager errors
#[derive(Error, Debug)]
pub enum ModuleError {
    /// A required setting is empty
    #[error("{field} can not be empty!")]
    Configuration { field: &'static str },

    /// The remote project listing failed or returned an error payload
    #[error("Failed to list remote projects: {0}")]
    DirectoryFetch(String),

    /// Tag or branch lookup failed for a single project
    #[error("Failed to resolve versions for '{project}'")]
    VersionResolution {
        project: String,
        #[source]
        source: anyhow::Error,
    },

    /// The selected version is not installable
    #[error("{0}")]
    Validation(String),

    /// The destination directory already exists
    #[error("Module already installed, please delete it first: {}", path.display())]
    Conflict { path: PathBuf },

    /// Another install of the same project has not finished yet
    #[error("An install of '{project}' is already in progress")]
    InstallInProgress { project: String },

    /// The archive could not be downloaded or cached
    #[error("Failed to download {project}@{version}")]
    Download {
        project: String,
        version: String,
        #[source]
        source: anyhow::Error,
    },

    /// The archive is corrupt or has an unexpected layout
    #[error("Failed to extract {}", archive.display())]
    Extract {
        archive: PathBuf,
        #[source]
        source: anyhow::Error,
    },

    /// The extracted directory could not be moved into place
    #[error("Failed to move {} to {}", from.display(), to.display())]
    Move {
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The project id is not part of the current listing
    #[error("Unknown project id {0}")]
    UnknownProject(u64),

    /// Settings could not be read or written
    #[error("Failed to access settings at {}", path.display())]
    SettingsStore {
        path: PathBuf,
        #[source]
        source: anyhow::Error,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Error categories surfaced to the user
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Configuration,
    DirectoryFetch,
    VersionResolution,
    Validation,
    Conflict,
    Transfer,
    Storage,
}

impl ModuleError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ModuleError::Configuration { .. } => ErrorKind::Configuration,
            ModuleError::DirectoryFetch(_) => ErrorKind::DirectoryFetch,
            ModuleError::VersionResolution { .. } => ErrorKind::VersionResolution,
            ModuleError::Validation(_) | ModuleError::UnknownProject(_) => ErrorKind::Validation,
            ModuleError::Conflict { .. } | ModuleError::InstallInProgress { .. } => {
                ErrorKind::Conflict
            }
            ModuleError::Download { .. }
            | ModuleError::Extract { .. }
            | ModuleError::Move { .. } => ErrorKind::Transfer,
            ModuleError::SettingsStore { .. } | ModuleError::Io(_) => ErrorKind::Storage,
        }
    }

    /// Full message including the source chain, for display to the user
    pub fn user_message(&self) -> String {
        use std::error::Error;

        let mut message = self.to_string();
        let mut source = self.source();
        while let Some(cause) = source {
            message.push_str(": ");
            message.push_str(&cause.to_string());
            source = cause.source();
        }
        message
    }
}

pub type Result<T> = std::result::Result<T, ModuleError>;

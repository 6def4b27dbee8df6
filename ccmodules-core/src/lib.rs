//! ccmodules library exports
//!
//! Lists the projects of a GitLab group, resolves which version of each is
//! installed locally, and installs a chosen tag or branch into the editor's
//! module directory.

pub mod archive;
pub mod catalog;
pub mod error;
pub mod installer;
pub mod layout;
pub mod manager;
pub mod manifest;
pub mod remote;
pub mod resolver;
pub mod settings;

pub use error::{ErrorKind, ModuleError, Result};
pub use manager::{gitlab_connector, ManagerOptions, ModuleManager, RefreshReport, RowState};
pub use settings::{Settings, SettingsStore};

//! ccmodules - install editor modules from a GitLab group
//!
//! Main entry point: parses flags, sets up logging, and dispatches to the
//! module and config commands.

use anyhow::Result;
use clap::{Parser, ValueEnum};
use std::path::PathBuf;
use tracing::debug;
use tracing_subscriber::EnvFilter;

use ccmodules_core::installer::LoggingAssetRegistry;
use ccmodules_core::{gitlab_connector, ManagerOptions, ModuleManager, SettingsStore};

mod config_cli;
mod modules_cli;

/// Log levels
#[derive(Debug, Clone, ValueEnum)]
enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    fn to_filter_directive(&self) -> &'static str {
        match self {
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Trace => "trace",
        }
    }
}

#[derive(Parser, Debug)]
#[clap(
    name = "ccmodules",
    about = "Browse and install editor modules published in a GitLab group",
    version
)]
struct Cli {
    #[clap(subcommand)]
    command: Command,

    /// Set log level
    #[clap(long, default_value = "warn", global = true)]
    log_level: LogLevel,

    /// Emit logs as JSON
    #[clap(long, global = true)]
    log_json: bool,

    /// Editor assets root that holds the module directory
    #[clap(long, default_value = "./assets", global = true)]
    assets_root: PathBuf,

    /// Directory for downloaded archives (defaults to <assets-root>/../cache)
    #[clap(long, global = true)]
    cache_dir: Option<PathBuf>,

    /// Override the settings file path
    #[clap(long, global = true)]
    settings: Option<PathBuf>,
}

#[derive(Parser, Debug)]
enum Command {
    #[clap(flatten)]
    Modules(modules_cli::ModulesCommand),

    /// Show or change connection settings
    Config {
        #[clap(subcommand)]
        command: config_cli::ConfigCommand,
    },
}

/// Paths and flags shared by every command
pub struct CliContext {
    assets_root: PathBuf,
    cache_dir: Option<PathBuf>,
    settings_path: Option<PathBuf>,
}

impl CliContext {
    pub fn store(&self) -> Result<SettingsStore> {
        Ok(match &self.settings_path {
            Some(path) => SettingsStore::at(path),
            None => SettingsStore::open_default()?,
        })
    }

    /// Build a manager; `env_overrides` applies `CCMODULES_PRIVATE_TOKEN`
    pub fn manager(&self, env_overrides: bool) -> Result<ModuleManager> {
        let store = self.store()?;
        debug!("Loading settings from {}", store.path().display());
        let mut settings = store.load()?;
        if env_overrides {
            settings = settings.with_env_overrides();
        }
        if let Some(field) = settings.first_empty_field() {
            debug!("Settings incomplete: {} is empty", field);
        }

        debug!("Assets root: {}", self.assets_root.display());

        let mut options = ManagerOptions::new(&self.assets_root)
            .with_asset_registry(std::sync::Arc::new(LoggingAssetRegistry));
        if let Some(cache_dir) = &self.cache_dir {
            options = options.with_cache_dir(cache_dir);
        }

        Ok(ModuleManager::new(
            settings,
            store,
            options,
            gitlab_connector(),
        )?)
    }
}

/// Initialize tracing with CLI flags
///
/// Logs always go to stderr so command output on stdout stays parseable.
fn initialize_tracing(log_level: &LogLevel, json: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(log_level.to_filter_directive()));

    if json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_target(true)
            .with_writer(std::io::stderr)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .with_writer(std::io::stderr)
            .init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    initialize_tracing(&cli.log_level, cli.log_json);
    debug!("ccmodules {} starting", env!("CARGO_PKG_VERSION"));

    let context = CliContext {
        assets_root: cli.assets_root,
        cache_dir: cli.cache_dir,
        settings_path: cli.settings,
    };

    match cli.command {
        Command::Modules(command) => command.execute(&context).await,
        Command::Config { command } => command.execute(&context),
    }
}

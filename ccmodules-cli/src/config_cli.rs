//! Config commands: show and update persisted settings

use anyhow::Result;
use clap::Subcommand;

use ccmodules_core::archive::ArchiveFormat;
use ccmodules_core::settings::{Settings, PRIVATE_TOKEN_ENV};

use crate::CliContext;

#[derive(Subcommand, Debug)]
pub enum ConfigCommand {
    /// Show current settings (the token is masked)
    Show {
        /// Output as JSON
        #[clap(long)]
        json: bool,
    },

    /// Update one or more settings
    Set {
        /// GitLab group endpoint, e.g. https://gitlab.example.com/api/v4/groups/42
        #[clap(long)]
        base_url: Option<String>,

        /// Private access token
        #[clap(long)]
        private_token: Option<String>,

        /// Comma-separated project name prefixes
        #[clap(long)]
        prefixes: Option<String>,

        /// Directory under the assets root that receives modules
        #[clap(long)]
        module_directory: Option<String>,

        /// Archive format to download (zip or tar.gz)
        #[clap(long)]
        archive_format: Option<ArchiveFormat>,
    },
}

impl ConfigCommand {
    pub fn execute(self, context: &CliContext) -> Result<()> {
        match self {
            ConfigCommand::Show { json } => execute_show(context, json),
            ConfigCommand::Set {
                base_url,
                private_token,
                prefixes,
                module_directory,
                archive_format,
            } => {
                let mut manager = context.manager(false)?;
                let mut settings = manager.settings().clone();

                if let Some(value) = base_url {
                    settings.base_url = value;
                }
                if let Some(value) = private_token {
                    settings.private_token = value;
                }
                if let Some(value) = prefixes {
                    settings.prefixes = value;
                }
                if let Some(value) = module_directory {
                    settings.module_directory = value;
                }
                if let Some(value) = archive_format {
                    settings.archive_format = value;
                }

                manager.save_settings(settings)?;
                println!("Settings saved to {}", context.store()?.path().display());
                Ok(())
            }
        }
    }
}

fn mask(token: &str) -> String {
    if token.is_empty() {
        return String::new();
    }
    let visible: String = token.chars().take(4).collect();
    format!("{visible}****")
}

fn execute_show(context: &CliContext, json_output: bool) -> Result<()> {
    let store = context.store()?;
    let settings: Settings = store.load()?;
    let token_from_env = std::env::var(PRIVATE_TOKEN_ENV).is_ok_and(|t| !t.trim().is_empty());

    if json_output {
        let output = serde_json::json!({
            "path": store.path(),
            "baseUrl": settings.base_url,
            "privateToken": mask(&settings.private_token),
            "prefixes": settings.prefixes,
            "moduleDirectory": settings.module_directory,
            "archiveFormat": settings.archive_format,
            "tokenFromEnv": token_from_env,
            "missing": settings.first_empty_field(),
        });
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    println!("Settings file:    {}", store.path().display());
    println!("baseUrl:          {}", settings.base_url);
    println!("privateToken:     {}", mask(&settings.private_token));
    println!("prefixes:         {}", settings.prefixes);
    println!("moduleDirectory:  {}", settings.module_directory);
    println!("archiveFormat:    {}", settings.archive_format);

    if token_from_env {
        println!();
        println!("{PRIVATE_TOKEN_ENV} is set and overrides the stored token.");
    }
    if let Some(field) = settings.first_empty_field() {
        println!();
        println!("Incomplete: {field} can not be empty!");
    }

    Ok(())
}

//! Module commands: list, versions, install, remove

use anyhow::{Context, Result};
use clap::Subcommand;
use tabled::{
    settings::{object::Rows, Alignment, Modify, Style},
    Table, Tabled,
};

use ccmodules_core::remote::Project;
use ccmodules_core::{ModuleManager, RowState};

use crate::CliContext;

#[derive(Subcommand, Debug)]
pub enum ModulesCommand {
    /// List remote modules and their installed versions
    List {
        /// Output results as JSON
        #[clap(long)]
        json: bool,
    },

    /// Show the versions offered for one module
    Versions {
        /// Module name
        name: String,

        /// Output as JSON
        #[clap(long)]
        json: bool,
    },

    /// Install a tag or branch of a module
    Install {
        /// Module name
        name: String,

        /// Tag or branch to install (defaults to master)
        #[clap(default_value = "master")]
        version: String,
    },

    /// Remove an installed module
    Remove {
        /// Module name
        name: String,
    },
}

impl ModulesCommand {
    pub async fn execute(self, context: &CliContext) -> Result<()> {
        let manager = context.manager(true)?;

        match self {
            ModulesCommand::List { json } => execute_list(&manager, json).await,
            ModulesCommand::Versions { name, json } => {
                execute_versions(&manager, &name, json).await
            }
            ModulesCommand::Install { name, version } => {
                execute_install(&manager, &name, &version).await
            }
            ModulesCommand::Remove { name } => execute_remove(&manager, &name).await,
        }
    }
}

/// Table row for the module listing
#[derive(Tabled)]
struct ModuleRow {
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Installed")]
    installed: String,
    #[tabled(rename = "Versions")]
    versions: String,
    #[tabled(rename = "Status")]
    status: String,
    #[tabled(rename = "Description")]
    description: String,
}

fn status_label(state: &RowState) -> String {
    match state {
        RowState::Unresolved => "-".to_string(),
        RowState::Resolving => "resolving".to_string(),
        RowState::Resolved => "ok".to_string(),
        RowState::ResolutionFailed(message) => format!("error: {message}"),
        RowState::Installing(version) => format!("installing {version}"),
    }
}

fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() > max {
        let kept: String = text.chars().take(max - 3).collect();
        format!("{kept}...")
    } else {
        text.to_string()
    }
}

fn find_project(manager: &ModuleManager, name: &str) -> Result<Project> {
    manager
        .projects()
        .into_iter()
        .find(|p| p.name == name)
        .with_context(|| format!("Module '{name}' is not listed in the remote group"))
}

async fn execute_list(manager: &ModuleManager, json_output: bool) -> Result<()> {
    let report = manager.refresh().await?;
    let state = manager.state();

    if json_output {
        let json_results: Vec<serde_json::Value> = state
            .projects
            .iter()
            .map(|project| {
                let versions = state.versions.get(&project.id);
                serde_json::json!({
                    "id": project.id,
                    "name": project.name,
                    "description": project.description,
                    "installed": versions.map(|v| v.selected.clone()),
                    "versions": versions.map(|v| v.names()),
                    "masterCommit": state.branches.get(&project.id).map(|b| b.commit.id.clone()),
                })
            })
            .collect();

        println!("{}", serde_json::to_string_pretty(&json_results)?);
        return Ok(());
    }

    if state.projects.is_empty() {
        println!("No modules found.");
        return Ok(());
    }

    let rows: Vec<ModuleRow> = state
        .projects
        .iter()
        .map(|project| {
            let versions = state.versions.get(&project.id);
            let row_state = state
                .rows
                .get(&project.id)
                .cloned()
                .unwrap_or(RowState::Unresolved);

            ModuleRow {
                name: project.name.clone(),
                installed: manager.installed_state(&project.name).to_string(),
                versions: versions
                    .map(|v| truncate(&v.names().join(", "), 40))
                    .unwrap_or_else(|| "-".to_string()),
                status: status_label(&row_state),
                description: truncate(&project.description, 50),
            }
        })
        .collect();

    let table = Table::new(&rows)
        .with(Style::rounded())
        .with(Modify::new(Rows::first()).with(Alignment::center()))
        .to_string();

    println!("{table}");

    if !report.failed.is_empty() {
        eprintln!(
            "\n{} lookup(s) failed; see the warnings above",
            report.failed.len()
        );
    }

    Ok(())
}

async fn execute_versions(manager: &ModuleManager, name: &str, json_output: bool) -> Result<()> {
    manager.refresh().await?;
    let project = find_project(manager, name)?;

    if let RowState::ResolutionFailed(message) = manager.row_state(project.id) {
        anyhow::bail!("Could not resolve versions of '{}': {}", name, message);
    }

    let versions = manager
        .candidates(project.id)
        .with_context(|| format!("No versions resolved for '{name}'"))?;

    if json_output {
        let output = serde_json::json!({
            "name": project.name,
            "selected": versions.selected,
            "versions": versions.entries,
        });
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    println!("Module:    {}", project.name);
    println!("Installed: {}", manager.installed_state(&project.name));
    println!();
    println!("Available versions:");
    for entry in &versions.entries {
        let marker = if entry.name == versions.selected {
            " (selected)"
        } else {
            ""
        };
        match entry.commit_id() {
            Some(commit) => {
                let short = commit.get(..8).unwrap_or(commit);
                println!("  {} [{}]{}", entry.name, short, marker);
            }
            None => println!("  {}{}", entry.name, marker),
        }
    }

    Ok(())
}

async fn execute_install(manager: &ModuleManager, name: &str, version: &str) -> Result<()> {
    manager.refresh().await?;
    let project = find_project(manager, name)?;

    println!("Installing {} {}...", project.name, version);
    let outcome = manager.request_install(project.id, version).await?;

    println!(
        "Installed {} {} ({}) to {}",
        outcome.project_name,
        outcome.version_name,
        outcome.commit_id,
        outcome.install_path.display()
    );
    Ok(())
}

async fn execute_remove(manager: &ModuleManager, name: &str) -> Result<()> {
    let removed = manager.uninstall(name).await?;
    println!("Removed {}", removed.display());
    Ok(())
}

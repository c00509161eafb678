use clap::Subcommand;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::cli::client::ApiClient;
use crate::cli::config::{load_config, save_config};
use crate::cli::utils::{field, output_empty_collection, output_success, output_value};
use crate::cli::OutputFormat;

#[derive(Subcommand)]
pub enum ProjectCommands {
    #[command(about = "List projects you belong to")]
    List,

    #[command(about = "Make a project the current one, here and on the server")]
    Use {
        #[arg(help = "Project id")]
        id: Uuid,
    },
}

pub async fn handle(cmd: ProjectCommands, output_format: OutputFormat) -> anyhow::Result<()> {
    let mut config = load_config()?;
    let client = ApiClient::from_config(&config)?;

    match cmd {
        ProjectCommands::List => {
            let projects: Value = client.get("/api/projects").await?;
            let empty = projects.as_array().map_or(true, |a| a.is_empty());
            if empty {
                return output_empty_collection(&output_format, "No projects");
            }
            output_value(&output_format, &projects, |list| {
                list.as_array()
                    .into_iter()
                    .flatten()
                    .map(|p| {
                        let marker = if p["is_current"].as_bool() == Some(true) { "*" } else { " " };
                        format!(
                            "{} {}  {:<30} {:<8} {}",
                            marker,
                            field(p, "id"),
                            field(p, "name"),
                            field(p, "role"),
                            field(p, "status")
                        )
                    })
                    .collect()
            })
        }
        ProjectCommands::Use { id } => {
            let project: Value = client
                .put("/api/projects/current", &json!({ "project_id": id }))
                .await?;
            config.project_id = Some(id);
            save_config(&config)?;
            output_success(
                &output_format,
                &format!("Switched to project '{}'", field(&project, "name")),
                Some(project),
            )
        }
    }
}

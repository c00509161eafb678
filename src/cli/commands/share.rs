use clap::Subcommand;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::cli::client::ApiClient;
use crate::cli::config::load_config;
use crate::cli::utils::{field, output_empty_collection, output_success, output_value};
use crate::cli::OutputFormat;
use crate::database::models::ShareSettings;
use crate::types::ToolKey;

#[derive(Subcommand)]
pub enum ShareCommands {
    #[command(about = "Create a read-only link to a tool")]
    Create {
        tool: ToolKey,
        #[arg(long)]
        project: Option<Uuid>,
        #[arg(long, help = "Days until the link expires")]
        days: Option<u32>,
        #[arg(long)]
        include_notes: bool,
        #[arg(long)]
        include_prices: bool,
        #[arg(long)]
        include_links: bool,
        #[arg(long)]
        include_comments: bool,
        #[arg(long)]
        include_assignees: bool,
        #[arg(long = "scope", help = "Board or room id to expose; repeatable")]
        scope_ids: Vec<String>,
    },

    #[command(about = "List a tool's share links")]
    List {
        tool: ToolKey,
        #[arg(long)]
        project: Option<Uuid>,
    },

    #[command(about = "Revoke a share link")]
    Revoke { id: Uuid },
}

pub async fn handle(cmd: ShareCommands, output_format: OutputFormat) -> anyhow::Result<()> {
    let config = load_config()?;
    let client = ApiClient::from_config(&config)?;

    match cmd {
        ShareCommands::Create {
            tool,
            project,
            days,
            include_notes,
            include_prices,
            include_links,
            include_comments,
            include_assignees,
            scope_ids,
        } => {
            let settings = ShareSettings {
                include_notes,
                include_prices,
                include_links,
                include_comments,
                include_assignees,
                scope_ids: (!scope_ids.is_empty()).then_some(scope_ids),
            };
            let created: Value = client
                .post(
                    &format!("/api/tools/{}/shares", tool),
                    &json!({
                        "project_id": config.project(project)?,
                        "settings": settings,
                        "expires_in_days": days,
                    }),
                )
                .await?;
            output_success(
                &output_format,
                &format!(
                    "Share link (shown once): {}\nExpires {}",
                    field(&created, "url"),
                    field(&created, "expires_at")
                ),
                Some(created),
            )
        }
        ShareCommands::List { tool, project } => {
            let path = format!("/api/tools/{}/shares?project_id={}", tool, config.project(project)?);
            let shares: Value = client.get(&path).await?;
            if shares.as_array().map_or(true, |a| a.is_empty()) {
                return output_empty_collection(&output_format, "No share links");
            }
            output_value(&output_format, &shares, |list| {
                list.as_array()
                    .into_iter()
                    .flatten()
                    .map(|s| {
                        let state = if s["active"].as_bool() == Some(true) { "active" } else { "inactive" };
                        format!(
                            "{}  {}…  {:<8} views={} expires={}",
                            field(s, "id"),
                            field(s, "token_hint"),
                            state,
                            field(s, "view_count"),
                            field(s, "expires_at")
                        )
                    })
                    .collect()
            })
        }
        ShareCommands::Revoke { id } => {
            client.delete(&format!("/api/shares/{}", id)).await?;
            output_success(&output_format, &format!("Share link {} revoked", id), None)
        }
    }
}

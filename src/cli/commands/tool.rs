use clap::Subcommand;
use serde_json::{json, Value};
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use uuid::Uuid;

use crate::cli::config::{cache_dir, load_config, CliConfig};
use crate::cli::utils::{output_success, output_value};
use crate::cli::OutputFormat;
use crate::sync::{CacheKey, FileCache, HttpRemote, SyncError, ToolStateSync};
use crate::types::ToolKey;

#[derive(Subcommand)]
pub enum ToolCommands {
    #[command(about = "Print a tool's current state")]
    Get {
        #[arg(help = "mood_boards, finish_decisions, punch_list or bid_checklist")]
        tool: ToolKey,
        #[arg(long, help = "Project id (defaults to the current project)")]
        project: Option<Uuid>,
    },

    #[command(about = "Replace a tool's state with a JSON file ('-' for stdin)")]
    Set {
        tool: ToolKey,
        file: PathBuf,
        #[arg(long, help = "Project id (defaults to the current project)")]
        project: Option<Uuid>,
    },
}

fn engine(config: &CliConfig, tool: ToolKey, project: Option<Uuid>) -> anyhow::Result<ToolStateSync> {
    let key = CacheKey::new(config.project(project)?, tool);
    let remote = HttpRemote::new(config.server.clone(), config.require_token()?);
    let cache = FileCache::new(cache_dir()?);
    Ok(ToolStateSync::new(key, Arc::new(cache), Arc::new(remote)))
}

fn read_payload(file: &Path) -> anyhow::Result<Value> {
    let mut raw = String::new();
    if file.as_os_str() == "-" {
        std::io::stdin().read_to_string(&mut raw)?;
    } else {
        raw = std::fs::read_to_string(file)?;
    }
    serde_json::from_str(&raw).map_err(|e| anyhow::anyhow!("{}: not valid JSON: {}", file.display(), e))
}

pub async fn handle(cmd: ToolCommands, output_format: OutputFormat) -> anyhow::Result<()> {
    let config = load_config()?;

    match cmd {
        ToolCommands::Get { tool, project } => {
            let sync = engine(&config, tool, project)?;
            let payload = sync.load().await?;
            if let Some(discarded) = sync.take_conflict().await {
                tracing::warn!("Local edits to {} were replaced by the server copy", tool);
                eprintln!("Local edits were set aside: {}", serde_json::to_string(&discarded)?);
            }
            output_value(&output_format, &payload, |p| {
                serde_json::to_string_pretty(p).map(|s| vec![s]).unwrap_or_default()
            })
        }
        ToolCommands::Set { tool, file, project } => {
            let payload = read_payload(&file)?;
            let sync = engine(&config, tool, project)?;
            sync.load().await?;
            sync.set(payload).await?;

            match sync.flush().await {
                Ok(()) => output_success(
                    &output_format,
                    &format!("Saved {} at revision {}", tool, sync.revision().await),
                    Some(json!({ "revision": sync.revision().await, "payload": sync.payload().await })),
                ),
                Err(SyncError::Offline(reason)) => output_success(
                    &output_format,
                    &format!("Server unreachable ({}); {} saved locally and will sync next time", reason, tool),
                    Some(json!({ "pending": true })),
                ),
                Err(SyncError::Conflict { server_revision }) => {
                    let discarded = sync.take_conflict().await.unwrap_or(Value::Null);
                    Err(anyhow::anyhow!(
                        "{} changed on the server (revision {}); your version was not saved:\n{}",
                        tool,
                        server_revision,
                        serde_json::to_string_pretty(&discarded)?
                    ))
                }
                Err(e) => Err(e.into()),
            }
        }
    }
}

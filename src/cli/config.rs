use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use uuid::Uuid;

pub const DEFAULT_SERVER: &str = "http://localhost:3000";

const CONFIG_FILE: &str = "config.yaml";
const CACHE_DIR: &str = "cache";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CliConfig {
    pub server: String,
    pub token: Option<String>,
    pub token_expires_at: Option<DateTime<Utc>>,
    pub email: Option<String>,
    /// Project used when a command gets no `--project`
    pub project_id: Option<Uuid>,
}

impl Default for CliConfig {
    fn default() -> Self {
        Self {
            server: DEFAULT_SERVER.to_string(),
            token: None,
            token_expires_at: None,
            email: None,
            project_id: None,
        }
    }
}

impl CliConfig {
    pub fn require_token(&self) -> anyhow::Result<&str> {
        match self.token.as_deref() {
            Some(token) if !token.is_empty() => Ok(token),
            _ => Err(anyhow::anyhow!("Not logged in; run `hhc login --token <token>` first")),
        }
    }

    pub fn project(&self, explicit: Option<Uuid>) -> anyhow::Result<Uuid> {
        explicit
            .or(self.project_id)
            .ok_or_else(|| anyhow::anyhow!("No project selected; pass --project or run `hhc projects use <id>`"))
    }
}

pub fn get_config_dir() -> anyhow::Result<PathBuf> {
    let config_dir = if let Ok(custom_dir) = std::env::var("HHC_CONFIG_DIR") {
        PathBuf::from(custom_dir)
    } else {
        let home = std::env::var("HOME").map_err(|_| anyhow::anyhow!("HOME environment variable not set"))?;
        PathBuf::from(home).join(".config").join("hhc")
    };

    if !config_dir.exists() {
        fs::create_dir_all(&config_dir)?;
    }

    Ok(config_dir)
}

/// Where the sync engine keeps tool state between runs
pub fn cache_dir() -> anyhow::Result<PathBuf> {
    Ok(get_config_dir()?.join(CACHE_DIR))
}

pub fn load_config() -> anyhow::Result<CliConfig> {
    load_config_from(&get_config_dir()?)
}

pub fn save_config(config: &CliConfig) -> anyhow::Result<()> {
    save_config_to(&get_config_dir()?, config)
}

pub fn load_config_from(dir: &Path) -> anyhow::Result<CliConfig> {
    let file = dir.join(CONFIG_FILE);
    if !file.exists() {
        return Ok(CliConfig::default());
    }
    let content = fs::read_to_string(&file)?;
    let config: CliConfig = serde_yaml::from_str(&content)
        .map_err(|e| anyhow::anyhow!("{}: {}", file.display(), e))?;
    Ok(config)
}

pub fn save_config_to(dir: &Path, config: &CliConfig) -> anyhow::Result<()> {
    fs::create_dir_all(dir)?;
    let content = serde_yaml::to_string(config)?;
    fs::write(dir.join(CONFIG_FILE), content)?;
    Ok(())
}

pub mod client;
pub mod commands;
pub mod config;
pub mod utils;

use clap::{Parser, Subcommand};
use serde::{Deserialize, Serialize};

#[derive(Parser)]
#[command(name = "hhc")]
#[command(about = "Hawaii Home Central CLI - projects, renovation tools and share links from the terminal")]
#[command(version)]
pub struct Cli {
    #[arg(long, global = true, help = "Output in human-readable text format")]
    pub text: bool,

    #[arg(long, global = true, help = "Output in JSON format")]
    pub json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    #[command(about = "Store a session token and server URL")]
    Login {
        #[arg(long, env = "HHC_TOKEN", help = "Session token from the web app")]
        token: Option<String>,
        #[arg(long, help = "Google ID token to exchange for a session token")]
        id_token: Option<String>,
        #[arg(long, env = "HHC_SERVER", help = "Server base URL")]
        server: Option<String>,
    },

    #[command(about = "Show the signed-in user")]
    Whoami,

    #[command(about = "List projects and pick the current one")]
    Projects {
        #[command(subcommand)]
        cmd: commands::projects::ProjectCommands,
    },

    #[command(about = "Read and write renovation tool state")]
    Tool {
        #[command(subcommand)]
        cmd: commands::tool::ToolCommands,
    },

    #[command(about = "Read-only share links")]
    Share {
        #[command(subcommand)]
        cmd: commands::share::ShareCommands,
    },
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub enum OutputFormat {
    Text,
    Json,
}

impl OutputFormat {
    pub fn from_cli(cli: &Cli) -> Self {
        if cli.json {
            OutputFormat::Json
        } else {
            OutputFormat::Text
        }
    }
}

pub async fn run(cli: Cli) -> anyhow::Result<()> {
    let output_format = OutputFormat::from_cli(&cli);

    match cli.command {
        Commands::Login { token, id_token, server } => {
            commands::auth::login(token, id_token, server, output_format).await
        }
        Commands::Whoami => commands::auth::whoami(output_format).await,
        Commands::Projects { cmd } => commands::projects::handle(cmd, output_format).await,
        Commands::Tool { cmd } => commands::tool::handle(cmd, output_format).await,
        Commands::Share { cmd } => commands::share::handle(cmd, output_format).await,
    }
}

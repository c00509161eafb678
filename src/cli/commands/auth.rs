use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::cli::client::ApiClient;
use crate::cli::config::{load_config, save_config};
use crate::cli::utils::{field, output_success, output_value};
use crate::cli::OutputFormat;

#[derive(Debug, Deserialize)]
struct SessionReply {
    token: String,
    expires_at: DateTime<Utc>,
}

pub async fn login(
    token: Option<String>,
    id_token: Option<String>,
    server: Option<String>,
    output_format: OutputFormat,
) -> anyhow::Result<()> {
    let mut config = load_config()?;
    if let Some(server) = server {
        config.server = server.trim_end_matches('/').to_string();
    }

    let (token, expires_at) = match (token, id_token) {
        (Some(token), _) => (token, None),
        (None, Some(id_token)) => {
            let client = ApiClient::new(&config.server, None)?;
            let session: SessionReply = client
                .post("/api/auth/google", &json!({ "id_token": id_token }))
                .await?;
            (session.token, Some(session.expires_at))
        }
        (None, None) => anyhow::bail!("Pass --token or --id-token"),
    };

    // Verify before saving
    let user: Value = ApiClient::new(&config.server, Some(&token))?
        .get("/api/auth/whoami")
        .await?;

    let email = field(&user, "email");
    config.token = Some(token);
    config.token_expires_at = expires_at;
    config.email = Some(email.clone());
    if config.project_id.is_none() {
        config.project_id = user["current_project_id"].as_str().and_then(|s| s.parse().ok());
    }
    save_config(&config)?;
    tracing::debug!("Saved session for {} on {}", email, config.server);

    output_success(
        &output_format,
        &format!("Logged in to {} as {}", config.server, email),
        Some(json!({ "server": config.server, "email": email })),
    )
}

pub async fn whoami(output_format: OutputFormat) -> anyhow::Result<()> {
    let config = load_config()?;
    let user: Value = ApiClient::from_config(&config)?.get("/api/auth/whoami").await?;
    output_value(&output_format, &user, |u| {
        vec![
            format!("Email: {}", field(u, "email")),
            format!("Name: {}", field(u, "name")),
            format!("Role: {}", field(u, "role")),
            format!("Server: {}", config.server),
        ]
    })
}

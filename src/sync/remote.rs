//! Server side of the sync engine: the tool API.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::time::Duration;
use thiserror::Error;
use uuid::Uuid;

use crate::services::access::Capability;
use crate::types::ToolKey;

use super::cache::CacheKey;

/// Tool state as the server reports it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteState {
    pub project_id: Uuid,
    pub tool: ToolKey,
    pub capability: Capability,
    pub revision: i64,
    pub updated_at: Option<DateTime<Utc>>,
    pub payload: Value,
}

#[derive(Debug, Error)]
pub enum RemoteError {
    /// The base revision was stale; carries what the server holds now
    #[error("revision conflict, server is at revision {}", .0.revision)]
    Conflict(Box<RemoteState>),

    #[error("server unreachable: {0}")]
    Unreachable(String),

    #[error("server rejected the request ({status}): {message}")]
    Rejected {
        status: u16,
        code: String,
        message: String,
    },
}

#[async_trait]
pub trait RemoteTools: Send + Sync {
    async fn fetch(&self, key: &CacheKey) -> Result<RemoteState, RemoteError>;
    async fn save(&self, key: &CacheKey, payload: &Value, base_revision: Option<i64>) -> Result<RemoteState, RemoteError>;
}

#[derive(Debug, Deserialize)]
struct Envelope {
    #[serde(default)]
    success: bool,
    data: Option<Value>,
    error: Option<String>,
    code: Option<String>,
}

/// `RemoteTools` over HTTP with a session token
#[derive(Debug, Clone)]
pub struct HttpRemote {
    client: reqwest::Client,
    base_url: String,
    token: String,
}

impl HttpRemote {
    pub fn new(base_url: impl Into<String>, token: impl Into<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(15))
            .build()
            .unwrap_or_default();
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token: token.into(),
        }
    }

    fn tool_url(&self, tool: ToolKey) -> String {
        format!("{}/api/tools/{}", self.base_url, tool.as_str())
    }

    async fn read(response: Result<reqwest::Response, reqwest::Error>) -> Result<RemoteState, RemoteError> {
        let response = response.map_err(|e| RemoteError::Unreachable(e.to_string()))?;
        let status = response.status();
        let envelope: Envelope = response.json().await.map_err(|e| RemoteError::Rejected {
            status: status.as_u16(),
            code: "INVALID_RESPONSE".into(),
            message: e.to_string(),
        })?;

        let code = envelope.code.unwrap_or_default();
        if status == StatusCode::CONFLICT && code == "REVISION_CONFLICT" {
            let server = envelope
                .data
                .and_then(|d| serde_json::from_value::<RemoteState>(d).ok())
                .ok_or_else(|| RemoteError::Rejected {
                    status: status.as_u16(),
                    code: code.clone(),
                    message: "conflict without server state".into(),
                })?;
            return Err(RemoteError::Conflict(Box::new(server)));
        }
        if !status.is_success() || !envelope.success {
            return Err(RemoteError::Rejected {
                status: status.as_u16(),
                code,
                message: envelope.error.unwrap_or_else(|| status.to_string()),
            });
        }

        let data = envelope.data.unwrap_or(Value::Null);
        serde_json::from_value(data).map_err(|e| RemoteError::Rejected {
            status: status.as_u16(),
            code: "INVALID_RESPONSE".into(),
            message: e.to_string(),
        })
    }
}

#[async_trait]
impl RemoteTools for HttpRemote {
    async fn fetch(&self, key: &CacheKey) -> Result<RemoteState, RemoteError> {
        let response = self
            .client
            .get(self.tool_url(key.tool))
            .query(&[("project_id", key.project_id.to_string())])
            .bearer_auth(&self.token)
            .send()
            .await;
        Self::read(response).await
    }

    async fn save(&self, key: &CacheKey, payload: &Value, base_revision: Option<i64>) -> Result<RemoteState, RemoteError> {
        let response = self
            .client
            .put(self.tool_url(key.tool))
            .bearer_auth(&self.token)
            .json(&json!({
                "project_id": key.project_id,
                "payload": payload,
                "base_revision": base_revision,
            }))
            .send()
            .await;
        Self::read(response).await
    }
}

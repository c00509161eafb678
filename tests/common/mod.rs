#![allow(dead_code)]

use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use reqwest::{Method, StatusCode};
use serde_json::{json, Value};
use uuid::Uuid;

use sqlx::postgres::PgPoolOptions;

use hawaii_home_central::app::{router, AppState};
use hawaii_home_central::auth::identity::StaticIdentity;
use hawaii_home_central::config::{AppConfig, StoreBackend};
use hawaii_home_central::database::{DatabaseManager, MemoryStore, PgStore, Store};

pub const ADMIN_EMAIL: &str = "admin@example.com";

/// In-process server on a free port. Backed by a fresh PostgreSQL database when
/// `DATABASE_URL` is set, otherwise by the memory store.
pub struct TestServer {
    pub base_url: String,
    pub client: reqwest::Client,
    pub identity: Arc<StaticIdentity>,
    pub store: Arc<dyn Store>,
}

/// A store of the backend selected by `DATABASE_URL`, empty and private to the caller
pub async fn test_store() -> Result<Arc<dyn Store>> {
    match std::env::var("DATABASE_URL") {
        Ok(url) if !url.trim().is_empty() => Ok(Arc::new(fresh_pg_store(&url).await?)),
        _ => Ok(Arc::new(MemoryStore::new())),
    }
}

/// Creates `hhc_test_<uuid>` next to the database in `admin_url` and migrates it
async fn fresh_pg_store(admin_url: &str) -> Result<PgStore> {
    let name = format!("hhc_test_{}", Uuid::new_v4().simple());
    let admin = PgPoolOptions::new()
        .max_connections(1)
        .connect(admin_url)
        .await
        .context("connect to DATABASE_URL")?;
    sqlx::query(&format!("CREATE DATABASE {}", name)).execute(&admin).await?;
    admin.close().await;

    let mut url = url::Url::parse(admin_url)?;
    url.set_path(&name);
    let pool = PgPoolOptions::new().max_connections(10).connect(url.as_str()).await?;
    DatabaseManager::migrate(&pool).await?;
    Ok(PgStore::new(pool))
}

/// A signed-in user
#[derive(Debug, Clone)]
pub struct Session {
    pub token: String,
    pub user_id: Uuid,
    pub email: String,
}

impl TestServer {
    pub async fn start() -> Result<Self> {
        Self::start_with(|_| {}).await
    }

    pub async fn start_with(tweak: impl FnOnce(&mut AppConfig)) -> Result<Self> {
        let port = portpicker::pick_unused_port().context("failed to pick free port")?;
        let base_url = format!("http://127.0.0.1:{}", port);

        let mut config = AppConfig::development();
        config.api.public_base_url = base_url.clone();
        config.auth.admin_emails = vec![ADMIN_EMAIL.to_string()];
        tweak(&mut config);

        let store = test_store().await?;
        config.database.backend = match store.backend_name() {
            "postgres" => StoreBackend::Postgres,
            _ => StoreBackend::Memory,
        };

        let identity = Arc::new(StaticIdentity::new());
        let state = AppState::new(store.clone(), identity.clone(), config);
        let listener = tokio::net::TcpListener::bind(("127.0.0.1", port)).await?;
        tokio::spawn(async move {
            let _ = axum::serve(listener, router(state)).await;
        });

        let server = Self {
            base_url,
            client: reqwest::Client::new(),
            identity,
            store,
        };
        server.wait_ready(Duration::from_secs(5)).await?;
        Ok(server)
    }

    async fn wait_ready(&self, timeout: Duration) -> Result<()> {
        let deadline = Instant::now() + timeout;
        while Instant::now() < deadline {
            if let Ok(resp) = self.client.get(format!("{}/health", self.base_url)).send().await {
                if resp.status() == StatusCode::OK {
                    return Ok(());
                }
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
        anyhow::bail!("server did not become ready on {} within {:?}", self.base_url, timeout)
    }

    /// Sign in through the Google endpoint with a registered static ID token
    pub async fn sign_in(&self, email: &str) -> Result<Session> {
        let (status, body) = self.try_sign_in(email).await?;
        anyhow::ensure!(status == StatusCode::OK, "sign-in of {} failed: {} {}", email, status, body);
        Ok(Session {
            token: body["data"]["token"].as_str().context("token")?.to_string(),
            user_id: body["data"]["user"]["id"].as_str().context("user id")?.parse()?,
            email: email.to_string(),
        })
    }

    pub async fn try_sign_in(&self, email: &str) -> Result<(StatusCode, Value)> {
        let id_token = format!("google-{}", email);
        self.identity.register(&id_token, email, Some("Test User"));
        self.call(Method::POST, "/api/auth/google", None, Some(json!({ "id_token": id_token })))
            .await
    }

    pub async fn call(
        &self,
        method: Method,
        path: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> Result<(StatusCode, Value)> {
        let mut req = self.client.request(method, format!("{}{}", self.base_url, path));
        if let Some(token) = token {
            req = req.bearer_auth(token);
        }
        if let Some(body) = body {
            req = req.json(&body);
        }
        let resp = req.send().await?;
        let status = resp.status();
        let text = resp.text().await?;
        let value = if text.is_empty() {
            Value::Null
        } else {
            serde_json::from_str(&text).unwrap_or(Value::String(text))
        };
        Ok((status, value))
    }

    pub async fn get(&self, path: &str, session: &Session) -> Result<(StatusCode, Value)> {
        self.call(Method::GET, path, Some(&session.token), None).await
    }

    pub async fn post(&self, path: &str, session: &Session, body: Value) -> Result<(StatusCode, Value)> {
        self.call(Method::POST, path, Some(&session.token), Some(body)).await
    }

    pub async fn put(&self, path: &str, session: &Session, body: Value) -> Result<(StatusCode, Value)> {
        self.call(Method::PUT, path, Some(&session.token), Some(body)).await
    }

    pub async fn patch(&self, path: &str, session: &Session, body: Value) -> Result<(StatusCode, Value)> {
        self.call(Method::PATCH, path, Some(&session.token), Some(body)).await
    }

    pub async fn delete(&self, path: &str, session: &Session) -> Result<(StatusCode, Value)> {
        self.call(Method::DELETE, path, Some(&session.token), None).await
    }

    /// The user's current project, created on first use
    pub async fn current_project(&self, session: &Session) -> Result<Uuid> {
        let (status, body) = self.get("/api/projects/current", session).await?;
        anyhow::ensure!(status == StatusCode::OK, "current project: {} {}", status, body);
        Ok(body["data"]["id"].as_str().context("project id")?.parse()?)
    }

    /// Invite `guest` into the owner's project with the given tool access and accept it
    pub async fn add_member(&self, owner: &Session, project: Uuid, guest: &Session, access: Value) -> Result<()> {
        let (status, body) = self
            .post(
                &format!("/api/projects/{}/invites", project),
                owner,
                json!({ "email": guest.email, "tool_access": access }),
            )
            .await?;
        anyhow::ensure!(status == StatusCode::CREATED, "invite: {} {}", status, body);
        let token = body["data"]["token"].as_str().context("invite token")?.to_string();

        let (status, body) = self.post("/api/invites/accept", guest, json!({ "token": token })).await?;
        anyhow::ensure!(status == StatusCode::OK, "accept: {} {}", status, body);
        Ok(())
    }

    /// Promote a user through the admin API
    pub async fn set_role(&self, admin: &Session, user: &Session, role: &str) -> Result<()> {
        let (status, body) = self
            .put(&format!("/api/admin/users/{}/role", user.user_id), admin, json!({ "role": role }))
            .await?;
        anyhow::ensure!(status == StatusCode::OK, "set role: {} {}", status, body);
        Ok(())
    }
}

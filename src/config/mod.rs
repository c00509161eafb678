use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::env;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} is required")]
    Missing(&'static str),

    #[error("{0} {1}")]
    Invalid(&'static str, &'static str),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub environment: Environment,
    pub database: DatabaseConfig,
    pub api: ApiConfig,
    pub security: SecurityConfig,
    pub auth: AuthConfig,
    pub projects: ProjectConfig,
    pub share: ShareConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Environment {
    Development,
    Staging,
    Production,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StoreBackend {
    Postgres,
    Memory,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub backend: StoreBackend,
    #[serde(skip_serializing)]
    pub url: Option<String>,
    pub max_connections: u32,
    pub connection_timeout: u64,
    pub run_migrations: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    pub port: u16,
    pub max_request_size_bytes: usize,
    pub public_base_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityConfig {
    pub cors_origins: Vec<String>,
    #[serde(skip_serializing)]
    pub jwt_secret: String,
    pub jwt_expiry_hours: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    pub google_client_id: String,
    pub admin_emails: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectConfig {
    /// Maximum members per project, owner included
    pub max_members: usize,
    pub invite_expiry_days: i64,
    pub default_project_name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShareConfig {
    pub max_active_per_tool: usize,
    pub default_expiry_days: i64,
    pub max_expiry_days: i64,
}

impl AppConfig {
    pub fn from_env() -> Self {
        let environment = match env::var("APP_ENV").as_deref() {
            Ok("production") | Ok("prod") => Environment::Production,
            Ok("staging") | Ok("stage") => Environment::Staging,
            _ => Environment::Development,
        };

        // Set defaults based on environment, then override with specific env vars
        match environment {
            Environment::Production => Self::production(),
            Environment::Staging => Self::staging(),
            Environment::Development => Self::development(),
        }
        .with_env_overrides()
    }

    fn with_env_overrides(mut self) -> Self {
        // Database overrides
        if let Ok(v) = env::var("HHC_STORE") {
            self.database.backend = match v.to_ascii_lowercase().as_str() {
                "memory" => StoreBackend::Memory,
                _ => StoreBackend::Postgres,
            };
        }
        if let Ok(v) = env::var("DATABASE_URL") {
            self.database.url = Some(v);
        }
        if let Ok(v) = env::var("DATABASE_MAX_CONNECTIONS") {
            self.database.max_connections = v.parse().unwrap_or(self.database.max_connections);
        }
        if let Ok(v) = env::var("DATABASE_CONNECTION_TIMEOUT") {
            self.database.connection_timeout = v.parse().unwrap_or(self.database.connection_timeout);
        }
        if let Ok(v) = env::var("DATABASE_RUN_MIGRATIONS") {
            self.database.run_migrations = v.parse().unwrap_or(self.database.run_migrations);
        }

        // API overrides
        if let Some(port) = env::var("HHC_API_PORT")
            .ok()
            .or_else(|| env::var("PORT").ok())
            .and_then(|s| s.parse::<u16>().ok())
        {
            self.api.port = port;
        }
        if let Ok(v) = env::var("API_MAX_REQUEST_SIZE_BYTES") {
            self.api.max_request_size_bytes = v.parse().unwrap_or(self.api.max_request_size_bytes);
        }
        if let Ok(v) = env::var("API_PUBLIC_BASE_URL") {
            self.api.public_base_url = v.trim_end_matches('/').to_string();
        }

        // Security overrides
        if let Ok(v) = env::var("SECURITY_CORS_ORIGINS") {
            self.security.cors_origins = split_list(&v);
        }
        if let Ok(v) = env::var("SECURITY_JWT_SECRET") {
            self.security.jwt_secret = v;
        }
        if let Ok(v) = env::var("SECURITY_JWT_EXPIRY_HOURS") {
            self.security.jwt_expiry_hours = v.parse().unwrap_or(self.security.jwt_expiry_hours);
        }

        // Auth overrides
        if let Ok(v) = env::var("AUTH_GOOGLE_CLIENT_ID") {
            self.auth.google_client_id = v;
        }
        if let Ok(v) = env::var("AUTH_ADMIN_EMAILS") {
            self.auth.admin_emails = split_list(&v)
                .into_iter()
                .map(|e| crate::types::normalize_email(&e))
                .collect();
        }

        // Project overrides
        if let Ok(v) = env::var("PROJECT_MAX_MEMBERS") {
            self.projects.max_members = v.parse().unwrap_or(self.projects.max_members);
        }
        if let Ok(v) = env::var("PROJECT_INVITE_EXPIRY_DAYS") {
            self.projects.invite_expiry_days = v.parse().unwrap_or(self.projects.invite_expiry_days);
        }
        if let Ok(v) = env::var("PROJECT_DEFAULT_NAME") {
            if !v.trim().is_empty() {
                self.projects.default_project_name = v.trim().to_string();
            }
        }

        // Share overrides
        if let Ok(v) = env::var("SHARE_MAX_ACTIVE_PER_TOOL") {
            self.share.max_active_per_tool = v.parse().unwrap_or(self.share.max_active_per_tool);
        }
        if let Ok(v) = env::var("SHARE_DEFAULT_EXPIRY_DAYS") {
            self.share.default_expiry_days = v.parse().unwrap_or(self.share.default_expiry_days);
        }
        if let Ok(v) = env::var("SHARE_MAX_EXPIRY_DAYS") {
            self.share.max_expiry_days = v.parse().unwrap_or(self.share.max_expiry_days);
        }

        self
    }

    pub fn development() -> Self {
        Self {
            environment: Environment::Development,
            database: DatabaseConfig {
                backend: StoreBackend::Postgres,
                url: None,
                max_connections: 10,
                connection_timeout: 30,
                run_migrations: true,
            },
            api: ApiConfig {
                port: 3000,
                max_request_size_bytes: 10 * 1024 * 1024, // 10MB
                public_base_url: "http://localhost:3000".to_string(),
            },
            security: SecurityConfig {
                cors_origins: vec![],
                jwt_secret: "development-only-secret".to_string(),
                jwt_expiry_hours: 24 * 7, // 1 week
            },
            auth: AuthConfig {
                google_client_id: String::new(),
                admin_emails: vec![],
            },
            projects: ProjectConfig::default(),
            share: ShareConfig::default(),
        }
    }

    fn staging() -> Self {
        Self {
            environment: Environment::Staging,
            database: DatabaseConfig {
                backend: StoreBackend::Postgres,
                url: None,
                max_connections: 20,
                connection_timeout: 10,
                run_migrations: true,
            },
            api: ApiConfig {
                port: 3000,
                max_request_size_bytes: 5 * 1024 * 1024, // 5MB
                public_base_url: "https://staging.hawaiihomecentral.com".to_string(),
            },
            security: SecurityConfig {
                cors_origins: vec!["https://staging.hawaiihomecentral.com".to_string()],
                jwt_secret: String::new(),
                jwt_expiry_hours: 24,
            },
            auth: AuthConfig {
                google_client_id: String::new(),
                admin_emails: vec![],
            },
            projects: ProjectConfig::default(),
            share: ShareConfig::default(),
        }
    }

    fn production() -> Self {
        Self {
            environment: Environment::Production,
            database: DatabaseConfig {
                backend: StoreBackend::Postgres,
                url: None,
                max_connections: 50,
                connection_timeout: 5,
                run_migrations: false,
            },
            api: ApiConfig {
                port: 3000,
                max_request_size_bytes: 2 * 1024 * 1024, // 2MB
                public_base_url: "https://www.hawaiihomecentral.com".to_string(),
            },
            security: SecurityConfig {
                cors_origins: vec!["https://www.hawaiihomecentral.com".to_string()],
                jwt_secret: String::new(),
                jwt_expiry_hours: 24,
            },
            auth: AuthConfig {
                google_client_id: String::new(),
                admin_emails: vec![],
            },
            projects: ProjectConfig::default(),
            share: ShareConfig::default(),
        }
    }

    /// Reject settings the server cannot run with
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.security.jwt_secret.is_empty() {
            return Err(ConfigError::Missing("SECURITY_JWT_SECRET"));
        }
        if self.database.backend == StoreBackend::Postgres && self.database.url.is_none() {
            return Err(ConfigError::Missing("DATABASE_URL"));
        }
        if self.projects.max_members < 1 {
            return Err(ConfigError::Invalid("PROJECT_MAX_MEMBERS", "must be at least 1"));
        }
        if self.share.max_expiry_days < 1 {
            return Err(ConfigError::Invalid("SHARE_MAX_EXPIRY_DAYS", "must be at least 1"));
        }
        if !(1..=self.share.max_expiry_days).contains(&self.share.default_expiry_days) {
            return Err(ConfigError::Invalid(
                "SHARE_DEFAULT_EXPIRY_DAYS",
                "must be between 1 and SHARE_MAX_EXPIRY_DAYS",
            ));
        }
        Ok(())
    }

    /// Whether the email is configured as a permanent site admin
    pub fn is_admin_email(&self, email: &str) -> bool {
        let email = crate::types::normalize_email(email);
        self.auth.admin_emails.iter().any(|e| *e == email)
    }
}

impl Default for ProjectConfig {
    fn default() -> Self {
        Self {
            max_members: 6,
            invite_expiry_days: 14,
            default_project_name: "My Home".to_string(),
        }
    }
}

impl Default for ShareConfig {
    fn default() -> Self {
        Self {
            max_active_per_tool: 5,
            default_expiry_days: 30,
            max_expiry_days: 90,
        }
    }
}

fn split_list(v: &str) -> Vec<String> {
    v.split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

// Global singleton config - initialized once at startup
pub static CONFIG: Lazy<AppConfig> = Lazy::new(AppConfig::from_env);

// Convenience function for accessing config
pub fn config() -> &'static AppConfig {
    &CONFIG
}

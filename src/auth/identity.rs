//! Verification of Google ID tokens.

use async_trait::async_trait;
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::RwLock;
use thiserror::Error;

const GOOGLE_TOKENINFO_URL: &str = "https://oauth2.googleapis.com/tokeninfo";

/// Identity asserted by the provider after verification
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifiedIdentity {
    pub subject: String,
    pub email: String,
    pub email_verified: bool,
    pub name: Option<String>,
    pub picture: Option<String>,
}

#[derive(Debug, Error)]
pub enum IdentityError {
    #[error("identity provider is not configured")]
    NotConfigured,

    #[error("token rejected: {0}")]
    Rejected(String),

    #[error("token issued for another audience")]
    WrongAudience,

    #[error("token expired")]
    Expired,

    #[error("email address is not verified")]
    UnverifiedEmail,

    #[error("identity provider unreachable: {0}")]
    Unreachable(String),
}

#[async_trait]
pub trait IdentityProvider: Send + Sync {
    async fn verify(&self, id_token: &str) -> Result<VerifiedIdentity, IdentityError>;
}

/// Fields of Google's tokeninfo response. Google encodes booleans and numbers as strings.
#[derive(Debug, Deserialize)]
struct TokenInfo {
    aud: String,
    sub: String,
    email: Option<String>,
    email_verified: Option<String>,
    exp: Option<String>,
    name: Option<String>,
    picture: Option<String>,
}

/// Checks ID tokens against Google's tokeninfo endpoint
pub struct GoogleIdentity {
    client: reqwest::Client,
    client_id: String,
    endpoint: String,
}

impl GoogleIdentity {
    pub fn new(client_id: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            client_id: client_id.into(),
            endpoint: GOOGLE_TOKENINFO_URL.to_string(),
        }
    }

    /// Point at another tokeninfo-compatible endpoint
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    fn check(&self, info: TokenInfo, now_secs: i64) -> Result<VerifiedIdentity, IdentityError> {
        if info.aud != self.client_id {
            return Err(IdentityError::WrongAudience);
        }
        let exp = info
            .exp
            .as_deref()
            .and_then(|s| s.parse::<i64>().ok())
            .ok_or_else(|| IdentityError::Rejected("missing expiry".into()))?;
        if exp <= now_secs {
            return Err(IdentityError::Expired);
        }
        if info.email_verified.as_deref() != Some("true") {
            return Err(IdentityError::UnverifiedEmail);
        }
        let email = info
            .email
            .filter(|e| !e.is_empty())
            .ok_or_else(|| IdentityError::Rejected("missing email".into()))?;

        Ok(VerifiedIdentity {
            subject: info.sub,
            email: crate::types::normalize_email(&email),
            email_verified: true,
            name: info.name.filter(|n| !n.trim().is_empty()),
            picture: info.picture.filter(|p| !p.trim().is_empty()),
        })
    }
}

#[async_trait]
impl IdentityProvider for GoogleIdentity {
    async fn verify(&self, id_token: &str) -> Result<VerifiedIdentity, IdentityError> {
        if self.client_id.is_empty() {
            return Err(IdentityError::NotConfigured);
        }

        let response = self
            .client
            .get(&self.endpoint)
            .query(&[("id_token", id_token)])
            .send()
            .await
            .map_err(|e| IdentityError::Unreachable(e.to_string()))?;

        if response.status().is_client_error() {
            return Err(IdentityError::Rejected(format!("status {}", response.status())));
        }
        if !response.status().is_success() {
            return Err(IdentityError::Unreachable(format!("status {}", response.status())));
        }

        let info: TokenInfo = response
            .json()
            .await
            .map_err(|e| IdentityError::Rejected(e.to_string()))?;
        self.check(info, chrono::Utc::now().timestamp())
    }
}

/// Fixed token → identity table, for tests and memory-store development runs
#[derive(Default)]
pub struct StaticIdentity {
    identities: RwLock<HashMap<String, VerifiedIdentity>>,
}

impl StaticIdentity {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `token` as a verified sign-in for `email`
    pub fn register(&self, token: &str, email: &str, name: Option<&str>) {
        let identity = VerifiedIdentity {
            subject: format!("static-{}", email),
            email: crate::types::normalize_email(email),
            email_verified: true,
            name: name.map(str::to_string),
            picture: None,
        };
        if let Ok(mut map) = self.identities.write() {
            map.insert(token.to_string(), identity);
        }
    }
}

#[async_trait]
impl IdentityProvider for StaticIdentity {
    async fn verify(&self, id_token: &str) -> Result<VerifiedIdentity, IdentityError> {
        let map = self
            .identities
            .read()
            .map_err(|_| IdentityError::Unreachable("identity table poisoned".into()))?;
        map.get(id_token)
            .cloned()
            .ok_or_else(|| IdentityError::Rejected("unknown token".into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn info(aud: &str, exp: i64, verified: &str) -> TokenInfo {
        TokenInfo {
            aud: aud.into(),
            sub: "1234".into(),
            email: Some("Noe@Example.com".into()),
            email_verified: Some(verified.into()),
            exp: Some(exp.to_string()),
            name: Some("Noe".into()),
            picture: Some(String::new()),
        }
    }

    #[test]
    fn accepts_valid_token_info() {
        let google = GoogleIdentity::new("client-1");
        let identity = google.check(info("client-1", 2_000, "true"), 1_000).unwrap();
        assert_eq!(identity.email, "noe@example.com");
        assert_eq!(identity.picture, None);
    }

    #[test]
    fn rejects_audience_expiry_and_unverified() {
        let google = GoogleIdentity::new("client-1");
        assert!(matches!(
            google.check(info("client-2", 2_000, "true"), 1_000),
            Err(IdentityError::WrongAudience)
        ));
        assert!(matches!(
            google.check(info("client-1", 1_000, "true"), 1_000),
            Err(IdentityError::Expired)
        ));
        assert!(matches!(
            google.check(info("client-1", 2_000, "false"), 1_000),
            Err(IdentityError::UnverifiedEmail)
        ));
    }

    #[tokio::test]
    async fn static_identity_only_knows_registered_tokens() {
        let identity = StaticIdentity::new();
        identity.register("tok-kai", "Kai@Example.com", Some("Kai"));
        assert_eq!(identity.verify("tok-kai").await.unwrap().email, "kai@example.com");
        assert!(identity.verify("tok-other").await.is_err());
    }

    #[tokio::test]
    async fn unconfigured_google_refuses() {
        let google = GoogleIdentity::new("");
        assert!(matches!(google.verify("x").await, Err(IdentityError::NotConfigured)));
    }
}

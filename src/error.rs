// HTTP API Error Types
use axum::{http::StatusCode, response::IntoResponse, Json};
use serde_json::{json, Value};
use std::collections::HashMap;

use crate::auth::identity::IdentityError;
use crate::auth::AuthError;
use crate::database::DatabaseError;

/// HTTP API error with appropriate status codes and client-friendly messages
#[derive(Debug)]
pub enum ApiError {
    // 400 Bad Request
    BadRequest(String),
    ValidationError {
        message: String,
        field_errors: Option<HashMap<String, String>>,
    },
    InvalidJson(String),

    // 401 Unauthorized
    Unauthorized(String),

    // 403 Forbidden
    Forbidden(String),

    // 404 Not Found
    NotFound(String),

    // 409 Conflict
    Conflict(String),

    // 500 Internal Server Error
    InternalServerError(String),

    // 502 Bad Gateway (identity provider unreachable)
    BadGateway(String),

    // 503 Service Unavailable
    ServiceUnavailable(String),

    /// A business rule with its own error code, optionally carrying data for the client
    Rule {
        status: StatusCode,
        code: &'static str,
        message: String,
        data: Option<Value>,
    },
}

impl ApiError {
    /// Get HTTP status code
    pub fn status_code(&self) -> u16 {
        match self {
            ApiError::BadRequest(_) => 400,
            ApiError::ValidationError { .. } => 400,
            ApiError::InvalidJson(_) => 400,
            ApiError::Unauthorized(_) => 401,
            ApiError::Forbidden(_) => 403,
            ApiError::NotFound(_) => 404,
            ApiError::Conflict(_) => 409,
            ApiError::InternalServerError(_) => 500,
            ApiError::BadGateway(_) => 502,
            ApiError::ServiceUnavailable(_) => 503,
            ApiError::Rule { status, .. } => status.as_u16(),
        }
    }

    /// Get client-safe error message
    pub fn message(&self) -> &str {
        match self {
            ApiError::BadRequest(msg) => msg,
            ApiError::ValidationError { message, .. } => message,
            ApiError::InvalidJson(msg) => msg,
            ApiError::Unauthorized(msg) => msg,
            ApiError::Forbidden(msg) => msg,
            ApiError::NotFound(msg) => msg,
            ApiError::Conflict(msg) => msg,
            ApiError::InternalServerError(msg) => msg,
            ApiError::BadGateway(msg) => msg,
            ApiError::ServiceUnavailable(msg) => msg,
            ApiError::Rule { message, .. } => message,
        }
    }

    /// Get error code for client handling
    pub fn error_code(&self) -> &'static str {
        match self {
            ApiError::BadRequest(_) => "BAD_REQUEST",
            ApiError::ValidationError { .. } => "VALIDATION_ERROR",
            ApiError::InvalidJson(_) => "INVALID_JSON",
            ApiError::Unauthorized(_) => "UNAUTHORIZED",
            ApiError::Forbidden(_) => "FORBIDDEN",
            ApiError::NotFound(_) => "NOT_FOUND",
            ApiError::Conflict(_) => "CONFLICT",
            ApiError::InternalServerError(_) => "INTERNAL_SERVER_ERROR",
            ApiError::BadGateway(_) => "BAD_GATEWAY",
            ApiError::ServiceUnavailable(_) => "SERVICE_UNAVAILABLE",
            ApiError::Rule { code, .. } => code,
        }
    }

    /// Convert to JSON response body
    pub fn to_json(&self) -> Value {
        let mut body = json!({
            "success": false,
            "error": self.message(),
            "code": self.error_code(),
        });

        match self {
            ApiError::ValidationError {
                field_errors: Some(field_errors),
                ..
            } => {
                body["field_errors"] = json!(field_errors);
            }
            ApiError::Rule { data: Some(data), .. } => {
                body["data"] = data.clone();
            }
            _ => {}
        }

        body
    }
}

// Static constructor methods
impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        ApiError::BadRequest(message.into())
    }

    pub fn validation_error(
        message: impl Into<String>,
        field_errors: Option<HashMap<String, String>>,
    ) -> Self {
        ApiError::ValidationError {
            message: message.into(),
            field_errors,
        }
    }

    /// Validation error for a single field
    pub fn field(field: &str, problem: impl Into<String>) -> Self {
        let mut field_errors = HashMap::new();
        field_errors.insert(field.to_string(), problem.into());
        ApiError::validation_error("Invalid request", Some(field_errors))
    }

    pub fn invalid_json(message: impl Into<String>) -> Self {
        ApiError::InvalidJson(message.into())
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        ApiError::Unauthorized(message.into())
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        ApiError::Forbidden(message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        ApiError::NotFound(message.into())
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        ApiError::Conflict(message.into())
    }

    pub fn internal_server_error(message: impl Into<String>) -> Self {
        ApiError::InternalServerError(message.into())
    }

    pub fn bad_gateway(message: impl Into<String>) -> Self {
        ApiError::BadGateway(message.into())
    }

    pub fn service_unavailable(message: impl Into<String>) -> Self {
        ApiError::ServiceUnavailable(message.into())
    }

    pub fn rule(status: StatusCode, code: &'static str, message: impl Into<String>) -> Self {
        ApiError::Rule {
            status,
            code,
            message: message.into(),
            data: None,
        }
    }

    /// Attach data to a rule error; other variants are returned unchanged
    pub fn with_data(self, value: Value) -> Self {
        match self {
            ApiError::Rule {
                status,
                code,
                message,
                ..
            } => ApiError::Rule {
                status,
                code,
                message,
                data: Some(value),
            },
            other => other,
        }
    }

    pub fn maintenance() -> Self {
        Self::rule(
            StatusCode::SERVICE_UNAVAILABLE,
            "MAINTENANCE",
            "The site is in maintenance mode",
        )
    }

    pub fn not_allowlisted() -> Self {
        Self::rule(
            StatusCode::FORBIDDEN,
            "NOT_ALLOWLISTED",
            "This account is not on the access list",
        )
    }

    pub fn project_archived() -> Self {
        Self::rule(StatusCode::CONFLICT, "PROJECT_ARCHIVED", "Project is archived")
    }
}

impl From<DatabaseError> for ApiError {
    fn from(err: DatabaseError) -> Self {
        match err {
            DatabaseError::NotFound(what) => ApiError::not_found(format!("{} not found", what)),
            DatabaseError::Conflict(msg) => ApiError::conflict(msg),
            DatabaseError::LimitReached(max) => ApiError::conflict(format!("Limit of {} reached", max)),
            DatabaseError::Sqlx(sqlx::Error::PoolTimedOut) => {
                tracing::error!("Database pool timed out");
                ApiError::service_unavailable("Database temporarily unavailable")
            }
            DatabaseError::Migration(e) => {
                tracing::error!("Migration error: {}", e);
                ApiError::service_unavailable("Service is being updated, please try again later")
            }
            other => {
                // Log the real error but return generic message
                tracing::error!("Storage error: {}", other);
                ApiError::internal_server_error("Database error occurred")
            }
        }
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::MissingSecret | AuthError::TokenGeneration(_) => {
                tracing::error!("Token issuing failed: {}", err);
                ApiError::internal_server_error("Unable to issue session token")
            }
            other => ApiError::unauthorized(other.to_string()),
        }
    }
}

impl From<IdentityError> for ApiError {
    fn from(err: IdentityError) -> Self {
        match err {
            IdentityError::Unreachable(msg) => {
                tracing::error!("Identity provider unreachable: {}", msg);
                ApiError::bad_gateway("Identity provider unavailable")
            }
            IdentityError::NotConfigured => {
                tracing::error!("Identity provider is not configured");
                ApiError::service_unavailable("Sign-in is not configured")
            }
            other => {
                tracing::warn!("Rejected identity token: {}", other);
                ApiError::unauthorized("Invalid identity token")
            }
        }
    }
}

impl From<axum::extract::rejection::JsonRejection> for ApiError {
    fn from(rejection: axum::extract::rejection::JsonRejection) -> Self {
        ApiError::invalid_json(rejection.body_text())
    }
}

// Standard error trait implementations
impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message())
    }
}

impl std::error::Error for ApiError {}

// Automatic HTTP response conversion for Axum
impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let status =
            StatusCode::from_u16(self.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (status, Json(self.to_json())).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn body_uses_failure_envelope() {
        let body = ApiError::not_found("Project not found").to_json();
        assert_eq!(body["success"], false);
        assert_eq!(body["error"], "Project not found");
        assert_eq!(body["code"], "NOT_FOUND");
        assert!(body.get("field_errors").is_none());
    }

    #[test]
    fn rule_errors_carry_code_and_data() {
        let err = ApiError::rule(StatusCode::CONFLICT, "REVISION_CONFLICT", "stale")
            .with_data(json!({"revision": 4}));
        assert_eq!(err.status_code(), 409);
        let body = err.to_json();
        assert_eq!(body["code"], "REVISION_CONFLICT");
        assert_eq!(body["data"]["revision"], 4);
    }

    #[test]
    fn field_errors_are_listed() {
        let body = ApiError::field("email", "must be a valid email address").to_json();
        assert_eq!(body["code"], "VALIDATION_ERROR");
        assert_eq!(body["field_errors"]["email"], "must be a valid email address");
    }

    #[test]
    fn storage_details_are_not_exposed() {
        let err: ApiError = DatabaseError::CorruptRow("role: unknown user role 'x'".into()).into();
        assert_eq!(err.status_code(), 500);
        assert!(!err.message().contains("role"));

        let err: ApiError = DatabaseError::conflict("slug 'lanai' is taken").into();
        assert_eq!(err.status_code(), 409);
    }
}

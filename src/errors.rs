use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("missing authorization code")]
    MissingCode,

    #[error("unknown or expired oauth state")]
    StateMismatch,

    #[error("token exchange failed: {0}")]
    AuthExchange(String),

    #[error("no refresh token stored for tenant '{tenant_id}'")]
    NoRefreshToken { tenant_id: String },

    #[error("refresh rejected by vendor: {0}")]
    RefreshRejected(String),

    #[error("authentication expired")]
    AuthenticationExpired,

    #[error("vendor rejected the query: {0}")]
    InvalidQuery(String),

    #[error("vendor rate limit hit")]
    RateLimited,

    #[error("vendor unavailable: {0}")]
    VendorUnavailable(String),

    #[error("pipeline '{query}' not found")]
    PipelineNotFound {
        query: String,
        available: Vec<String>,
    },

    #[error("all fetch strategies failed")]
    FallbackExhausted { attempts: Vec<(String, String)> },

    #[error("token store error: {0}")]
    Store(String),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    /// Wrap a transport-level failure (DNS, connect timeout, TLS) from the
    /// vendor client. Vendor HTTP status codes are mapped separately in
    /// `ghl::map_status`.
    pub fn transport(e: reqwest::Error) -> Self {
        AppError::VendorUnavailable(e.to_string())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_type, code, msg, remediation) = match &self {
            AppError::MissingCode => (
                StatusCode::BAD_REQUEST,
                "invalid_request_error",
                "missing_code",
                self.to_string(),
                Some("restart the flow at /oauth/init"),
            ),
            AppError::StateMismatch => (
                StatusCode::BAD_REQUEST,
                "invalid_request_error",
                "state_mismatch",
                self.to_string(),
                Some("restart the flow at /oauth/init"),
            ),
            AppError::AuthExchange(_) => (
                StatusCode::BAD_GATEWAY,
                "authentication_error",
                "auth_exchange_failed",
                self.to_string(),
                Some("authorization codes are single-use; restart at /oauth/init"),
            ),
            AppError::NoRefreshToken { .. } => (
                StatusCode::UNAUTHORIZED,
                "authentication_error",
                "no_refresh_token",
                self.to_string(),
                Some("visit /oauth/init to authenticate"),
            ),
            AppError::RefreshRejected(_) => (
                StatusCode::BAD_GATEWAY,
                "authentication_error",
                "refresh_rejected",
                self.to_string(),
                Some("visit /oauth/init to re-authenticate"),
            ),
            AppError::AuthenticationExpired => (
                StatusCode::UNAUTHORIZED,
                "authentication_error",
                "authentication_expired",
                self.to_string(),
                Some("visit /oauth/init to re-authenticate"),
            ),
            AppError::InvalidQuery(_) => (
                StatusCode::BAD_REQUEST,
                "invalid_request_error",
                "invalid_query",
                self.to_string(),
                None,
            ),
            AppError::RateLimited => (
                StatusCode::TOO_MANY_REQUESTS,
                "rate_limit_error",
                "vendor_rate_limited",
                self.to_string(),
                Some("wait and retry; the bridge does not retry on your behalf"),
            ),
            AppError::VendorUnavailable(_) => (
                StatusCode::BAD_GATEWAY,
                "upstream_error",
                "vendor_unavailable",
                self.to_string(),
                None,
            ),
            AppError::PipelineNotFound { .. } => (
                StatusCode::NOT_FOUND,
                "invalid_request_error",
                "pipeline_not_found",
                self.to_string(),
                None,
            ),
            AppError::FallbackExhausted { attempts } => (
                StatusCode::BAD_GATEWAY,
                "upstream_error",
                "fallback_exhausted",
                format!(
                    "all fetch strategies failed: {}",
                    attempts
                        .iter()
                        .map(|(tier, err)| format!("[{tier}] {err}"))
                        .collect::<Vec<_>>()
                        .join("; ")
                ),
                Some("if the failures are 401s, visit /oauth/init to re-authenticate"),
            ),
            AppError::Store(e) => {
                tracing::error!("token store error: {}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    "internal_server_error",
                    "internal server error".to_string(),
                    None,
                )
            }
            AppError::Database(e) => {
                tracing::error!("database error: {}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    "internal_server_error",
                    "internal server error".to_string(),
                    None,
                )
            }
            AppError::Internal(e) => {
                tracing::error!("internal error: {}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    "internal_server_error",
                    "internal server error".to_string(),
                    None,
                )
            }
        };

        let mut error = json!({
            "message": msg,
            "type": error_type,
            "code": code,
        });
        if let Some(hint) = remediation {
            error["remediation"] = json!(hint);
        }
        if let AppError::PipelineNotFound { available, .. } = &self {
            error["available_pipelines"] = json!(available);
        }

        let body = Json(json!({ "success": false, "error": error }));
        let mut response = (status, body).into_response();

        // Pass the vendor's rate limit along as a hint; nothing here retries.
        if matches!(self, AppError::RateLimited) {
            response
                .headers_mut()
                .insert("retry-after", axum::http::HeaderValue::from_static("60"));
        }

        response
    }
}

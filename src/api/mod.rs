//! HTTP API endpoints.

pub mod chat;
pub mod health;
pub mod rate_limit;

use axum::Router;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;

use crate::AppState;
use crate::entitlement::AccessDecision;

/// Create the API router.
pub fn create_router() -> Router<AppState> {
    Router::new().merge(chat::router()).merge(health::router())
}

/// Structured API error response.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// The request body could not be parsed.
    #[error("bad request")]
    BadRequest(String),
    /// Missing or unusable credentials for this operation.
    #[error("unauthorized")]
    Unauthorized,
    /// The identity's daily message cap is spent until the next UTC day.
    #[error("daily message cap exceeded")]
    DailyCapExceeded { retry_after_secs: u64 },
    /// The admission gate denied the action.
    #[error("forbidden")]
    Denied(AccessDecision),
    /// The actor may not touch this resource.
    #[error("forbidden")]
    Forbidden,
    /// The resource does not exist.
    #[error("not found")]
    NotFound,
    /// Internal failure; details stay in the logs.
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: &'static str,
    message: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            Self::BadRequest(message) => (
                StatusCode::BAD_REQUEST,
                axum::Json(ErrorBody {
                    error: "bad_request",
                    message,
                }),
            )
                .into_response(),
            Self::DailyCapExceeded { retry_after_secs } => rate_limit::RateLimitError {
                error: "daily_message_cap_exceeded".to_string(),
                message: "Daily message limit reached. Try again tomorrow.".to_string(),
                retry_after_secs: Some(retry_after_secs),
            }
            .into_response(),
            Self::Unauthorized => (
                StatusCode::UNAUTHORIZED,
                axum::Json(ErrorBody {
                    error: "unauthorized",
                    message: "Authentication required.".to_string(),
                }),
            )
                .into_response(),
            Self::Denied(decision) => {
                (StatusCode::FORBIDDEN, axum::Json(DenialBody::from(decision))).into_response()
            }
            Self::Forbidden => (
                StatusCode::FORBIDDEN,
                axum::Json(ErrorBody {
                    error: "forbidden",
                    message: "You do not have access to this resource.".to_string(),
                }),
            )
                .into_response(),
            Self::NotFound => (
                StatusCode::NOT_FOUND,
                axum::Json(ErrorBody {
                    error: "not_found",
                    message: "Resource not found.".to_string(),
                }),
            )
                .into_response(),
            Self::Internal(e) => {
                tracing::error!(error = %e, "Internal error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    axum::Json(ErrorBody {
                        error: "internal_error",
                        message: "Something went wrong. Please try again.".to_string(),
                    }),
                )
                    .into_response()
            }
        }
    }
}

/// Response body for an admission denial, carrying the remediation hints
/// the client renders.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DenialBody {
    /// Denial reason code.
    error: Option<crate::entitlement::DenyReason>,
    requires_login: bool,
    requires_upgrade: bool,
    requires_contact: bool,
    limits: crate::entitlement::PlanLimits,
    usage: crate::usage::UsageRecord,
}

impl From<AccessDecision> for DenialBody {
    fn from(decision: AccessDecision) -> Self {
        Self {
            error: decision.reason,
            requires_login: decision.requires_login,
            requires_upgrade: decision.requires_upgrade,
            requires_contact: decision.requires_contact,
            limits: decision.limits,
            usage: decision.usage,
        }
    }
}

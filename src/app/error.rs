use crate::auth::AuthError;
use crate::config::AppConfig;
use crate::ports::StoreError;
use crate::push::DispatchError;

use axum::Json;
use axum::body::Body;
use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use axum::http::{Request, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use serde::Serialize;

use std::sync::Arc;

pub(crate) const INTERNAL_ERROR_MESSAGE: &str = "Internal server error";

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{0}")]
    Validation(String),
    #[error("Validation failed")]
    InvalidFields(Vec<String>),
    #[error("{0}")]
    Unauthorized(String),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Conflict(String),
    #[error("Push notifications are not configured")]
    PushNotConfigured,
    #[error("internal error: {0}")]
    Internal(String),
}

impl ApiError {
    pub(crate) fn validation(message: impl Into<String>) -> Self {
        ApiError::Validation(message.into())
    }

    pub(crate) fn internal(err: impl std::fmt::Display) -> Self {
        ApiError::Internal(err.to_string())
    }
}

#[derive(Serialize)]
pub(crate) struct ErrorResponse {
    pub(crate) success: bool,
    pub(crate) error: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub(crate) errors: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) details: Option<String>,
}

impl ErrorResponse {
    pub(crate) fn new(error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: error.into(),
            errors: Vec::new(),
            details: None,
        }
    }
}

/// Detail of a 500 response, surfaced to clients in development only.
#[derive(Clone, Debug)]
pub(crate) struct InternalDetails(pub(crate) String);

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            ApiError::Validation(_) | ApiError::InvalidFields(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::PushNotConfigured => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        match self {
            ApiError::Internal(detail) => {
                tracing::error!(error = %detail, "request failed");
                let mut response =
                    (status, Json(ErrorResponse::new(INTERNAL_ERROR_MESSAGE))).into_response();
                response.extensions_mut().insert(InternalDetails(detail));
                response
            }
            ApiError::InvalidFields(errors) => {
                let body = ErrorResponse {
                    errors,
                    ..ErrorResponse::new("Validation failed")
                };
                (status, Json(body)).into_response()
            }
            other => (status, Json(ErrorResponse::new(other.to_string()))).into_response(),
        }
    }
}

pub(crate) async fn expose_internal_details(
    State(config): State<Arc<AppConfig>>,
    req: Request<Body>,
    next: Next,
) -> Response {
    let response = next.run(req).await;
    if !config.environment.is_development() {
        return response;
    }
    let Some(InternalDetails(detail)) = response.extensions().get::<InternalDetails>().cloned()
    else {
        return response;
    };
    let body = ErrorResponse {
        details: Some(detail),
        ..ErrorResponse::new(INTERNAL_ERROR_MESSAGE)
    };
    (response.status(), Json(body)).into_response()
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::Validation(rejection.body_text())
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(_) => ApiError::NotFound("User not found".to_string()),
            StoreError::Conflict(field) => ApiError::Conflict(format!("{field} is already taken")),
            other => ApiError::internal(other),
        }
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::InvalidToken | AuthError::MissingSubject => {
                ApiError::Unauthorized("Invalid token".to_string())
            }
            AuthError::ExpiredToken => ApiError::Unauthorized("Token expired".to_string()),
            other => ApiError::internal(other),
        }
    }
}

impl From<DispatchError> for ApiError {
    fn from(err: DispatchError) -> Self {
        match err {
            DispatchError::Validation(message) => ApiError::Validation(message),
            DispatchError::UserNotFound(_) => ApiError::NotFound("User not found".to_string()),
            DispatchError::NoMatchingUsers => {
                ApiError::NotFound("No users found for the given emails".to_string())
            }
            DispatchError::Store(err) => err.into(),
            DispatchError::Payload(err) => ApiError::internal(err),
        }
    }
}

use crate::app::error::ApiError;
use crate::ports::PushSender;
use crate::state::AppState;
use crate::types::user::{UserSummary, normalize_email};

use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use serde::{Deserialize, Serialize};

#[derive(Serialize)]
pub(crate) struct UserLookupResponse {
    success: bool,
    user: UserSummary,
}

pub(crate) async fn by_email<S: PushSender>(
    State(state): State<AppState<S>>,
    Path(email): Path<String>,
) -> Result<Json<UserLookupResponse>, ApiError> {
    let email = normalize_email(&email);
    if email.is_empty() {
        return Err(ApiError::validation("email is required"));
    }
    let user = state
        .users
        .find_by_email(&email)?
        .filter(|user| user.active)
        .ok_or_else(|| ApiError::NotFound("User not found".to_string()))?;
    Ok(Json(UserLookupResponse {
        success: true,
        user: user.summary(),
    }))
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct EmailsRequest {
    emails: Option<Vec<String>>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct UsersLookupResponse {
    success: bool,
    users: Vec<UserSummary>,
    found: usize,
    total: usize,
    not_found: Vec<String>,
}

/// Unmatched addresses come back as sent, before normalization.
pub(crate) async fn by_emails<S: PushSender>(
    State(state): State<AppState<S>>,
    payload: Result<Json<EmailsRequest>, JsonRejection>,
) -> Result<Json<UsersLookupResponse>, ApiError> {
    let Json(request) = payload?;
    let emails = request
        .emails
        .ok_or_else(|| ApiError::validation("an array of emails is required"))?;
    if emails.is_empty() {
        return Err(ApiError::validation("at least one email is required"));
    }

    let active = state.users.list_active()?;
    let mut users: Vec<UserSummary> = Vec::new();
    let mut not_found = Vec::new();
    for email in &emails {
        let normalized = normalize_email(email);
        match active.iter().find(|user| user.email == normalized) {
            Some(user) if !users.iter().any(|found| found.id == user.id) => {
                users.push(user.summary())
            }
            Some(_) => {}
            None => not_found.push(email.clone()),
        }
    }

    Ok(Json(UsersLookupResponse {
        success: true,
        found: users.len(),
        total: emails.len(),
        users,
        not_found,
    }))
}

use crate::app::auth::CurrentUser;
use crate::app::error::ApiError;
use crate::app::push::{UserSendResponse, dispatcher};
use crate::ports::PushSender;
use crate::push::SentNotification;
use crate::state::AppState;
use crate::types::push::{Notification, NotificationData, NotificationOptions};
use crate::types::user::Role;

use axum::Extension;
use axum::Json;
use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;
use uuid::Uuid;

const DEFAULT_KIND: &str = "message";

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct DirectNotificationRequest {
    target_user_id: Option<String>,
    title: Option<String>,
    message: Option<String>,
    #[serde(rename = "type")]
    kind: Option<String>,
    #[serde(default)]
    data: Map<String, Value>,
}

/// Builds the `data` bag: caller fields first, then `type`, `fromUser` and `timestamp`.
fn direct_data(
    mut extra: Map<String, Value>,
    kind: &str,
    from: &CurrentUser,
    now: OffsetDateTime,
) -> Result<NotificationData, ApiError> {
    let url = match extra.remove("url") {
        Some(Value::String(url)) if !url.trim().is_empty() => url,
        _ => NotificationData::default().url,
    };
    let timestamp = now.format(&Rfc3339).map_err(ApiError::internal)?;
    extra.insert("type".to_string(), json!(kind));
    extra.insert(
        "fromUser".to_string(),
        json!({ "id": from.0.id, "username": from.0.username }),
    );
    extra.insert("timestamp".to_string(), json!(timestamp));
    Ok(NotificationData { url, extra })
}

pub(crate) async fn send_to_user<S: PushSender>(
    State(state): State<AppState<S>>,
    Extension(sender): Extension<CurrentUser>,
    payload: Result<Json<DirectNotificationRequest>, JsonRejection>,
) -> Result<Json<UserSendResponse>, ApiError> {
    let dispatcher = dispatcher(&state)?;
    let Json(request) = payload?;
    let (Some(target), Some(title)) = (
        request.target_user_id.filter(|id| !id.trim().is_empty()),
        request.title.filter(|title| !title.trim().is_empty()),
    ) else {
        return Err(ApiError::validation("targetUserId and title are required"));
    };

    let target = Uuid::parse_str(target.trim())
        .ok()
        .and_then(|id| state.users.find_by_id(id).transpose())
        .transpose()?
        .ok_or_else(|| ApiError::NotFound("Target user not found".to_string()))?;

    let kind = request
        .kind
        .filter(|kind| !kind.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_KIND.to_string());
    let now = OffsetDateTime::now_utc();
    let mut options = NotificationOptions {
        data: direct_data(request.data, &kind, &sender, now)?,
        tag: kind.clone(),
        ..Default::default()
    };
    if let Some(message) = request.message.clone().filter(|m| !m.trim().is_empty()) {
        options.body = message;
    }
    let notification = Notification::new(title.clone(), options);

    let report = dispatcher.send_to_user(target.id, &notification).await?;
    state.history.record(SentNotification {
        id: Uuid::new_v4(),
        from_user_id: sender.0.id,
        to_user_id: target.id,
        to_username: target.username.clone(),
        title,
        message: request.message,
        kind,
        sent: report.sent,
        failed: report.failed,
        sent_at: now,
    });
    tracing::info!(
        from = %sender.0.id,
        to = %target.id,
        sent = report.sent,
        failed = report.failed,
        "direct notification sent"
    );

    Ok(Json(report.into()))
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct AvailableUser {
    id: Uuid,
    username: String,
    email: String,
    role: Role,
    has_subscriptions: bool,
}

#[derive(Serialize)]
pub(crate) struct AvailableUsersResponse {
    success: bool,
    users: Vec<AvailableUser>,
}

/// Other active users that can currently receive a push.
pub(crate) async fn available_users<S: PushSender>(
    State(state): State<AppState<S>>,
    Extension(CurrentUser(me)): Extension<CurrentUser>,
) -> Result<Json<AvailableUsersResponse>, ApiError> {
    let users = state
        .users
        .list_active()?
        .into_iter()
        .filter(|user| user.id != me.id && !user.subscriptions.is_empty())
        .map(|user| AvailableUser {
            id: user.id,
            username: user.username,
            email: user.email,
            role: user.role,
            has_subscriptions: true,
        })
        .collect();
    Ok(Json(AvailableUsersResponse {
        success: true,
        users,
    }))
}

#[derive(Serialize)]
pub(crate) struct HistoryResponse {
    success: bool,
    history: Vec<SentNotification>,
}

pub(crate) async fn sent_history<S: PushSender>(
    State(state): State<AppState<S>>,
    Extension(CurrentUser(me)): Extension<CurrentUser>,
) -> Json<HistoryResponse> {
    Json(HistoryResponse {
        success: true,
        history: state.history.sent_by(me.id),
    })
}

use crate::adapters::SystemClock;
use crate::app::auth::{AckResponse, CurrentUser};
use crate::app::error::ApiError;
use crate::ports::PushSender;
use crate::push::{self as push_service, Dispatcher, PushStats};
use crate::state::AppState;
use crate::types::dispatch::{BatchReport, UserReport};
use crate::types::push::{
    Notification, NotificationOptions, Subscription, SubscriptionKeys, Urgency,
};

use axum::Extension;
use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

/// Fields shared by every send route; `message` becomes the body and `url` the click target.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct NotificationFields {
    pub(crate) title: Option<String>,
    pub(crate) message: Option<String>,
    pub(crate) icon: Option<String>,
    pub(crate) url: Option<String>,
    pub(crate) image: Option<String>,
    pub(crate) tag: Option<String>,
    pub(crate) badge: Option<String>,
    pub(crate) urgency: Option<Urgency>,
    /// Seconds.
    pub(crate) ttl: Option<u64>,
    pub(crate) require_interaction: Option<bool>,
}

fn present(value: Option<String>) -> Option<String> {
    value.filter(|value| !value.trim().is_empty())
}

impl NotificationFields {
    pub(crate) fn into_notification(self) -> Result<Notification, ApiError> {
        let title = present(self.title).ok_or_else(|| ApiError::validation("title is required"))?;
        let mut options = NotificationOptions::default();
        if let Some(body) = present(self.message) {
            options.body = body;
        }
        if let Some(icon) = present(self.icon) {
            options.icon = icon;
        }
        if let Some(url) = present(self.url) {
            options.data.url = url;
        }
        options.image = present(self.image);
        if let Some(tag) = present(self.tag) {
            options.tag = tag;
        }
        if let Some(badge) = present(self.badge) {
            options.badge = badge;
        }
        if let Some(urgency) = self.urgency {
            options.urgency = urgency;
        }
        if let Some(ttl) = self.ttl {
            options.ttl = std::time::Duration::from_secs(ttl);
        }
        options.require_interaction = self.require_interaction.unwrap_or(false);
        Ok(Notification::new(title, options))
    }
}

pub(crate) fn dispatcher<S: PushSender>(
    state: &AppState<S>,
) -> Result<&Dispatcher<S, SystemClock>, ApiError> {
    state.push.as_ref().ok_or(ApiError::PushNotConfigured)
}

#[derive(Serialize)]
pub(crate) struct UserSendResponse {
    pub(crate) success: bool,
    pub(crate) message: String,
    pub(crate) results: UserReport,
}

impl From<UserReport> for UserSendResponse {
    fn from(report: UserReport) -> Self {
        Self {
            success: !report.has_no_subscriptions(),
            message: report.message(),
            results: report,
        }
    }
}

#[derive(Serialize)]
pub(crate) struct BatchSendResponse {
    success: bool,
    message: String,
    results: BatchReport,
}

impl From<BatchReport> for BatchSendResponse {
    fn from(report: BatchReport) -> Self {
        Self {
            success: report.success,
            message: report.message(),
            results: report,
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct PublicKeyResponse {
    success: bool,
    public_key: String,
}

pub(crate) async fn vapid_public_key<S: PushSender>(
    State(state): State<AppState<S>>,
) -> Result<Json<PublicKeyResponse>, ApiError> {
    let vapid = state
        .config
        .push
        .vapid
        .ready()
        .ok_or(ApiError::PushNotConfigured)?;
    Ok(Json(PublicKeyResponse {
        success: true,
        public_key: vapid.public_key.clone(),
    }))
}

#[derive(Debug, Deserialize)]
pub(crate) struct SubscriptionBody {
    #[serde(default)]
    endpoint: String,
    #[serde(default)]
    keys: SubscriptionKeys,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct SubscribeRequest {
    subscription: Option<SubscriptionBody>,
}

pub(crate) async fn subscribe<S: PushSender>(
    State(state): State<AppState<S>>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    payload: Result<Json<SubscribeRequest>, JsonRejection>,
) -> Result<Json<AckResponse>, ApiError> {
    let Json(request) = payload?;
    let body = request
        .subscription
        .ok_or_else(|| ApiError::validation("subscription is required"))?;
    let subscription = Subscription::new(body.endpoint, body.keys, OffsetDateTime::now_utc());
    subscription
        .validate()
        .map_err(|err| ApiError::Validation(err.to_string()))?;

    let endpoint = subscription.endpoint.clone();
    state
        .users
        .append_or_replace_subscription(user.id, subscription)?;
    tracing::info!(user_id = %user.id, endpoint = %endpoint, "push subscription saved");
    Ok(AckResponse::ok("Subscription saved"))
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct UnsubscribeRequest {
    endpoint: Option<String>,
}

pub(crate) async fn unsubscribe<S: PushSender>(
    State(state): State<AppState<S>>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    payload: Result<Json<UnsubscribeRequest>, JsonRejection>,
) -> Result<Json<AckResponse>, ApiError> {
    let Json(request) = payload?;
    let endpoint =
        present(request.endpoint).ok_or_else(|| ApiError::validation("endpoint is required"))?;
    let removed = state
        .users
        .remove_subscription_by_endpoint(user.id, &endpoint)?;
    tracing::info!(user_id = %user.id, endpoint = %endpoint, removed, "push subscription removed");
    Ok(AckResponse::ok("Subscription removed"))
}

pub(crate) async fn send<S: PushSender>(
    State(state): State<AppState<S>>,
    payload: Result<Json<NotificationFields>, JsonRejection>,
) -> Result<Json<BatchSendResponse>, ApiError> {
    let dispatcher = dispatcher(&state)?;
    let Json(fields) = payload?;
    let notification = fields.into_notification()?;
    let report = dispatcher.broadcast(&notification).await?;
    Ok(Json(report.into()))
}

pub(crate) async fn send_to_user<S: PushSender>(
    State(state): State<AppState<S>>,
    Path(user_id): Path<String>,
    payload: Result<Json<NotificationFields>, JsonRejection>,
) -> Result<Json<UserSendResponse>, ApiError> {
    let dispatcher = dispatcher(&state)?;
    let Json(fields) = payload?;
    let notification = fields.into_notification()?;
    let user_id = Uuid::parse_str(user_id.trim())
        .map_err(|_| ApiError::NotFound("User not found".to_string()))?;
    let report = dispatcher.send_to_user(user_id, &notification).await?;
    Ok(Json(report.into()))
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct SendToUsersRequest {
    user_ids: Option<Vec<String>>,
    #[serde(flatten)]
    fields: NotificationFields,
}

pub(crate) async fn send_to_users<S: PushSender>(
    State(state): State<AppState<S>>,
    payload: Result<Json<SendToUsersRequest>, JsonRejection>,
) -> Result<Json<BatchSendResponse>, ApiError> {
    let dispatcher = dispatcher(&state)?;
    let Json(request) = payload?;
    let notification = request.fields.into_notification()?;
    let raw_ids = request
        .user_ids
        .ok_or_else(|| ApiError::validation("userIds (array) is required"))?;

    let mut user_ids = Vec::with_capacity(raw_ids.len());
    let mut malformed = Vec::new();
    for raw in raw_ids {
        match Uuid::parse_str(raw.trim()) {
            Ok(id) => user_ids.push(id),
            Err(_) => malformed.push(raw),
        }
    }

    let mut report = dispatcher.send_to_users(&user_ids, &notification).await?;
    report.unmatched.extend(malformed);
    Ok(Json(report.into()))
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct SendToEmailRequest {
    email: Option<String>,
    #[serde(flatten)]
    fields: NotificationFields,
}

pub(crate) async fn send_to_email<S: PushSender>(
    State(state): State<AppState<S>>,
    payload: Result<Json<SendToEmailRequest>, JsonRejection>,
) -> Result<Json<UserSendResponse>, ApiError> {
    let dispatcher = dispatcher(&state)?;
    let Json(request) = payload?;
    let notification = request.fields.into_notification()?;
    let email = present(request.email).ok_or_else(|| ApiError::validation("email is required"))?;
    let report = dispatcher.send_to_email(&email, &notification).await?;
    Ok(Json(report.into()))
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct SendToEmailsRequest {
    emails: Option<Vec<String>>,
    #[serde(flatten)]
    fields: NotificationFields,
}

pub(crate) async fn send_to_emails<S: PushSender>(
    State(state): State<AppState<S>>,
    payload: Result<Json<SendToEmailsRequest>, JsonRejection>,
) -> Result<Json<BatchSendResponse>, ApiError> {
    let dispatcher = dispatcher(&state)?;
    let Json(request) = payload?;
    let notification = request.fields.into_notification()?;
    let emails = request
        .emails
        .ok_or_else(|| ApiError::validation("emails (array) is required"))?;
    let report = dispatcher.send_to_emails(&emails, &notification).await?;
    Ok(Json(report.into()))
}

#[derive(Serialize)]
pub(crate) struct StatsResponse {
    success: bool,
    #[serde(flatten)]
    stats: PushStats,
}

pub(crate) async fn stats<S: PushSender>(
    State(state): State<AppState<S>>,
) -> Result<Json<StatsResponse>, ApiError> {
    let stats = push_service::stats(state.users.as_ref(), &state.config.push)?;
    Ok(Json(StatsResponse {
        success: true,
        stats,
    }))
}

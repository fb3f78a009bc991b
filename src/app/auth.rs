use crate::app::error::ApiError;
use crate::auth as auth_service;
use crate::ports::PushSender;
use crate::state::AppState;
use crate::types::user::{
    User, UserProfile, UserSummary, normalize_email, validate_email, validate_password,
    validate_username,
};

use axum::Extension;
use axum::Json;
use axum::body::Body;
use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use axum::http::header::AUTHORIZATION;
use axum::http::{HeaderMap, Request, StatusCode};
use axum::middleware::Next;
use axum::response::Response;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

const INVALID_CREDENTIALS: &str = "Invalid credentials";

/// The verified, active account behind the request's bearer token.
#[derive(Clone, Debug)]
pub(crate) struct CurrentUser(pub(crate) User);

pub(crate) async fn auth_middleware<S: PushSender>(
    State(state): State<AppState<S>>,
    mut req: Request<Body>,
    next: Next,
) -> Result<Response, ApiError> {
    let user_id = {
        let token = bearer_token(req.headers())
            .ok_or_else(|| ApiError::Unauthorized("Access token required".to_string()))?;
        state.auth.verify_token(token)?
    };

    let user = state
        .users
        .find_by_id(user_id)?
        .ok_or_else(|| ApiError::Unauthorized("User not found".to_string()))?;
    if !user.active {
        return Err(ApiError::Unauthorized("User is deactivated".to_string()));
    }

    req.extensions_mut().insert(CurrentUser(user));
    Ok(next.run(req).await)
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let raw = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = raw.trim().split_once(' ')?;
    let token = token.trim();
    (scheme.eq_ignore_ascii_case("bearer") && !token.is_empty()).then_some(token)
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct RegisterRequest {
    username: Option<String>,
    email: Option<String>,
    password: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct LoginRequest {
    email: Option<String>,
    password: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct UpdateProfileRequest {
    username: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ChangePasswordRequest {
    current_password: Option<String>,
    new_password: Option<String>,
}

#[derive(Serialize)]
pub(crate) struct SessionResponse {
    success: bool,
    message: &'static str,
    token: String,
    user: UserSummary,
}

#[derive(Serialize)]
pub(crate) struct ProfileResponse {
    success: bool,
    user: UserProfile,
}

#[derive(Serialize)]
pub(crate) struct SummaryResponse {
    success: bool,
    message: &'static str,
    user: UserSummary,
}

#[derive(Serialize)]
pub(crate) struct UsersResponse {
    success: bool,
    users: Vec<UserProfile>,
}

#[derive(Serialize)]
pub(crate) struct AckResponse {
    pub(crate) success: bool,
    pub(crate) message: &'static str,
}

impl AckResponse {
    pub(crate) fn ok(message: &'static str) -> Json<Self> {
        Json(Self {
            success: true,
            message,
        })
    }
}

fn required(value: Option<String>) -> Option<String> {
    value.filter(|value| !value.trim().is_empty())
}

pub(crate) async fn register<S: PushSender>(
    State(state): State<AppState<S>>,
    payload: Result<Json<RegisterRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<SessionResponse>), ApiError> {
    let Json(request) = payload?;
    let (Some(username), Some(email), Some(password)) = (
        required(request.username),
        required(request.email),
        required(request.password),
    ) else {
        return Err(ApiError::validation("username, email and password are required"));
    };

    let mut errors = Vec::new();
    let username = validate_username(&username).map_err(|err| errors.push(err)).ok();
    let email = validate_email(&email).map_err(|err| errors.push(err)).ok();
    if let Err(err) = validate_password(&password) {
        errors.push(err);
    }
    let (Some(username), Some(email)) = (username, email) else {
        return Err(ApiError::InvalidFields(errors));
    };
    if !errors.is_empty() {
        return Err(ApiError::InvalidFields(errors));
    }

    if state.users.find_by_email(&email)?.is_some()
        || state.users.find_by_username(&username)?.is_some()
    {
        return Err(ApiError::Conflict("User already exists".to_string()));
    }

    let password_hash = auth_service::hash_password(&password).map_err(ApiError::internal)?;
    let user = User::new(username, email, password_hash, OffsetDateTime::now_utc());
    let token = state.auth.issue_token(user.id)?;
    let summary = user.summary();
    state.users.insert(user).map_err(|err| match ApiError::from(err) {
        ApiError::Conflict(_) => ApiError::Conflict("User already exists".to_string()),
        other => other,
    })?;
    tracing::info!(user_id = %summary.id, username = %summary.username, "user registered");

    Ok((
        StatusCode::CREATED,
        Json(SessionResponse {
            success: true,
            message: "User registered",
            token,
            user: summary,
        }),
    ))
}

pub(crate) async fn login<S: PushSender>(
    State(state): State<AppState<S>>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<Json<SessionResponse>, ApiError> {
    let Json(request) = payload?;
    let (Some(email), Some(password)) = (required(request.email), request.password) else {
        return Err(ApiError::validation("email and password are required"));
    };

    let candidate = state
        .users
        .find_by_email(&normalize_email(&email))?
        .filter(|user| user.active);
    let verified = match &candidate {
        Some(user) => auth_service::verify_password(&password, &user.password_hash),
        None => auth_service::verify_without_account(&password),
    };
    let Some(user) = candidate.filter(|_| verified) else {
        tracing::info!("login rejected");
        return Err(ApiError::Unauthorized(INVALID_CREDENTIALS.to_string()));
    };

    let token = state.auth.issue_token(user.id)?;
    tracing::info!(user_id = %user.id, "user logged in");
    Ok(Json(SessionResponse {
        success: true,
        message: "Login successful",
        token,
        user: user.summary(),
    }))
}

pub(crate) async fn profile(
    Extension(CurrentUser(user)): Extension<CurrentUser>,
) -> Json<ProfileResponse> {
    Json(ProfileResponse {
        success: true,
        user: user.profile(),
    })
}

pub(crate) async fn update_profile<S: PushSender>(
    State(state): State<AppState<S>>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    payload: Result<Json<UpdateProfileRequest>, JsonRejection>,
) -> Result<Json<SummaryResponse>, ApiError> {
    let Json(request) = payload?;
    let user = match request.username {
        Some(raw) => {
            let username = validate_username(&raw).map_err(ApiError::Validation)?;
            state
                .users
                .rename(user.id, &username, OffsetDateTime::now_utc())
                .map_err(|err| match ApiError::from(err) {
                    ApiError::Conflict(_) => {
                        ApiError::Conflict("Username is already taken".to_string())
                    }
                    other => other,
                })?
        }
        None => user,
    };

    Ok(Json(SummaryResponse {
        success: true,
        message: "Profile updated",
        user: user.summary(),
    }))
}

pub(crate) async fn change_password<S: PushSender>(
    State(state): State<AppState<S>>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    payload: Result<Json<ChangePasswordRequest>, JsonRejection>,
) -> Result<Json<AckResponse>, ApiError> {
    let Json(request) = payload?;
    let (Some(current), Some(new)) = (
        required(request.current_password),
        required(request.new_password),
    ) else {
        return Err(ApiError::validation(
            "currentPassword and newPassword are required",
        ));
    };
    validate_password(&new).map_err(ApiError::Validation)?;

    if !auth_service::verify_password(&current, &user.password_hash) {
        return Err(ApiError::Unauthorized(
            "Current password is incorrect".to_string(),
        ));
    }

    let password_hash = auth_service::hash_password(&new).map_err(ApiError::internal)?;
    state
        .users
        .set_password_hash(user.id, password_hash, OffsetDateTime::now_utc())?;
    tracing::info!(user_id = %user.id, "password changed");

    Ok(AckResponse::ok("Password updated"))
}

pub(crate) async fn list_users<S: PushSender>(
    State(state): State<AppState<S>>,
) -> Result<Json<UsersResponse>, ApiError> {
    let users = state
        .users
        .list_active()?
        .iter()
        .map(User::profile)
        .collect();
    Ok(Json(UsersResponse {
        success: true,
        users,
    }))
}

use crate::ports::PushSender;
use crate::state::AppState;

use axum::Json;
use axum::Router;
use axum::extract::State;
use axum::http::{StatusCode, Uri};
use axum::middleware;
use axum::routing::{delete, get, post, put};
use serde::Serialize;
use time::OffsetDateTime;

mod auth;
pub mod content;
pub mod error;
mod notifications;
mod push;
mod users;

pub use error::ApiError;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

const ENDPOINT_PREFIXES: [&str; 8] = [
    "/api/auth",
    "/api/images",
    "/api/push",
    "/api/notifications",
    "/api/posts",
    "/api/users",
    "/api/health",
    "/api/system-info",
];

pub fn router<S: PushSender>(state: AppState<S>) -> Router {
    let protected = Router::new()
        .route(
            "/api/auth/profile",
            get(auth::profile).put(auth::update_profile::<S>),
        )
        .route("/api/auth/change-password", put(auth::change_password::<S>))
        .route("/api/auth/users", get(auth::list_users::<S>))
        .route("/api/push/subscribe", post(push::subscribe::<S>))
        .route("/api/push/subscription", delete(push::unsubscribe::<S>))
        .route("/api/push/send", post(push::send::<S>))
        .route(
            "/api/push/send-to-user/{user_id}",
            post(push::send_to_user::<S>),
        )
        .route("/api/push/send-to-users", post(push::send_to_users::<S>))
        .route("/api/push/send-to-email", post(push::send_to_email::<S>))
        .route("/api/push/send-to-emails", post(push::send_to_emails::<S>))
        .route("/api/push/stats", get(push::stats::<S>))
        .route("/api/users/email/{email}", get(users::by_email::<S>))
        .route("/api/users/emails", post(users::by_emails::<S>))
        .route(
            "/api/notifications/send-to-user",
            post(notifications::send_to_user::<S>),
        )
        .route(
            "/api/notifications/available-users",
            get(notifications::available_users::<S>),
        )
        .route(
            "/api/notifications/sent-history",
            get(notifications::sent_history::<S>),
        )
        .route(
            "/api/posts",
            get(content::list_posts).post(content::create_post),
        )
        .route("/api/posts/{id}", get(content::get_post))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth::auth_middleware::<S>,
        ));

    Router::new()
        .route("/", get(root))
        .route("/api/health", get(health::<S>))
        .route("/api/system-info", get(system_info::<S>))
        .route("/api/auth/register", post(auth::register::<S>))
        .route("/api/auth/login", post(auth::login::<S>))
        .route(
            "/api/push/vapid-public-key",
            get(push::vapid_public_key::<S>),
        )
        .route(
            "/api/images",
            get(content::list_images::<S>).post(content::create_image::<S>),
        )
        .route("/api/images/{id}", get(content::get_image::<S>))
        .merge(protected)
        .fallback(not_found)
        .layer(middleware::from_fn_with_state(
            state.config.clone(),
            error::expose_internal_details,
        ))
        .with_state(state)
}

#[derive(Serialize)]
struct RootResponse {
    message: &'static str,
    version: &'static str,
    endpoints: [&'static str; 8],
}

async fn root() -> Json<RootResponse> {
    Json(RootResponse {
        message: "herald accounts and push notification server",
        version: VERSION,
        endpoints: ENDPOINT_PREFIXES,
    })
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct HealthResponse {
    success: bool,
    status: &'static str,
    environment: &'static str,
    database: &'static str,
    uptime_seconds: u64,
    version: &'static str,
    #[serde(with = "time::serde::rfc3339")]
    timestamp: OffsetDateTime,
}

async fn health<S: PushSender>(State(state): State<AppState<S>>) -> Json<HealthResponse> {
    let database = match state.users.ping() {
        Ok(()) => "connected",
        Err(err) => {
            tracing::warn!(error = %err, "user store health check failed");
            "disconnected"
        }
    };
    Json(HealthResponse {
        success: true,
        status: if database == "connected" { "ok" } else { "degraded" },
        environment: state.config.environment.as_str(),
        database,
        uptime_seconds: state.started_at.elapsed().as_secs(),
        version: VERSION,
        timestamp: OffsetDateTime::now_utc(),
    })
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SystemInfo {
    version: &'static str,
    platform: &'static str,
    arch: &'static str,
    uptime_seconds: u64,
    environment: &'static str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct Features {
    notifications: bool,
    user_messaging: bool,
    persistent_store: bool,
}

#[derive(Serialize)]
struct SystemInfoResponse {
    success: bool,
    system: SystemInfo,
    features: Features,
}

async fn system_info<S: PushSender>(
    State(state): State<AppState<S>>,
) -> Json<SystemInfoResponse> {
    Json(SystemInfoResponse {
        success: true,
        system: SystemInfo {
            version: VERSION,
            platform: std::env::consts::OS,
            arch: std::env::consts::ARCH,
            uptime_seconds: state.started_at.elapsed().as_secs(),
            environment: state.config.environment.as_str(),
        },
        features: Features {
            notifications: state.push.is_some(),
            user_messaging: state.push.is_some(),
            persistent_store: state.config.data_file.is_some(),
        },
    })
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct NotFoundResponse {
    success: bool,
    error: &'static str,
    requested_url: String,
    available_endpoints: [&'static str; 8],
}

async fn not_found(uri: Uri) -> (StatusCode, Json<NotFoundResponse>) {
    (
        StatusCode::NOT_FOUND,
        Json(NotFoundResponse {
            success: false,
            error: "Route not found",
            requested_url: uri.to_string(),
            available_endpoints: ENDPOINT_PREFIXES,
        }),
    )
}

#[cfg(test)]
#[allow(non_snake_case)]
pub(crate) mod tests {
    use super::*;
    use crate::adapters::SystemClock;
    use crate::auth::AuthState;
    use crate::config::{self, PushConfig};
    use crate::ports::UserStore;
    use crate::push::{Dispatcher, FakeSender, VapidConfigStatus, load_vapid_config};
    use crate::store::UserDirectory;
    use crate::types::user::User;
    use axum::body::Body;
    use axum::body::to_bytes;
    use axum::http::Request;
    use axum::http::header::{AUTHORIZATION, CONTENT_TYPE};
    use axum::response::Response;
    use serde_json::{Value as JsonValue, json};
    use std::sync::Arc;
    use tower::ServiceExt;

    struct TestApp {
        state: AppState<FakeSender>,
        store: Arc<UserDirectory>,
        sender: FakeSender,
    }

    impl TestApp {
        fn new() -> Self {
            Self::with_push(ready_push())
        }

        fn without_push() -> Self {
            Self::with_push(PushConfig {
                vapid: VapidConfigStatus::Missing,
            })
        }

        fn with_push(push: PushConfig) -> Self {
            let config = config::AppConfig {
                push,
                ..Default::default()
            };
            let auth = AuthState::from_config(&config.auth).expect("auth state");
            let store = Arc::new(UserDirectory::in_memory());
            let users: Arc<dyn UserStore> = store.clone();
            let sender = FakeSender::default();
            let dispatcher = config
                .push
                .is_configured()
                .then(|| Dispatcher::new(Arc::clone(&users), sender.clone(), SystemClock));
            Self {
                state: AppState::new(config, auth, users, dispatcher),
                store,
                sender,
            }
        }

        fn seed_user(&self, name: &str, password: &str, endpoints: &[&str]) -> User {
            let mut user = User::new(
                name.to_string(),
                format!("{name}@example.com"),
                crate::auth::hash_password(password).expect("hash"),
                OffsetDateTime::UNIX_EPOCH,
            );
            for endpoint in endpoints {
                user.upsert_subscription(crate::push::test_subscription(endpoint));
            }
            self.store.insert(user.clone()).expect("insert user");
            user
        }

        fn token_for(&self, user: &User) -> String {
            self.state.auth.issue_token(user.id).expect("token")
        }

        async fn call(&self, request: Request<Body>) -> Response {
            router(self.state.clone())
                .oneshot(request)
                .await
                .expect("request failed")
        }
    }

    fn ready_push() -> PushConfig {
        PushConfig {
            vapid: load_vapid_config(
                Some("private"),
                Some("BCRweRf_U5iQM4pKNucGRzM6OuLp8Hisa8yX0N2ePIf1"),
                Some("mailto:ops@example.com"),
            ),
        }
    }

    fn json_request(method: &str, uri: &str, token: Option<&str>, body: JsonValue) -> Request<Body> {
        let mut builder = Request::builder()
            .method(method)
            .uri(uri)
            .header(CONTENT_TYPE, "application/json");
        if let Some(token) = token {
            builder = builder.header(AUTHORIZATION, format!("Bearer {token}"));
        }
        builder.body(Body::from(body.to_string())).unwrap()
    }

    fn get_request(uri: &str, token: Option<&str>) -> Request<Body> {
        let mut builder = Request::builder().uri(uri);
        if let Some(token) = token {
            builder = builder.header(AUTHORIZATION, format!("Bearer {token}"));
        }
        builder.body(Body::empty()).unwrap()
    }

    async fn body_json(response: Response) -> JsonValue {
        let body = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("read body");
        serde_json::from_slice(&body).expect("parse json")
    }

    #[tokio::test]
    async fn health__should_report_connected_store() {
        // Given
        let app = TestApp::new();

        // When
        let response = app.call(get_request("/api/health", None)).await;

        // Then
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["status"], "ok");
        assert_eq!(body["database"], "connected");
        assert_eq!(body["environment"], "development");
    }

    #[tokio::test]
    async fn fallback__should_list_known_endpoints() {
        // Given
        let app = TestApp::new();

        // When
        let response = app.call(get_request("/api/nope", None)).await;

        // Then
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let body = body_json(response).await;
        assert_eq!(body["success"], false);
        assert_eq!(body["requestedUrl"], "/api/nope");
        assert_eq!(body["availableEndpoints"].as_array().map(Vec::len), Some(8));
    }

    #[tokio::test]
    async fn register__should_return_token_and_summary_without_hash() {
        // Given
        let app = TestApp::new();
        let request = json_request(
            "POST",
            "/api/auth/register",
            None,
            json!({ "username": "marta", "email": " Marta@Example.com ", "password": "secret-1" }),
        );

        // When
        let response = app.call(request).await;

        // Then
        assert_eq!(response.status(), StatusCode::CREATED);
        let body = body_json(response).await;
        assert_eq!(body["success"], true);
        assert_eq!(body["user"]["email"], "marta@example.com");
        assert_eq!(body["user"]["role"], "user");
        assert!(body["user"].get("passwordHash").is_none());
        let token = body["token"].as_str().expect("token");
        assert!(app.state.auth.verify_token(token).is_ok());
    }

    #[tokio::test]
    async fn register__should_reject_duplicate_email_with_conflict() {
        // Given
        let app = TestApp::new();
        app.seed_user("marta", "secret-1", &[]);
        let request = json_request(
            "POST",
            "/api/auth/register",
            None,
            json!({ "username": "other", "email": "marta@example.com", "password": "secret-1" }),
        );

        // When
        let response = app.call(request).await;

        // Then
        assert_eq!(response.status(), StatusCode::CONFLICT);
        assert_eq!(app.store.list_active().expect("list").len(), 1);
    }

    #[tokio::test]
    async fn register__should_list_every_invalid_field() {
        // Given
        let app = TestApp::new();
        let request = json_request(
            "POST",
            "/api/auth/register",
            None,
            json!({ "username": "ab", "email": "not-an-email", "password": "123" }),
        );

        // When
        let response = app.call(request).await;

        // Then
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body_json(response).await;
        assert_eq!(body["errors"].as_array().map(Vec::len), Some(3));
    }

    #[tokio::test]
    async fn login__should_not_reveal_which_credential_was_wrong() {
        // Given
        let app = TestApp::new();
        app.seed_user("marta", "secret-1", &[]);

        // When
        let wrong_password = app
            .call(json_request(
                "POST",
                "/api/auth/login",
                None,
                json!({ "email": "marta@example.com", "password": "nope-nope" }),
            ))
            .await;
        let unknown_email = app
            .call(json_request(
                "POST",
                "/api/auth/login",
                None,
                json!({ "email": "ghost@example.com", "password": "secret-1" }),
            ))
            .await;

        // Then
        assert_eq!(wrong_password.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(unknown_email.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(body_json(wrong_password).await, body_json(unknown_email).await);
    }

    #[tokio::test]
    async fn login__should_issue_token_for_valid_credentials() {
        // Given
        let app = TestApp::new();
        let marta = app.seed_user("marta", "secret-1", &[]);

        // When
        let response = app
            .call(json_request(
                "POST",
                "/api/auth/login",
                None,
                json!({ "email": "MARTA@example.com", "password": "secret-1" }),
            ))
            .await;

        // Then
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        let token = body["token"].as_str().expect("token");
        assert_eq!(app.state.auth.verify_token(token).expect("verify"), marta.id);
    }

    #[tokio::test]
    async fn auth_middleware__should_reject_missing_and_invalid_tokens() {
        // Given
        let app = TestApp::new();

        // When
        let missing = app.call(get_request("/api/auth/profile", None)).await;
        let invalid = app
            .call(get_request("/api/auth/profile", Some("not.a.token")))
            .await;

        // Then
        assert_eq!(missing.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(invalid.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(body_json(invalid).await["error"], "Invalid token");
    }

    #[tokio::test]
    async fn auth_middleware__should_reject_deactivated_users() {
        // Given
        let app = TestApp::new();
        let mut marta = app.seed_user("marta", "secret-1", &[]);
        let token = app.token_for(&marta);
        marta.active = false;
        app.store.save(&marta).expect("save");

        // When
        let response = app
            .call(get_request("/api/auth/profile", Some(&token)))
            .await;

        // Then
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn profile__should_exclude_password_and_subscriptions() {
        // Given
        let app = TestApp::new();
        let marta = app.seed_user("marta", "secret-1", &["https://a/1"]);
        let token = app.token_for(&marta);

        // When
        let response = app
            .call(get_request("/api/auth/profile", Some(&token)))
            .await;

        // Then
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["user"]["username"], "marta");
        assert!(body["user"].get("passwordHash").is_none());
        assert!(body["user"].get("subscriptions").is_none());
    }

    #[tokio::test]
    async fn update_profile__should_reject_taken_username() {
        // Given
        let app = TestApp::new();
        let marta = app.seed_user("marta", "secret-1", &[]);
        app.seed_user("luis", "secret-1", &[]);
        let token = app.token_for(&marta);

        // When
        let response = app
            .call(json_request(
                "PUT",
                "/api/auth/profile",
                Some(&token),
                json!({ "username": "luis" }),
            ))
            .await;

        // Then
        assert_eq!(response.status(), StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn change_password__should_require_current_password() {
        // Given
        let app = TestApp::new();
        let marta = app.seed_user("marta", "secret-1", &[]);
        let token = app.token_for(&marta);

        // When
        let wrong = app
            .call(json_request(
                "PUT",
                "/api/auth/change-password",
                Some(&token),
                json!({ "currentPassword": "wrong-1", "newPassword": "secret-2" }),
            ))
            .await;
        let short = app
            .call(json_request(
                "PUT",
                "/api/auth/change-password",
                Some(&token),
                json!({ "currentPassword": "secret-1", "newPassword": "123" }),
            ))
            .await;
        let ok = app
            .call(json_request(
                "PUT",
                "/api/auth/change-password",
                Some(&token),
                json!({ "currentPassword": "secret-1", "newPassword": "secret-2" }),
            ))
            .await;

        // Then
        assert_eq!(wrong.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(short.status(), StatusCode::BAD_REQUEST);
        assert_eq!(ok.status(), StatusCode::OK);
        let stored = app.store.find_by_id(marta.id).expect("find").expect("user");
        assert!(crate::auth::verify_password("secret-2", &stored.password_hash));
    }

    #[tokio::test]
    async fn subscribe__should_keep_one_entry_per_endpoint() {
        // Given
        let app = TestApp::new();
        let marta = app.seed_user("marta", "secret-1", &[]);
        let token = app.token_for(&marta);
        let body = |auth: &str| {
            json!({ "subscription": {
                "endpoint": "https://push.example/1",
                "keys": { "p256dh": "p256", "auth": auth }
            }})
        };

        // When
        let first = app
            .call(json_request("POST", "/api/push/subscribe", Some(&token), body("a")))
            .await;
        let second = app
            .call(json_request("POST", "/api/push/subscribe", Some(&token), body("b")))
            .await;

        // Then
        assert_eq!(first.status(), StatusCode::OK);
        assert_eq!(second.status(), StatusCode::OK);
        let stored = app.store.find_by_id(marta.id).expect("find").expect("user");
        assert_eq!(stored.subscriptions.len(), 1);
        assert_eq!(stored.subscriptions[0].keys.auth, "b");
    }

    #[tokio::test]
    async fn subscribe__should_reject_missing_keys() {
        // Given
        let app = TestApp::new();
        let marta = app.seed_user("marta", "secret-1", &[]);
        let token = app.token_for(&marta);

        // When
        let response = app
            .call(json_request(
                "POST",
                "/api/push/subscribe",
                Some(&token),
                json!({ "subscription": { "endpoint": "https://push.example/1" } }),
            ))
            .await;

        // Then
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn unsubscribe__should_ignore_unknown_endpoint() {
        // Given
        let app = TestApp::new();
        let marta = app.seed_user("marta", "secret-1", &["https://a/1"]);
        let token = app.token_for(&marta);

        // When
        let response = app
            .call(json_request(
                "DELETE",
                "/api/push/subscription",
                Some(&token),
                json!({ "endpoint": "https://a/unknown" }),
            ))
            .await;

        // Then
        assert_eq!(response.status(), StatusCode::OK);
        let stored = app.store.find_by_id(marta.id).expect("find").expect("user");
        assert_eq!(stored.subscriptions.len(), 1);
    }

    #[tokio::test]
    async fn send__should_return_aggregate_and_prune_gone_endpoints() {
        // Given
        let app = TestApp::new();
        let marta = app.seed_user("marta", "secret-1", &["https://a/1", "https://a/gone"]);
        app.seed_user("luis", "secret-1", &["https://b/1"]);
        app.sender.fail("https://a/gone", Some(410));
        let token = app.token_for(&marta);

        // When
        let response = app
            .call(json_request(
                "POST",
                "/api/push/send",
                Some(&token),
                json!({ "title": "Hello", "message": "World" }),
            ))
            .await;

        // Then
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["success"], true);
        assert_eq!(body["results"]["totalSent"], 2);
        assert_eq!(body["results"]["totalFailed"], 1);
        let stored = app.store.find_by_id(marta.id).expect("find").expect("user");
        assert_eq!(stored.subscriptions.len(), 1);
    }

    #[tokio::test]
    async fn send__should_return_200_when_every_delivery_fails() {
        // Given
        let app = TestApp::new();
        let marta = app.seed_user("marta", "secret-1", &["https://a/1"]);
        app.sender.fail("https://a/1", Some(500));
        let token = app.token_for(&marta);

        // When
        let response = app
            .call(json_request(
                "POST",
                "/api/push/send",
                Some(&token),
                json!({ "title": "Hello" }),
            ))
            .await;

        // Then
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["success"], false);
        assert_eq!(body["results"]["totalFailed"], 1);
    }

    #[tokio::test]
    async fn send__should_require_title() {
        // Given
        let app = TestApp::new();
        let marta = app.seed_user("marta", "secret-1", &["https://a/1"]);
        let token = app.token_for(&marta);

        // When
        let response = app
            .call(json_request(
                "POST",
                "/api/push/send",
                Some(&token),
                json!({ "message": "no title" }),
            ))
            .await;

        // Then
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(app.sender.sent_endpoints().is_empty());
    }

    #[tokio::test]
    async fn send__should_report_unconfigured_push_before_validating() {
        // Given
        let app = TestApp::without_push();
        let marta = app.seed_user("marta", "secret-1", &["https://a/1"]);
        let token = app.token_for(&marta);

        // When
        let response = app
            .call(json_request("POST", "/api/push/send", Some(&token), json!({})))
            .await;

        // Then
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn send_to_user__should_report_missing_subscriptions() {
        // Given
        let app = TestApp::new();
        let marta = app.seed_user("marta", "secret-1", &[]);
        let token = app.token_for(&marta);

        // When
        let response = app
            .call(json_request(
                "POST",
                &format!("/api/push/send-to-user/{}", marta.id),
                Some(&token),
                json!({ "title": "Hello" }),
            ))
            .await;

        // Then
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["success"], false);
        assert_eq!(body["results"]["status"], "no_active_subscriptions");
    }

    #[tokio::test]
    async fn send_to_emails__should_report_unmatched_addresses() {
        // Given
        let app = TestApp::new();
        let marta = app.seed_user("marta", "secret-1", &["https://a/1"]);
        app.seed_user("luis", "secret-1", &["https://b/1"]);
        app.seed_user("ines", "secret-1", &["https://c/1"]);
        let token = app.token_for(&marta);

        // When
        let response = app
            .call(json_request(
                "POST",
                "/api/push/send-to-emails",
                Some(&token),
                json!({
                    "title": "Hello",
                    "emails": ["marta@example.com", "LUIS@example.com", "ghost@example.com"]
                }),
            ))
            .await;

        // Then
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["results"]["totalUsers"], 2);
        assert_eq!(body["results"]["totalSent"], 2);
        assert_eq!(body["results"]["unmatched"], json!(["ghost@example.com"]));
    }

    #[tokio::test]
    async fn send_to_email__should_return_404_for_unknown_address() {
        // Given
        let app = TestApp::new();
        let marta = app.seed_user("marta", "secret-1", &["https://a/1"]);
        let token = app.token_for(&marta);

        // When
        let response = app
            .call(json_request(
                "POST",
                "/api/push/send-to-email",
                Some(&token),
                json!({ "title": "Hello", "email": "ghost@example.com" }),
            ))
            .await;

        // Then
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn stats__should_report_counts_and_configuration() {
        // Given
        let app = TestApp::new();
        let marta = app.seed_user("marta", "secret-1", &["https://a/1", "https://a/2"]);
        app.seed_user("luis", "secret-1", &[]);
        let token = app.token_for(&marta);

        // When
        let response = app.call(get_request("/api/push/stats", Some(&token))).await;

        // Then
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["totalUsers"], 2);
        assert_eq!(body["usersWithSubscriptions"], 1);
        assert_eq!(body["totalSubscriptions"], 2);
        assert_eq!(body["configured"], true);
        assert_eq!(body["vapidPublicKey"], "BCRweRf_U5iQM4pKNucG...");
    }

    #[tokio::test]
    async fn vapid_public_key__should_be_public() {
        // Given
        let app = TestApp::new();

        // When
        let response = app
            .call(get_request("/api/push/vapid-public-key", None))
            .await;

        // Then
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(
            body["publicKey"],
            "BCRweRf_U5iQM4pKNucGRzM6OuLp8Hisa8yX0N2ePIf1"
        );
    }

    #[tokio::test]
    async fn users_by_emails__should_split_found_and_missing() {
        // Given
        let app = TestApp::new();
        let marta = app.seed_user("marta", "secret-1", &[]);
        let token = app.token_for(&marta);

        // When
        let response = app
            .call(json_request(
                "POST",
                "/api/users/emails",
                Some(&token),
                json!({ "emails": ["Marta@example.com", "ghost@example.com"] }),
            ))
            .await;

        // Then
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["found"], 1);
        assert_eq!(body["total"], 2);
        assert_eq!(body["notFound"], json!(["ghost@example.com"]));
        assert_eq!(body["users"][0]["username"], "marta");
    }

    #[tokio::test]
    async fn users_by_email__should_return_404_for_unknown_user() {
        // Given
        let app = TestApp::new();
        let marta = app.seed_user("marta", "secret-1", &[]);
        let token = app.token_for(&marta);

        // When
        let response = app
            .call(get_request("/api/users/email/ghost@example.com", Some(&token)))
            .await;

        // Then
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn direct_notification__should_send_and_record_history() {
        // Given
        let app = TestApp::new();
        let marta = app.seed_user("marta", "secret-1", &[]);
        let luis = app.seed_user("luis", "secret-1", &["https://b/1"]);
        let token = app.token_for(&marta);

        // When
        let response = app
            .call(json_request(
                "POST",
                "/api/notifications/send-to-user",
                Some(&token),
                json!({ "targetUserId": luis.id, "title": "Ping", "type": "chat" }),
            ))
            .await;
        let history = app
            .call(get_request("/api/notifications/sent-history", Some(&token)))
            .await;

        // Then
        assert_eq!(response.status(), StatusCode::OK);
        let sent = app.sender.sent.lock().expect("sent lock").clone();
        assert_eq!(sent.len(), 1);
        let payload: JsonValue = serde_json::from_slice(&sent[0].1).expect("payload");
        assert_eq!(payload["tag"], "chat");
        assert_eq!(payload["data"]["fromUser"]["username"], "marta");
        let history = body_json(history).await;
        assert_eq!(history["history"][0]["toUsername"], "luis");
        assert_eq!(history["history"][0]["type"], "chat");
    }

    #[tokio::test]
    async fn direct_notification__should_return_404_for_unknown_target() {
        // Given
        let app = TestApp::new();
        let marta = app.seed_user("marta", "secret-1", &[]);
        let token = app.token_for(&marta);

        // When
        let response = app
            .call(json_request(
                "POST",
                "/api/notifications/send-to-user",
                Some(&token),
                json!({ "targetUserId": uuid::Uuid::new_v4(), "title": "Ping" }),
            ))
            .await;

        // Then
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn available_users__should_exclude_caller_and_unsubscribed_users() {
        // Given
        let app = TestApp::new();
        let marta = app.seed_user("marta", "secret-1", &["https://a/1"]);
        app.seed_user("luis", "secret-1", &["https://b/1"]);
        app.seed_user("ines", "secret-1", &[]);
        let token = app.token_for(&marta);

        // When
        let response = app
            .call(get_request("/api/notifications/available-users", Some(&token)))
            .await;

        // Then
        let body = body_json(response).await;
        let users = body["users"].as_array().expect("users");
        assert_eq!(users.len(), 1);
        assert_eq!(users[0]["username"], "luis");
        assert_eq!(users[0]["hasSubscriptions"], true);
    }

    #[tokio::test]
    async fn images__should_be_public_and_accept_new_entries() {
        // Given
        let app = TestApp::new();

        // When
        let created = app
            .call(json_request(
                "POST",
                "/api/images",
                None,
                json!({ "title": "Sunset", "url": "https://example.com/sunset.jpg" }),
            ))
            .await;
        let fetched = app.call(get_request("/api/images/7", None)).await;
        let missing = app.call(get_request("/api/images/99", None)).await;

        // Then
        assert_eq!(created.status(), StatusCode::CREATED);
        assert_eq!(fetched.status(), StatusCode::OK);
        assert_eq!(body_json(fetched).await["title"], "Sunset");
        assert_eq!(missing.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn posts__should_require_authentication_and_fields() {
        // Given
        let app = TestApp::new();
        let marta = app.seed_user("marta", "secret-1", &[]);
        let token = app.token_for(&marta);

        // When
        let anonymous = app.call(get_request("/api/posts", None)).await;
        let incomplete = app
            .call(json_request(
                "POST",
                "/api/posts",
                Some(&token),
                json!({ "title": "Only a title" }),
            ))
            .await;
        let created = app
            .call(json_request(
                "POST",
                "/api/posts",
                Some(&token),
                json!({ "title": "Hi", "content": "First post" }),
            ))
            .await;

        // Then
        assert_eq!(anonymous.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(incomplete.status(), StatusCode::BAD_REQUEST);
        assert_eq!(created.status(), StatusCode::CREATED);
        assert_eq!(body_json(created).await["post"]["author"], "marta");
    }

    #[tokio::test]
    async fn expose_internal_details__should_add_details_in_development_only() {
        // Given
        async fn failing() -> Result<(), ApiError> {
            Err(ApiError::Internal("disk on fire".to_string()))
        }
        let build = |environment| {
            let config = Arc::new(config::AppConfig {
                environment,
                ..Default::default()
            });
            Router::new()
                .route("/boom", get(failing))
                .layer(middleware::from_fn_with_state(
                    config,
                    error::expose_internal_details,
                ))
        };

        // When
        let dev = build(config::Environment::Development)
            .oneshot(get_request("/boom", None))
            .await
            .expect("request failed");
        let prod = build(config::Environment::Production)
            .oneshot(get_request("/boom", None))
            .await
            .expect("request failed");

        // Then
        assert_eq!(dev.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body_json(dev).await["details"], "disk on fire");
        assert!(body_json(prod).await.get("details").is_none());
    }
}

pub mod adapters;
pub mod app;
pub mod auth;
pub mod config;
pub mod ports;
pub mod push;
pub mod state;
pub mod store;
pub mod telemetry;
pub mod types;

pub use push::generate_vapid_credentials;

use crate::auth::{AuthError, AuthState};
use crate::config::AppConfig;
use crate::ports::{StoreError, UserStore};
use crate::state::AppState;
use crate::store::UserDirectory;

use std::net::SocketAddr;
use std::sync::Arc;

use tower_http::trace::TraceLayer;

#[derive(Debug, thiserror::Error)]
pub enum ServeError {
    #[error("invalid auth configuration: {0}")]
    Auth(#[from] AuthError),
    #[error("failed to open user store: {0}")]
    Store(#[from] StoreError),
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        source: std::io::Error,
    },
    #[error("server error: {0}")]
    Serve(std::io::Error),
}

pub fn build_state(config: AppConfig) -> Result<AppState, ServeError> {
    let auth = AuthState::from_config(&config.auth)?;
    let users: Arc<dyn UserStore> = match config.data_file.as_ref() {
        Some(path) => Arc::new(UserDirectory::open(path)?),
        None => {
            tracing::warn!("no data file configured; users are kept in memory only");
            Arc::new(UserDirectory::in_memory())
        }
    };
    let push = push::build_dispatcher(&config.push, Arc::clone(&users));
    Ok(AppState::new(config, auth, users, push))
}

pub async fn serve(config: AppConfig) -> Result<(), ServeError> {
    let addr = config.listen;
    let environment = config.environment;
    let state = build_state(config)?;
    let push_enabled = state.push.is_some();
    let router = app::router(state).layer(TraceLayer::new_for_http());

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|source| ServeError::Bind { addr, source })?;
    tracing::info!(%addr, %environment, push_enabled, "herald listening");

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(ServeError::Serve)?;
    tracing::info!("herald stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %err, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                tracing::error!(error = %err, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    tracing::info!("shutdown signal received, draining connections");
}

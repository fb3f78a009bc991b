use crate::adapters::{SystemClock, WebPushSender};
use crate::app::content::ImageGallery;
use crate::auth::AuthState;
use crate::config::AppConfig;
use crate::ports::{PushSender, UserStore};
use crate::push::{Dispatcher, SentHistory};

use std::sync::Arc;
use std::time::Instant;

/// Shared handler state. The sender is generic so tests can swap in a fake transport.
pub struct AppState<S: PushSender = WebPushSender> {
    pub config: Arc<AppConfig>,
    pub auth: AuthState,
    pub users: Arc<dyn UserStore>,
    /// `None` when VAPID credentials are missing or incomplete.
    pub push: Option<Dispatcher<S, SystemClock>>,
    pub history: Arc<SentHistory>,
    pub images: Arc<ImageGallery>,
    pub started_at: Instant,
}

impl<S: PushSender> Clone for AppState<S> {
    fn clone(&self) -> Self {
        Self {
            config: Arc::clone(&self.config),
            auth: self.auth.clone(),
            users: Arc::clone(&self.users),
            push: self.push.clone(),
            history: Arc::clone(&self.history),
            images: Arc::clone(&self.images),
            started_at: self.started_at,
        }
    }
}

impl<S: PushSender> AppState<S> {
    pub fn new(
        config: AppConfig,
        auth: AuthState,
        users: Arc<dyn UserStore>,
        push: Option<Dispatcher<S, SystemClock>>,
    ) -> Self {
        Self {
            config: Arc::new(config),
            auth,
            users,
            push,
            history: Arc::new(SentHistory::default()),
            images: Arc::new(ImageGallery::seeded()),
            started_at: Instant::now(),
        }
    }
}

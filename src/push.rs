use crate::adapters::{SystemClock, WebPushSender};
use crate::config::PushConfig;
use crate::ports::{StoreError, UserStore};

mod dispatcher;
mod history;
pub(crate) mod payload;
pub mod vapid;

use std::sync::Arc;

use serde::Serialize;

pub use dispatcher::{DispatchError, Dispatcher};
pub use history::{HISTORY_CAPACITY, SentHistory, SentNotification};
pub use vapid::{
    VapidConfigStatus, VapidCredentials, generate_vapid_credentials, load_vapid_config,
};

#[cfg(test)]
pub(crate) use dispatcher::tests::{FakeSender, FixedClock, subscription as test_subscription};

pub type WebPushDispatcher = Dispatcher<WebPushSender, SystemClock>;

/// Returns `None` when push is not configured or the web-push client cannot start.
pub fn build_dispatcher(
    config: &PushConfig,
    store: Arc<dyn UserStore>,
) -> Option<WebPushDispatcher> {
    let vapid = match &config.vapid {
        VapidConfigStatus::Ready(vapid) => vapid.clone(),
        VapidConfigStatus::Incomplete => {
            tracing::warn!("push notifications disabled: incomplete VAPID configuration");
            return None;
        }
        VapidConfigStatus::Missing => {
            tracing::info!("push notifications disabled: no VAPID configuration");
            return None;
        }
    };

    let sender = match WebPushSender::new(vapid) {
        Ok(sender) => sender,
        Err(err) => {
            tracing::error!(error = %err, "push notifications disabled: failed to init web-push");
            return None;
        }
    };

    Some(Dispatcher::new(store, sender, SystemClock))
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PushStats {
    pub total_users: usize,
    pub users_with_subscriptions: usize,
    pub total_subscriptions: usize,
    pub configured: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vapid_public_key: Option<String>,
}

/// Counts over active users only.
pub fn stats(store: &dyn UserStore, config: &PushConfig) -> Result<PushStats, StoreError> {
    let users = store.list_active()?;
    Ok(PushStats {
        total_users: users.len(),
        users_with_subscriptions: users
            .iter()
            .filter(|user| !user.subscriptions.is_empty())
            .count(),
        total_subscriptions: users.iter().map(|user| user.subscriptions.len()).sum(),
        configured: config.is_configured(),
        vapid_public_key: config
            .vapid
            .ready()
            .map(|vapid| vapid::public_key_preview(&vapid.public_key)),
    })
}

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use std::time::Duration;

#[derive(Debug, Clone)]
pub struct VapidConfig {
    pub private_key: String,
    pub public_key: String,
    pub subject: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscriptionKeys {
    #[serde(default)]
    pub p256dh: String,
    #[serde(default)]
    pub auth: String,
}

/// A browser push endpoint registered by one user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Subscription {
    pub endpoint: String,
    pub keys: SubscriptionKeys,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum SubscriptionShapeError {
    #[error("subscription endpoint is missing")]
    MissingEndpoint,
    #[error("subscription key p256dh is missing")]
    MissingP256dh,
    #[error("subscription key auth is missing")]
    MissingAuth,
}

impl Subscription {
    pub fn new(endpoint: impl Into<String>, keys: SubscriptionKeys, created_at: OffsetDateTime) -> Self {
        Self {
            endpoint: endpoint.into(),
            keys,
            created_at,
        }
    }

    pub fn validate(&self) -> Result<(), SubscriptionShapeError> {
        if self.endpoint.trim().is_empty() {
            return Err(SubscriptionShapeError::MissingEndpoint);
        }
        if self.keys.p256dh.trim().is_empty() {
            return Err(SubscriptionShapeError::MissingP256dh);
        }
        if self.keys.auth.trim().is_empty() {
            return Err(SubscriptionShapeError::MissingAuth);
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Urgency {
    VeryLow,
    Low,
    #[default]
    Normal,
    High,
}

pub const DEFAULT_TTL: Duration = Duration::from_secs(24 * 60 * 60);

/// Transport hints for one delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryOptions {
    pub ttl: Duration,
    pub urgency: Urgency,
}

impl Default for DeliveryOptions {
    fn default() -> Self {
        Self {
            ttl: DEFAULT_TTL,
            urgency: Urgency::Normal,
        }
    }
}

/// The `data` bag of a notification. `url` is always present.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationData {
    pub url: String,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl Default for NotificationData {
    fn default() -> Self {
        Self {
            url: "/".to_string(),
            extra: serde_json::Map::new(),
        }
    }
}

/// Every field a sender may set on a notification besides the title.
#[derive(Debug, Clone, PartialEq)]
pub struct NotificationOptions {
    pub body: String,
    pub icon: String,
    pub image: Option<String>,
    pub badge: String,
    pub data: NotificationData,
    pub tag: String,
    pub ttl: Duration,
    pub urgency: Urgency,
    pub require_interaction: bool,
}

pub const DEFAULT_BODY: &str = "You have a new notification";
pub const DEFAULT_ICON: &str = "/icons/icon-192x192.png";
pub const DEFAULT_BADGE: &str = "/icons/icon-72x72.png";
pub const DEFAULT_TAG: &str = "general";

impl Default for NotificationOptions {
    fn default() -> Self {
        Self {
            body: DEFAULT_BODY.to_string(),
            icon: DEFAULT_ICON.to_string(),
            image: None,
            badge: DEFAULT_BADGE.to_string(),
            data: NotificationData::default(),
            tag: DEFAULT_TAG.to_string(),
            ttl: DEFAULT_TTL,
            urgency: Urgency::Normal,
            require_interaction: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Notification {
    pub title: String,
    pub options: NotificationOptions,
}

impl Notification {
    pub fn new(title: impl Into<String>, options: NotificationOptions) -> Self {
        Self {
            title: title.into(),
            options,
        }
    }
}

/// Wire form handed to the service worker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationPayload {
    pub title: String,
    pub body: String,
    pub icon: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    pub badge: String,
    pub data: NotificationData,
    pub tag: String,
    pub timestamp: i64,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub require_interaction: bool,
}

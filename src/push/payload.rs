use time::OffsetDateTime;

use crate::types::push::{DeliveryOptions, Notification, NotificationPayload};

pub(crate) fn build_payload(notification: &Notification, now: OffsetDateTime) -> NotificationPayload {
    let options = &notification.options;
    NotificationPayload {
        title: notification.title.clone(),
        body: options.body.clone(),
        icon: options.icon.clone(),
        image: options.image.clone(),
        badge: options.badge.clone(),
        data: options.data.clone(),
        tag: options.tag.clone(),
        timestamp: unix_millis(now),
        require_interaction: options.require_interaction,
    }
}

pub(crate) fn delivery_options(notification: &Notification) -> DeliveryOptions {
    DeliveryOptions {
        ttl: notification.options.ttl,
        urgency: notification.options.urgency,
    }
}

fn unix_millis(at: OffsetDateTime) -> i64 {
    (at.unix_timestamp_nanos() / 1_000_000) as i64
}

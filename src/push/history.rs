use std::collections::VecDeque;
use std::sync::Mutex;

use serde::Serialize;
use time::OffsetDateTime;
use uuid::Uuid;

pub const HISTORY_CAPACITY: usize = 100;

/// One user-to-user notification as recorded after sending.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SentNotification {
    pub id: Uuid,
    pub from_user_id: Uuid,
    pub to_user_id: Uuid,
    pub to_username: String,
    pub title: String,
    pub message: Option<String>,
    #[serde(rename = "type")]
    pub kind: String,
    pub sent: usize,
    pub failed: usize,
    #[serde(with = "time::serde::rfc3339")]
    pub sent_at: OffsetDateTime,
}

/// Process-wide record of the most recent sends, oldest dropped first.
#[derive(Debug, Default)]
pub struct SentHistory {
    entries: Mutex<VecDeque<SentNotification>>,
}

impl SentHistory {
    pub fn record(&self, entry: SentNotification) {
        let Ok(mut entries) = self.entries.lock() else {
            tracing::error!("sent history lock poisoned; entry dropped");
            return;
        };
        if entries.len() == HISTORY_CAPACITY {
            entries.pop_front();
        }
        entries.push_back(entry);
    }

    /// Entries sent by `user_id`, newest first.
    pub fn sent_by(&self, user_id: Uuid) -> Vec<SentNotification> {
        let Ok(entries) = self.entries.lock() else {
            return Vec::new();
        };
        entries
            .iter()
            .rev()
            .filter(|entry| entry.from_user_id == user_id)
            .cloned()
            .collect()
    }
}

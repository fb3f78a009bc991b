use serde::Serialize;
use uuid::Uuid;

/// Outcome of one delivery attempt to one subscription.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttemptOutcome {
    Sent,
    /// The push service rejected the message. `pruned` is set when the
    /// subscription was removed from the owner's list as a result.
    Rejected {
        status_code: Option<u16>,
        pruned: bool,
    },
    /// The stored subscription lacks an endpoint or a key; nothing was sent.
    Malformed,
}

/// Running `{ok, sent, failed}` count.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Tally {
    pub sent: usize,
    pub failed: usize,
}

impl Tally {
    pub fn record(&mut self, outcome: &AttemptOutcome) {
        match outcome {
            AttemptOutcome::Sent => self.sent += 1,
            AttemptOutcome::Rejected { .. } | AttemptOutcome::Malformed => self.failed += 1,
        }
    }

    pub fn ok(&self) -> bool {
        self.sent > 0
    }
}

impl std::ops::AddAssign for Tally {
    fn add_assign(&mut self, other: Self) {
        self.sent += other.sent;
        self.failed += other.failed;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UserDispatchStatus {
    Attempted,
    NoActiveSubscriptions,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserReport {
    pub user_id: Uuid,
    pub username: String,
    pub status: UserDispatchStatus,
    pub sent: usize,
    pub failed: usize,
    pub total_subscriptions: usize,
    pub pruned: usize,
}

impl UserReport {
    pub fn has_no_subscriptions(&self) -> bool {
        self.status == UserDispatchStatus::NoActiveSubscriptions
    }

    pub fn tally(&self) -> Tally {
        Tally {
            sent: self.sent,
            failed: self.failed,
        }
    }

    pub fn message(&self) -> String {
        match self.status {
            UserDispatchStatus::NoActiveSubscriptions => {
                format!("{} has no active push subscriptions", self.username)
            }
            UserDispatchStatus::Attempted => format!(
                "Notifications sent to {}: {} delivered, {} failed",
                self.username, self.sent, self.failed
            ),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchReport {
    pub success: bool,
    pub total_sent: usize,
    pub total_failed: usize,
    pub total_users: usize,
    pub user_results: Vec<UserReport>,
    /// Requested targets (ids or emails) that matched no active user.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub unmatched: Vec<String>,
}

impl BatchReport {
    pub fn from_reports(user_results: Vec<UserReport>, unmatched: Vec<String>) -> Self {
        let mut total = Tally::default();
        for report in &user_results {
            total += report.tally();
        }
        Self {
            success: total.ok(),
            total_sent: total.sent,
            total_failed: total.failed,
            total_users: user_results.len(),
            user_results,
            unmatched,
        }
    }

    pub fn message(&self) -> String {
        format!(
            "Notifications sent: {} delivered, {} failed",
            self.total_sent, self.total_failed
        )
    }
}

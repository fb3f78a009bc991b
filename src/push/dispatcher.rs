use std::collections::HashSet;
use std::sync::Arc;

use uuid::Uuid;

use crate::ports::{PushSender, StoreError, TimeProvider, UserStore};
use crate::push::payload;
use crate::types::dispatch::{
    AttemptOutcome, BatchReport, Tally, UserDispatchStatus, UserReport,
};
use crate::types::push::{DeliveryOptions, Notification, Subscription};
use crate::types::user::{User, normalize_email};

#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error("{0}")]
    Validation(String),
    #[error("user {0} not found")]
    UserNotFound(String),
    #[error("no users found for the given emails")]
    NoMatchingUsers,
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("failed to encode notification payload: {0}")]
    Payload(#[from] serde_json::Error),
}

/// Fans one notification out to the subscriptions of the addressed users.
///
/// Deliveries run one at a time. A failed delivery is counted, never
/// propagated; 404 and 410 answers also drop the subscription from the store.
pub struct Dispatcher<S: PushSender, C: TimeProvider> {
    store: Arc<dyn UserStore>,
    sender: S,
    clock: C,
}

impl<S: PushSender, C: TimeProvider> Clone for Dispatcher<S, C> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            sender: self.sender.clone(),
            clock: self.clock.clone(),
        }
    }
}

struct Prepared {
    payload: Vec<u8>,
    options: DeliveryOptions,
}

impl<S: PushSender, C: TimeProvider> Dispatcher<S, C> {
    pub fn new(store: Arc<dyn UserStore>, sender: S, clock: C) -> Self {
        Self {
            store,
            sender,
            clock,
        }
    }

    pub async fn send_to_user(
        &self,
        user_id: Uuid,
        notification: &Notification,
    ) -> Result<UserReport, DispatchError> {
        let prepared = self.prepare(notification)?;
        self.dispatch_to_user(user_id, &prepared).await
    }

    /// Ids that match no active user are returned in `unmatched`.
    pub async fn send_to_users(
        &self,
        user_ids: &[Uuid],
        notification: &Notification,
    ) -> Result<BatchReport, DispatchError> {
        let prepared = self.prepare(notification)?;
        self.dispatch_to_users(user_ids, &prepared).await
    }

    pub async fn send_to_email(
        &self,
        email: &str,
        notification: &Notification,
    ) -> Result<UserReport, DispatchError> {
        let prepared = self.prepare(notification)?;
        let normalized = normalize_email(email);
        if normalized.is_empty() {
            return Err(DispatchError::Validation("email is required".to_string()));
        }
        let user = self
            .store
            .find_by_email(&normalized)?
            .filter(|user| user.active)
            .ok_or_else(|| DispatchError::UserNotFound(normalized.clone()))?;
        self.dispatch_to_user(user.id, &prepared).await
    }

    /// Emails are matched after trimming and lowercasing. Fails when none match.
    pub async fn send_to_emails(
        &self,
        emails: &[String],
        notification: &Notification,
    ) -> Result<BatchReport, DispatchError> {
        let prepared = self.prepare(notification)?;
        if emails.is_empty() {
            return Err(DispatchError::Validation(
                "at least one email is required".to_string(),
            ));
        }

        let active = self.store.list_active()?;
        let mut user_ids = Vec::new();
        let mut unmatched = Vec::new();
        for email in emails {
            let normalized = normalize_email(email);
            match active.iter().find(|user| user.email == normalized) {
                Some(user) if !user_ids.contains(&user.id) => user_ids.push(user.id),
                Some(_) => {}
                None => unmatched.push(email.clone()),
            }
        }
        if user_ids.is_empty() {
            return Err(DispatchError::NoMatchingUsers);
        }

        let mut report = self.dispatch_to_users(&user_ids, &prepared).await?;
        report.unmatched = unmatched;
        Ok(report)
    }

    /// Every active user holding at least one subscription.
    pub async fn broadcast(&self, notification: &Notification) -> Result<BatchReport, DispatchError> {
        let prepared = self.prepare(notification)?;
        let users: Vec<User> = self
            .store
            .list_active()?
            .into_iter()
            .filter(|user| !user.subscriptions.is_empty())
            .collect();
        Ok(self.dispatch_batch(&users, Vec::new(), &prepared).await)
    }

    async fn dispatch_to_user(
        &self,
        user_id: Uuid,
        prepared: &Prepared,
    ) -> Result<UserReport, DispatchError> {
        let user = self
            .store
            .find_by_id(user_id)?
            .ok_or_else(|| DispatchError::UserNotFound(user_id.to_string()))?;
        let report = self.dispatch_user(&user, prepared).await;
        tracing::info!(
            user_id = %user.id,
            sent = report.sent,
            failed = report.failed,
            "push dispatch to user finished"
        );
        Ok(report)
    }

    async fn dispatch_to_users(
        &self,
        user_ids: &[Uuid],
        prepared: &Prepared,
    ) -> Result<BatchReport, DispatchError> {
        let wanted: HashSet<Uuid> = user_ids.iter().copied().collect();
        let users: Vec<User> = self
            .store
            .list_active()?
            .into_iter()
            .filter(|user| wanted.contains(&user.id))
            .collect();

        let mut seen = HashSet::new();
        let unmatched = user_ids
            .iter()
            .filter(|id| !users.iter().any(|user| user.id == **id))
            .filter(|id| seen.insert(**id))
            .map(Uuid::to_string)
            .collect();

        Ok(self.dispatch_batch(&users, unmatched, prepared).await)
    }

    fn prepare(&self, notification: &Notification) -> Result<Prepared, DispatchError> {
        if notification.title.trim().is_empty() {
            return Err(DispatchError::Validation("title is required".to_string()));
        }
        let body = payload::build_payload(notification, self.clock.now());
        Ok(Prepared {
            payload: serde_json::to_vec(&body)?,
            options: payload::delivery_options(notification),
        })
    }

    async fn dispatch_batch(
        &self,
        users: &[User],
        unmatched: Vec<String>,
        prepared: &Prepared,
    ) -> BatchReport {
        let mut reports = Vec::with_capacity(users.len());
        for user in users {
            reports.push(self.dispatch_user(user, prepared).await);
        }
        let report = BatchReport::from_reports(reports, unmatched);
        tracing::info!(
            users = report.total_users,
            sent = report.total_sent,
            failed = report.total_failed,
            unmatched = report.unmatched.len(),
            "push dispatch finished"
        );
        report
    }

    async fn dispatch_user(&self, user: &User, prepared: &Prepared) -> UserReport {
        let mut report = UserReport {
            user_id: user.id,
            username: user.username.clone(),
            status: UserDispatchStatus::NoActiveSubscriptions,
            sent: 0,
            failed: 0,
            total_subscriptions: user.subscriptions.len(),
            pruned: 0,
        };
        if user.subscriptions.is_empty() {
            tracing::debug!(user_id = %user.id, "user has no push subscriptions");
            return report;
        }

        report.status = UserDispatchStatus::Attempted;
        let mut tally = Tally::default();
        for subscription in &user.subscriptions {
            let outcome = self.attempt(user, subscription, prepared).await;
            if let AttemptOutcome::Rejected { pruned: true, .. } = outcome {
                report.pruned += 1;
            }
            tally.record(&outcome);
        }
        report.sent = tally.sent;
        report.failed = tally.failed;
        report
    }

    async fn attempt(
        &self,
        user: &User,
        subscription: &Subscription,
        prepared: &Prepared,
    ) -> AttemptOutcome {
        if let Err(err) = subscription.validate() {
            tracing::warn!(
                user_id = %user.id,
                endpoint = %subscription.endpoint,
                error = %err,
                "skipping malformed push subscription"
            );
            return AttemptOutcome::Malformed;
        }

        match self
            .sender
            .send(subscription, &prepared.payload, &prepared.options)
            .await
        {
            Ok(()) => AttemptOutcome::Sent,
            Err(err) => {
                tracing::warn!(
                    user_id = %user.id,
                    endpoint = %subscription.endpoint,
                    status = ?err.status_code,
                    error = %err.body,
                    "push delivery failed"
                );
                let pruned = err.is_permanent() && self.prune(user, &subscription.endpoint);
                AttemptOutcome::Rejected {
                    status_code: err.status_code,
                    pruned,
                }
            }
        }
    }

    fn prune(&self, user: &User, endpoint: &str) -> bool {
        match self.store.remove_subscription_by_endpoint(user.id, endpoint) {
            Ok(removed) => {
                if removed {
                    tracing::info!(user_id = %user.id, endpoint = %endpoint, "pruned dead push subscription");
                }
                removed
            }
            Err(err) => {
                tracing::error!(user_id = %user.id, endpoint = %endpoint, error = %err, "failed to prune push subscription");
                false
            }
        }
    }
}

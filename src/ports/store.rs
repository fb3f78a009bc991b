use time::OffsetDateTime;
use uuid::Uuid;

use crate::types::push::Subscription;
use crate::types::user::User;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("user {0} not found")]
    NotFound(Uuid),
    #[error("{0} is already taken")]
    Conflict(&'static str),
    #[error("user store i/o failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("user store data is corrupt: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("user store lock poisoned")]
    Poisoned,
}

/// Account storage. Every mutating call is persisted before it returns.
///
/// Email lookups expect an already normalized (trimmed, lowercase) address.
pub trait UserStore: Send + Sync + 'static {
    fn find_by_id(&self, id: Uuid) -> Result<Option<User>, StoreError>;
    fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError>;
    fn find_by_username(&self, username: &str) -> Result<Option<User>, StoreError>;
    /// Active users in insertion order.
    fn list_active(&self) -> Result<Vec<User>, StoreError>;
    /// Adds a new user, failing with `Conflict` when the username or email is taken.
    fn insert(&self, user: User) -> Result<(), StoreError>;
    /// Overwrites an existing user, keeping username and email unique.
    ///
    /// The whole record is replaced, subscriptions included. Request handlers
    /// holding a copy loaded earlier must use the field-level calls below.
    fn save(&self, user: &User) -> Result<(), StoreError>;
    /// Changes only the username and returns the updated record.
    fn rename(
        &self,
        user_id: Uuid,
        username: &str,
        at: OffsetDateTime,
    ) -> Result<User, StoreError>;
    /// Changes only the password hash and returns the updated record.
    fn set_password_hash(
        &self,
        user_id: Uuid,
        password_hash: String,
        at: OffsetDateTime,
    ) -> Result<User, StoreError>;
    fn append_or_replace_subscription(
        &self,
        user_id: Uuid,
        subscription: Subscription,
    ) -> Result<(), StoreError>;
    /// Returns whether an entry was removed; a missing endpoint is not an error.
    fn remove_subscription_by_endpoint(
        &self,
        user_id: Uuid,
        endpoint: &str,
    ) -> Result<bool, StoreError>;
    /// Drops every subscription of every user and returns how many were removed.
    fn clear_subscriptions(&self) -> Result<usize, StoreError>;
    fn ping(&self) -> Result<(), StoreError>;
}

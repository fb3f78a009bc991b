use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::types::push::Subscription;

pub const USERNAME_MIN_LEN: usize = 3;
pub const USERNAME_MAX_LEN: usize = 30;
pub const PASSWORD_MIN_LEN: usize = 6;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[default]
    User,
    Admin,
}

/// Stored account record. Only the password hash is kept.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub role: Role,
    pub active: bool,
    #[serde(default)]
    pub subscriptions: Vec<Subscription>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

impl User {
    pub fn new(
        username: String,
        email: String,
        password_hash: String,
        now: OffsetDateTime,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            username,
            email,
            password_hash,
            role: Role::User,
            active: true,
            subscriptions: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Replaces the entry with the same endpoint or appends a new one.
    /// Returns true when an existing entry was updated.
    pub fn upsert_subscription(&mut self, subscription: Subscription) -> bool {
        match self
            .subscriptions
            .iter_mut()
            .find(|existing| existing.endpoint == subscription.endpoint)
        {
            Some(existing) => {
                existing.keys = subscription.keys;
                existing.created_at = subscription.created_at;
                true
            }
            None => {
                self.subscriptions.push(subscription);
                false
            }
        }
    }

    /// Returns true when an entry was removed.
    pub fn remove_subscription(&mut self, endpoint: &str) -> bool {
        let before = self.subscriptions.len();
        self.subscriptions
            .retain(|subscription| subscription.endpoint != endpoint);
        self.subscriptions.len() != before
    }

    pub fn summary(&self) -> UserSummary {
        UserSummary {
            id: self.id,
            username: self.username.clone(),
            email: self.email.clone(),
            role: self.role,
        }
    }

    pub fn profile(&self) -> UserProfile {
        UserProfile {
            id: self.id,
            username: self.username.clone(),
            email: self.email.clone(),
            role: self.role,
            active: self.active,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserSummary {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub role: Role,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub role: Role,
    pub active: bool,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

pub fn normalize_email(raw: &str) -> String {
    raw.trim().to_lowercase()
}

pub fn validate_username(raw: &str) -> Result<String, String> {
    let username = raw.trim();
    let len = username.chars().count();
    if len < USERNAME_MIN_LEN {
        return Err(format!(
            "username must be at least {USERNAME_MIN_LEN} characters"
        ));
    }
    if len > USERNAME_MAX_LEN {
        return Err(format!(
            "username must be at most {USERNAME_MAX_LEN} characters"
        ));
    }
    Ok(username.to_string())
}

pub fn validate_email(raw: &str) -> Result<String, String> {
    let email = normalize_email(raw);
    if is_valid_email(&email) {
        Ok(email)
    } else {
        Err("email address is not valid".to_string())
    }
}

pub fn validate_password(raw: &str) -> Result<(), String> {
    if raw.chars().count() < PASSWORD_MIN_LEN {
        return Err(format!(
            "password must be at least {PASSWORD_MIN_LEN} characters"
        ));
    }
    Ok(())
}

// Word characters separated by single '.' or '-', then a 2-3 letter suffix.
fn is_valid_email(email: &str) -> bool {
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    if !is_dotted_words(local) || !is_dotted_words(domain) {
        return false;
    }
    let Some((_, suffix)) = domain.rsplit_once('.') else {
        return false;
    };
    (2..=3).contains(&suffix.len()) && suffix.chars().all(is_word_char)
}

fn is_dotted_words(value: &str) -> bool {
    !value.is_empty()
        && value
            .split(['.', '-'])
            .all(|segment| !segment.is_empty() && segment.chars().all(is_word_char))
}

fn is_word_char(ch: char) -> bool {
    ch.is_ascii_alphanumeric() || ch == '_'
}

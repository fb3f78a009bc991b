//! User storage kept in memory, optionally mirrored to a JSON file.
//!
//! With a data file configured every mutation rewrites the whole snapshot
//! through a temporary file and a rename, so a crash never leaves a
//! half-written store behind. A mutation is applied to a copy first and only
//! becomes visible once the snapshot is on disk.

use crate::ports::store::{StoreError, UserStore};
use crate::types::push::Subscription;
use crate::types::user::User;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use std::path::{Path, PathBuf};
use std::sync::Mutex;

const SNAPSHOT_VERSION: u32 = 1;

#[derive(Debug, Serialize, Deserialize)]
struct Snapshot {
    version: u32,
    users: Vec<User>,
}

#[derive(Debug, Default)]
pub struct UserDirectory {
    users: Mutex<Vec<User>>,
    path: Option<PathBuf>,
}

impl UserDirectory {
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// Loads the snapshot at `path`, starting empty when the file does not exist yet.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        let users = match std::fs::read(&path) {
            Ok(bytes) => {
                let snapshot: Snapshot = serde_json::from_slice(&bytes)?;
                snapshot.users
            }
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Vec::new(),
            Err(err) => return Err(err.into()),
        };
        tracing::debug!(path = %path.display(), users = users.len(), "user store loaded");
        Ok(Self {
            users: Mutex::new(users),
            path: Some(path),
        })
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    fn read<T>(&self, f: impl FnOnce(&[User]) -> T) -> Result<T, StoreError> {
        let users = self.users.lock().map_err(|_| StoreError::Poisoned)?;
        Ok(f(&users))
    }

    fn mutate<T>(
        &self,
        f: impl FnOnce(&mut Vec<User>) -> Result<T, StoreError>,
    ) -> Result<T, StoreError> {
        let mut users = self.users.lock().map_err(|_| StoreError::Poisoned)?;
        let mut next = users.clone();
        let value = f(&mut next)?;
        self.persist(&next)?;
        *users = next;
        Ok(value)
    }

    fn persist(&self, users: &[User]) -> Result<(), StoreError> {
        let Some(path) = self.path.as_ref() else {
            return Ok(());
        };
        let snapshot = Snapshot {
            version: SNAPSHOT_VERSION,
            users: users.to_vec(),
        };
        let bytes = serde_json::to_vec_pretty(&snapshot)?;
        let tmp = temp_path(path);
        std::fs::write(&tmp, bytes)?;
        std::fs::rename(&tmp, path)?;
        Ok(())
    }
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|name| name.to_os_string())
        .unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

fn find_mut(users: &mut [User], id: Uuid) -> Result<&mut User, StoreError> {
    users
        .iter_mut()
        .find(|user| user.id == id)
        .ok_or(StoreError::NotFound(id))
}

fn check_unique(users: &[User], candidate: &User) -> Result<(), StoreError> {
    for user in users.iter().filter(|user| user.id != candidate.id) {
        if user.email == candidate.email {
            return Err(StoreError::Conflict("email"));
        }
        if user.username == candidate.username {
            return Err(StoreError::Conflict("username"));
        }
    }
    Ok(())
}

impl UserStore for UserDirectory {
    fn find_by_id(&self, id: Uuid) -> Result<Option<User>, StoreError> {
        self.read(|users| users.iter().find(|user| user.id == id).cloned())
    }

    fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        self.read(|users| users.iter().find(|user| user.email == email).cloned())
    }

    fn find_by_username(&self, username: &str) -> Result<Option<User>, StoreError> {
        self.read(|users| users.iter().find(|user| user.username == username).cloned())
    }

    fn list_active(&self) -> Result<Vec<User>, StoreError> {
        self.read(|users| users.iter().filter(|user| user.active).cloned().collect())
    }

    fn insert(&self, user: User) -> Result<(), StoreError> {
        self.mutate(|users| {
            check_unique(users, &user)?;
            users.push(user);
            Ok(())
        })
    }

    fn save(&self, user: &User) -> Result<(), StoreError> {
        self.mutate(|users| {
            check_unique(users, user)?;
            let existing = find_mut(users, user.id)?;
            *existing = user.clone();
            Ok(())
        })
    }

    fn rename(
        &self,
        user_id: Uuid,
        username: &str,
        at: OffsetDateTime,
    ) -> Result<User, StoreError> {
        self.mutate(|users| {
            if users
                .iter()
                .any(|user| user.id != user_id && user.username == username)
            {
                return Err(StoreError::Conflict("username"));
            }
            let user = find_mut(users, user_id)?;
            user.username = username.to_string();
            user.updated_at = at;
            Ok(user.clone())
        })
    }

    fn set_password_hash(
        &self,
        user_id: Uuid,
        password_hash: String,
        at: OffsetDateTime,
    ) -> Result<User, StoreError> {
        self.mutate(|users| {
            let user = find_mut(users, user_id)?;
            user.password_hash = password_hash;
            user.updated_at = at;
            Ok(user.clone())
        })
    }

    fn append_or_replace_subscription(
        &self,
        user_id: Uuid,
        subscription: Subscription,
    ) -> Result<(), StoreError> {
        self.mutate(|users| {
            find_mut(users, user_id)?.upsert_subscription(subscription);
            Ok(())
        })
    }

    fn remove_subscription_by_endpoint(
        &self,
        user_id: Uuid,
        endpoint: &str,
    ) -> Result<bool, StoreError> {
        let present = self.read(|users| {
            users
                .iter()
                .find(|user| user.id == user_id)
                .map(|user| user.subscriptions.iter().any(|s| s.endpoint == endpoint))
        })?;
        match present {
            None => Err(StoreError::NotFound(user_id)),
            Some(false) => Ok(false),
            Some(true) => self.mutate(|users| Ok(find_mut(users, user_id)?.remove_subscription(endpoint))),
        }
    }

    fn clear_subscriptions(&self) -> Result<usize, StoreError> {
        self.mutate(|users| {
            let mut removed = 0;
            for user in users.iter_mut() {
                removed += user.subscriptions.len();
                user.subscriptions.clear();
            }
            Ok(removed)
        })
    }

    fn ping(&self) -> Result<(), StoreError> {
        self.read(|_| ())?;
        if let Some(dir) = self.path.as_deref().and_then(Path::parent)
            && !dir.as_os_str().is_empty()
        {
            std::fs::metadata(dir)?;
        }
        Ok(())
    }
}

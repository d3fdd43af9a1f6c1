//! Per-name mutual exclusion for read-modify-write against Nexus.
//!
//! Adding a privilege to a role reads the role, appends, and writes it back.
//! Granting or revoking user roles does the same with the user's role list.
//! Two workers doing either on the same name concurrently would lose one
//! write, so every such sequence runs under the lock for that name. Workers
//! touching different names do not contend.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::OwnedMutexGuard;

type LockMap = HashMap<String, Arc<tokio::sync::Mutex<()>>>;

/// Lock map keyed by name. An entry lives only while some task holds or
/// waits on it.
#[derive(Default)]
pub struct KeyedLocks {
    locks: Mutex<LockMap>,
}

impl KeyedLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to `key`. Released when the guard drops.
    pub async fn lock(&self, key: &str) -> KeyedGuard<'_> {
        let lock = {
            let mut locks = self.map();
            Arc::clone(locks.entry(key.to_string()).or_default())
        };
        KeyedGuard {
            owner: self,
            key: key.to_string(),
            guard: Some(lock.lock_owned().await),
        }
    }

    /// Number of names currently held or awaited.
    pub fn len(&self) -> usize {
        self.map().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn map(&self) -> std::sync::MutexGuard<'_, LockMap> {
        self.locks.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Held lock on one name. Dropping it releases the lock and removes the
/// map entry when no other task is waiting on it.
pub struct KeyedGuard<'a> {
    owner: &'a KeyedLocks,
    key: String,
    guard: Option<OwnedMutexGuard<()>>,
}

impl Drop for KeyedGuard<'_> {
    fn drop(&mut self) {
        // Release first so the map holds the only remaining reference.
        drop(self.guard.take());

        // New references are only cloned under the map lock, so a count of
        // one here means nobody holds or waits on this entry.
        let mut locks = self.owner.map();
        if locks
            .get(&self.key)
            .is_some_and(|lock| Arc::strong_count(lock) == 1)
        {
            locks.remove(&self.key);
        }
    }
}

/// The two lock maps every batch shares: one for role privilege lists, one
/// for user role lists.
#[derive(Default)]
pub struct ResourceLocks {
    roles: KeyedLocks,
    users: KeyedLocks,
}

impl ResourceLocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn role(&self, role_name: &str) -> KeyedGuard<'_> {
        self.roles.lock(role_name).await
    }

    pub async fn user(&self, username: &str) -> KeyedGuard<'_> {
        self.users.lock(username).await
    }

    /// True when no role or user lock is held or awaited.
    pub fn is_idle(&self) -> bool {
        self.roles.is_empty() && self.users.is_empty()
    }
}

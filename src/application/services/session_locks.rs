//! Per-session async locks
//!
//! Serializes work on one session (payment initiation) without blocking any
//! other session. Entries are dropped once nobody holds or waits on them.

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};

#[derive(Default)]
pub struct SessionLocks {
    locks: DashMap<i32, Arc<Mutex<()>>>,
}

impl SessionLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to `session_id`.
    pub async fn lock(&self, session_id: i32) -> SessionGuard<'_> {
        let mutex = self.locks.entry(session_id).or_default().clone();
        let guard = mutex.lock_owned().await;
        SessionGuard {
            locks: self,
            session_id,
            guard: Some(guard),
        }
    }

    /// Number of sessions with a live lock entry.
    pub fn len(&self) -> usize {
        self.locks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }
}

pub struct SessionGuard<'a> {
    locks: &'a SessionLocks,
    session_id: i32,
    guard: Option<OwnedMutexGuard<()>>,
}

impl Drop for SessionGuard<'_> {
    fn drop(&mut self) {
        drop(self.guard.take());
        // Only the map's own handle left: nobody is waiting.
        self.locks
            .locks
            .remove_if(&self.session_id, |_, m| Arc::strong_count(m) == 1);
    }
}

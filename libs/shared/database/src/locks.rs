use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::debug;

type LockMap = DashMap<String, Arc<Mutex<()>>>;

/// Per-key async mutexes serializing check-then-write sequences.
///
/// Keys name one timeline, e.g. `appointments:{doctor}:{date}`. A holder of
/// the guard is the only writer on that timeline until it is dropped. An
/// entry lives only while someone holds or waits on it.
#[derive(Clone, Default)]
pub struct TimelineLocks {
    locks: Arc<LockMap>,
}

/// Exclusive hold on one timeline key. Releasing the last hold evicts the key.
pub struct TimelineGuard {
    guard: Option<OwnedMutexGuard<()>>,
    key: String,
    locks: Arc<LockMap>,
}

impl Drop for TimelineGuard {
    fn drop(&mut self) {
        // Release the mutex first so our Arc is gone before the count check.
        self.guard.take();
        // `remove_if` runs under the shard lock that `acquire` clones under,
        // so a count of 1 means no holder and no waiter.
        self.locks
            .remove_if(&self.key, |_, lock| Arc::strong_count(lock) == 1);
    }
}

impl TimelineLocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn acquire(&self, key: impl Into<String>) -> TimelineGuard {
        let key = key.into();
        let lock = self
            .locks
            .entry(key.clone())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        debug!("Acquiring timeline lock {}", key);
        let guard = lock.lock_owned().await;

        TimelineGuard {
            guard: Some(guard),
            key,
            locks: Arc::clone(&self.locks),
        }
    }

    /// Acquires several keys in sorted order so overlapping callers cannot deadlock.
    pub async fn acquire_many<I, K>(&self, keys: I) -> Vec<TimelineGuard>
    where
        I: IntoIterator<Item = K>,
        K: Into<String>,
    {
        let mut keys: Vec<String> = keys.into_iter().map(Into::into).collect();
        keys.sort();
        keys.dedup();

        let mut guards = Vec::with_capacity(keys.len());
        for key in keys {
            guards.push(self.acquire(key).await);
        }
        guards
    }

    pub fn len(&self) -> usize {
        self.locks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }
}

pub fn appointment_key(doctor_id: impl std::fmt::Display, date: impl std::fmt::Display) -> String {
    format!("appointments:{}:{}", doctor_id, date)
}

pub fn block_key(doctor_id: impl std::fmt::Display, date: impl std::fmt::Display) -> String {
    format!("blocks:{}:{}", doctor_id, date)
}

pub fn template_key(doctor_id: impl std::fmt::Display, day: impl std::fmt::Display) -> String {
    format!("templates:{}:{}", doctor_id, day)
}

pub fn waitlist_key(patient_id: impl std::fmt::Display) -> String {
    format!("waitlist:{}", patient_id)
}

//! In-process write serialisation per (user, category, period).
//!
//! Allocation and reconciliation both read the spent amount, decide, then
//! write. Holding the key's lock across that sequence keeps two submissions
//! for the same budget from deciding on the same stale `remaining`.

use std::{
    collections::HashMap,
    sync::{Arc, Mutex, PoisonError},
};

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

use crate::Period;

#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub(crate) struct PeriodKey {
    user_id: String,
    category_id: i32,
    period: Period,
}

impl PeriodKey {
    pub(crate) fn new(user_id: &str, category_id: i32, period: Period) -> Self {
        Self {
            user_id: user_id.to_string(),
            category_id,
            period,
        }
    }
}

#[derive(Debug, Default)]
pub(crate) struct PeriodLocks {
    inner: Mutex<HashMap<PeriodKey, Arc<AsyncMutex<()>>>>,
}

impl PeriodLocks {
    /// Wait for exclusive access to `key`.
    pub(crate) async fn acquire(&self, key: PeriodKey) -> OwnedMutexGuard<()> {
        let lock = {
            let mut map = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
            // Drop entries nobody holds or waits on.
            map.retain(|_, lock| Arc::strong_count(lock) > 1);
            Arc::clone(map.entry(key).or_default())
        };
        lock.lock_owned().await
    }

    /// Acquire several keys in a fixed order so two callers locking the same
    /// pair can never deadlock.
    pub(crate) async fn acquire_all(&self, mut keys: Vec<PeriodKey>) -> Vec<OwnedMutexGuard<()>> {
        keys.sort();
        keys.dedup();
        let mut guards = Vec::with_capacity(keys.len());
        for key in keys {
            guards.push(self.acquire(key).await);
        }
        guards
    }
}

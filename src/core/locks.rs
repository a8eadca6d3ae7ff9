use std::sync::Arc;
use std::time::Duration;

use chrono::NaiveDate;
use moka::future::Cache;
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::error::{ServiceError, ServiceResult};

/// Per-(user, date) write serialization. Every mutation of an attendance
/// record (clock event, break event, correction) must hold the key's lock,
/// which is what keeps "one record per user per day" and "one open break"
/// true under concurrent requests.
///
/// Idle entries age out of the cache; a lock is only ever contended within
/// a day's traffic for one user.
#[derive(Clone)]
pub struct KeyedLocks {
    entries: Cache<(i64, NaiveDate), Arc<Mutex<()>>>,
    wait: Duration,
}

impl KeyedLocks {
    pub fn new(wait: Duration) -> Self {
        Self {
            entries: Cache::builder()
                .max_capacity(100_000)
                .time_to_idle(Duration::from_secs(86_400))
                .build(),
            wait,
        }
    }

    /// Acquires the key's lock, waiting at most the configured bound.
    /// Contention past the bound surfaces as a retryable `Concurrency` error.
    pub async fn acquire(
        &self,
        user_id: i64,
        date: NaiveDate,
    ) -> ServiceResult<OwnedMutexGuard<()>> {
        let lock = self
            .entries
            .get_with((user_id, date), async { Arc::new(Mutex::new(())) })
            .await;
        tokio::time::timeout(self.wait, lock.lock_owned())
            .await
            .map_err(|_| ServiceError::Concurrency)
    }
}

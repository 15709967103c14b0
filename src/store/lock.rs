//! Per-queue promotion lock.
//!
//! Serializes promotion ticks for a queue across every scheduler instance.
//! Two concurrent ticks computing free capacity from the same stale read
//! would jointly over-admit, so the read-capacity/select-batch/promote
//! sequence always runs under this lease.
//!
//! Acquisition has a bounded wait (a contended tick is skipped, never
//! queued indefinitely) and the lease carries a TTL so a crashed holder
//! cannot wedge the queue.

use std::time::Duration;

use async_trait::async_trait;
use tokio::time::Instant;
use uuid::Uuid;

use super::errors::StoreResult;

/// Retry cadence while waiting for a contended lock.
const ACQUIRE_RETRY_INTERVAL: Duration = Duration::from_millis(50);

/// Proof of lock ownership. Only the holder of the lease token can release
/// it; a lease that outlives its TTL simply lapses.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LockLease {
    pub queue_id: Uuid,
    pub token: Uuid,
}

/// Mutual exclusion scoped to a queue id.
#[async_trait]
pub trait PromotionLock: Send + Sync {
    /// Try to acquire the queue's lock, retrying up to `wait`. Returns
    /// `None` when the lock stayed contended for the whole bound.
    async fn acquire(
        &self,
        queue_id: Uuid,
        wait: Duration,
        lease_ttl: Duration,
    ) -> StoreResult<Option<LockLease>>;

    /// Release a held lease. Returns false when the lease was no longer
    /// owned (lapsed and taken over by another holder).
    async fn release(&self, lease: LockLease) -> StoreResult<bool>;
}

/// In-process lock provider for tests and single-instance deployments.
#[derive(Debug, Default)]
pub struct InMemoryPromotionLock {
    // queue -> (lease token, expiry)
    held: parking_lot::Mutex<std::collections::HashMap<Uuid, (Uuid, Instant)>>,
}

impl InMemoryPromotionLock {
    pub fn new() -> Self {
        Self::default()
    }

    fn try_take(&self, queue_id: Uuid, lease_ttl: Duration) -> Option<LockLease> {
        let mut held = self.held.lock();
        let now = Instant::now();
        match held.get(&queue_id) {
            Some((_, expiry)) if *expiry > now => None,
            _ => {
                let token = Uuid::new_v4();
                held.insert(queue_id, (token, now + lease_ttl));
                Some(LockLease { queue_id, token })
            }
        }
    }
}

#[async_trait]
impl PromotionLock for InMemoryPromotionLock {
    async fn acquire(
        &self,
        queue_id: Uuid,
        wait: Duration,
        lease_ttl: Duration,
    ) -> StoreResult<Option<LockLease>> {
        let deadline = Instant::now() + wait;
        loop {
            if let Some(lease) = self.try_take(queue_id, lease_ttl) {
                return Ok(Some(lease));
            }
            if Instant::now() >= deadline {
                return Ok(None);
            }
            tokio::time::sleep(ACQUIRE_RETRY_INTERVAL.min(wait)).await;
        }
    }

    async fn release(&self, lease: LockLease) -> StoreResult<bool> {
        let mut held = self.held.lock();
        match held.get(&lease.queue_id) {
            Some((token, _)) if *token == lease.token => {
                held.remove(&lease.queue_id);
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}

#[cfg(feature = "store-redis")]
pub use self::redis_lock::RedisPromotionLock;

#[cfg(feature = "store-redis")]
mod redis_lock {
    use super::*;
    use crate::constants::keys;
    use crate::store::errors::StoreError;
    use tracing::debug;

    /// Only the lease owner may delete the lock key.
    const RELEASE_SCRIPT: &str = r#"
        if redis.call('GET', KEYS[1]) == ARGV[1] then
            return redis.call('DEL', KEYS[1])
        end
        return 0
    "#;

    /// Distributed lock provider: `SET NX PX` lease with an owner-guarded
    /// release script.
    #[derive(Clone)]
    pub struct RedisPromotionLock {
        connection_manager: redis::aio::ConnectionManager,
        release_script: redis::Script,
    }

    impl std::fmt::Debug for RedisPromotionLock {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            f.debug_struct("RedisPromotionLock")
                .field("connection_manager", &"ConnectionManager")
                .finish()
        }
    }

    impl RedisPromotionLock {
        pub fn new(connection_manager: redis::aio::ConnectionManager) -> Self {
            Self {
                connection_manager,
                release_script: redis::Script::new(RELEASE_SCRIPT),
            }
        }

        async fn try_take(
            &self,
            queue_id: Uuid,
            lease_ttl: Duration,
        ) -> StoreResult<Option<LockLease>> {
            let mut conn = self.connection_manager.clone();
            let token = Uuid::new_v4();
            let acquired: Option<String> = redis::cmd("SET")
                .arg(keys::promotion_lock(&queue_id))
                .arg(token.to_string())
                .arg("NX")
                .arg("PX")
                .arg(lease_ttl.as_millis().max(1) as u64)
                .query_async(&mut conn)
                .await
                .map_err(|e| StoreError::BackendError(format!("Redis SET NX failed: {e}")))?;

            Ok(acquired.map(|_| LockLease { queue_id, token }))
        }
    }

    #[async_trait]
    impl PromotionLock for RedisPromotionLock {
        async fn acquire(
            &self,
            queue_id: Uuid,
            wait: Duration,
            lease_ttl: Duration,
        ) -> StoreResult<Option<LockLease>> {
            let deadline = Instant::now() + wait;
            loop {
                if let Some(lease) = self.try_take(queue_id, lease_ttl).await? {
                    debug!(queue_id = %queue_id, "Promotion lock acquired");
                    return Ok(Some(lease));
                }
                if Instant::now() >= deadline {
                    return Ok(None);
                }
                tokio::time::sleep(ACQUIRE_RETRY_INTERVAL.min(wait)).await;
            }
        }

        async fn release(&self, lease: LockLease) -> StoreResult<bool> {
            let mut conn = self.connection_manager.clone();
            let released: i64 = self
                .release_script
                .key(keys::promotion_lock(&lease.queue_id))
                .arg(lease.token.to_string())
                .invoke_async(&mut conn)
                .await
                .map_err(|e| StoreError::BackendError(format!("Redis lock release failed: {e}")))?;

            Ok(released == 1)
        }
    }
}

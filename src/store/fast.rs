//! Fast ordered store trait.
//!
//! The low-latency, rank-aware store that is the source of truth for "can
//! this user act right now". Every mutating operation must be atomic in a
//! single round trip: the engine performs no read-then-write sequences
//! against this store.

use std::time::Duration;

use async_trait::async_trait;
use uuid::Uuid;

use super::errors::StoreResult;

/// Operations the queue engine requires from the fast store.
///
/// Waiting membership is an ordered set keyed by join score (ascending,
/// earliest wins); admitted membership is a token with a TTL. Implemented
/// by `RedisFastStore` in production and `InMemoryFastStore` for tests and
/// local development.
#[async_trait]
pub trait FastOrderedStore: Send + Sync {
    /// Add a user to the waiting line with the given join score.
    /// Returns false when the user is already waiting (the score is not
    /// updated on repeat calls).
    async fn add_waiting(&self, queue_id: Uuid, user_id: Uuid, score: i64) -> StoreResult<bool>;

    /// Remove a user from the waiting line. Returns false when absent.
    async fn remove_waiting(&self, queue_id: Uuid, user_id: Uuid) -> StoreResult<bool>;

    /// 1-based position of the user in the waiting line, None when absent.
    async fn rank_in_waiting(&self, queue_id: Uuid, user_id: Uuid) -> StoreResult<Option<u64>>;

    /// Number of users strictly ahead, None when absent.
    async fn count_ahead_in_waiting(
        &self,
        queue_id: Uuid,
        user_id: Uuid,
    ) -> StoreResult<Option<u64>>;

    /// Total users currently waiting.
    async fn total_waiting(&self, queue_id: Uuid) -> StoreResult<u64>;

    /// The first `n` waiting users in strict FIFO order.
    async fn top_waiting(&self, queue_id: Uuid, n: usize) -> StoreResult<Vec<Uuid>>;

    /// Whether the user is currently in the waiting line.
    async fn is_waiting(&self, queue_id: Uuid, user_id: Uuid) -> StoreResult<bool>;

    /// Atomically move a user from waiting to admitted with the given TTL.
    ///
    /// Returns `Some(join_score)` when *this* call performed the move, and
    /// `None` when it did not (already admitted or never waiting) - a
    /// repeat attempt is a no-op, not an error. The returned join score is
    /// the one recorded at `add_waiting` time.
    async fn move_to_admitted(
        &self,
        queue_id: Uuid,
        user_id: Uuid,
        ttl: Duration,
    ) -> StoreResult<Option<i64>>;

    /// Whether the user holds a live (unexpired) admission.
    async fn is_admitted(&self, queue_id: Uuid, user_id: Uuid) -> StoreResult<bool>;

    /// Drop the user's admission token. Returns false when absent.
    async fn remove_admitted(&self, queue_id: Uuid, user_id: Uuid) -> StoreResult<bool>;

    /// Count of live admissions. Purges lapsed entries before counting, so
    /// the result self-heals any counter drift.
    async fn total_admitted(&self, queue_id: Uuid) -> StoreResult<u64>;

    /// Bump the cumulative admissions counter. Best-effort statistics only;
    /// never consulted for capacity decisions.
    async fn increment_admitted_serial(&self, queue_id: Uuid) -> StoreResult<u64>;

    /// Read the cumulative admissions counter.
    async fn admitted_serial(&self, queue_id: Uuid) -> StoreResult<u64>;

    /// Compensating action: return an admitted user to the waiting line at
    /// their original join score. Returns false when the user held neither
    /// an admission nor an origin entry.
    async fn rollback_to_waiting(&self, queue_id: Uuid, user_id: Uuid) -> StoreResult<bool>;

    /// Remove and return every admitted user whose TTL has lapsed.
    /// Feeds the maintenance sweep.
    async fn pop_expired_admitted(&self, queue_id: Uuid) -> StoreResult<Vec<Uuid>>;

    /// Drop every structure belonging to the queue.
    async fn clear_all(&self, queue_id: Uuid) -> StoreResult<()>;

    /// Whether the store backend is reachable.
    async fn health_check(&self) -> StoreResult<bool>;
}

//! Audit store trait.
//!
//! Durable, queryable storage for queue configuration and admission
//! records. Used for recovery and reporting; never consulted to grant
//! access while the fast store is healthy, and always written *after* the
//! fast store confirms a transition.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::errors::StoreResult;
use crate::models::{AdmissionRecord, NewAdmission, QueueConfig};

/// Operations the queue engine requires from the durable store.
#[async_trait]
pub trait AuditStore: Send + Sync {
    /// Look up a queue configuration by its id.
    async fn find_queue(&self, queue_id: Uuid) -> StoreResult<Option<QueueConfig>>;

    /// Look up the queue gating a protected resource, by kind.
    async fn find_queue_for_resource(
        &self,
        resource_id: Uuid,
        queue_kind: &str,
    ) -> StoreResult<Option<QueueConfig>>;

    /// The admission record for a (queue, user) pair, if one exists.
    async fn find_admission(
        &self,
        queue_id: Uuid,
        user_id: Uuid,
    ) -> StoreResult<Option<AdmissionRecord>>;

    /// Create or refresh an ADMITTED record with a fresh token.
    async fn upsert_admitted(&self, admission: &NewAdmission) -> StoreResult<AdmissionRecord>;

    /// ADMITTED -> COMPLETED. False when not currently ADMITTED.
    async fn mark_completed(&self, queue_id: Uuid, user_id: Uuid) -> StoreResult<bool>;

    /// ADMITTED -> EXPIRED. False when not currently ADMITTED.
    async fn mark_expired(&self, queue_id: Uuid, user_id: Uuid) -> StoreResult<bool>;

    /// Bulk-demote lapsed ADMITTED records. Returns how many changed.
    async fn expire_stale(&self, queue_id: Uuid, now: DateTime<Utc>) -> StoreResult<u64>;
}

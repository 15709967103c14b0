//! Postgres audit-store provider.
//!
//! Thin adapter from the `AuditStore` trait onto the model layer. Error
//! detail is logged here; callers only see `StoreError`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use tracing::error;
use uuid::Uuid;

use crate::models::{AdmissionRecord, NewAdmission, QueueConfig};
use crate::store::audit::AuditStore;
use crate::store::errors::{StoreError, StoreResult};

/// Embedded schema migrations for the audit tables.
pub static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!();

/// Audit store backed by Postgres.
#[derive(Debug, Clone)]
pub struct PgAuditStore {
    pool: PgPool,
}

impl PgAuditStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    fn backend_error(operation: &str, err: sqlx::Error) -> StoreError {
        error!(operation = operation, error = %err, "Audit store operation failed");
        StoreError::BackendError(format!("{operation} failed: {err}"))
    }
}

#[async_trait]
impl AuditStore for PgAuditStore {
    async fn find_queue(&self, queue_id: Uuid) -> StoreResult<Option<QueueConfig>> {
        QueueConfig::find_by_id(&self.pool, queue_id)
            .await
            .map_err(|e| Self::backend_error("find_queue", e))
    }

    async fn find_queue_for_resource(
        &self,
        resource_id: Uuid,
        queue_kind: &str,
    ) -> StoreResult<Option<QueueConfig>> {
        QueueConfig::find_by_resource(&self.pool, resource_id, queue_kind)
            .await
            .map_err(|e| Self::backend_error("find_queue_for_resource", e))
    }

    async fn find_admission(
        &self,
        queue_id: Uuid,
        user_id: Uuid,
    ) -> StoreResult<Option<AdmissionRecord>> {
        AdmissionRecord::find_by_queue_and_user(&self.pool, queue_id, user_id)
            .await
            .map_err(|e| Self::backend_error("find_admission", e))
    }

    async fn upsert_admitted(&self, admission: &NewAdmission) -> StoreResult<AdmissionRecord> {
        AdmissionRecord::upsert_admitted(&self.pool, admission)
            .await
            .map_err(|e| Self::backend_error("upsert_admitted", e))
    }

    async fn mark_completed(&self, queue_id: Uuid, user_id: Uuid) -> StoreResult<bool> {
        AdmissionRecord::mark_completed(&self.pool, queue_id, user_id)
            .await
            .map_err(|e| Self::backend_error("mark_completed", e))
    }

    async fn mark_expired(&self, queue_id: Uuid, user_id: Uuid) -> StoreResult<bool> {
        AdmissionRecord::mark_expired(&self.pool, queue_id, user_id)
            .await
            .map_err(|e| Self::backend_error("mark_expired", e))
    }

    async fn expire_stale(&self, queue_id: Uuid, now: DateTime<Utc>) -> StoreResult<u64> {
        AdmissionRecord::expire_stale(&self.pool, queue_id, now)
            .await
            .map_err(|e| Self::backend_error("expire_stale", e))
    }
}

//! # Admission Gate
//!
//! The single read-only check the protected resource flow is allowed to
//! depend on. Fails closed: any negative or uncertain result - unknown
//! queue, store failure, no admission - collapses into one generic
//! `NotEnterable` error so callers cannot branch on queue internals.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, instrument};
use uuid::Uuid;

use crate::constants::queue_kind;
use crate::error::{Result, WaitroomError};
use crate::store::{AuditStore, FastOrderedStore, StoreResult};

/// Translates a protected-resource id into the id of the queue gating it.
///
/// The gate checks admission by resource, but queues are administered by
/// their own id; this seam keeps that translation outside the engine.
#[async_trait]
pub trait QueueKeyResolver: Send + Sync {
    async fn resolve(&self, resource_id: Uuid) -> StoreResult<Option<Uuid>>;
}

/// Default resolver: look the queue up in the audit store by
/// (resource, kind).
pub struct AuditQueueKeyResolver {
    audit: Arc<dyn AuditStore>,
    queue_kind: String,
}

impl AuditQueueKeyResolver {
    pub fn new(audit: Arc<dyn AuditStore>) -> Self {
        Self::with_kind(audit, queue_kind::BOOKING)
    }

    pub fn with_kind(audit: Arc<dyn AuditStore>, queue_kind: impl Into<String>) -> Self {
        Self {
            audit,
            queue_kind: queue_kind.into(),
        }
    }
}

#[async_trait]
impl QueueKeyResolver for AuditQueueKeyResolver {
    async fn resolve(&self, resource_id: Uuid) -> StoreResult<Option<Uuid>> {
        Ok(self
            .audit
            .find_queue_for_resource(resource_id, &self.queue_kind)
            .await?
            .map(|config| config.queue_id))
    }
}

/// Read-only admission check for the protected flow.
pub struct AdmissionGate {
    resolver: Arc<dyn QueueKeyResolver>,
    fast: Arc<dyn FastOrderedStore>,
}

impl AdmissionGate {
    pub fn new(resolver: Arc<dyn QueueKeyResolver>, fast: Arc<dyn FastOrderedStore>) -> Self {
        Self { resolver, fast }
    }

    /// Assert the user currently holds a live admission for the resource's
    /// queue. Returns `NotEnterable` on every negative path; the concrete
    /// cause is logged at debug level only.
    #[instrument(skip(self))]
    pub async fn assert_enterable(&self, resource_id: Uuid, user_id: Uuid) -> Result<()> {
        let queue_id = match self.resolver.resolve(resource_id).await {
            Ok(Some(queue_id)) => queue_id,
            Ok(None) => {
                debug!(resource_id = %resource_id, "No queue gates this resource");
                return Err(WaitroomError::NotEnterable);
            }
            Err(e) => {
                debug!(resource_id = %resource_id, error = %e, "Queue resolution failed");
                return Err(WaitroomError::NotEnterable);
            }
        };

        match self.fast.is_admitted(queue_id, user_id).await {
            Ok(true) => Ok(()),
            Ok(false) => {
                debug!(queue_id = %queue_id, user_id = %user_id, "User holds no live admission");
                Err(WaitroomError::NotEnterable)
            }
            Err(e) => {
                // Uncertainty fails closed.
                debug!(queue_id = %queue_id, user_id = %user_id, error = %e, "Fast store unavailable");
                Err(WaitroomError::NotEnterable)
            }
        }
    }
}

impl std::fmt::Debug for AdmissionGate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdmissionGate").finish()
    }
}

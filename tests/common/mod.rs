#![allow(dead_code)] // Each integration binary uses a different slice of the harness.

//! Shared test doubles and fixtures for the integration suite.
//!
//! `MockAuditStore` records every call and supports failure injection so
//! tests can drive the compensation paths without a database. The fast
//! store side uses the real `InMemoryFastStore`, optionally wrapped in
//! `FaultInjectingFastStore` to simulate outages.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use uuid::Uuid;

use waitroom_core::admission::{
    CoordinatorConfig, PromotionScheduler, QueueCoordinator, SchedulerConfig,
};
use waitroom_core::models::{AdmissionRecord, AdmissionStatus, NewAdmission, QueueConfig};
use waitroom_core::store::{
    AuditStore, FastOrderedStore, InMemoryFastStore, InMemoryPromotionLock, StoreError,
    StoreResult,
};

#[derive(Debug, Default)]
struct MockAuditState {
    queues: HashMap<Uuid, QueueConfig>,
    records: HashMap<(Uuid, Uuid), AdmissionRecord>,
    upsert_calls: u64,
    fail_next_upsert: bool,
}

/// In-memory audit store with call recording and failure injection.
#[derive(Debug, Default)]
pub struct MockAuditStore {
    state: Mutex<MockAuditState>,
}

impl MockAuditStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a queue and return its configuration.
    pub fn seed_queue(&self, capacity: i32, admission_ttl_minutes: i32) -> QueueConfig {
        let now = Utc::now();
        let config = QueueConfig {
            queue_id: Uuid::new_v4(),
            resource_id: Uuid::new_v4(),
            queue_kind: "booking".to_string(),
            capacity,
            admission_ttl_minutes,
            created_at: now,
            updated_at: now,
        };
        self.state
            .lock()
            .queues
            .insert(config.queue_id, config.clone());
        config
    }

    /// Plant an admission record directly, bypassing the engine.
    pub fn seed_record(
        &self,
        queue_id: Uuid,
        user_id: Uuid,
        status: AdmissionStatus,
        expires_at: DateTime<Utc>,
    ) -> AdmissionRecord {
        let now = Utc::now();
        let record = AdmissionRecord {
            admission_id: Uuid::new_v4(),
            queue_id,
            user_id,
            status,
            admission_token: Uuid::new_v4(),
            joined_at: now,
            admitted_at: now,
            expires_at,
            completed_at: None,
            created_at: now,
            updated_at: now,
        };
        self.state
            .lock()
            .records
            .insert((queue_id, user_id), record.clone());
        record
    }

    /// Make the next upsert fail with a backend error.
    pub fn fail_next_upsert(&self) {
        self.state.lock().fail_next_upsert = true;
    }

    pub fn upsert_calls(&self) -> u64 {
        self.state.lock().upsert_calls
    }

    pub fn record(&self, queue_id: Uuid, user_id: Uuid) -> Option<AdmissionRecord> {
        self.state.lock().records.get(&(queue_id, user_id)).cloned()
    }

    pub fn record_count(&self) -> usize {
        self.state.lock().records.len()
    }
}

#[async_trait]
impl AuditStore for MockAuditStore {
    async fn find_queue(&self, queue_id: Uuid) -> StoreResult<Option<QueueConfig>> {
        Ok(self.state.lock().queues.get(&queue_id).cloned())
    }

    async fn find_queue_for_resource(
        &self,
        resource_id: Uuid,
        queue_kind: &str,
    ) -> StoreResult<Option<QueueConfig>> {
        Ok(self
            .state
            .lock()
            .queues
            .values()
            .find(|q| q.resource_id == resource_id && q.queue_kind == queue_kind)
            .cloned())
    }

    async fn find_admission(
        &self,
        queue_id: Uuid,
        user_id: Uuid,
    ) -> StoreResult<Option<AdmissionRecord>> {
        Ok(self.state.lock().records.get(&(queue_id, user_id)).cloned())
    }

    async fn upsert_admitted(&self, admission: &NewAdmission) -> StoreResult<AdmissionRecord> {
        let mut state = self.state.lock();
        state.upsert_calls += 1;
        if state.fail_next_upsert {
            state.fail_next_upsert = false;
            return Err(StoreError::BackendError("injected upsert failure".to_string()));
        }

        let now = Utc::now();
        let existing = state
            .records
            .get(&(admission.queue_id, admission.user_id))
            .cloned();
        let record = AdmissionRecord {
            admission_id: existing
                .as_ref()
                .map(|r| r.admission_id)
                .unwrap_or_else(Uuid::new_v4),
            queue_id: admission.queue_id,
            user_id: admission.user_id,
            status: AdmissionStatus::Admitted,
            admission_token: admission.admission_token,
            joined_at: admission.joined_at,
            admitted_at: admission.admitted_at,
            expires_at: admission.expires_at,
            completed_at: None,
            created_at: existing.map(|r| r.created_at).unwrap_or(now),
            updated_at: now,
        };
        state
            .records
            .insert((admission.queue_id, admission.user_id), record.clone());
        Ok(record)
    }

    async fn mark_completed(&self, queue_id: Uuid, user_id: Uuid) -> StoreResult<bool> {
        let mut state = self.state.lock();
        match state.records.get_mut(&(queue_id, user_id)) {
            Some(record) if record.status == AdmissionStatus::Admitted => {
                record.status = AdmissionStatus::Completed;
                record.completed_at = Some(Utc::now());
                record.updated_at = Utc::now();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn mark_expired(&self, queue_id: Uuid, user_id: Uuid) -> StoreResult<bool> {
        let mut state = self.state.lock();
        match state.records.get_mut(&(queue_id, user_id)) {
            Some(record) if record.status == AdmissionStatus::Admitted => {
                record.status = AdmissionStatus::Expired;
                record.updated_at = Utc::now();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn expire_stale(&self, queue_id: Uuid, now: DateTime<Utc>) -> StoreResult<u64> {
        let mut state = self.state.lock();
        let mut demoted = 0;
        for record in state.records.values_mut() {
            if record.queue_id == queue_id
                && record.status == AdmissionStatus::Admitted
                && record.expires_at <= now
            {
                record.status = AdmissionStatus::Expired;
                record.updated_at = now;
                demoted += 1;
            }
        }
        Ok(demoted)
    }
}

/// Fast store wrapper with switchable failure modes.
pub struct FaultInjectingFastStore {
    inner: InMemoryFastStore,
    fail_all: AtomicBool,
    fail_rollback: AtomicBool,
}

impl FaultInjectingFastStore {
    pub fn new() -> Self {
        Self {
            inner: InMemoryFastStore::new(),
            fail_all: AtomicBool::new(false),
            fail_rollback: AtomicBool::new(false),
        }
    }

    pub fn set_fail_all(&self, fail: bool) {
        self.fail_all.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_rollback(&self, fail: bool) {
        self.fail_rollback.store(fail, Ordering::SeqCst);
    }

    fn outage<T>(&self) -> Option<StoreResult<T>> {
        if self.fail_all.load(Ordering::SeqCst) {
            Some(Err(StoreError::ConnectionError(
                "injected outage".to_string(),
            )))
        } else {
            None
        }
    }
}

impl Default for FaultInjectingFastStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl FastOrderedStore for FaultInjectingFastStore {
    async fn add_waiting(&self, queue_id: Uuid, user_id: Uuid, score: i64) -> StoreResult<bool> {
        if let Some(err) = self.outage() {
            return err;
        }
        self.inner.add_waiting(queue_id, user_id, score).await
    }

    async fn remove_waiting(&self, queue_id: Uuid, user_id: Uuid) -> StoreResult<bool> {
        if let Some(err) = self.outage() {
            return err;
        }
        self.inner.remove_waiting(queue_id, user_id).await
    }

    async fn rank_in_waiting(&self, queue_id: Uuid, user_id: Uuid) -> StoreResult<Option<u64>> {
        if let Some(err) = self.outage() {
            return err;
        }
        self.inner.rank_in_waiting(queue_id, user_id).await
    }

    async fn count_ahead_in_waiting(
        &self,
        queue_id: Uuid,
        user_id: Uuid,
    ) -> StoreResult<Option<u64>> {
        if let Some(err) = self.outage() {
            return err;
        }
        self.inner.count_ahead_in_waiting(queue_id, user_id).await
    }

    async fn total_waiting(&self, queue_id: Uuid) -> StoreResult<u64> {
        if let Some(err) = self.outage() {
            return err;
        }
        self.inner.total_waiting(queue_id).await
    }

    async fn top_waiting(&self, queue_id: Uuid, n: usize) -> StoreResult<Vec<Uuid>> {
        if let Some(err) = self.outage() {
            return err;
        }
        self.inner.top_waiting(queue_id, n).await
    }

    async fn is_waiting(&self, queue_id: Uuid, user_id: Uuid) -> StoreResult<bool> {
        if let Some(err) = self.outage() {
            return err;
        }
        self.inner.is_waiting(queue_id, user_id).await
    }

    async fn move_to_admitted(
        &self,
        queue_id: Uuid,
        user_id: Uuid,
        ttl: Duration,
    ) -> StoreResult<Option<i64>> {
        if let Some(err) = self.outage() {
            return err;
        }
        self.inner.move_to_admitted(queue_id, user_id, ttl).await
    }

    async fn is_admitted(&self, queue_id: Uuid, user_id: Uuid) -> StoreResult<bool> {
        if let Some(err) = self.outage() {
            return err;
        }
        self.inner.is_admitted(queue_id, user_id).await
    }

    async fn remove_admitted(&self, queue_id: Uuid, user_id: Uuid) -> StoreResult<bool> {
        if let Some(err) = self.outage() {
            return err;
        }
        self.inner.remove_admitted(queue_id, user_id).await
    }

    async fn total_admitted(&self, queue_id: Uuid) -> StoreResult<u64> {
        if let Some(err) = self.outage() {
            return err;
        }
        self.inner.total_admitted(queue_id).await
    }

    async fn increment_admitted_serial(&self, queue_id: Uuid) -> StoreResult<u64> {
        if let Some(err) = self.outage() {
            return err;
        }
        self.inner.increment_admitted_serial(queue_id).await
    }

    async fn admitted_serial(&self, queue_id: Uuid) -> StoreResult<u64> {
        if let Some(err) = self.outage() {
            return err;
        }
        self.inner.admitted_serial(queue_id).await
    }

    async fn rollback_to_waiting(&self, queue_id: Uuid, user_id: Uuid) -> StoreResult<bool> {
        if let Some(err) = self.outage() {
            return err;
        }
        if self.fail_rollback.load(Ordering::SeqCst) {
            return Err(StoreError::BackendError(
                "injected rollback failure".to_string(),
            ));
        }
        self.inner.rollback_to_waiting(queue_id, user_id).await
    }

    async fn pop_expired_admitted(&self, queue_id: Uuid) -> StoreResult<Vec<Uuid>> {
        if let Some(err) = self.outage() {
            return err;
        }
        self.inner.pop_expired_admitted(queue_id).await
    }

    async fn clear_all(&self, queue_id: Uuid) -> StoreResult<()> {
        if let Some(err) = self.outage() {
            return err;
        }
        self.inner.clear_all(queue_id).await
    }

    async fn health_check(&self) -> StoreResult<bool> {
        if let Some(err) = self.outage() {
            return err;
        }
        self.inner.health_check().await
    }
}

/// Fully wired engine over in-memory stores.
pub struct TestHarness {
    pub fast: Arc<FaultInjectingFastStore>,
    pub audit: Arc<MockAuditStore>,
    pub lock: Arc<InMemoryPromotionLock>,
    pub coordinator: Arc<QueueCoordinator>,
    pub scheduler: PromotionScheduler,
}

impl TestHarness {
    pub fn new() -> Self {
        Self::with_scheduler_config(SchedulerConfig {
            tick_interval: Duration::from_millis(20),
            batch_size: 100,
            lock_wait: Duration::from_millis(100),
            lock_lease: Duration::from_secs(2),
        })
    }

    pub fn with_scheduler_config(config: SchedulerConfig) -> Self {
        let fast = Arc::new(FaultInjectingFastStore::new());
        let audit = Arc::new(MockAuditStore::new());
        let lock = Arc::new(InMemoryPromotionLock::new());

        // Tests mutate queue configs mid-flight; don't let the cache hide
        // that.
        let coordinator = Arc::new(QueueCoordinator::with_config(
            fast.clone(),
            audit.clone(),
            CoordinatorConfig {
                config_cache_ttl: Duration::ZERO,
            },
        ));
        let scheduler = PromotionScheduler::with_config(
            coordinator.clone(),
            fast.clone(),
            audit.clone(),
            lock.clone(),
            config,
        );

        Self {
            fast,
            audit,
            lock,
            coordinator,
            scheduler,
        }
    }
}

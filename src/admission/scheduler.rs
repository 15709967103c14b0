//! # Promotion Scheduler
//!
//! The capacity-aware promotion cycle. Each tick reads free capacity,
//! selects the next FIFO batch of waiting users, and promotes them one by
//! one - serialized per queue by a leased lock, because two concurrent
//! ticks computing free capacity from the same stale read would jointly
//! over-admit past the ceiling.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::Utc;
use parking_lot::RwLock;
use std::collections::HashSet;
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::admission::coordinator::QueueCoordinator;
use crate::admission::types::TickOutcome;
use crate::config::WaitroomConfig;
use crate::constants::defaults;
use crate::error::{Result, WaitroomError};
use crate::store::{AuditStore, FastOrderedStore, PromotionLock};

/// Configuration for promotion scheduling behavior
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Tick period for the run loop.
    pub tick_interval: std::time::Duration,
    /// Users promoted per tick, before the capacity clamp.
    pub batch_size: usize,
    /// Bounded wait for the per-queue lock; a contended tick is skipped.
    pub lock_wait: std::time::Duration,
    /// Lease TTL on the lock, so a crashed holder frees the queue.
    pub lock_lease: std::time::Duration,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            tick_interval: std::time::Duration::from_millis(defaults::TICK_INTERVAL_MS),
            batch_size: defaults::PROMOTION_BATCH_SIZE,
            lock_wait: std::time::Duration::from_millis(defaults::LOCK_WAIT_MS),
            lock_lease: std::time::Duration::from_millis(defaults::LOCK_LEASE_MS),
        }
    }
}

impl From<&WaitroomConfig> for SchedulerConfig {
    fn from(config: &WaitroomConfig) -> Self {
        Self {
            tick_interval: config.tick_interval(),
            batch_size: config.promotion_batch_size,
            lock_wait: config.lock_wait(),
            lock_lease: config.lock_lease(),
        }
    }
}

/// Batch promotion engine, one instance per process.
pub struct PromotionScheduler {
    coordinator: Arc<QueueCoordinator>,
    fast: Arc<dyn FastOrderedStore>,
    audit: Arc<dyn AuditStore>,
    lock: Arc<dyn PromotionLock>,
    config: SchedulerConfig,
    registered: RwLock<HashSet<Uuid>>,
    running: AtomicBool,
}

impl PromotionScheduler {
    pub fn new(
        coordinator: Arc<QueueCoordinator>,
        fast: Arc<dyn FastOrderedStore>,
        audit: Arc<dyn AuditStore>,
        lock: Arc<dyn PromotionLock>,
    ) -> Self {
        Self::with_config(coordinator, fast, audit, lock, SchedulerConfig::default())
    }

    pub fn with_config(
        coordinator: Arc<QueueCoordinator>,
        fast: Arc<dyn FastOrderedStore>,
        audit: Arc<dyn AuditStore>,
        lock: Arc<dyn PromotionLock>,
        config: SchedulerConfig,
    ) -> Self {
        Self {
            coordinator,
            fast,
            audit,
            lock,
            config,
            registered: RwLock::new(HashSet::new()),
            running: AtomicBool::new(false),
        }
    }

    /// Add a queue to the run loop's rotation.
    pub fn register_queue(&self, queue_id: Uuid) {
        self.registered.write().insert(queue_id);
    }

    pub fn deregister_queue(&self, queue_id: Uuid) {
        self.registered.write().remove(&queue_id);
    }

    /// One promotion cycle for a queue, under the per-queue lock.
    ///
    /// The lock is not optional: every tick path serializes here, with a
    /// bounded wait so a contended cycle skips rather than queues up.
    #[instrument(skip(self))]
    pub async fn tick(&self, queue_id: Uuid, batch_size: usize) -> Result<TickOutcome> {
        let Some(lease) = self
            .lock
            .acquire(queue_id, self.config.lock_wait, self.config.lock_lease)
            .await?
        else {
            warn!(queue_id = %queue_id, "Promotion lock contended past the wait bound; skipping tick");
            return Ok(TickOutcome::skipped_lock(queue_id));
        };

        let outcome = self.promote_batch(queue_id, batch_size).await;

        if let Err(e) = self.lock.release(lease).await {
            warn!(queue_id = %queue_id, error = %e, "Promotion lock release failed; lease will lapse");
        }

        outcome
    }

    /// The capacity-clamped batch walk. Caller must hold the queue lock.
    async fn promote_batch(&self, queue_id: Uuid, batch_size: usize) -> Result<TickOutcome> {
        let waiting = self.fast.total_waiting(queue_id).await?;
        if waiting == 0 {
            return Ok(TickOutcome::noop(queue_id));
        }

        // An unreadable admitted count aborts the tick: guessing here is
        // how a queue over-admits.
        let available = match self.coordinator.available_slots(queue_id).await {
            Ok(available) => available,
            Err(e) => {
                warn!(queue_id = %queue_id, error = %e, "Capacity unreadable; aborting tick");
                return Err(e);
            }
        };
        if available == 0 {
            debug!(queue_id = %queue_id, waiting = waiting, "Queue at capacity; nothing promoted");
            return Ok(TickOutcome::noop(queue_id));
        }

        let eligible = (batch_size as u64).min(available).min(waiting);
        if eligible == 0 {
            return Ok(TickOutcome::noop(queue_id));
        }

        let batch = self.fast.top_waiting(queue_id, eligible as usize).await?;

        let mut promoted = 0u64;
        let mut skipped = 0u64;
        for user_id in batch {
            // One corrupt record must not stall everyone behind it.
            match self.coordinator.promote(queue_id, user_id).await {
                Ok(()) => promoted += 1,
                Err(e) => {
                    skipped += 1;
                    warn!(
                        queue_id = %queue_id,
                        user_id = %user_id,
                        error = %e,
                        "Promotion failed for user; continuing batch"
                    );
                }
            }
        }

        if promoted > 0 {
            info!(
                queue_id = %queue_id,
                promoted = promoted,
                skipped = skipped,
                remaining_waiting = waiting - promoted,
                "Promotion tick complete"
            );
        }

        Ok(TickOutcome {
            queue_id,
            lock_acquired: true,
            eligible,
            promoted,
            skipped,
        })
    }

    /// Demote lapsed admissions: drain expired fast-store members, then
    /// bulk-expire their audit records. Also catches records whose token
    /// already vanished from the fast store in an earlier purge.
    #[instrument(skip(self))]
    pub async fn sweep_expired(&self, queue_id: Uuid) -> Result<u64> {
        let lapsed = self.fast.pop_expired_admitted(queue_id).await?;
        if !lapsed.is_empty() {
            debug!(queue_id = %queue_id, lapsed = lapsed.len(), "Cleared lapsed admission tokens");
        }

        let demoted = self.audit.expire_stale(queue_id, Utc::now()).await?;
        if demoted > 0 {
            info!(queue_id = %queue_id, demoted = demoted, "Demoted stale admissions to expired");
        }
        Ok(demoted)
    }

    /// Spawn the recurring promotion loop over every registered queue.
    pub fn start(self: Arc<Self>) -> JoinHandle<()> {
        let scheduler = self;
        scheduler.running.store(true, Ordering::SeqCst);

        tokio::spawn(async move {
            let mut interval = tokio::time::interval(scheduler.config.tick_interval);
            info!(
                tick_interval_ms = scheduler.config.tick_interval.as_millis() as u64,
                "Promotion scheduler started"
            );

            while scheduler.running.load(Ordering::SeqCst) {
                interval.tick().await;

                let queues: Vec<Uuid> = scheduler.registered.read().iter().copied().collect();
                for queue_id in queues {
                    if !scheduler.running.load(Ordering::SeqCst) {
                        break;
                    }
                    if let Err(e) = scheduler.sweep_expired(queue_id).await {
                        warn!(queue_id = %queue_id, error = %e, "Expiry sweep failed");
                    }
                    match scheduler.tick(queue_id, scheduler.config.batch_size).await {
                        Ok(outcome) if outcome.promoted > 0 => {
                            debug!(queue_id = %queue_id, promoted = outcome.promoted, "Tick promoted users");
                        }
                        Ok(_) => {}
                        Err(WaitroomError::QueueNotFound { .. }) => {
                            // Deregistered out from under us; drop it.
                            scheduler.deregister_queue(queue_id);
                        }
                        Err(e) => {
                            warn!(queue_id = %queue_id, error = %e, "Promotion tick failed");
                        }
                    }
                }
            }

            debug!("Promotion scheduler loop stopped");
        })
    }

    /// Stop the run loop after the current cycle.
    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }
}

impl std::fmt::Debug for PromotionScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PromotionScheduler")
            .field("config", &self.config)
            .field("registered_queues", &self.registered.read().len())
            .field("running", &self.is_running())
            .finish()
    }
}

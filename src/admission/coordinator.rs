//! # Queue Coordinator
//!
//! Orchestrates join, status, promotion, completion, and exit against the
//! fast store and the audit store; owns the consistency and compensation
//! rules between them.
//!
//! ## Consistency model
//!
//! The fast store is always written first and the audit store second: the
//! fast store is cheap to reverse, the audit store is not, so ordering the
//! writes this way means we only ever compensate on the cheap side. A user
//! is in exactly one of WAITING (fast store only), ADMITTED (fast token
//! plus audit record), or a terminal state (audit record only) at any time.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use crate::admission::types::{JoinReceipt, QueueStatistics, QueueStatus};
use crate::error::{Result, WaitroomError};
use crate::models::{AdmissionStatus, NewAdmission, QueueConfig};
use crate::store::{AuditStore, FastOrderedStore};

/// Configuration for coordinator behavior
#[derive(Debug, Clone)]
pub struct CoordinatorConfig {
    /// How long a QueueConfig read stays cached before the audit store is
    /// consulted again.
    pub config_cache_ttl: Duration,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            config_cache_ttl: Duration::from_secs(
                crate::constants::defaults::CONFIG_CACHE_TTL_SECS,
            ),
        }
    }
}

#[derive(Debug, Clone)]
struct CachedConfig {
    config: QueueConfig,
    fetched_at: Instant,
}

/// Core admission-control coordinator.
pub struct QueueCoordinator {
    fast: Arc<dyn FastOrderedStore>,
    audit: Arc<dyn AuditStore>,
    config: CoordinatorConfig,
    config_cache: DashMap<Uuid, CachedConfig>,
}

impl QueueCoordinator {
    pub fn new(fast: Arc<dyn FastOrderedStore>, audit: Arc<dyn AuditStore>) -> Self {
        Self::with_config(fast, audit, CoordinatorConfig::default())
    }

    pub fn with_config(
        fast: Arc<dyn FastOrderedStore>,
        audit: Arc<dyn AuditStore>,
        config: CoordinatorConfig,
    ) -> Self {
        Self {
            fast,
            audit,
            config,
            config_cache: DashMap::new(),
        }
    }

    /// Enter the waiting line.
    ///
    /// Rejects users who are already waiting or admitted. A terminal
    /// EXPIRED record does not block re-entry: abandoning the queue and
    /// coming back is an expected path.
    #[instrument(skip(self))]
    pub async fn join(&self, queue_id: Uuid, user_id: Uuid) -> Result<JoinReceipt> {
        self.queue_config(queue_id).await?;

        if self.fast.is_waiting(queue_id, user_id).await? {
            return Err(WaitroomError::AlreadyInQueue { queue_id, user_id });
        }
        if self.fast.is_admitted(queue_id, user_id).await? {
            return Err(WaitroomError::AlreadyInQueue { queue_id, user_id });
        }
        // The fast store says no membership; only ADMITTED/COMPLETED audit
        // records still block (a live token may have lapsed ahead of the
        // sweep, and a completed user is done for good).
        if let Some(record) = self.audit.find_admission(queue_id, user_id).await? {
            if record.status.blocks_rejoin() {
                return Err(WaitroomError::AlreadyInQueue { queue_id, user_id });
            }
        }

        let score = Utc::now().timestamp_millis();
        if !self.fast.add_waiting(queue_id, user_id, score).await? {
            // Lost a race with a concurrent join by the same user.
            return Err(WaitroomError::AlreadyInQueue { queue_id, user_id });
        }

        let rank = self
            .fast
            .rank_in_waiting(queue_id, user_id)
            .await?
            .unwrap_or(1);
        let ahead = rank - 1;

        info!(queue_id = %queue_id, user_id = %user_id, rank = rank, "User joined waiting line");

        Ok(JoinReceipt {
            queue_id,
            user_id,
            rank,
            ahead,
        })
    }

    /// The user's live relationship to the queue.
    ///
    /// Fast-store verdicts take precedence; the audit store is consulted
    /// only once the fast store shows no membership, and then only for
    /// terminal display. A fast-store failure propagates rather than
    /// falling back: the audit store must never advertise access the
    /// authoritative store does not grant.
    #[instrument(skip(self))]
    pub async fn status(&self, queue_id: Uuid, user_id: Uuid) -> Result<QueueStatus> {
        if let Some(rank) = self.fast.rank_in_waiting(queue_id, user_id).await? {
            let total = self.fast.total_waiting(queue_id).await?;
            return Ok(QueueStatus::Waiting {
                rank,
                ahead: rank - 1,
                total,
            });
        }

        if self.fast.is_admitted(queue_id, user_id).await? {
            return Ok(QueueStatus::Admitted);
        }

        match self.audit.find_admission(queue_id, user_id).await? {
            Some(record) => match record.status {
                AdmissionStatus::Completed => Ok(QueueStatus::Completed),
                // An ADMITTED record with no live token means the TTL
                // lapsed ahead of the sweep.
                AdmissionStatus::Admitted | AdmissionStatus::Expired => Ok(QueueStatus::Expired),
            },
            None => Err(WaitroomError::NotInQueue { queue_id, user_id }),
        }
    }

    /// Promote a waiting user to ADMITTED. Idempotent: a repeat call (or a
    /// concurrent duplicate) is a no-op success, decided by the fast
    /// store's atomic move.
    #[instrument(skip(self))]
    pub async fn promote(&self, queue_id: Uuid, user_id: Uuid) -> Result<()> {
        let config = self.queue_config(queue_id).await?;
        let ttl = config.admission_ttl();

        let Some(join_score) = self.fast.move_to_admitted(queue_id, user_id, ttl).await? else {
            debug!(queue_id = %queue_id, user_id = %user_id, "Promotion no-op: not waiting or already admitted");
            return Ok(());
        };

        let now = Utc::now();
        let admission = NewAdmission {
            queue_id,
            user_id,
            admission_token: Uuid::new_v4(),
            joined_at: DateTime::from_timestamp_millis(join_score).unwrap_or(now),
            admitted_at: now,
            expires_at: now + chrono::Duration::milliseconds(ttl.as_millis() as i64),
        };

        match self.audit.upsert_admitted(&admission).await {
            Ok(record) => {
                if let Err(e) = self.fast.increment_admitted_serial(queue_id).await {
                    warn!(
                        queue_id = %queue_id,
                        error = %e,
                        "Admitted serial increment failed; drift self-heals on the next recount"
                    );
                }
                info!(
                    queue_id = %queue_id,
                    user_id = %user_id,
                    expires_at = %record.expires_at,
                    "User admitted"
                );
                Ok(())
            }
            Err(upsert_err) => {
                error!(
                    queue_id = %queue_id,
                    user_id = %user_id,
                    error = %upsert_err,
                    "Admission record upsert failed; rolling fast-store membership back"
                );
                match self.fast.rollback_to_waiting(queue_id, user_id).await {
                    Ok(_) => Err(WaitroomError::StoreUnavailable(format!(
                        "admission record upsert failed: {upsert_err}"
                    ))),
                    Err(rollback_err) => {
                        // Both stores now disagree and neither write can be
                        // retried here. Reconciliation is manual.
                        error!(
                            queue_id = %queue_id,
                            user_id = %user_id,
                            upsert_error = %upsert_err,
                            rollback_error = %rollback_err,
                            "FATAL: rollback after failed admission upsert also failed"
                        );
                        Err(WaitroomError::FatalInconsistency(format!(
                            "user {user_id} in queue {queue_id}: upsert failed ({upsert_err}), rollback failed ({rollback_err})"
                        )))
                    }
                }
            }
        }
    }

    /// Consume an admission. The single authorization gate the protected
    /// action relies on transitively.
    #[instrument(skip(self))]
    pub async fn complete(&self, queue_id: Uuid, user_id: Uuid) -> Result<()> {
        if !self.fast.is_admitted(queue_id, user_id).await? {
            return Err(WaitroomError::InvalidAdmissionState(
                "no active admission token".to_string(),
            ));
        }

        let record = self
            .audit
            .find_admission(queue_id, user_id)
            .await?
            .ok_or_else(|| {
                WaitroomError::InvalidAdmissionState("no admission record".to_string())
            })?;

        if record.status != AdmissionStatus::Admitted {
            return Err(WaitroomError::InvalidAdmissionState(format!(
                "admission is {}, not admitted",
                record.status
            )));
        }
        let now = Utc::now();
        if record.is_expired_at(now) {
            return Err(WaitroomError::InvalidAdmissionState(
                "admission has expired".to_string(),
            ));
        }

        // Durable transition first; the guarded UPDATE loses gracefully to
        // a concurrent complete or sweep.
        if !self.audit.mark_completed(queue_id, user_id).await? {
            return Err(WaitroomError::InvalidAdmissionState(
                "admission was transitioned concurrently".to_string(),
            ));
        }
        self.fast.remove_admitted(queue_id, user_id).await?;

        info!(queue_id = %queue_id, user_id = %user_id, "Admission completed");
        Ok(())
    }

    /// Leave the queue.
    ///
    /// A waiting user vanishes without an audit trace - users who leave
    /// the line before admission leave no billable footprint. An admitted
    /// user's record is demoted to EXPIRED.
    #[instrument(skip(self))]
    pub async fn exit(&self, queue_id: Uuid, user_id: Uuid) -> Result<()> {
        if self.fast.is_waiting(queue_id, user_id).await? {
            self.fast.remove_waiting(queue_id, user_id).await?;
            info!(queue_id = %queue_id, user_id = %user_id, "User left waiting line");
            return Ok(());
        }

        if self.fast.is_admitted(queue_id, user_id).await? {
            self.fast.remove_admitted(queue_id, user_id).await?;
            if let Some(record) = self.audit.find_admission(queue_id, user_id).await? {
                if record.status == AdmissionStatus::Admitted {
                    self.audit.mark_expired(queue_id, user_id).await?;
                }
            }
            info!(queue_id = %queue_id, user_id = %user_id, "Admitted user exited");
            return Ok(());
        }

        Err(WaitroomError::NotInQueue { queue_id, user_id })
    }

    /// Read-only aggregates computed from fast-store counts.
    #[instrument(skip(self))]
    pub async fn statistics(&self, queue_id: Uuid) -> Result<QueueStatistics> {
        let config = self.queue_config(queue_id).await?;
        let capacity = config.capacity.max(0) as u64;

        let waiting = self.fast.total_waiting(queue_id).await?;
        let admitted = self.fast.total_admitted(queue_id).await?;
        let admitted_serial = self.fast.admitted_serial(queue_id).await?;

        if admitted > capacity {
            warn!(
                queue_id = %queue_id,
                admitted = admitted,
                capacity = capacity,
                "Admitted count exceeds capacity; counter drift or a promotion race"
            );
        }

        Ok(QueueStatistics {
            queue_id,
            capacity,
            waiting,
            admitted,
            available: capacity.saturating_sub(admitted),
            admitted_serial,
        })
    }

    /// Free admission slots, clamped at zero.
    pub async fn available_slots(&self, queue_id: Uuid) -> Result<u64> {
        Ok(self.statistics(queue_id).await?.available)
    }

    pub async fn can_admit_more(&self, queue_id: Uuid) -> Result<bool> {
        Ok(self.available_slots(queue_id).await? > 0)
    }

    /// Resolve the queue configuration through the read-through cache.
    pub(crate) async fn queue_config(&self, queue_id: Uuid) -> Result<QueueConfig> {
        if let Some(cached) = self.config_cache.get(&queue_id) {
            if cached.fetched_at.elapsed() < self.config.config_cache_ttl {
                return Ok(cached.config.clone());
            }
        }

        let config = self
            .audit
            .find_queue(queue_id)
            .await?
            .ok_or(WaitroomError::QueueNotFound { queue_id })?;

        self.config_cache.insert(
            queue_id,
            CachedConfig {
                config: config.clone(),
                fetched_at: Instant::now(),
            },
        );
        Ok(config)
    }

    /// Drop a cached queue configuration (after an administrative update).
    pub fn invalidate_config_cache(&self, queue_id: Uuid) {
        self.config_cache.remove(&queue_id);
    }
}

impl std::fmt::Debug for QueueCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueueCoordinator")
            .field("config", &self.config)
            .field("cached_queues", &self.config_cache.len())
            .finish()
    }
}

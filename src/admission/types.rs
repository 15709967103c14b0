//! Result types for queue operations.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// What `Join` hands back to the caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JoinReceipt {
    pub queue_id: Uuid,
    pub user_id: Uuid,
    /// 1-based position in the waiting line.
    pub rank: u64,
    /// Users strictly ahead.
    pub ahead: u64,
}

/// A user's live relationship to a queue.
///
/// Waiting and Admitted verdicts come from the fast store only; the
/// terminal verdicts are read from the audit store once the fast store
/// shows no membership.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "lowercase")]
pub enum QueueStatus {
    Waiting { rank: u64, ahead: u64, total: u64 },
    Admitted,
    Completed,
    Expired,
}

impl QueueStatus {
    pub fn is_waiting(&self) -> bool {
        matches!(self, QueueStatus::Waiting { .. })
    }

    pub fn is_admitted(&self) -> bool {
        matches!(self, QueueStatus::Admitted)
    }
}

/// Read-only aggregates for a queue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueueStatistics {
    pub queue_id: Uuid,
    pub capacity: u64,
    pub waiting: u64,
    pub admitted: u64,
    /// Free admission slots, clamped at zero.
    pub available: u64,
    /// Cumulative admissions since the queue was created. Statistics only;
    /// drift here never affects capacity decisions.
    pub admitted_serial: u64,
}

/// Outcome of one promotion tick.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TickOutcome {
    pub queue_id: Uuid,
    /// Whether the per-queue lock was obtained. A contended tick reports
    /// false and does nothing.
    pub lock_acquired: bool,
    /// Batch size after the capacity and backlog clamps.
    pub eligible: u64,
    pub promoted: u64,
    /// Users whose individual promotion failed and was skipped.
    pub skipped: u64,
}

impl TickOutcome {
    pub fn skipped_lock(queue_id: Uuid) -> Self {
        Self {
            queue_id,
            lock_acquired: false,
            eligible: 0,
            promoted: 0,
            skipped: 0,
        }
    }

    pub fn noop(queue_id: Uuid) -> Self {
        Self {
            queue_id,
            lock_acquired: true,
            eligible: 0,
            promoted: 0,
            skipped: 0,
        }
    }
}

//! # System Constants
//!
//! Key-space layout for the fast store and operational defaults that bound
//! the promotion scheduler. Every Redis key used by the engine is built
//! here so the layout stays greppable in one place.

use uuid::Uuid;

/// Fast-store key builders, one per queue-scoped structure.
///
/// Layout per queue:
/// - `waitroom:{queue}:waiting` - zset of waiting users, score = join epoch millis
/// - `waitroom:{queue}:admitted` - zset of admitted users, score = admission expiry millis
/// - `waitroom:{queue}:origin` - hash user -> original join score, kept while admitted
/// - `waitroom:{queue}:admitted_serial` - cumulative admission counter
/// - `waitroom:{queue}:promotion_lock` - scheduler mutual-exclusion lease
pub mod keys {
    use super::Uuid;

    pub const NAMESPACE: &str = "waitroom";

    pub fn waiting(queue_id: &Uuid) -> String {
        format!("{NAMESPACE}:{queue_id}:waiting")
    }

    pub fn admitted(queue_id: &Uuid) -> String {
        format!("{NAMESPACE}:{queue_id}:admitted")
    }

    pub fn origin(queue_id: &Uuid) -> String {
        format!("{NAMESPACE}:{queue_id}:origin")
    }

    pub fn admitted_serial(queue_id: &Uuid) -> String {
        format!("{NAMESPACE}:{queue_id}:admitted_serial")
    }

    pub fn promotion_lock(queue_id: &Uuid) -> String {
        format!("{NAMESPACE}:{queue_id}:promotion_lock")
    }
}

/// Operational defaults. Each is overridable through configuration.
pub mod defaults {
    /// Users promoted per scheduler tick, before the capacity clamp.
    pub const PROMOTION_BATCH_SIZE: usize = 100;

    /// Scheduler tick period in milliseconds.
    pub const TICK_INTERVAL_MS: u64 = 1_000;

    /// Bounded wait for the per-queue promotion lock.
    pub const LOCK_WAIT_MS: u64 = 500;

    /// Lease TTL on the promotion lock; a crashed holder frees the queue
    /// after this long.
    pub const LOCK_LEASE_MS: u64 = 5_000;

    /// How long a QueueConfig read stays cached in the coordinator.
    pub const CONFIG_CACHE_TTL_SECS: u64 = 30;
}

/// Queue kinds recognized by the key resolver.
pub mod queue_kind {
    pub const BOOKING: &str = "booking";
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_layout_is_queue_scoped() {
        let queue_id = Uuid::new_v4();
        assert_eq!(
            keys::waiting(&queue_id),
            format!("waitroom:{queue_id}:waiting")
        );
        assert_eq!(
            keys::promotion_lock(&queue_id),
            format!("waitroom:{queue_id}:promotion_lock")
        );
    }

    #[test]
    fn test_keys_are_distinct_per_structure() {
        let queue_id = Uuid::new_v4();
        let all = [
            keys::waiting(&queue_id),
            keys::admitted(&queue_id),
            keys::origin(&queue_id),
            keys::admitted_serial(&queue_id),
            keys::promotion_lock(&queue_id),
        ];
        for (i, a) in all.iter().enumerate() {
            for b in &all[i + 1..] {
                assert_ne!(a, b);
            }
        }
    }
}

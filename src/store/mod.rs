//! # Store Infrastructure
//!
//! The two swappable stores the engine orchestrates, plus the per-queue
//! promotion lock:
//!
//! - [`FastOrderedStore`] - low-latency rank-aware store; the source of
//!   truth for live admission state
//! - [`AuditStore`] - durable store for queue configuration and admission
//!   history; never authoritative for live access decisions
//! - [`PromotionLock`] - leased mutual exclusion for the scheduler

pub mod audit;
pub mod errors;
pub mod fast;
pub mod lock;
pub mod providers;

pub use audit::AuditStore;
pub use errors::{StoreError, StoreResult};
pub use fast::FastOrderedStore;
pub use lock::{InMemoryPromotionLock, LockLease, PromotionLock};
pub use providers::{InMemoryFastStore, PgAuditStore};

#[cfg(feature = "store-redis")]
pub use lock::RedisPromotionLock;
#[cfg(feature = "store-redis")]
pub use providers::RedisFastStore;

//! # Admission Engine
//!
//! The core of the waiting room: ordered waiting, capacity-bounded
//! promotion, and the fail-closed entry check.
//!
//! ## Core Components
//!
//! - [`QueueCoordinator`]: join/status/promote/complete/exit against both
//!   stores; owns the consistency and compensation rules
//! - [`PromotionScheduler`]: lock-serialized batch promotion plus the
//!   expiry sweep
//! - [`AdmissionGate`]: the single read-only check exposed to the
//!   protected resource flow

pub mod coordinator;
pub mod gate;
pub mod scheduler;
pub mod types;

pub use coordinator::{CoordinatorConfig, QueueCoordinator};
pub use gate::{AdmissionGate, AuditQueueKeyResolver, QueueKeyResolver};
pub use scheduler::{PromotionScheduler, SchedulerConfig};
pub use types::{JoinReceipt, QueueStatistics, QueueStatus, TickOutcome};

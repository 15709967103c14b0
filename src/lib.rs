#![allow(clippy::doc_markdown)] // Allow technical terms like PostgreSQL, SQLx in docs
#![allow(clippy::missing_errors_doc)] // Allow public functions without # Errors sections
#![allow(clippy::must_use_candidate)] // Allow methods without must_use when context is clear

//! # Waitroom Core
//!
//! Admission-control queue engine for virtual waiting rooms: users wait in
//! a fair FIFO line and are admitted in controlled batches under a
//! capacity ceiling, each admission carrying a short-lived, revocable
//! token.
//!
//! ## Architecture
//!
//! The engine reconciles two independently failing stores. A fast,
//! ephemeral, rank-aware store (Redis) is the source of truth for "can
//! this user act right now"; a durable audit store (Postgres) keeps the
//! admission history and is never consulted to grant live access. The
//! fast store is always written first and compensated on failure, so the
//! durable side never needs reversing.
//!
//! ## Guarantees
//!
//! - At most `capacity` concurrently admitted users per queue
//! - Strict FIFO promotion by join order
//! - Idempotent promotion and idempotent re-entry after expiry
//! - Fail-closed admission checks when either store is uncertain
//!
//! ## Module Organization
//!
//! - [`admission`] - coordinator, promotion scheduler, and admission gate
//! - [`store`] - fast-store/audit-store traits, providers, promotion lock
//! - [`models`] - durable queue configuration and admission records
//! - [`config`] - environment-driven configuration
//! - [`error`] - structured error taxonomy
//! - [`logging`] - structured tracing initialization
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use waitroom_core::admission::{PromotionScheduler, QueueCoordinator};
//! use waitroom_core::store::{InMemoryFastStore, InMemoryPromotionLock, PgAuditStore};
//!
//! # async fn example(pool: sqlx::PgPool) {
//! let fast = Arc::new(InMemoryFastStore::new());
//! let audit = Arc::new(PgAuditStore::new(pool));
//! let lock = Arc::new(InMemoryPromotionLock::new());
//!
//! let coordinator = Arc::new(QueueCoordinator::new(fast.clone(), audit.clone()));
//! let scheduler = Arc::new(PromotionScheduler::new(
//!     coordinator.clone(),
//!     fast,
//!     audit,
//!     lock,
//! ));
//! let handle = scheduler.start();
//! # let _ = handle;
//! # }
//! ```

pub mod admission;
pub mod config;
pub mod constants;
pub mod error;
pub mod logging;
pub mod models;
pub mod store;

pub use admission::{
    AdmissionGate, AuditQueueKeyResolver, CoordinatorConfig, JoinReceipt, PromotionScheduler,
    QueueCoordinator, QueueKeyResolver, QueueStatistics, QueueStatus, SchedulerConfig,
    TickOutcome,
};
pub use config::WaitroomConfig;
pub use error::{Result, WaitroomError};
pub use models::{AdmissionRecord, AdmissionStatus, NewAdmission, QueueConfig};
pub use store::{AuditStore, FastOrderedStore, PromotionLock, StoreError};

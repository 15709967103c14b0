//! Durable data models backing the audit store.

pub mod admission_record;
pub mod queue_config;

pub use admission_record::{AdmissionRecord, AdmissionStatus, NewAdmission};
pub use queue_config::{NewQueueConfig, QueueConfig};

//! Store provider implementations.

pub mod memory;
pub mod postgres;

#[cfg(feature = "store-redis")]
pub mod redis;

pub use memory::InMemoryFastStore;
pub use postgres::PgAuditStore;

#[cfg(feature = "store-redis")]
pub use self::redis::RedisFastStore;

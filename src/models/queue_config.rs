//! Queue configuration model.
//!
//! One row per (resource, kind) pair. Administered outside the engine;
//! the coordinator and scheduler only ever read it.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

/// Maps to the `waitroom_queues` table. Unique per (resource_id, queue_kind).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct QueueConfig {
    pub queue_id: Uuid,
    /// The protected resource this queue gates (e.g. a performance).
    pub resource_id: Uuid,
    pub queue_kind: String,
    /// Max concurrently admitted users.
    pub capacity: i32,
    /// Minutes an admission token remains valid.
    pub admission_ttl_minutes: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// New queue configuration for creation (without generated fields).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewQueueConfig {
    pub resource_id: Uuid,
    pub queue_kind: String,
    pub capacity: i32,
    pub admission_ttl_minutes: i32,
}

impl QueueConfig {
    pub fn admission_ttl(&self) -> Duration {
        Duration::from_secs(self.admission_ttl_minutes.max(0) as u64 * 60)
    }

    /// Create a new queue configuration
    pub async fn create(
        pool: &PgPool,
        new_queue: NewQueueConfig,
    ) -> Result<QueueConfig, sqlx::Error> {
        let query = r#"
            INSERT INTO waitroom_queues (resource_id, queue_kind, capacity, admission_ttl_minutes)
            VALUES ($1, $2, $3, $4)
            RETURNING queue_id, resource_id, queue_kind, capacity, admission_ttl_minutes,
                      created_at, updated_at
        "#;

        sqlx::query_as::<_, QueueConfig>(query)
            .bind(new_queue.resource_id)
            .bind(&new_queue.queue_kind)
            .bind(new_queue.capacity)
            .bind(new_queue.admission_ttl_minutes)
            .fetch_one(pool)
            .await
    }

    /// Find a queue configuration by ID
    pub async fn find_by_id(
        pool: &PgPool,
        queue_id: Uuid,
    ) -> Result<Option<QueueConfig>, sqlx::Error> {
        let query = r#"
            SELECT queue_id, resource_id, queue_kind, capacity, admission_ttl_minutes,
                   created_at, updated_at
            FROM waitroom_queues
            WHERE queue_id = $1
        "#;

        sqlx::query_as::<_, QueueConfig>(query)
            .bind(queue_id)
            .fetch_optional(pool)
            .await
    }

    /// Find the queue gating a resource, by kind
    pub async fn find_by_resource(
        pool: &PgPool,
        resource_id: Uuid,
        queue_kind: &str,
    ) -> Result<Option<QueueConfig>, sqlx::Error> {
        let query = r#"
            SELECT queue_id, resource_id, queue_kind, capacity, admission_ttl_minutes,
                   created_at, updated_at
            FROM waitroom_queues
            WHERE resource_id = $1 AND queue_kind = $2
        "#;

        sqlx::query_as::<_, QueueConfig>(query)
            .bind(resource_id)
            .bind(queue_kind)
            .fetch_optional(pool)
            .await
    }

    /// List all queue configurations
    pub async fn list_all(pool: &PgPool) -> Result<Vec<QueueConfig>, sqlx::Error> {
        let query = r#"
            SELECT queue_id, resource_id, queue_kind, capacity, admission_ttl_minutes,
                   created_at, updated_at
            FROM waitroom_queues
            ORDER BY created_at
        "#;

        sqlx::query_as::<_, QueueConfig>(query).fetch_all(pool).await
    }

    /// Update capacity and/or admission TTL
    pub async fn update(
        pool: &PgPool,
        queue_id: Uuid,
        capacity: Option<i32>,
        admission_ttl_minutes: Option<i32>,
    ) -> Result<QueueConfig, sqlx::Error> {
        let query = r#"
            UPDATE waitroom_queues
            SET capacity = COALESCE($2, capacity),
                admission_ttl_minutes = COALESCE($3, admission_ttl_minutes),
                updated_at = NOW()
            WHERE queue_id = $1
            RETURNING queue_id, resource_id, queue_kind, capacity, admission_ttl_minutes,
                      created_at, updated_at
        "#;

        sqlx::query_as::<_, QueueConfig>(query)
            .bind(queue_id)
            .bind(capacity)
            .bind(admission_ttl_minutes)
            .fetch_one(pool)
            .await
    }

    /// Delete a queue configuration
    pub async fn delete(pool: &PgPool, queue_id: Uuid) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM waitroom_queues WHERE queue_id = $1")
            .bind(queue_id)
            .execute(pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_admission_ttl_conversion() {
        let config = QueueConfig {
            queue_id: Uuid::new_v4(),
            resource_id: Uuid::new_v4(),
            queue_kind: "booking".to_string(),
            capacity: 100,
            admission_ttl_minutes: 10,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        assert_eq!(config.admission_ttl(), Duration::from_secs(600));
    }

    #[test]
    fn test_negative_ttl_clamps_to_zero() {
        let config = QueueConfig {
            queue_id: Uuid::new_v4(),
            resource_id: Uuid::new_v4(),
            queue_kind: "booking".to_string(),
            capacity: 100,
            admission_ttl_minutes: -5,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        assert_eq!(config.admission_ttl(), Duration::ZERO);
    }
}

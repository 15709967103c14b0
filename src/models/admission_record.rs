//! Admission record model.
//!
//! The durable projection of "this user was admitted". Written only after
//! the fast store has confirmed the transition, never before, so the fast
//! store stays authoritative for live access decisions. Users who never
//! leave the waiting line get no row here.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

/// Lifecycle states of an admission.
///
/// WAITING is deliberately absent: waiting membership lives only in the
/// fast store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AdmissionStatus {
    Admitted,
    Completed,
    Expired,
}

impl AdmissionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AdmissionStatus::Admitted => "admitted",
            AdmissionStatus::Completed => "completed",
            AdmissionStatus::Expired => "expired",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "admitted" => Some(AdmissionStatus::Admitted),
            "completed" => Some(AdmissionStatus::Completed),
            "expired" => Some(AdmissionStatus::Expired),
            _ => None,
        }
    }

    /// Whether this status blocks the user from re-joining the queue.
    /// EXPIRED does not: abandonment must allow idempotent re-entry.
    pub fn blocks_rejoin(&self) -> bool {
        matches!(self, AdmissionStatus::Admitted | AdmissionStatus::Completed)
    }
}

impl std::fmt::Display for AdmissionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Maps to the `waitroom_admissions` table. Unique per (queue_id, user_id).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdmissionRecord {
    pub admission_id: Uuid,
    pub queue_id: Uuid,
    pub user_id: Uuid,
    pub status: AdmissionStatus,
    /// Opaque proof of the admitted slot; re-issued on every promotion.
    pub admission_token: Uuid,
    pub joined_at: DateTime<Utc>,
    pub admitted_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl AdmissionRecord {
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }
}

/// Fields for the promotion-time upsert.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewAdmission {
    pub queue_id: Uuid,
    pub user_id: Uuid,
    pub admission_token: Uuid,
    pub joined_at: DateTime<Utc>,
    pub admitted_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

/// Internal struct for SQL query results
#[derive(FromRow)]
struct AdmissionRecordRow {
    admission_id: Uuid,
    queue_id: Uuid,
    user_id: Uuid,
    status: String,
    admission_token: Uuid,
    joined_at: DateTime<Utc>,
    admitted_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
    completed_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl AdmissionRecordRow {
    fn into_record(self) -> Result<AdmissionRecord, sqlx::Error> {
        let status = AdmissionStatus::parse(&self.status).ok_or_else(|| {
            sqlx::Error::Decode(
                format!("unknown admission status '{}'", self.status).into(),
            )
        })?;
        Ok(AdmissionRecord {
            admission_id: self.admission_id,
            queue_id: self.queue_id,
            user_id: self.user_id,
            status,
            admission_token: self.admission_token,
            joined_at: self.joined_at,
            admitted_at: self.admitted_at,
            expires_at: self.expires_at,
            completed_at: self.completed_at,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

impl AdmissionRecord {
    /// Upsert an admission into the ADMITTED state with a fresh token.
    ///
    /// A repeat promotion of the same user overwrites token and expiry
    /// rather than creating a second row; the (queue_id, user_id) unique
    /// constraint is the conflict target.
    pub async fn upsert_admitted(
        pool: &PgPool,
        admission: &NewAdmission,
    ) -> Result<AdmissionRecord, sqlx::Error> {
        let query = r#"
            INSERT INTO waitroom_admissions
                (queue_id, user_id, status, admission_token, joined_at, admitted_at, expires_at)
            VALUES ($1, $2, 'admitted', $3, $4, $5, $6)
            ON CONFLICT (queue_id, user_id) DO UPDATE
            SET status = 'admitted',
                admission_token = EXCLUDED.admission_token,
                joined_at = EXCLUDED.joined_at,
                admitted_at = EXCLUDED.admitted_at,
                expires_at = EXCLUDED.expires_at,
                completed_at = NULL,
                updated_at = NOW()
            RETURNING admission_id, queue_id, user_id, status, admission_token,
                      joined_at, admitted_at, expires_at, completed_at, created_at, updated_at
        "#;

        let row = sqlx::query_as::<_, AdmissionRecordRow>(query)
            .bind(admission.queue_id)
            .bind(admission.user_id)
            .bind(admission.admission_token)
            .bind(admission.joined_at)
            .bind(admission.admitted_at)
            .bind(admission.expires_at)
            .fetch_one(pool)
            .await?;

        row.into_record()
    }

    /// Find the admission record for a (queue, user) pair
    pub async fn find_by_queue_and_user(
        pool: &PgPool,
        queue_id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<AdmissionRecord>, sqlx::Error> {
        let query = r#"
            SELECT admission_id, queue_id, user_id, status, admission_token,
                   joined_at, admitted_at, expires_at, completed_at, created_at, updated_at
            FROM waitroom_admissions
            WHERE queue_id = $1 AND user_id = $2
        "#;

        let row = sqlx::query_as::<_, AdmissionRecordRow>(query)
            .bind(queue_id)
            .bind(user_id)
            .fetch_optional(pool)
            .await?;

        row.map(AdmissionRecordRow::into_record).transpose()
    }

    /// Transition ADMITTED -> COMPLETED. Returns false when the record is
    /// not currently ADMITTED (already completed, expired, or absent).
    pub async fn mark_completed(
        pool: &PgPool,
        queue_id: Uuid,
        user_id: Uuid,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            r#"
            UPDATE waitroom_admissions
            SET status = 'completed', completed_at = NOW(), updated_at = NOW()
            WHERE queue_id = $1 AND user_id = $2 AND status = 'admitted'
        "#,
        )
        .bind(queue_id)
        .bind(user_id)
        .execute(pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Transition ADMITTED -> EXPIRED. Returns false when the record is
    /// not currently ADMITTED.
    pub async fn mark_expired(
        pool: &PgPool,
        queue_id: Uuid,
        user_id: Uuid,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            r#"
            UPDATE waitroom_admissions
            SET status = 'expired', updated_at = NOW()
            WHERE queue_id = $1 AND user_id = $2 AND status = 'admitted'
        "#,
        )
        .bind(queue_id)
        .bind(user_id)
        .execute(pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Bulk-demote every ADMITTED record whose expiry has lapsed.
    /// Used by the maintenance sweep.
    pub async fn expire_stale(
        pool: &PgPool,
        queue_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            r#"
            UPDATE waitroom_admissions
            SET status = 'expired', updated_at = NOW()
            WHERE queue_id = $1 AND status = 'admitted' AND expires_at <= $2
        "#,
        )
        .bind(queue_id)
        .bind(now)
        .execute(pool)
        .await?;

        Ok(result.rows_affected())
    }
}

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqliteExecutor, SqlitePool, Type};
use strum_macros::{Display, EnumString};

use super::RecordType;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize, EnumString, Display)]
#[sqlx(type_name = "TEXT", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum DeleteRequestStatus {
    Pending,
    Approved,
    Rejected,
}

/// A member's request that a record's author delete it
#[derive(Debug, Clone, FromRow, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteRequest {
    pub id: i64,
    /// Cleared when the record is deleted
    pub record_id: Option<i64>,
    pub requester_id: i64,
    pub owner_id: i64,
    pub status: DeleteRequestStatus,
    pub reason: String,
    #[serde(serialize_with = "super::timestamp::serialize")]
    pub created_at: i64,
    #[serde(serialize_with = "super::timestamp::serialize_option")]
    pub resolved_at: Option<i64>,
}

/// Pending request as shown to the record's author
#[derive(Debug, Clone, FromRow, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingDeleteRequest {
    pub id: i64,
    pub record_id: i64,
    pub family_id: i64,
    pub requester_id: i64,
    pub requester_name: String,
    pub reason: String,
    pub amount: i64,
    #[sqlx(rename = "type")]
    #[serde(rename = "type")]
    pub record_type: RecordType,
    pub related_person: String,
    pub event_date: NaiveDate,
    #[serde(serialize_with = "super::timestamp::serialize")]
    pub created_at: i64,
}

impl DeleteRequest {
    pub async fn create<'e, E>(
        executor: E,
        record_id: i64,
        requester_id: i64,
        owner_id: i64,
        reason: &str,
        now: i64,
    ) -> Result<DeleteRequest, sqlx::Error>
    where
        E: SqliteExecutor<'e>,
    {
        sqlx::query_as::<_, DeleteRequest>(
            r#"INSERT INTO delete_requests (record_id, requester_id, owner_id, status, reason, created_at)
               VALUES (?, ?, ?, 'pending', ?, ?)
               RETURNING *"#,
        )
        .bind(record_id)
        .bind(requester_id)
        .bind(owner_id)
        .bind(reason)
        .bind(now)
        .fetch_one(executor)
        .await
    }

    pub async fn find_by_id(pool: &SqlitePool, id: i64) -> Result<Option<DeleteRequest>, sqlx::Error> {
        sqlx::query_as::<_, DeleteRequest>("SELECT * FROM delete_requests WHERE id = ?")
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    pub async fn has_pending(pool: &SqlitePool, record_id: i64, requester_id: i64) -> Result<bool, sqlx::Error> {
        let count: i64 = sqlx::query_scalar(
            r#"SELECT COUNT(*) FROM delete_requests
               WHERE record_id = ? AND requester_id = ? AND status = 'pending'"#,
        )
        .bind(record_id)
        .bind(requester_id)
        .fetch_one(pool)
        .await?;
        Ok(count > 0)
    }

    pub async fn list_pending_for_owner(
        pool: &SqlitePool,
        owner_id: i64,
    ) -> Result<Vec<PendingDeleteRequest>, sqlx::Error> {
        sqlx::query_as::<_, PendingDeleteRequest>(
            r#"SELECT d.id, d.record_id, r.family_id, d.requester_id,
                      COALESCE(NULLIF(u.nickname, ''), u.username) AS requester_name,
                      d.reason, r.amount, r.type, r.related_person, r.event_date, d.created_at
               FROM delete_requests d
               JOIN records r ON r.id = d.record_id
               JOIN users u ON u.id = d.requester_id
               WHERE d.owner_id = ? AND d.status = 'pending'
               ORDER BY d.created_at DESC, d.id DESC"#,
        )
        .bind(owner_id)
        .fetch_all(pool)
        .await
    }

    /// Resolve one pending request; false when it was already resolved
    pub async fn resolve<'e, E>(
        executor: E,
        id: i64,
        status: DeleteRequestStatus,
        now: i64,
    ) -> Result<bool, sqlx::Error>
    where
        E: SqliteExecutor<'e>,
    {
        let result = sqlx::query(
            "UPDATE delete_requests SET status = ?, resolved_at = ? WHERE id = ? AND status = 'pending'",
        )
        .bind(status)
        .bind(now)
        .bind(id)
        .execute(executor)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Requesters of other pending requests on the same record, resolved as approved
    pub async fn approve_all_for_record<'e, E>(
        executor: E,
        record_id: i64,
        now: i64,
    ) -> Result<Vec<i64>, sqlx::Error>
    where
        E: SqliteExecutor<'e>,
    {
        sqlx::query_scalar(
            r#"UPDATE delete_requests SET status = 'approved', resolved_at = ?
               WHERE record_id = ? AND status = 'pending'
               RETURNING requester_id"#,
        )
        .bind(now)
        .bind(record_id)
        .fetch_all(executor)
        .await
    }
}

use serde::{Deserialize, Serialize};
use sqlx::{FromRow, QueryBuilder, Sqlite, SqliteExecutor, SqlitePool, Type};
use strum_macros::{Display, EnumString};

/// Fixed classification bucket for in-app messages
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize, EnumString, Display)]
#[sqlx(type_name = "TEXT", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum NotificationCategory {
    System,
    Family,
    Records,
    DeleteRequest,
}

#[derive(Debug, Clone, FromRow, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub id: i64,
    pub user_id: i64,
    pub category: NotificationCategory,
    pub title: String,
    pub content: String,
    pub related_record_id: Option<i64>,
    pub is_read: bool,
    #[serde(serialize_with = "super::timestamp::serialize")]
    pub created_at: i64,
}

/// Unread notifications per category
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct UnreadCounts {
    pub total: i64,
    pub system: i64,
    pub family: i64,
    pub records: i64,
    pub delete_request: i64,
}

impl UnreadCounts {
    fn add(&mut self, category: NotificationCategory, count: i64) {
        match category {
            NotificationCategory::System => self.system += count,
            NotificationCategory::Family => self.family += count,
            NotificationCategory::Records => self.records += count,
            NotificationCategory::DeleteRequest => self.delete_request += count,
        }
        self.total += count;
    }
}

impl Notification {
    pub async fn create<'e, E>(
        executor: E,
        user_id: i64,
        category: NotificationCategory,
        title: &str,
        content: &str,
        related_record_id: Option<i64>,
        now: i64,
    ) -> Result<i64, sqlx::Error>
    where
        E: SqliteExecutor<'e>,
    {
        sqlx::query_scalar(
            r#"INSERT INTO notifications (user_id, category, title, content, related_record_id, is_read, created_at)
               VALUES (?, ?, ?, ?, ?, 0, ?)
               RETURNING id"#,
        )
        .bind(user_id)
        .bind(category)
        .bind(title)
        .bind(content)
        .bind(related_record_id)
        .bind(now)
        .fetch_one(executor)
        .await
    }

    /// Send a system notification to every user; returns how many were created
    pub async fn broadcast(pool: &SqlitePool, title: &str, content: &str, now: i64) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            r#"INSERT INTO notifications (user_id, category, title, content, related_record_id, is_read, created_at)
               SELECT id, 'system', ?, ?, NULL, 0, ? FROM users"#,
        )
        .bind(title)
        .bind(content)
        .bind(now)
        .execute(pool)
        .await?;
        Ok(result.rows_affected())
    }

    /// Newest first, optionally narrowed to one category or to unread ones
    pub async fn list(
        pool: &SqlitePool,
        user_id: i64,
        category: Option<NotificationCategory>,
        unread_only: bool,
        limit: i64,
    ) -> Result<Vec<Notification>, sqlx::Error> {
        let mut query = QueryBuilder::<Sqlite>::new("SELECT * FROM notifications WHERE user_id = ");
        query.push_bind(user_id);
        if let Some(category) = category {
            query.push(" AND category = ").push_bind(category);
        }
        if unread_only {
            query.push(" AND is_read = 0");
        }
        query
            .push(" ORDER BY created_at DESC, id DESC LIMIT ")
            .push_bind(limit);
        query.build_query_as::<Notification>().fetch_all(pool).await
    }

    pub async fn unread_counts(pool: &SqlitePool, user_id: i64) -> Result<UnreadCounts, sqlx::Error> {
        let rows: Vec<(NotificationCategory, i64)> = sqlx::query_as(
            r#"SELECT category, COUNT(*) FROM notifications
               WHERE user_id = ? AND is_read = 0
               GROUP BY category"#,
        )
        .bind(user_id)
        .fetch_all(pool)
        .await?;

        let mut counts = UnreadCounts::default();
        for (category, count) in rows {
            counts.add(category, count);
        }
        Ok(counts)
    }

    /// Returns false when the notification does not exist or belongs to someone else
    pub async fn mark_read(pool: &SqlitePool, id: i64, user_id: i64) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("UPDATE notifications SET is_read = 1 WHERE id = ? AND user_id = ?")
            .bind(id)
            .bind(user_id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Mark every unread notification (of one category, if given) as read
    pub async fn mark_all_read(
        pool: &SqlitePool,
        user_id: i64,
        category: Option<NotificationCategory>,
    ) -> Result<u64, sqlx::Error> {
        let mut query =
            QueryBuilder::<Sqlite>::new("UPDATE notifications SET is_read = 1 WHERE is_read = 0 AND user_id = ");
        query.push_bind(user_id);
        if let Some(category) = category {
            query.push(" AND category = ").push_bind(category);
        }
        let result = query.build().execute(pool).await?;
        Ok(result.rows_affected())
    }

    pub async fn delete(pool: &SqlitePool, id: i64, user_id: i64) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM notifications WHERE id = ? AND user_id = ?")
            .bind(id)
            .bind(user_id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqliteExecutor, SqlitePool, Type};
use strum_macros::{Display, EnumString};

/// Role of a user inside one family
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize, EnumString, Display)]
#[sqlx(type_name = "TEXT", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum MemberRole {
    Owner,
    Member,
}

/// Row of the `families` table
#[derive(Debug, Clone, FromRow, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Family {
    pub id: i64,
    pub name: String,
    pub invite_code: String,
    pub created_by: i64,
    #[serde(serialize_with = "super::timestamp::serialize")]
    pub created_at: i64,
}

/// A family as seen from one of its members
#[derive(Debug, Clone, FromRow, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FamilySummary {
    pub id: i64,
    pub name: String,
    pub invite_code: String,
    pub role: MemberRole,
    pub member_count: i64,
    pub record_count: i64,
    #[serde(serialize_with = "super::timestamp::serialize")]
    pub created_at: i64,
}

/// Member listing entry
#[derive(Debug, Clone, FromRow, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FamilyMember {
    pub user_id: i64,
    pub username: String,
    pub nickname: String,
    pub avatar: String,
    pub role: MemberRole,
    #[serde(serialize_with = "super::timestamp::serialize")]
    pub joined_at: i64,
}

impl Family {
    pub async fn create<'e, E>(
        executor: E,
        name: &str,
        invite_code: &str,
        created_by: i64,
        now: i64,
    ) -> Result<Family, sqlx::Error>
    where
        E: SqliteExecutor<'e>,
    {
        sqlx::query_as::<_, Family>(
            r#"INSERT INTO families (name, invite_code, created_by, created_at)
               VALUES (?, ?, ?, ?)
               RETURNING *"#,
        )
        .bind(name)
        .bind(invite_code)
        .bind(created_by)
        .bind(now)
        .fetch_one(executor)
        .await
    }

    pub async fn find_by_id(pool: &SqlitePool, id: i64) -> Result<Option<Family>, sqlx::Error> {
        sqlx::query_as::<_, Family>("SELECT * FROM families WHERE id = ?")
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    pub async fn find_by_invite_code(
        pool: &SqlitePool,
        invite_code: &str,
    ) -> Result<Option<Family>, sqlx::Error> {
        sqlx::query_as::<_, Family>("SELECT * FROM families WHERE invite_code = ?")
            .bind(invite_code)
            .fetch_optional(pool)
            .await
    }

    pub async fn invite_code_exists(pool: &SqlitePool, invite_code: &str) -> Result<bool, sqlx::Error> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM families WHERE invite_code = ?")
            .bind(invite_code)
            .fetch_one(pool)
            .await?;
        Ok(count > 0)
    }

    pub async fn list_for_user(
        pool: &SqlitePool,
        user_id: i64,
    ) -> Result<Vec<FamilySummary>, sqlx::Error> {
        sqlx::query_as::<_, FamilySummary>(
            r#"SELECT f.id, f.name, f.invite_code, m.role, f.created_at,
                      (SELECT COUNT(*) FROM family_members fm WHERE fm.family_id = f.id) AS member_count,
                      (SELECT COUNT(*) FROM records r WHERE r.family_id = f.id) AS record_count
               FROM families f
               JOIN family_members m ON m.family_id = f.id
               WHERE m.user_id = ?
               ORDER BY f.created_at, f.id"#,
        )
        .bind(user_id)
        .fetch_all(pool)
        .await
    }

    /// The user's role in the family, or `None` when not a member
    pub async fn role_of<'e, E>(
        executor: E,
        family_id: i64,
        user_id: i64,
    ) -> Result<Option<MemberRole>, sqlx::Error>
    where
        E: SqliteExecutor<'e>,
    {
        sqlx::query_scalar::<_, MemberRole>(
            "SELECT role FROM family_members WHERE family_id = ? AND user_id = ?",
        )
        .bind(family_id)
        .bind(user_id)
        .fetch_optional(executor)
        .await
    }

    pub async fn add_member<'e, E>(
        executor: E,
        family_id: i64,
        user_id: i64,
        role: MemberRole,
        now: i64,
    ) -> Result<(), sqlx::Error>
    where
        E: SqliteExecutor<'e>,
    {
        sqlx::query("INSERT INTO family_members (family_id, user_id, role, joined_at) VALUES (?, ?, ?, ?)")
            .bind(family_id)
            .bind(user_id)
            .bind(role)
            .bind(now)
            .execute(executor)
            .await?;
        Ok(())
    }

    pub async fn remove_member<'e, E>(executor: E, family_id: i64, user_id: i64) -> Result<bool, sqlx::Error>
    where
        E: SqliteExecutor<'e>,
    {
        let result = sqlx::query("DELETE FROM family_members WHERE family_id = ? AND user_id = ?")
            .bind(family_id)
            .bind(user_id)
            .execute(executor)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn members(pool: &SqlitePool, family_id: i64) -> Result<Vec<FamilyMember>, sqlx::Error> {
        sqlx::query_as::<_, FamilyMember>(
            r#"SELECT u.id AS user_id, u.username, u.nickname, u.avatar, m.role, m.joined_at
               FROM family_members m
               JOIN users u ON u.id = m.user_id
               WHERE m.family_id = ?
               ORDER BY CASE m.role WHEN 'owner' THEN 0 ELSE 1 END, m.joined_at, u.id"#,
        )
        .bind(family_id)
        .fetch_all(pool)
        .await
    }

    pub async fn member_ids<'e, E>(executor: E, family_id: i64) -> Result<Vec<i64>, sqlx::Error>
    where
        E: SqliteExecutor<'e>,
    {
        sqlx::query_scalar("SELECT user_id FROM family_members WHERE family_id = ? ORDER BY user_id")
            .bind(family_id)
            .fetch_all(executor)
            .await
    }

    /// Hand the family to another member; the previous owner stays as a plain member
    pub async fn transfer_ownership(
        conn: &mut sqlx::SqliteConnection,
        family_id: i64,
        new_owner_id: i64,
    ) -> Result<(), sqlx::Error> {
        sqlx::query("UPDATE family_members SET role = 'member' WHERE family_id = ? AND role = 'owner'")
            .bind(family_id)
            .execute(&mut *conn)
            .await?;
        sqlx::query("UPDATE family_members SET role = 'owner' WHERE family_id = ? AND user_id = ?")
            .bind(family_id)
            .bind(new_owner_id)
            .execute(&mut *conn)
            .await?;
        sqlx::query("UPDATE families SET created_by = ? WHERE id = ?")
            .bind(new_owner_id)
            .bind(family_id)
            .execute(&mut *conn)
            .await?;
        Ok(())
    }

    pub async fn owned_by<'e, E>(executor: E, user_id: i64) -> Result<Vec<i64>, sqlx::Error>
    where
        E: SqliteExecutor<'e>,
    {
        sqlx::query_scalar("SELECT id FROM families WHERE created_by = ? ORDER BY id")
            .bind(user_id)
            .fetch_all(executor)
            .await
    }

    /// Longest-standing member other than `excluding`, next in line to own the family
    pub async fn successor<'e, E>(
        executor: E,
        family_id: i64,
        excluding: i64,
    ) -> Result<Option<i64>, sqlx::Error>
    where
        E: SqliteExecutor<'e>,
    {
        sqlx::query_scalar(
            r#"SELECT user_id FROM family_members
               WHERE family_id = ? AND user_id != ?
               ORDER BY joined_at, user_id
               LIMIT 1"#,
        )
        .bind(family_id)
        .bind(excluding)
        .fetch_optional(executor)
        .await
    }

    /// Members and records go with the family through `ON DELETE CASCADE`
    pub async fn delete<'e, E>(executor: E, family_id: i64) -> Result<bool, sqlx::Error>
    where
        E: SqliteExecutor<'e>,
    {
        let result = sqlx::query("DELETE FROM families WHERE id = ?")
            .bind(family_id)
            .execute(executor)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

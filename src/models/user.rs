use serde::Serialize;
use sqlx::{FromRow, SqliteExecutor, SqlitePool};

use crate::constants::{USERNAME_MAX_CHARS, USERNAME_MIN_CHARS};

/// Row of the `users` table
#[derive(Debug, Clone, FromRow)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub password_hash: String,
    pub nickname: String,
    pub bio: String,
    pub avatar: String,
    pub security_question: String,
    pub security_answer_hash: String,
    pub is_admin: bool,
    /// When the user was created (Unix timestamp)
    pub created_at: i64,
}

/// User model for API responses (never carries hashes)
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub id: i64,
    pub username: String,
    pub nickname: String,
    pub bio: String,
    pub avatar: String,
    pub security_question: String,
    pub is_admin: bool,
    #[serde(serialize_with = "super::timestamp::serialize")]
    pub created_at: i64,
}

/// Fields required to insert a user
#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub password_hash: String,
    pub nickname: String,
    pub security_question: String,
    pub security_answer_hash: String,
}

impl User {
    /// Usernames are 3-32 characters of ASCII letters, digits, `_` or CJK ideographs
    pub fn validate_username(username: &str) -> bool {
        let len = username.chars().count();
        (USERNAME_MIN_CHARS..=USERNAME_MAX_CHARS).contains(&len)
            && username
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || ('\u{4e00}'..='\u{9fff}').contains(&c))
    }

    pub fn profile(&self) -> UserProfile {
        UserProfile {
            id: self.id,
            username: self.username.clone(),
            nickname: self.nickname.clone(),
            bio: self.bio.clone(),
            avatar: self.avatar.clone(),
            security_question: self.security_question.clone(),
            is_admin: self.is_admin,
            created_at: self.created_at,
        }
    }

    pub async fn find_by_id<'e, E>(executor: E, id: i64) -> Result<Option<User>, sqlx::Error>
    where
        E: SqliteExecutor<'e>,
    {
        sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = ?")
            .bind(id)
            .fetch_optional(executor)
            .await
    }

    pub async fn find_by_username(
        pool: &SqlitePool,
        username: &str,
    ) -> Result<Option<User>, sqlx::Error> {
        sqlx::query_as::<_, User>("SELECT * FROM users WHERE username = ?")
            .bind(username)
            .fetch_optional(pool)
            .await
    }

    /// Insert a user; the very first account becomes an administrator
    pub async fn create(pool: &SqlitePool, new_user: &NewUser, now: i64) -> Result<User, sqlx::Error> {
        sqlx::query_as::<_, User>(
            r#"INSERT INTO users (username, password_hash, nickname, bio, avatar,
                                  security_question, security_answer_hash, is_admin, created_at)
               VALUES (?, ?, ?, '', '', ?, ?, (SELECT COUNT(*) = 0 FROM users), ?)
               RETURNING *"#,
        )
        .bind(&new_user.username)
        .bind(&new_user.password_hash)
        .bind(&new_user.nickname)
        .bind(&new_user.security_question)
        .bind(&new_user.security_answer_hash)
        .bind(now)
        .fetch_one(pool)
        .await
    }

    pub async fn update_profile(
        pool: &SqlitePool,
        id: i64,
        nickname: &str,
        bio: &str,
        avatar: &str,
    ) -> Result<User, sqlx::Error> {
        sqlx::query_as::<_, User>(
            "UPDATE users SET nickname = ?, bio = ?, avatar = ? WHERE id = ? RETURNING *",
        )
        .bind(nickname)
        .bind(bio)
        .bind(avatar)
        .bind(id)
        .fetch_one(pool)
        .await
    }

    pub async fn update_password(
        pool: &SqlitePool,
        id: i64,
        password_hash: &str,
    ) -> Result<(), sqlx::Error> {
        sqlx::query("UPDATE users SET password_hash = ? WHERE id = ?")
            .bind(password_hash)
            .bind(id)
            .execute(pool)
            .await?;
        Ok(())
    }

    pub async fn update_security_question(
        pool: &SqlitePool,
        id: i64,
        question: &str,
        answer_hash: &str,
    ) -> Result<(), sqlx::Error> {
        sqlx::query("UPDATE users SET security_question = ?, security_answer_hash = ? WHERE id = ?")
            .bind(question)
            .bind(answer_hash)
            .bind(id)
            .execute(pool)
            .await?;
        Ok(())
    }

    pub async fn set_admin(pool: &SqlitePool, id: i64, is_admin: bool) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("UPDATE users SET is_admin = ? WHERE id = ?")
            .bind(is_admin)
            .bind(id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn list_all(pool: &SqlitePool) -> Result<Vec<User>, sqlx::Error> {
        sqlx::query_as::<_, User>("SELECT * FROM users ORDER BY id")
            .fetch_all(pool)
            .await
    }

    pub async fn delete<'e, E>(executor: E, id: i64) -> Result<bool, sqlx::Error>
    where
        E: SqliteExecutor<'e>,
    {
        let result = sqlx::query("DELETE FROM users WHERE id = ?")
            .bind(id)
            .execute(executor)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_username() {
        assert!(User::validate_username("alice"));
        assert!(User::validate_username("bob_2024"));
        assert!(User::validate_username("张小明"));

        // Too short
        assert!(!User::validate_username("ab"));

        // Too long
        assert!(!User::validate_username(&"a".repeat(33)));

        // Invalid characters
        assert!(!User::validate_username("alice smith"));
        assert!(!User::validate_username("alice@home"));
        assert!(!User::validate_username("🎁gift"));
    }

    #[test]
    fn test_profile_hides_hashes() {
        let user = User {
            id: 7,
            username: "alice".to_string(),
            password_hash: "$argon2id$secret".to_string(),
            nickname: "Alice".to_string(),
            bio: String::new(),
            avatar: String::new(),
            security_question: "小学名字?".to_string(),
            security_answer_hash: "$argon2id$answer".to_string(),
            is_admin: false,
            created_at: 1733788800,
        };

        let json = serde_json::to_value(user.profile()).unwrap();
        assert_eq!(json["username"], "alice");
        assert_eq!(json["isAdmin"], false);
        assert_eq!(json["createdAt"], "2024-12-10T00:00:00+00:00");
        assert!(json.get("passwordHash").is_none());
        assert!(!json.to_string().contains("argon2"));
    }
}

//! Offline maintenance run from the command line against the ledger file.

use anyhow::Context;
use regex::{Captures, Regex};
use serde::Serialize;
use serde_json::{json, Value};
use sqlx::SqlitePool;

use crate::models::{Family, Notification, User};

/// Rows removed by [`cleanup_orphans`]
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct CleanupReport {
    pub family_members: u64,
    pub records: u64,
    pub notifications: u64,
    pub delete_requests: u64,
}

impl CleanupReport {
    pub fn total(&self) -> u64 {
        self.family_members + self.records + self.notifications + self.delete_requests
    }
}

/// Delete rows whose parents are gone
///
/// Covers memberships of missing users or families, records of missing
/// families, notifications of missing users, and delete requests that can no
/// longer be acted on.
pub async fn cleanup_orphans(pool: &SqlitePool) -> anyhow::Result<CleanupReport> {
    let mut tx = pool.begin().await?;

    let family_members = sqlx::query(
        r#"DELETE FROM family_members
           WHERE user_id NOT IN (SELECT id FROM users)
              OR family_id NOT IN (SELECT id FROM families)"#,
    )
    .execute(&mut *tx)
    .await?
    .rows_affected();

    let records = sqlx::query("DELETE FROM records WHERE family_id NOT IN (SELECT id FROM families)")
        .execute(&mut *tx)
        .await?
        .rows_affected();

    let notifications =
        sqlx::query("DELETE FROM notifications WHERE user_id NOT IN (SELECT id FROM users)")
            .execute(&mut *tx)
            .await?
            .rows_affected();

    // Resolved requests keep their history even after the record is gone
    let delete_requests = sqlx::query(
        r#"DELETE FROM delete_requests
           WHERE requester_id NOT IN (SELECT id FROM users)
              OR owner_id NOT IN (SELECT id FROM users)
              OR (status = 'pending'
                  AND (record_id IS NULL OR record_id NOT IN (SELECT id FROM records)))"#,
    )
    .execute(&mut *tx)
    .await?
    .rows_affected();

    tx.commit().await?;

    let report = CleanupReport {
        family_members,
        records,
        notifications,
        delete_requests,
    };
    tracing::info!("Orphan cleanup removed {} rows: {:?}", report.total(), report);
    Ok(report)
}

/// Rewrites money amounts in notification text into the `¥100` form
pub struct ContentNormalizer {
    yuan_suffix: Regex,
    currency_prefix: Regex,
    whitespace: Regex,
}

/// `100.00` -> `100`, `88.50` -> `88.5`, `1,000` -> `1000`
fn canonical_amount(raw: &str) -> String {
    let digits = raw.replace(',', "");
    if !digits.contains('.') {
        return digits;
    }
    match digits.trim_end_matches('0').trim_end_matches('.') {
        "" => "0".to_string(),
        trimmed => trimmed.to_string(),
    }
}

fn yen(caps: &Captures<'_>) -> String {
    format!("¥{}", canonical_amount(&caps[1]))
}

impl ContentNormalizer {
    pub fn new() -> Result<Self, regex::Error> {
        Ok(Self {
            yuan_suffix: Regex::new(r"(?:[￥¥]\s*)?(\d[\d,]*(?:\.\d+)?)\s*元")?,
            currency_prefix: Regex::new(r"[￥¥]\s*(\d[\d,]*(?:\.\d+)?)")?,
            whitespace: Regex::new(r"\s+")?,
        })
    }

    pub fn normalize(&self, content: &str) -> String {
        let text = self.yuan_suffix.replace_all(content, yen);
        let text = self.currency_prefix.replace_all(&text, yen);
        self.whitespace.replace_all(&text, " ").trim().to_string()
    }
}

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct NormalizeReport {
    pub scanned: u64,
    pub changed: u64,
    pub dry_run: bool,
}

/// Normalize the content of every notification; with `dry_run` nothing is written
pub async fn normalize_notifications(pool: &SqlitePool, dry_run: bool) -> anyhow::Result<NormalizeReport> {
    let normalizer = ContentNormalizer::new().context("invalid normalization pattern")?;
    let mut tx = pool.begin().await?;

    let rows: Vec<(i64, String)> = sqlx::query_as("SELECT id, content FROM notifications ORDER BY id")
        .fetch_all(&mut *tx)
        .await?;

    let mut report = NormalizeReport {
        dry_run,
        ..Default::default()
    };
    for (id, content) in rows {
        report.scanned += 1;
        let normalized = normalizer.normalize(&content);
        if normalized == content {
            continue;
        }
        report.changed += 1;
        tracing::debug!("Notification {}: {:?} -> {:?}", id, content, normalized);

        if !dry_run {
            sqlx::query("UPDATE notifications SET content = ? WHERE id = ?")
                .bind(&normalized)
                .bind(id)
                .execute(&mut *tx)
                .await?;
        }
    }

    if dry_run {
        tx.rollback().await?;
    } else {
        tx.commit().await?;
    }

    tracing::info!(
        "Normalized {} of {} notifications (dry run: {})",
        report.changed,
        report.scanned,
        dry_run
    );
    Ok(report)
}

/// Debug snapshot of one account: profile, families and notification counts
pub async fn dump_user(pool: &SqlitePool, username: &str) -> anyhow::Result<Option<Value>> {
    let Some(user) = User::find_by_username(pool, username).await? else {
        return Ok(None);
    };

    let families = Family::list_for_user(pool, user.id).await?;
    let unread = Notification::unread_counts(pool, user.id).await?;
    let notification_total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM notifications WHERE user_id = ?")
        .bind(user.id)
        .fetch_one(pool)
        .await?;
    let record_count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM records WHERE user_id = ?")
        .bind(user.id)
        .fetch_one(pool)
        .await?;
    let pending_delete_requests: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM delete_requests WHERE owner_id = ? AND status = 'pending'",
    )
    .bind(user.id)
    .fetch_one(pool)
    .await?;

    Ok(Some(json!({
        "user": user.profile(),
        "hasSecurityAnswer": !user.security_answer_hash.is_empty(),
        "families": families,
        "recordsAuthored": record_count,
        "notifications": {
            "total": notification_total,
            "unread": unread,
        },
        "pendingDeleteRequests": pending_delete_requests,
    })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::open_database;
    use crate::models::user::NewUser;
    use crate::models::{MemberRole, NotificationCategory};
    use tempfile::TempDir;

    async fn test_db(temp_dir: &TempDir) -> SqlitePool {
        open_database(temp_dir.path().join("maintenance.db"))
            .await
            .unwrap()
    }

    async fn seed_user(pool: &SqlitePool, username: &str) -> User {
        let new_user = NewUser {
            username: username.to_string(),
            password_hash: "not-a-real-hash".to_string(),
            nickname: String::new(),
            security_question: String::new(),
            security_answer_hash: String::new(),
        };
        User::create(pool, &new_user, 1_700_000_000).await.unwrap()
    }

    async fn seed_family(pool: &SqlitePool, owner: &User) -> Family {
        let family = Family::create(pool, "王家", "WANG23", owner.id, 0).await.unwrap();
        Family::add_member(pool, family.id, owner.id, MemberRole::Owner, 0)
            .await
            .unwrap();
        family
    }

    async fn notification_content(pool: &SqlitePool, id: i64) -> String {
        sqlx::query_scalar("SELECT content FROM notifications WHERE id = ?")
            .bind(id)
            .fetch_one(pool)
            .await
            .unwrap()
    }

    fn normalize(content: &str) -> String {
        ContentNormalizer::new().unwrap().normalize(content)
    }

    #[test]
    fn test_normalize_yuan_suffix() {
        assert_eq!(normalize("金额：100元"), "金额：¥100");
        assert_eq!(normalize("张三 婚礼 送礼 100.00元"), "张三 婚礼 送礼 ¥100");
        assert_eq!(normalize("¥ 300 元"), "¥300");
    }

    #[test]
    fn test_normalize_currency_prefix() {
        assert_eq!(normalize("收到 ￥ 200"), "收到 ¥200");
        assert_eq!(normalize("￥88.50"), "¥88.5");
    }

    #[test]
    fn test_normalize_whitespace() {
        assert_eq!(normalize("  新成员   加入\n家庭 "), "新成员 加入 家庭");
    }

    #[test]
    fn test_canonical_text_is_unchanged() {
        let text = "李四 在「王家」中记录了：李四 生日 收礼 ¥500";
        assert_eq!(normalize(text), text);
    }

    #[test]
    fn test_canonical_amount() {
        assert_eq!(canonical_amount("100"), "100");
        assert_eq!(canonical_amount("100.00"), "100");
        assert_eq!(canonical_amount("100.50"), "100.5");
        // Trailing zeros of integers are kept
        assert_eq!(canonical_amount("1000"), "1000");
        assert_eq!(canonical_amount("12,000.50"), "12000.5");
    }

    #[test]
    fn test_normalize_grouped_amounts() {
        assert_eq!(normalize("收到 1,000元"), "收到 ¥1000");
        assert_eq!(normalize("￥2,500"), "¥2500");
        assert_eq!(normalize("¥1,000,000.00 元"), "¥1000000");
    }

    #[tokio::test]
    async fn test_cleanup_removes_orphans() {
        let temp_dir = TempDir::new().unwrap();
        let pool = test_db(&temp_dir).await;
        let alice = seed_user(&pool, "alice").await;
        let family = seed_family(&pool, &alice).await;
        Notification::create(&pool, alice.id, NotificationCategory::System, "欢迎", "欢迎使用", None, 0)
            .await
            .unwrap();

        // Orphans can only appear while foreign keys are not enforced
        let mut conn = pool.acquire().await.unwrap();
        sqlx::query("PRAGMA foreign_keys = OFF")
            .execute(&mut *conn)
            .await
            .unwrap();
        sqlx::query("INSERT INTO family_members (family_id, user_id, role, joined_at) VALUES (?, 999, 'member', 0)")
            .bind(family.id)
            .execute(&mut *conn)
            .await
            .unwrap();
        sqlx::query(
            r#"INSERT INTO records (family_id, user_id, amount, type, related_person, event_date, created_at, updated_at)
               VALUES (999, ?, 100, 'given', '张三', '2024-01-01', 0, 0)"#,
        )
        .bind(alice.id)
        .execute(&mut *conn)
        .await
        .unwrap();
        sqlx::query("INSERT INTO notifications (user_id, title, content, created_at) VALUES (999, '孤儿', '孤儿', 0)")
            .execute(&mut *conn)
            .await
            .unwrap();
        sqlx::query("PRAGMA foreign_keys = ON")
            .execute(&mut *conn)
            .await
            .unwrap();
        drop(conn);

        // A pending request without its record goes, a resolved one stays
        for status in ["pending", "approved"] {
            sqlx::query(
                "INSERT INTO delete_requests (record_id, requester_id, owner_id, status, created_at) VALUES (NULL, ?, ?, ?, 0)",
            )
            .bind(alice.id)
            .bind(alice.id)
            .bind(status)
            .execute(&pool)
            .await
            .unwrap();
        }

        let report = cleanup_orphans(&pool).await.unwrap();
        assert_eq!(
            report,
            CleanupReport {
                family_members: 1,
                records: 1,
                notifications: 1,
                delete_requests: 1,
            }
        );
        assert_eq!(report.total(), 4);

        let remaining: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM notifications")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(remaining, 1);
        let resolved: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM delete_requests")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(resolved, 1);

        // Nothing left to do on a second pass
        assert_eq!(cleanup_orphans(&pool).await.unwrap().total(), 0);
    }

    #[tokio::test]
    async fn test_normalize_notifications_dry_run_then_apply() {
        let temp_dir = TempDir::new().unwrap();
        let pool = test_db(&temp_dir).await;
        let alice = seed_user(&pool, "alice").await;
        let legacy = Notification::create(
            &pool,
            alice.id,
            NotificationCategory::Records,
            "新增礼金记录",
            "收到  1,000元",
            None,
            0,
        )
        .await
        .unwrap();
        let canonical = Notification::create(
            &pool,
            alice.id,
            NotificationCategory::Records,
            "新增礼金记录",
            "李四 生日 收礼 ¥500",
            None,
            0,
        )
        .await
        .unwrap();

        let report = normalize_notifications(&pool, true).await.unwrap();
        assert_eq!(
            report,
            NormalizeReport {
                scanned: 2,
                changed: 1,
                dry_run: true,
            }
        );
        assert_eq!(notification_content(&pool, legacy).await, "收到  1,000元");

        let report = normalize_notifications(&pool, false).await.unwrap();
        assert_eq!(report.changed, 1);
        assert!(!report.dry_run);
        assert_eq!(notification_content(&pool, legacy).await, "收到 ¥1000");
        assert_eq!(notification_content(&pool, canonical).await, "李四 生日 收礼 ¥500");

        assert_eq!(normalize_notifications(&pool, false).await.unwrap().changed, 0);
    }

    #[tokio::test]
    async fn test_dump_user() {
        let temp_dir = TempDir::new().unwrap();
        let pool = test_db(&temp_dir).await;
        let alice = seed_user(&pool, "alice").await;
        seed_family(&pool, &alice).await;
        Notification::create(&pool, alice.id, NotificationCategory::Family, "新成员加入", "bob 加入了家庭", None, 0)
            .await
            .unwrap();
        let read = Notification::create(&pool, alice.id, NotificationCategory::System, "欢迎", "欢迎使用", None, 0)
            .await
            .unwrap();
        Notification::mark_read(&pool, read, alice.id).await.unwrap();

        let dump = dump_user(&pool, "alice").await.unwrap().unwrap();
        assert_eq!(dump["user"]["username"], "alice");
        assert_eq!(dump["hasSecurityAnswer"], false);
        assert_eq!(dump["families"].as_array().unwrap().len(), 1);
        assert_eq!(dump["families"][0]["name"], "王家");
        assert_eq!(dump["families"][0]["role"], "owner");
        assert_eq!(dump["recordsAuthored"], 0);
        assert_eq!(dump["notifications"]["total"], 2);
        assert_eq!(dump["notifications"]["unread"]["total"], 1);
        assert_eq!(dump["notifications"]["unread"]["family"], 1);
        assert_eq!(dump["notifications"]["unread"]["system"], 0);

        assert!(dump_user(&pool, "nobody").await.unwrap().is_none());
    }
}

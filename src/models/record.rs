use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, QueryBuilder, Sqlite, SqliteExecutor, SqlitePool, Type};
use strum_macros::{Display, EnumString};

/// Direction of a gift relative to the family
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Type, Serialize, Deserialize, EnumString, Display)]
#[sqlx(type_name = "TEXT", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum RecordType {
    /// 收礼: the family received money
    Received,
    /// 送礼: the family gave money
    Given,
}

/// A gift record joined with its author's display name
#[derive(Debug, Clone, FromRow, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Record {
    pub id: i64,
    pub family_id: i64,
    pub user_id: i64,
    /// Whole yuan, always positive
    pub amount: i64,
    #[sqlx(rename = "type")]
    #[serde(rename = "type")]
    pub record_type: RecordType,
    pub related_person: String,
    pub relation: String,
    pub event_type: String,
    pub description: String,
    pub event_date: NaiveDate,
    pub author: String,
    #[serde(serialize_with = "super::timestamp::serialize")]
    pub created_at: i64,
    #[serde(serialize_with = "super::timestamp::serialize")]
    pub updated_at: i64,
}

/// Validated record fields, shared by create and update
#[derive(Debug, Clone)]
pub struct NewRecord {
    pub amount: i64,
    pub record_type: RecordType,
    pub related_person: String,
    pub relation: String,
    pub event_type: String,
    pub description: String,
    pub event_date: NaiveDate,
}

/// Optional filters for listing a family's records
#[derive(Debug, Clone, Default)]
pub struct RecordFilter {
    pub record_type: Option<RecordType>,
    pub related_person: Option<String>,
    pub event_type: Option<String>,
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
}

const SELECT_RECORDS: &str = r#"SELECT r.id, r.family_id, r.user_id, r.amount, r.type,
       r.related_person, r.relation, r.event_type, r.description, r.event_date,
       COALESCE(NULLIF(u.nickname, ''), u.username, '已注销用户') AS author,
       r.created_at, r.updated_at
FROM records r
LEFT JOIN users u ON u.id = r.user_id"#;

/// Make `%` and `_` typed by users match literally
fn escape_like(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        if matches!(c, '\\' | '%' | '_') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

impl RecordFilter {
    fn push_conditions(&self, builder: &mut QueryBuilder<'_, Sqlite>) {
        if let Some(record_type) = self.record_type {
            builder.push(" AND r.type = ").push_bind(record_type);
        }
        if let Some(person) = &self.related_person {
            builder
                .push(" AND r.related_person LIKE ")
                .push_bind(format!("%{}%", escape_like(person)))
                .push(r" ESCAPE '\'");
        }
        if let Some(event_type) = &self.event_type {
            builder.push(" AND r.event_type = ").push_bind(event_type.clone());
        }
        if let Some(from) = self.from {
            builder.push(" AND r.event_date >= ").push_bind(from);
        }
        if let Some(to) = self.to {
            builder.push(" AND r.event_date <= ").push_bind(to);
        }
    }
}

impl Record {
    pub async fn find_by_id(pool: &SqlitePool, id: i64) -> Result<Option<Record>, sqlx::Error> {
        sqlx::query_as::<_, Record>(&format!("{} WHERE r.id = ?", SELECT_RECORDS))
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// A window of a family's records, newest event first, plus the filtered total
    pub async fn list(
        pool: &SqlitePool,
        family_id: i64,
        filter: &RecordFilter,
        offset: i64,
        limit: i64,
    ) -> Result<(Vec<Record>, i64), sqlx::Error> {
        let mut count_query =
            QueryBuilder::<Sqlite>::new("SELECT COUNT(*) FROM records r WHERE r.family_id = ");
        count_query.push_bind(family_id);
        filter.push_conditions(&mut count_query);
        let total: i64 = count_query.build_query_scalar().fetch_one(pool).await?;

        let mut query = QueryBuilder::<Sqlite>::new(SELECT_RECORDS);
        query.push(" WHERE r.family_id = ").push_bind(family_id);
        filter.push_conditions(&mut query);
        query
            .push(" ORDER BY r.event_date DESC, r.id DESC LIMIT ")
            .push_bind(limit)
            .push(" OFFSET ")
            .push_bind(offset);
        let records = query.build_query_as::<Record>().fetch_all(pool).await?;

        Ok((records, total))
    }

    pub async fn list_for_family(pool: &SqlitePool, family_id: i64) -> Result<Vec<Record>, sqlx::Error> {
        sqlx::query_as::<_, Record>(&format!(
            "{} WHERE r.family_id = ? ORDER BY r.event_date, r.id",
            SELECT_RECORDS
        ))
        .bind(family_id)
        .fetch_all(pool)
        .await
    }

    /// Every record of every family the user belongs to
    pub async fn list_for_member(pool: &SqlitePool, user_id: i64) -> Result<Vec<Record>, sqlx::Error> {
        sqlx::query_as::<_, Record>(&format!(
            r#"{} WHERE r.family_id IN (SELECT family_id FROM family_members WHERE user_id = ?)
               ORDER BY r.event_date, r.id"#,
            SELECT_RECORDS
        ))
        .bind(user_id)
        .fetch_all(pool)
        .await
    }

    pub async fn create<'e, E>(
        executor: E,
        family_id: i64,
        user_id: i64,
        record: &NewRecord,
        now: i64,
    ) -> Result<i64, sqlx::Error>
    where
        E: SqliteExecutor<'e>,
    {
        sqlx::query_scalar(
            r#"INSERT INTO records (family_id, user_id, amount, type, related_person, relation,
                                    event_type, description, event_date, created_at, updated_at)
               VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
               RETURNING id"#,
        )
        .bind(family_id)
        .bind(user_id)
        .bind(record.amount)
        .bind(record.record_type)
        .bind(&record.related_person)
        .bind(&record.relation)
        .bind(&record.event_type)
        .bind(&record.description)
        .bind(record.event_date)
        .bind(now)
        .bind(now)
        .fetch_one(executor)
        .await
    }

    pub async fn update(pool: &SqlitePool, id: i64, record: &NewRecord, now: i64) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"UPDATE records SET amount = ?, type = ?, related_person = ?, relation = ?,
                                  event_type = ?, description = ?, event_date = ?, updated_at = ?
               WHERE id = ?"#,
        )
        .bind(record.amount)
        .bind(record.record_type)
        .bind(&record.related_person)
        .bind(&record.relation)
        .bind(&record.event_type)
        .bind(&record.description)
        .bind(record.event_date)
        .bind(now)
        .bind(id)
        .execute(pool)
        .await?;
        Ok(())
    }

    pub async fn delete<'e, E>(executor: E, id: i64) -> Result<bool, sqlx::Error>
    where
        E: SqliteExecutor<'e>,
    {
        let result = sqlx::query("DELETE FROM records WHERE id = ?")
            .bind(id)
            .execute(executor)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Short human description used in notification texts, e.g. `张三 婚礼 送礼 ¥500`
    pub fn summary(&self) -> String {
        let direction = match self.record_type {
            RecordType::Received => "收礼",
            RecordType::Given => "送礼",
        };
        let mut parts = vec![self.related_person.as_str()];
        if !self.event_type.is_empty() {
            parts.push(self.event_type.as_str());
        }
        format!("{} {} ¥{}", parts.join(" "), direction, self.amount)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn sample() -> Record {
        Record {
            id: 1,
            family_id: 1,
            user_id: 1,
            amount: 500,
            record_type: RecordType::Given,
            related_person: "张三".to_string(),
            relation: "朋友".to_string(),
            event_type: "婚礼".to_string(),
            description: String::new(),
            event_date: NaiveDate::from_ymd_opt(2024, 5, 1).unwrap(),
            author: "alice".to_string(),
            created_at: 0,
            updated_at: 0,
        }
    }

    #[test]
    fn test_record_type_strings() {
        assert_eq!(RecordType::Received.to_string(), "received");
        assert_eq!(RecordType::from_str("given").unwrap(), RecordType::Given);
        assert!(RecordType::from_str("income").is_err());
    }

    #[test]
    fn test_record_serializes_type_field() {
        let json = serde_json::to_value(sample()).unwrap();
        assert_eq!(json["type"], "given");
        assert_eq!(json["relatedPerson"], "张三");
        assert_eq!(json["eventDate"], "2024-05-01");
    }

    #[test]
    fn test_escape_like() {
        assert_eq!(escape_like("张三"), "张三");
        assert_eq!(escape_like("100%"), "100\\%");
        assert_eq!(escape_like("a_b\\c"), "a\\_b\\\\c");
    }

    #[test]
    fn test_summary() {
        assert_eq!(sample().summary(), "张三 婚礼 送礼 ¥500");

        let mut no_event = sample();
        no_event.event_type.clear();
        no_event.record_type = RecordType::Received;
        assert_eq!(no_event.summary(), "张三 收礼 ¥500");
    }
}

use axum::{
    extract::{Path, Query, State},
    Json,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::constants::{
    DEFAULT_PAGE_SIZE, DESCRIPTION_MAX_CHARS, ERR_NOT_RECORD_OWNER, LABEL_MAX_CHARS, MAX_PAGE_SIZE,
    MAX_RECORD_AMOUNT, RELATED_PERSON_MAX_CHARS,
};
use crate::error::{AppError, Result};
use crate::models::{
    DeleteRequest, Family, MemberRole, NewRecord, Notification, NotificationCategory, Record,
    RecordFilter, RecordType,
};
use crate::routes::families::{display_name, require_member};
use crate::routes::{validation, SuccessResponse};
use crate::session::AuthUser;
use crate::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordRequest {
    pub amount: i64,
    #[serde(rename = "type")]
    pub record_type: RecordType,
    pub related_person: String,
    #[serde(default)]
    pub relation: String,
    #[serde(default)]
    pub event_type: String,
    #[serde(default)]
    pub description: String,
    pub event_date: String,
}

impl RecordRequest {
    fn validate(self) -> Result<NewRecord> {
        if self.amount <= 0 {
            return Err(AppError::InvalidInput("金额必须大于 0".to_string()));
        }
        if self.amount > MAX_RECORD_AMOUNT {
            return Err(AppError::InvalidInput(format!(
                "金额不能超过 {}",
                MAX_RECORD_AMOUNT
            )));
        }

        Ok(NewRecord {
            amount: self.amount,
            record_type: self.record_type,
            related_person: validation::required_text(
                "相关人",
                &self.related_person,
                RELATED_PERSON_MAX_CHARS,
            )?,
            relation: validation::optional_text("关系", &self.relation, LABEL_MAX_CHARS)?,
            event_type: validation::optional_text("事件类型", &self.event_type, LABEL_MAX_CHARS)?,
            description: validation::optional_text("备注", &self.description, DESCRIPTION_MAX_CHARS)?,
            event_date: validation::date("日期", &self.event_date)?,
        })
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListRecordsParams {
    #[serde(rename = "type")]
    pub record_type: Option<String>,
    pub related_person: Option<String>,
    pub event_type: Option<String>,
    pub from: Option<String>,
    pub to: Option<String>,
    pub page: Option<i64>,
    pub page_size: Option<i64>,
}

impl ListRecordsParams {
    fn filter(&self) -> Result<RecordFilter> {
        let non_empty = |value: &Option<String>| {
            value
                .as_deref()
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map(str::to_string)
        };

        let from = non_empty(&self.from)
            .map(|d| validation::date("开始日期", &d))
            .transpose()?;
        let to = non_empty(&self.to)
            .map(|d| validation::date("结束日期", &d))
            .transpose()?;

        Ok(RecordFilter {
            record_type: validation::parse_optional("记录类型", self.record_type.as_deref())?,
            related_person: non_empty(&self.related_person),
            event_type: non_empty(&self.event_type),
            from,
            to,
        })
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordPage {
    pub records: Vec<Record>,
    pub total: i64,
    pub page: i64,
    pub page_size: i64,
}

/// Load a record the caller may see (any member of its family)
pub(crate) async fn visible_record(state: &AppState, record_id: i64, user_id: i64) -> Result<Record> {
    let record = Record::find_by_id(&state.db, record_id)
        .await?
        .ok_or(AppError::RecordNotFound)?;
    require_member(&state.db, record.family_id, user_id).await?;
    Ok(record)
}

fn not_record_owner(record: &Record, user_id: i64) -> AppError {
    tracing::warn!(
        "User {} attempted to modify record {} owned by user {}",
        user_id,
        record.id,
        record.user_id
    );
    AppError::Forbidden(ERR_NOT_RECORD_OWNER.to_string())
}

/// Load a record the caller authored; other members get 403
async fn owned_record(state: &AppState, record_id: i64, user_id: i64) -> Result<Record> {
    let record = visible_record(state, record_id, user_id).await?;
    if record.user_id != user_id {
        return Err(not_record_owner(&record, user_id));
    }
    Ok(record)
}

/// The author left the family or their account was deleted
async fn author_departed(state: &AppState, record: &Record) -> Result<bool> {
    Ok(Family::role_of(&state.db, record.family_id, record.user_id)
        .await?
        .is_none())
}

pub async fn list_records(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(family_id): Path<i64>,
    Query(params): Query<ListRecordsParams>,
) -> Result<Json<RecordPage>> {
    require_member(&state.db, family_id, user.id).await?;

    let filter = params.filter()?;
    let page = params.page.unwrap_or(1).max(1);
    let page_size = params
        .page_size
        .unwrap_or(DEFAULT_PAGE_SIZE)
        .clamp(1, MAX_PAGE_SIZE);
    let offset = (page - 1)
        .checked_mul(page_size)
        .ok_or_else(|| AppError::InvalidInput("页码超出范围".to_string()))?;

    let (records, total) = Record::list(&state.db, family_id, &filter, offset, page_size).await?;

    Ok(Json(RecordPage {
        records,
        total,
        page,
        page_size,
    }))
}

/// Add a gift record; the other family members are notified
pub async fn create_record(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(family_id): Path<i64>,
    Json(payload): Json<RecordRequest>,
) -> Result<Json<Record>> {
    let (family, _) = require_member(&state.db, family_id, user.id).await?;
    let new_record = payload.validate()?;

    let now = Utc::now().timestamp();
    let mut tx = state.db.begin().await?;
    let record_id = Record::create(&mut *tx, family_id, user.id, &new_record, now).await?;
    let members = Family::member_ids(&mut *tx, family_id).await?;
    tx.commit().await?;

    let record = Record::find_by_id(&state.db, record_id)
        .await?
        .ok_or(AppError::RecordNotFound)?;

    let content = format!("{} 在「{}」中记录了：{}", record.author, family.name, record.summary());
    for member_id in members.into_iter().filter(|id| *id != user.id) {
        Notification::create(
            &state.db,
            member_id,
            NotificationCategory::Records,
            "新增礼金记录",
            &content,
            Some(record.id),
            now,
        )
        .await?;
    }

    tracing::info!(
        "Record {} created in family {} by user {}",
        record.id,
        family_id,
        user.id
    );

    Ok(Json(record))
}

pub async fn get_record(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(record_id): Path<i64>,
) -> Result<Json<Record>> {
    Ok(Json(visible_record(&state, record_id, user.id).await?))
}

pub async fn update_record(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(record_id): Path<i64>,
    Json(payload): Json<RecordRequest>,
) -> Result<Json<Record>> {
    owned_record(&state, record_id, user.id).await?;
    let new_record = payload.validate()?;

    Record::update(&state.db, record_id, &new_record, Utc::now().timestamp()).await?;
    tracing::info!("Record {} updated by user {}", record_id, user.id);

    let record = Record::find_by_id(&state.db, record_id)
        .await?
        .ok_or(AppError::RecordNotFound)?;
    Ok(Json(record))
}

/// Only the author may delete; other members file a delete request instead.
/// Records whose author is no longer in the family fall to the family owner.
pub async fn delete_record(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(record_id): Path<i64>,
) -> Result<Json<SuccessResponse>> {
    let record = visible_record(&state, record_id, user.id).await?;
    if record.user_id != user.id {
        let role = Family::role_of(&state.db, record.family_id, user.id).await?;
        if role != Some(MemberRole::Owner) || !author_departed(&state, &record).await? {
            return Err(not_record_owner(&record, user.id));
        }
    }

    Record::delete(&state.db, record_id).await?;
    tracing::info!("Record {} deleted by user {}", record_id, user.id);

    Ok(Json(SuccessResponse::ok()))
}

#[derive(Debug, Default, Deserialize)]
pub struct DeleteRequestBody {
    #[serde(default)]
    pub reason: String,
}

/// A member who did not author the record asks its author to delete it
pub async fn request_delete(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(record_id): Path<i64>,
    body: Option<Json<DeleteRequestBody>>,
) -> Result<Json<DeleteRequest>> {
    let record = visible_record(&state, record_id, user.id).await?;
    if record.user_id == user.id {
        return Err(AppError::InvalidInput("这是您自己的记录，可以直接删除".to_string()));
    }
    if author_departed(&state, &record).await? {
        return Err(AppError::InvalidInput(
            "记录创建者已不在家庭中，请联系家庭创建者删除".to_string(),
        ));
    }

    let reason = body.map(|Json(b)| b.reason).unwrap_or_default();
    let reason = validation::optional_text("删除原因", &reason, DESCRIPTION_MAX_CHARS)?;

    if DeleteRequest::has_pending(&state.db, record_id, user.id).await? {
        return Err(AppError::Conflict("您已提交过删除申请，请等待处理".to_string()));
    }

    let now = Utc::now().timestamp();
    let mut content = format!("{} 申请删除您的记录：{}", display_name(&user), record.summary());
    if !reason.is_empty() {
        content.push_str(&format!("，原因：{}", reason));
    }

    let mut tx = state.db.begin().await?;
    let request =
        DeleteRequest::create(&mut *tx, record_id, user.id, record.user_id, &reason, now).await?;
    Notification::create(
        &mut *tx,
        record.user_id,
        NotificationCategory::DeleteRequest,
        "删除申请",
        &content,
        Some(record_id),
        now,
    )
    .await?;
    tx.commit().await?;

    tracing::info!(
        "User {} requested deletion of record {} (request {})",
        user.id,
        record_id,
        request.id
    );

    Ok(Json(request))
}

use axum::{
    extract::{Path, State},
    Json,
};
use chrono::Utc;

use crate::error::{AppError, Result};
use crate::models::{
    DeleteRequest, DeleteRequestStatus, Notification, NotificationCategory, PendingDeleteRequest,
    Record,
};
use crate::routes::families::{display_name, require_member};
use crate::session::AuthUser;
use crate::AppState;

/// Pending requests addressed to the caller as a record author
pub async fn list_pending(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
) -> Result<Json<Vec<PendingDeleteRequest>>> {
    Ok(Json(
        DeleteRequest::list_pending_for_owner(&state.db, user.id).await?,
    ))
}

/// A pending request the caller may decide, with its record if that still exists
///
/// The caller must be the record's author and still belong to its family.
async fn addressed_to(
    state: &AppState,
    request_id: i64,
    user_id: i64,
) -> Result<(DeleteRequest, Option<Record>)> {
    let request = DeleteRequest::find_by_id(&state.db, request_id)
        .await?
        .ok_or(AppError::DeleteRequestNotFound)?;
    if request.owner_id != user_id {
        return Err(AppError::Forbidden("只有记录创建者可以处理删除申请".to_string()));
    }
    if request.status != DeleteRequestStatus::Pending {
        return Err(AppError::Conflict("该删除申请已处理".to_string()));
    }

    let record = match request.record_id {
        Some(record_id) => Record::find_by_id(&state.db, record_id).await?,
        None => None,
    };
    if let Some(record) = &record {
        require_member(&state.db, record.family_id, user_id).await?;
    }
    Ok((request, record))
}

/// Approve a request: the record is deleted and every pending requester on it is told
pub async fn approve(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(request_id): Path<i64>,
) -> Result<Json<DeleteRequest>> {
    let (request, record) = addressed_to(&state, request_id, user.id).await?;

    let now = Utc::now().timestamp();
    let mut tx = state.db.begin().await?;
    if !DeleteRequest::resolve(&mut *tx, request_id, DeleteRequestStatus::Approved, now).await? {
        return Err(AppError::Conflict("该删除申请已处理".to_string()));
    }

    let mut requesters = vec![request.requester_id];
    let content = match &record {
        Some(record) => {
            requesters.extend(DeleteRequest::approve_all_for_record(&mut *tx, record.id, now).await?);
            Record::delete(&mut *tx, record.id).await?;
            format!("{} 同意了删除申请，记录已删除：{}", display_name(&user), record.summary())
        }
        None => format!("{} 同意了删除申请，记录已不存在", display_name(&user)),
    };

    requesters.sort_unstable();
    requesters.dedup();
    for requester_id in requesters {
        Notification::create(
            &mut *tx,
            requester_id,
            NotificationCategory::Records,
            "删除申请已通过",
            &content,
            None,
            now,
        )
        .await?;
    }
    tx.commit().await?;

    tracing::info!(
        "Delete request {} approved by user {} (record {:?})",
        request_id,
        user.id,
        request.record_id
    );

    let resolved = DeleteRequest::find_by_id(&state.db, request_id)
        .await?
        .ok_or(AppError::DeleteRequestNotFound)?;
    Ok(Json(resolved))
}

pub async fn reject(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(request_id): Path<i64>,
) -> Result<Json<DeleteRequest>> {
    let (request, record) = addressed_to(&state, request_id, user.id).await?;

    let now = Utc::now().timestamp();
    let mut tx = state.db.begin().await?;
    if !DeleteRequest::resolve(&mut *tx, request_id, DeleteRequestStatus::Rejected, now).await? {
        return Err(AppError::Conflict("该删除申请已处理".to_string()));
    }
    let content = match &record {
        Some(record) => format!("{} 拒绝了您的删除申请：{}", display_name(&user), record.summary()),
        None => format!("{} 拒绝了您的删除申请", display_name(&user)),
    };
    Notification::create(
        &mut *tx,
        request.requester_id,
        NotificationCategory::Records,
        "删除申请被拒绝",
        &content,
        request.record_id,
        now,
    )
    .await?;
    tx.commit().await?;

    tracing::info!("Delete request {} rejected by user {}", request_id, user.id);

    let resolved = DeleteRequest::find_by_id(&state.db, request_id)
        .await?
        .ok_or(AppError::DeleteRequestNotFound)?;
    Ok(Json(resolved))
}

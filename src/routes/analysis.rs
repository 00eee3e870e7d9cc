use axum::{
    extract::{Path, State},
    Json,
};

use crate::analysis::{AnalysisEngine, AnalysisReport};
use crate::error::Result;
use crate::models::Record;
use crate::routes::families::require_member;
use crate::session::AuthUser;
use crate::AppState;

/// Insights over one family's ledger
pub async fn family_analysis(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(family_id): Path<i64>,
) -> Result<Json<AnalysisReport>> {
    require_member(&state.db, family_id, user.id).await?;

    let records = Record::list_for_family(&state.db, family_id).await?;
    tracing::debug!(
        "Analysing {} records of family {} for user {}",
        records.len(),
        family_id,
        user.id
    );

    Ok(Json(AnalysisEngine::new(&records).report()))
}

/// Insights over every family the caller belongs to
pub async fn my_analysis(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
) -> Result<Json<AnalysisReport>> {
    let records = Record::list_for_member(&state.db, user.id).await?;
    tracing::debug!("Analysing {} records for user {}", records.len(), user.id);

    Ok(Json(AnalysisEngine::new(&records).report()))
}

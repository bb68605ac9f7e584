//! Statistics endpoints

use axum::{
    extract::{Query, State},
    Json,
};

use crate::{error::AppResult, services::stats::LendingStats};

use super::SchoolScope;

/// Get lending counters for a school
#[utoipa::path(
    get,
    path = "/stats",
    tag = "stats",
    params(SchoolScope),
    responses(
        (status = 200, description = "Lending statistics", body = LendingStats)
    )
)]
pub async fn get_stats(
    State(state): State<crate::AppState>,
    Query(scope): Query<SchoolScope>,
) -> AppResult<Json<LendingStats>> {
    let stats = state.services.stats.lending_stats(scope.school_id).await?;
    Ok(Json(stats))
}

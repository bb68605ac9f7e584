//! Lending-policy settings endpoints

use axum::{
    extract::{Query, State},
    Json,
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::{error::AppResult, models::loan::LendingPolicy};

use super::SchoolScope;

/// Settings response
#[derive(Serialize, ToSchema)]
pub struct SettingsResponse {
    /// Effective lending policy per member type
    pub policies: Vec<LendingPolicy>,
}

/// Update settings request
#[derive(Deserialize, ToSchema)]
pub struct UpdateSettingsRequest {
    pub school_id: i64,
    /// Policies to store (upserted per member type)
    pub policies: Vec<LendingPolicy>,
}

/// Get the school's effective lending policies
#[utoipa::path(
    get,
    path = "/settings",
    tag = "settings",
    params(SchoolScope),
    responses(
        (status = 200, description = "Current settings", body = SettingsResponse)
    )
)]
pub async fn get_settings(
    State(state): State<crate::AppState>,
    Query(scope): Query<SchoolScope>,
) -> AppResult<Json<SettingsResponse>> {
    let policies = state.services.settings.policies(scope.school_id).await?;
    Ok(Json(SettingsResponse { policies }))
}

/// Update the school's lending policies
#[utoipa::path(
    put,
    path = "/settings",
    tag = "settings",
    request_body = UpdateSettingsRequest,
    responses(
        (status = 200, description = "Settings updated", body = SettingsResponse)
    )
)]
pub async fn update_settings(
    State(state): State<crate::AppState>,
    Json(request): Json<UpdateSettingsRequest>,
) -> AppResult<Json<SettingsResponse>> {
    let policies = state
        .services
        .settings
        .update_policies(request.school_id, request.policies)
        .await?;
    Ok(Json(SettingsResponse { policies }))
}

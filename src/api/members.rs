//! Membership endpoints

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::Serialize;
use utoipa::ToSchema;
use validator::Validate;

use crate::{
    error::{AppError, AppResult},
    models::member::{CreateMember, Member, MemberQuery, MemberShort},
};

use super::SchoolScope;

/// Paginated member list
#[derive(Serialize, ToSchema)]
pub struct MemberListResponse {
    pub items: Vec<MemberShort>,
    pub total: i64,
}

/// List members
#[utoipa::path(
    get,
    path = "/members",
    tag = "members",
    params(MemberQuery),
    responses(
        (status = 200, description = "Members matching the query", body = MemberListResponse)
    )
)]
pub async fn list_members(
    State(state): State<crate::AppState>,
    Query(query): Query<MemberQuery>,
) -> AppResult<Json<MemberListResponse>> {
    let (items, total) = state.services.members.search(&query).await?;
    Ok(Json(MemberListResponse { items, total }))
}

/// Get a single member
#[utoipa::path(
    get,
    path = "/members/{id}",
    tag = "members",
    params(
        ("id" = i64, Path, description = "Member ID"),
        SchoolScope
    ),
    responses(
        (status = 200, description = "Member", body = Member),
        (status = 404, description = "Member not found")
    )
)]
pub async fn get_member(
    State(state): State<crate::AppState>,
    Path(id): Path<i64>,
    Query(scope): Query<SchoolScope>,
) -> AppResult<Json<Member>> {
    let member = state.services.members.get(scope.school_id, id).await?;
    Ok(Json(member))
}

/// Create a single membership
#[utoipa::path(
    post,
    path = "/members",
    tag = "members",
    request_body = CreateMember,
    responses(
        (status = 201, description = "Membership created", body = Member),
        (status = 404, description = "Person record not found"),
        (status = 409, description = "Person already holds an active membership")
    )
)]
pub async fn create_member(
    State(state): State<crate::AppState>,
    Json(request): Json<CreateMember>,
) -> AppResult<(StatusCode, Json<Member>)> {
    request
        .validate()
        .map_err(|e| AppError::Validation(e.to_string()))?;

    let policy = state
        .services
        .settings
        .policy_for(request.school_id, request.member_type)
        .await?;
    let member = state.services.members.create(request, policy.max_books).await?;
    Ok((StatusCode::CREATED, Json(member)))
}

/// Deactivate a membership
#[utoipa::path(
    post,
    path = "/members/{id}/deactivate",
    tag = "members",
    params(
        ("id" = i64, Path, description = "Member ID"),
        SchoolScope
    ),
    responses(
        (status = 200, description = "Membership deactivated", body = Member),
        (status = 404, description = "Member not found")
    )
)]
pub async fn deactivate_member(
    State(state): State<crate::AppState>,
    Path(id): Path<i64>,
    Query(scope): Query<SchoolScope>,
) -> AppResult<Json<Member>> {
    let member = state.services.members.deactivate(scope.school_id, id).await?;
    Ok(Json(member))
}

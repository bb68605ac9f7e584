//! Bulk provisioning endpoints: roster groups, file upload, template

use axum::{
    extract::{Query, State},
    http::{header, StatusCode},
    response::IntoResponse,
    Json,
};
use axum_extra::extract::Multipart;
use serde::Deserialize;
use utoipa::{IntoParams, ToSchema};

use crate::{
    error::{AppError, AppResult},
    imports::parser,
    models::import::BatchReport,
    models::member::MemberType,
    services::provisioning::BatchOptions,
};

/// Provision all active roster members of the selected groups
#[derive(Debug, Deserialize, ToSchema)]
pub struct GroupImportRequest {
    pub school_id: i64,
    /// Batch (class group) ids to provision
    pub batch_ids: Vec<i64>,
}

/// Scope of a file import
#[derive(Debug, Deserialize, IntoParams)]
pub struct ImportScope {
    pub school_id: i64,
    pub member_type: MemberType,
}

/// Template query
#[derive(Debug, Deserialize, IntoParams)]
pub struct TemplateQuery {
    pub member_type: MemberType,
}

/// Provision memberships for whole roster groups
#[utoipa::path(
    post,
    path = "/members/import/groups",
    tag = "imports",
    request_body = GroupImportRequest,
    responses(
        (status = 200, description = "Batch completed (possibly with per-row failures)", body = BatchReport),
        (status = 404, description = "Group not found")
    )
)]
pub async fn import_groups(
    State(state): State<crate::AppState>,
    Json(request): Json<GroupImportRequest>,
) -> AppResult<Json<BatchReport>> {
    if request.batch_ids.is_empty() {
        return Err(AppError::Validation("No groups selected".to_string()));
    }

    let policy = state
        .services
        .settings
        .policy_for(request.school_id, MemberType::Student)
        .await?;

    let report = state
        .services
        .provisioning
        .provision_from_groups(
            request.school_id,
            &request.batch_ids,
            policy.max_books,
            BatchOptions::default(),
        )
        .await?;
    Ok(Json(report))
}

/// Provision memberships from an uploaded member list
#[utoipa::path(
    post,
    path = "/members/import",
    tag = "imports",
    params(ImportScope),
    request_body(content = String, content_type = "multipart/form-data"),
    responses(
        (status = 200, description = "Batch completed; per-row outcomes carry the original row data", body = BatchReport),
        (status = 400, description = "Missing file or malformed header")
    )
)]
pub async fn import_file(
    State(state): State<crate::AppState>,
    Query(scope): Query<ImportScope>,
    mut multipart: Multipart,
) -> AppResult<Json<BatchReport>> {
    let mut content: Option<String> = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::BadRequest(format!("Invalid multipart body: {}", e)))?
    {
        if field.name() == Some("file") {
            let bytes = field
                .bytes()
                .await
                .map_err(|e| AppError::BadRequest(format!("Could not read upload: {}", e)))?;
            content = Some(
                String::from_utf8(bytes.to_vec())
                    .map_err(|_| AppError::Validation("File is not valid UTF-8".to_string()))?,
            );
        }
    }
    let content =
        content.ok_or_else(|| AppError::BadRequest("Missing 'file' field".to_string()))?;

    let (rows, dropped) = parser::parse_import_file(&content, scope.member_type)
        .map_err(|e| AppError::Validation(e.to_string()))?;

    let policy = state
        .services
        .settings
        .policy_for(scope.school_id, scope.member_type)
        .await?;

    let report = state
        .services
        .provisioning
        .provision_from_rows(
            scope.school_id,
            scope.member_type,
            rows,
            dropped,
            policy.max_books,
            BatchOptions::default(),
        )
        .await?;
    Ok(Json(report))
}

/// Download the import template for a member type
#[utoipa::path(
    get,
    path = "/members/import/template",
    tag = "imports",
    params(TemplateQuery),
    responses(
        (status = 200, description = "CSV template with one example row", content_type = "text/csv")
    )
)]
pub async fn import_template(
    Query(query): Query<TemplateQuery>,
) -> impl IntoResponse {
    let body = parser::import_template(query.member_type);
    (
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!(
                    "attachment; filename=\"member_import_{}.csv\"",
                    query.member_type
                ),
            ),
        ],
        body,
    )
}

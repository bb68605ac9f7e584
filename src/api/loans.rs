//! Loan lifecycle endpoints

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::Serialize;
use utoipa::ToSchema;

use crate::{
    error::{AppError, AppResult},
    models::loan::{IssueLoan, LoanDetails, LoanTransaction, MarkLost, ReturnLoan},
};

use super::SchoolScope;

/// Sweep result
#[derive(Serialize, ToSchema)]
pub struct SweepResponse {
    /// Number of loans whose stored status was flipped to overdue
    pub flipped: u64,
}

/// Issue a loan (lend a copy to a member)
#[utoipa::path(
    post,
    path = "/loans",
    tag = "loans",
    request_body = IssueLoan,
    responses(
        (status = 201, description = "Loan issued", body = LoanTransaction),
        (status = 404, description = "Book not found"),
        (status = 409, description = "No copy available"),
        (status = 422, description = "Member ineligible or at their borrowing limit")
    )
)]
pub async fn issue_loan(
    State(state): State<crate::AppState>,
    Json(request): Json<IssueLoan>,
) -> AppResult<(StatusCode, Json<LoanTransaction>)> {
    let loan = state.services.lending.issue(request).await?;
    Ok((StatusCode::CREATED, Json(loan)))
}

/// Get a loan
#[utoipa::path(
    get,
    path = "/loans/{id}",
    tag = "loans",
    params(
        ("id" = i64, Path, description = "Loan ID"),
        SchoolScope
    ),
    responses(
        (status = 200, description = "Loan", body = LoanTransaction),
        (status = 404, description = "Loan not found")
    )
)]
pub async fn get_loan(
    State(state): State<crate::AppState>,
    Path(id): Path<i64>,
    Query(scope): Query<SchoolScope>,
) -> AppResult<Json<LoanTransaction>> {
    let loan = state.services.lending.get_loan(scope.school_id, id).await?;
    Ok(Json(loan))
}

/// Return a loan
#[utoipa::path(
    post,
    path = "/loans/{id}/return",
    tag = "loans",
    params(
        ("id" = i64, Path, description = "Loan ID"),
        SchoolScope
    ),
    request_body = ReturnLoan,
    responses(
        (status = 200, description = "Loan returned", body = LoanTransaction),
        (status = 404, description = "Loan not found"),
        (status = 409, description = "Already returned or written off")
    )
)]
pub async fn return_loan(
    State(state): State<crate::AppState>,
    Path(id): Path<i64>,
    Query(scope): Query<SchoolScope>,
    request: Option<Json<ReturnLoan>>,
) -> AppResult<Json<LoanTransaction>> {
    let request = request.map(|Json(r)| r).unwrap_or_default();
    let loan = state
        .services
        .lending
        .return_loan(scope.school_id, id, request)
        .await?;
    Ok(Json(loan))
}

/// Renew a loan
#[utoipa::path(
    post,
    path = "/loans/{id}/renew",
    tag = "loans",
    params(
        ("id" = i64, Path, description = "Loan ID"),
        SchoolScope
    ),
    responses(
        (status = 200, description = "Loan renewed", body = LoanTransaction),
        (status = 404, description = "Loan not found"),
        (status = 409, description = "Loan overdue or terminal"),
        (status = 422, description = "Renewal limit reached")
    )
)]
pub async fn renew_loan(
    State(state): State<crate::AppState>,
    Path(id): Path<i64>,
    Query(scope): Query<SchoolScope>,
) -> AppResult<Json<LoanTransaction>> {
    let loan = state.services.lending.renew(scope.school_id, id).await?;
    Ok(Json(loan))
}

/// Write a loan off as lost
#[utoipa::path(
    post,
    path = "/loans/{id}/lost",
    tag = "loans",
    params(
        ("id" = i64, Path, description = "Loan ID"),
        SchoolScope
    ),
    request_body = MarkLost,
    responses(
        (status = 200, description = "Loan written off", body = LoanTransaction),
        (status = 404, description = "Loan not found"),
        (status = 409, description = "Loan already terminal")
    )
)]
pub async fn mark_lost(
    State(state): State<crate::AppState>,
    Path(id): Path<i64>,
    Query(scope): Query<SchoolScope>,
    Json(request): Json<MarkLost>,
) -> AppResult<Json<LoanTransaction>> {
    if request.replacement_fee.is_sign_negative() {
        return Err(AppError::Validation(
            "Replacement fee cannot be negative".to_string(),
        ));
    }

    let loan = state
        .services
        .lending
        .mark_lost(scope.school_id, id, request)
        .await?;
    Ok(Json(loan))
}

/// Record payment of a loan's fine
#[utoipa::path(
    post,
    path = "/loans/{id}/fine/pay",
    tag = "loans",
    params(
        ("id" = i64, Path, description = "Loan ID"),
        SchoolScope
    ),
    responses(
        (status = 200, description = "Fine recorded as paid", body = LoanTransaction),
        (status = 404, description = "Loan not found"),
        (status = 409, description = "Fine already paid")
    )
)]
pub async fn pay_fine(
    State(state): State<crate::AppState>,
    Path(id): Path<i64>,
    Query(scope): Query<SchoolScope>,
) -> AppResult<Json<LoanTransaction>> {
    let loan = state.services.lending.pay_fine(scope.school_id, id).await?;
    Ok(Json(loan))
}

/// Get a member's live loans
#[utoipa::path(
    get,
    path = "/members/{id}/loans",
    tag = "loans",
    params(
        ("id" = i64, Path, description = "Member ID"),
        SchoolScope
    ),
    responses(
        (status = 200, description = "Member's live loans", body = Vec<LoanDetails>),
        (status = 404, description = "Member not found")
    )
)]
pub async fn member_loans(
    State(state): State<crate::AppState>,
    Path(member_id): Path<i64>,
    Query(scope): Query<SchoolScope>,
) -> AppResult<Json<Vec<LoanDetails>>> {
    let loans = state
        .services
        .lending
        .member_loans(scope.school_id, member_id)
        .await?;
    Ok(Json(loans))
}

/// List loans currently past due
#[utoipa::path(
    get,
    path = "/loans/overdue",
    tag = "loans",
    params(SchoolScope),
    responses(
        (status = 200, description = "Overdue loans", body = Vec<LoanDetails>)
    )
)]
pub async fn overdue_loans(
    State(state): State<crate::AppState>,
    Query(scope): Query<SchoolScope>,
) -> AppResult<Json<Vec<LoanDetails>>> {
    let loans = state.services.lending.overdue_loans(scope.school_id).await?;
    Ok(Json(loans))
}

/// Materialize the overdue display status (idempotent)
#[utoipa::path(
    post,
    path = "/loans/overdue/sweep",
    tag = "loans",
    params(SchoolScope),
    responses(
        (status = 200, description = "Sweep completed", body = SweepResponse)
    )
)]
pub async fn sweep_overdue(
    State(state): State<crate::AppState>,
    Query(scope): Query<SchoolScope>,
) -> AppResult<Json<SweepResponse>> {
    let flipped = state.services.lending.sweep_overdue(scope.school_id).await?;
    Ok(Json(SweepResponse { flipped }))
}

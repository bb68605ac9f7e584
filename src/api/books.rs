//! Catalog endpoints

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
    models::book::{AdjustCopies, Book, BookQuery, CreateBook},
};

use super::SchoolScope;

/// Paginated book list
#[derive(Serialize, ToSchema)]
pub struct BookListResponse {
    pub items: Vec<Book>,
    pub total: i64,
}

/// List books
#[utoipa::path(
    get,
    path = "/books",
    tag = "books",
    params(BookQuery),
    responses(
        (status = 200, description = "Books matching the query", body = BookListResponse)
    )
)]
pub async fn list_books(
    State(state): State<crate::AppState>,
    Query(query): Query<BookQuery>,
) -> AppResult<Json<BookListResponse>> {
    let (items, total) = state.services.catalog.search_books(&query).await?;
    Ok(Json(BookListResponse { items, total }))
}

/// Get a single book
#[utoipa::path(
    get,
    path = "/books/{id}",
    tag = "books",
    params(
        ("id" = i64, Path, description = "Book ID"),
        SchoolScope
    ),
    responses(
        (status = 200, description = "Book", body = Book),
        (status = 404, description = "Book not found")
    )
)]
pub async fn get_book(
    State(state): State<crate::AppState>,
    Path(id): Path<i64>,
    Query(scope): Query<SchoolScope>,
) -> AppResult<Json<Book>> {
    let book = state.services.catalog.get_book(scope.school_id, id).await?;
    Ok(Json(book))
}

/// Create a book
#[utoipa::path(
    post,
    path = "/books",
    tag = "books",
    request_body = CreateBook,
    responses(
        (status = 201, description = "Book created", body = Book),
        (status = 400, description = "Invalid request")
    )
)]
pub async fn create_book(
    State(state): State<crate::AppState>,
    Json(request): Json<CreateBook>,
) -> AppResult<(StatusCode, Json<Book>)> {
    request
        .validate()
        .map_err(|e| AppError::Validation(e.to_string()))?;

    let book = state.services.catalog.create_book(request).await?;
    Ok((StatusCode::CREATED, Json(book)))
}

/// Inventory correction: set the physical copy count
#[utoipa::path(
    put,
    path = "/books/{id}/copies",
    tag = "books",
    params(
        ("id" = i64, Path, description = "Book ID"),
        SchoolScope
    ),
    request_body = AdjustCopies,
    responses(
        (status = 200, description = "Copy count adjusted", body = Book),
        (status = 404, description = "Book not found")
    )
)]
pub async fn adjust_copies(
    State(state): State<crate::AppState>,
    Path(id): Path<i64>,
    Query(scope): Query<SchoolScope>,
    Json(request): Json<AdjustCopies>,
) -> AppResult<Json<Book>> {
    request
        .validate()
        .map_err(|e| AppError::Validation(e.to_string()))?;

    let book = state
        .services
        .catalog
        .adjust_copies(scope.school_id, id, request.total_copies)
        .await?;
    Ok(Json(book))
}

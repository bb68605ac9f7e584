//! Book (catalog title) model and related types.
//!
//! Availability is tracked in aggregate per title: `available_copies` counts
//! free physical units, never individual barcodes. Only the loan ledger
//! mutates it (decrement on issue, clamped increment on return).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

/// Book model from database
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Book {
    pub id: i64,
    pub school_id: i64,
    pub title: String,
    pub author: Option<String>,
    pub isbn: Option<String>,
    pub category: Option<String>,
    pub total_copies: i32,
    pub available_copies: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl Book {
    /// Whether at least one copy is free to lend.
    pub fn is_available(&self) -> bool {
        self.available_copies > 0
    }
}

/// Create book request
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateBook {
    pub school_id: i64,
    #[validate(length(min = 1, message = "Title must not be empty"))]
    pub title: String,
    pub author: Option<String>,
    pub isbn: Option<String>,
    pub category: Option<String>,
    /// Number of physical copies acquired; all start available
    #[validate(range(min = 1, message = "A book needs at least one copy"))]
    pub total_copies: i32,
}

/// Inventory correction request: adjusts the physical copy count after a
/// write-off or an acquisition. `available_copies` is clamped to the new
/// total when the total shrinks.
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct AdjustCopies {
    #[validate(range(min = 0, message = "Copy count cannot be negative"))]
    pub total_copies: i32,
}

/// Book query parameters
#[derive(Debug, Deserialize, IntoParams, ToSchema)]
pub struct BookQuery {
    pub school_id: i64,
    pub title: Option<String>,
    pub author: Option<String>,
    pub available_only: Option<bool>,
    pub page: Option<i64>,
    pub per_page: Option<i64>,
}

//! Bulk provisioning rows, per-row outcomes and batch reports

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

/// One parsed row from an uploaded member list.
///
/// `first_name`, `last_name` and `email` are mandatory; the identifier
/// column holds an employee id or an admission number depending on the
/// member type of the import.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct ImportRow {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub identifier: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub borrowing_limit: Option<i32>,
}

/// What happened to a single entry of a provisioning batch.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
#[serde(rename_all = "snake_case", tag = "status")]
pub enum RowStatus {
    /// Membership created
    Created { member_code: String },
    /// Filtered before processing (already a member, duplicate in batch,
    /// malformed row); not counted against the batch
    Excluded { reason: String },
    /// Processing attempted and failed; the batch continued
    Failed { reason: String },
}

/// Per-row outcome, carrying the original row data for operator review on
/// the upload path.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct RowOutcome {
    /// 1-based data-row number (upload path) or position in the roster
    pub row_number: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub row: Option<ImportRow>,
    #[serde(flatten)]
    pub status: RowStatus,
}

/// Aggregate result of a provisioning batch. `total` counts the entries
/// that entered processing after validation and dedup; excluded rows are
/// reported but not counted.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct BatchReport {
    pub job_id: Uuid,
    pub success: usize,
    pub failed: usize,
    pub total: usize,
    pub cancelled: bool,
    pub rows: Vec<RowOutcome>,
}

/// Live progress of a running batch, published between rows.
#[derive(Debug, Clone, Copy, Default, Serialize, ToSchema)]
pub struct BatchProgress {
    pub processed: usize,
    pub success: usize,
    pub failed: usize,
    pub total: usize,
}

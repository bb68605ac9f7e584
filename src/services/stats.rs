//! Statistics service: read-only lending counters

use rust_decimal::Decimal;
use serde::Serialize;
use utoipa::ToSchema;

use crate::{error::AppResult, repository::Repository};

/// Lending counters for one school
#[derive(Debug, Serialize, ToSchema)]
pub struct LendingStats {
    pub active_loans: i64,
    pub overdue_loans: i64,
    pub returned_today: i64,
    pub active_members: i64,
    pub outstanding_fines: Decimal,
}

#[derive(Clone)]
pub struct StatsService {
    repository: Repository,
}

impl StatsService {
    pub fn new(repository: Repository) -> Self {
        Self { repository }
    }

    pub async fn lending_stats(&self, school_id: i64) -> AppResult<LendingStats> {
        let pool = &self.repository.pool;

        let active_loans: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM loan_transactions WHERE school_id = $1 AND status IN ('issued', 'overdue')",
        )
        .bind(school_id)
        .fetch_one(pool)
        .await?;

        let overdue_loans: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*) FROM loan_transactions
            WHERE school_id = $1 AND status IN ('issued', 'overdue') AND due_date < NOW()
            "#,
        )
        .bind(school_id)
        .fetch_one(pool)
        .await?;

        let returned_today: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*) FROM loan_transactions
            WHERE school_id = $1 AND status = 'returned'
              AND return_date >= DATE_TRUNC('day', NOW())
            "#,
        )
        .bind(school_id)
        .fetch_one(pool)
        .await?;

        let active_members: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM library_members WHERE school_id = $1 AND is_active",
        )
        .bind(school_id)
        .fetch_one(pool)
        .await?;

        let outstanding_fines: Decimal = sqlx::query_scalar(
            r#"
            SELECT COALESCE(SUM(fine_amount), 0) FROM loan_transactions
            WHERE school_id = $1 AND fine_amount > 0 AND NOT fine_paid
            "#,
        )
        .bind(school_id)
        .fetch_one(pool)
        .await?;

        Ok(LendingStats {
            active_loans,
            overdue_loans,
            returned_today,
            active_members,
            outstanding_fines,
        })
    }
}

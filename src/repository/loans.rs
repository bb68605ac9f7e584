//! Loans repository: the loan ledger state machine.
//!
//! Every transition runs in one transaction with the loan row locked
//! (`SELECT ... FOR UPDATE`), and issue combines the member checks, the
//! conditional catalog decrement and the loan insert so that a failed
//! precondition leaves no catalog mutation behind.

use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use sqlx::{Pool, Postgres, Row, Transaction};

use crate::{
    error::{AppError, AppResult},
    fines,
    models::loan::{LoanDetails, LoanStatus, LoanTransaction},
    repository::books::BooksRepository,
};

/// Resolved inputs for an issue, after the service has applied the policy
#[derive(Debug, Clone)]
pub struct IssueParams {
    pub school_id: i64,
    pub book_id: i64,
    pub member_id: i64,
    pub issue_date: DateTime<Utc>,
    pub due_date: DateTime<Utc>,
    pub max_renewals: i16,
    pub notes: Option<String>,
}

#[derive(Clone)]
pub struct LoansRepository {
    pool: Pool<Postgres>,
}

impl LoansRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    /// Get loan by ID
    pub async fn get_by_id(&self, school_id: i64, id: i64) -> AppResult<LoanTransaction> {
        sqlx::query_as::<_, LoanTransaction>(
            "SELECT * FROM loan_transactions WHERE id = $1 AND school_id = $2",
        )
        .bind(id)
        .bind(school_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Loan with id {} not found", id)))
    }

    /// Lock a loan row for a state transition
    async fn lock(
        tx: &mut Transaction<'_, Postgres>,
        school_id: i64,
        id: i64,
    ) -> AppResult<LoanTransaction> {
        sqlx::query_as::<_, LoanTransaction>(
            "SELECT * FROM loan_transactions WHERE id = $1 AND school_id = $2 FOR UPDATE",
        )
        .bind(id)
        .bind(school_id)
        .fetch_optional(&mut **tx)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Loan with id {} not found", id)))
    }

    /// Issue a loan.
    ///
    /// Preconditions checked in order: member exists and is active, member
    /// is under their borrowing limit, a copy is available. The catalog
    /// decrement and the loan insert commit together or not at all.
    pub async fn issue(&self, params: &IssueParams) -> AppResult<LoanTransaction> {
        if params.due_date <= params.issue_date {
            return Err(AppError::Validation(
                "Due date must be after the issue date".to_string(),
            ));
        }

        let mut tx = self.pool.begin().await?;

        let member_row = sqlx::query(
            r#"
            SELECT is_active, borrowing_limit FROM library_members
            WHERE id = $1 AND school_id = $2
            FOR UPDATE
            "#,
        )
        .bind(params.member_id)
        .bind(params.school_id)
        .fetch_optional(&mut *tx)
        .await?;

        let member_row = member_row.ok_or_else(|| {
            AppError::MemberIneligible(format!("Member with id {} not found", params.member_id))
        })?;
        if !member_row.get::<bool, _>("is_active") {
            return Err(AppError::MemberIneligible(format!(
                "Member {} is not active",
                params.member_id
            )));
        }
        let limit: i32 = member_row.get("borrowing_limit");

        let current: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*) FROM loan_transactions
            WHERE school_id = $1 AND member_id = $2 AND status IN ('issued', 'overdue')
            "#,
        )
        .bind(params.school_id)
        .bind(params.member_id)
        .fetch_one(&mut *tx)
        .await?;

        if current >= limit as i64 {
            return Err(AppError::BorrowingLimitExceeded { current, limit });
        }

        // Last precondition: the conditional decrement. A rollback from any
        // earlier failure never touches the catalog.
        BooksRepository::reserve(&mut tx, params.school_id, params.book_id).await?;

        let loan_id = sqlx::query_scalar::<_, i64>(
            r#"
            INSERT INTO loan_transactions (
                school_id, book_id, member_id, issue_date, due_date,
                status, renewal_count, max_renewals, fine_amount, fine_paid, notes
            ) VALUES ($1, $2, $3, $4, $5, 'issued', 0, $6, 0, FALSE, $7)
            RETURNING id
            "#,
        )
        .bind(params.school_id)
        .bind(params.book_id)
        .bind(params.member_id)
        .bind(params.issue_date)
        .bind(params.due_date)
        .bind(params.max_renewals)
        .bind(&params.notes)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        self.get_by_id(params.school_id, loan_id).await
    }

    /// Renew a loan: extend the due date by the loan period.
    ///
    /// Only open to a loan that is effectively issued (not overdue, not
    /// terminal) and under its renewal cap; on failure nothing changes.
    pub async fn renew(
        &self,
        school_id: i64,
        loan_id: i64,
        loan_period_days: i16,
    ) -> AppResult<LoanTransaction> {
        let now = Utc::now();
        let mut tx = self.pool.begin().await?;

        let loan = Self::lock(&mut tx, school_id, loan_id).await?;

        match loan.effective_status(now) {
            LoanStatus::Issued => {}
            LoanStatus::Overdue => {
                return Err(AppError::InvalidStateTransition(format!(
                    "Loan {} is overdue and must be returned before any renewal",
                    loan_id
                )));
            }
            status => {
                return Err(AppError::InvalidStateTransition(format!(
                    "Loan {} is {} and cannot be renewed",
                    loan_id, status
                )));
            }
        }

        if loan.renewal_count >= loan.max_renewals {
            return Err(AppError::RenewalLimitExceeded {
                count: loan.renewal_count,
                max: loan.max_renewals,
            });
        }

        let new_due = loan.due_date + Duration::days(loan_period_days as i64);

        sqlx::query(
            r#"
            UPDATE loan_transactions
            SET due_date = $1, renewal_count = renewal_count + 1
            WHERE id = $2
            "#,
        )
        .bind(new_due)
        .bind(loan_id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        self.get_by_id(school_id, loan_id).await
    }

    /// Return a loan: compute the fine, close the row, release the copy.
    ///
    /// Idempotence: a second return of the same loan fails with
    /// `AlreadyReturned` and never releases a second copy.
    pub async fn return_loan(
        &self,
        school_id: i64,
        loan_id: i64,
        return_date: DateTime<Utc>,
        fine_rate_per_day: Decimal,
        fine_override: Option<Decimal>,
    ) -> AppResult<LoanTransaction> {
        let mut tx = self.pool.begin().await?;

        let loan = Self::lock(&mut tx, school_id, loan_id).await?;

        match loan.status {
            LoanStatus::Issued | LoanStatus::Overdue => {}
            LoanStatus::Returned => {
                return Err(AppError::AlreadyReturned(format!(
                    "Loan {} was already returned",
                    loan_id
                )));
            }
            LoanStatus::Lost => {
                return Err(AppError::InvalidStateTransition(format!(
                    "Loan {} is written off as lost",
                    loan_id
                )));
            }
        }

        let fine = fine_override
            .unwrap_or_else(|| fines::fine_for_period(loan.due_date, return_date, fine_rate_per_day));
        if fine.is_sign_negative() {
            return Err(AppError::Validation("Fine amount cannot be negative".to_string()));
        }

        sqlx::query(
            r#"
            UPDATE loan_transactions
            SET status = 'returned', return_date = $1, fine_amount = $2
            WHERE id = $3
            "#,
        )
        .bind(return_date)
        .bind(fine)
        .bind(loan_id)
        .execute(&mut *tx)
        .await?;

        BooksRepository::release(&mut tx, school_id, loan.book_id).await?;

        tx.commit().await?;

        self.get_by_id(school_id, loan_id).await
    }

    /// Write a loan off as lost. The copy is gone, so the catalog is NOT
    /// released; the physical count is corrected separately through the
    /// inventory adjustment.
    pub async fn mark_lost(
        &self,
        school_id: i64,
        loan_id: i64,
        replacement_fee: Decimal,
        notes: Option<String>,
    ) -> AppResult<LoanTransaction> {
        let mut tx = self.pool.begin().await?;

        let loan = Self::lock(&mut tx, school_id, loan_id).await?;

        if loan.status.is_terminal() {
            return Err(AppError::InvalidStateTransition(format!(
                "Loan {} is {} and cannot be marked lost",
                loan_id, loan.status
            )));
        }

        sqlx::query(
            r#"
            UPDATE loan_transactions
            SET status = 'lost', fine_amount = $1, notes = COALESCE($2, notes)
            WHERE id = $3
            "#,
        )
        .bind(replacement_fee)
        .bind(notes)
        .bind(loan_id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        self.get_by_id(school_id, loan_id).await
    }

    /// Record payment of a loan's fine. The only mutation allowed on a
    /// terminal loan.
    pub async fn pay_fine(&self, school_id: i64, loan_id: i64) -> AppResult<LoanTransaction> {
        let loan = self.get_by_id(school_id, loan_id).await?;
        if loan.fine_amount == Decimal::ZERO {
            return Err(AppError::BadRequest(format!("Loan {} has no fine", loan_id)));
        }
        if loan.fine_paid {
            return Err(AppError::Conflict(format!(
                "Fine for loan {} is already paid",
                loan_id
            )));
        }

        sqlx::query(
            "UPDATE loan_transactions SET fine_paid = TRUE WHERE id = $1 AND school_id = $2",
        )
        .bind(loan_id)
        .bind(school_id)
        .execute(&self.pool)
        .await?;

        self.get_by_id(school_id, loan_id).await
    }

    /// Materialize the overdue status for display/query performance.
    /// Idempotent; touches nothing but the status column, never fines or
    /// renewal counts. Correctness never depends on it running.
    pub async fn sweep_overdue(&self, school_id: i64) -> AppResult<u64> {
        let rows = sqlx::query(
            r#"
            UPDATE loan_transactions
            SET status = 'overdue'
            WHERE school_id = $1 AND status = 'issued' AND due_date < NOW()
            "#,
        )
        .bind(school_id)
        .execute(&self.pool)
        .await?
        .rows_affected();
        Ok(rows)
    }

    /// Live loans of a member, oldest due first
    pub async fn member_loans(&self, school_id: i64, member_id: i64) -> AppResult<Vec<LoanDetails>> {
        self.details_query(
            school_id,
            "l.member_id = $2 AND l.status IN ('issued', 'overdue')",
            Some(member_id),
        )
        .await
    }

    /// All loans currently past due (derived view, independent of the sweep)
    pub async fn overdue_loans(&self, school_id: i64) -> AppResult<Vec<LoanDetails>> {
        self.details_query(
            school_id,
            "l.status IN ('issued', 'overdue') AND l.due_date < NOW()",
            None,
        )
        .await
    }

    async fn details_query(
        &self,
        school_id: i64,
        condition: &str,
        extra_bind: Option<i64>,
    ) -> AppResult<Vec<LoanDetails>> {
        let query = format!(
            r#"
            SELECT l.*, b.title as book_title, m.member_code,
                   m.first_name as member_first_name, m.last_name as member_last_name
            FROM loan_transactions l
            JOIN books b ON l.book_id = b.id
            JOIN library_members m ON l.member_id = m.id
            WHERE l.school_id = $1 AND {}
            ORDER BY l.due_date, l.id
            "#,
            condition
        );

        let mut builder = sqlx::query(&query).bind(school_id);
        if let Some(bind) = extra_bind {
            builder = builder.bind(bind);
        }
        let rows = builder.fetch_all(&self.pool).await?;

        let now = Utc::now();
        let mut result = Vec::new();
        for row in rows {
            let status: LoanStatus = row.get("status");
            let due_date: DateTime<Utc> = row.get("due_date");
            result.push(LoanDetails {
                id: row.get("id"),
                book_id: row.get("book_id"),
                book_title: row.get("book_title"),
                member_id: row.get("member_id"),
                member_code: row.get("member_code"),
                member_name: format!(
                    "{} {}",
                    row.get::<String, _>("member_first_name"),
                    row.get::<String, _>("member_last_name")
                ),
                issue_date: row.get("issue_date"),
                due_date,
                return_date: row.get("return_date"),
                status,
                renewal_count: row.get("renewal_count"),
                max_renewals: row.get("max_renewals"),
                fine_amount: row.get("fine_amount"),
                fine_paid: row.get("fine_paid"),
                is_overdue: !status.is_terminal() && due_date < now,
            });
        }
        Ok(result)
    }
}

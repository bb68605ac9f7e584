//! Lending service: orchestrates the loan ledger.
//!
//! Resolves the member's lending policy before every transition so that the
//! loan period, renewal cap and fine rate always come from configuration,
//! then delegates the transactional work to the loans repository.

use chrono::{Duration, Utc};
use rust_decimal::Decimal;

use crate::{
    error::{AppError, AppResult},
    models::loan::{IssueLoan, LoanDetails, LoanTransaction, MarkLost, ReturnLoan},
    repository::{loans::IssueParams, Repository},
    services::settings::SettingsService,
};

#[derive(Clone)]
pub struct LendingService {
    repository: Repository,
    settings: SettingsService,
}

impl LendingService {
    pub fn new(repository: Repository, settings: SettingsService) -> Self {
        Self { repository, settings }
    }

    pub async fn get_loan(&self, school_id: i64, loan_id: i64) -> AppResult<LoanTransaction> {
        self.repository.loans.get_by_id(school_id, loan_id).await
    }

    /// Issue a loan. The due date defaults to now + the policy's loan
    /// period; the renewal cap is snapshotted onto the loan.
    pub async fn issue(&self, request: IssueLoan) -> AppResult<LoanTransaction> {
        if matches!(request.max_renewals, Some(n) if n < 0) {
            return Err(AppError::Validation(
                "Renewal cap cannot be negative".to_string(),
            ));
        }

        let member = self
            .repository
            .members
            .get_by_id(request.school_id, request.member_id)
            .await
            .map_err(|e| match e {
                AppError::NotFound(msg) => AppError::MemberIneligible(msg),
                e => e,
            })?;
        let policy = self
            .settings
            .policy_for(request.school_id, member.member_type)
            .await?;

        let now = Utc::now();
        let due_date = request
            .due_date
            .unwrap_or_else(|| now + Duration::days(policy.loan_period_days as i64));

        let params = IssueParams {
            school_id: request.school_id,
            book_id: request.book_id,
            member_id: request.member_id,
            issue_date: now,
            due_date,
            max_renewals: request.max_renewals.unwrap_or(policy.max_renewals),
            notes: request.notes,
        };

        let loan = self.repository.loans.issue(&params).await?;
        tracing::info!(
            loan_id = loan.id,
            book_id = loan.book_id,
            member_id = loan.member_id,
            due_date = %loan.due_date,
            "loan issued"
        );
        Ok(loan)
    }

    /// Renew a loan, extending the due date by the policy's loan period
    pub async fn renew(&self, school_id: i64, loan_id: i64) -> AppResult<LoanTransaction> {
        let loan = self.repository.loans.get_by_id(school_id, loan_id).await?;
        let member = self.repository.members.get_by_id(school_id, loan.member_id).await?;
        let policy = self.settings.policy_for(school_id, member.member_type).await?;

        self.repository
            .loans
            .renew(school_id, loan_id, policy.loan_period_days)
            .await
    }

    /// Return a loan; the fine is computed from the policy's rate unless
    /// the desk supplies an override.
    pub async fn return_loan(
        &self,
        school_id: i64,
        loan_id: i64,
        request: ReturnLoan,
    ) -> AppResult<LoanTransaction> {
        let loan = self.repository.loans.get_by_id(school_id, loan_id).await?;
        let member = self.repository.members.get_by_id(school_id, loan.member_id).await?;
        let policy = self.settings.policy_for(school_id, member.member_type).await?;

        let return_date = request.return_date.unwrap_or_else(Utc::now);
        let loan = self
            .repository
            .loans
            .return_loan(
                school_id,
                loan_id,
                return_date,
                policy.fine_rate_per_day,
                request.fine_override,
            )
            .await?;

        if loan.fine_amount > Decimal::ZERO {
            tracing::info!(loan_id = loan.id, fine = %loan.fine_amount, "loan returned late");
        }
        Ok(loan)
    }

    /// Write a loan off as lost with a replacement fee
    pub async fn mark_lost(
        &self,
        school_id: i64,
        loan_id: i64,
        request: MarkLost,
    ) -> AppResult<LoanTransaction> {
        self.repository
            .loans
            .mark_lost(school_id, loan_id, request.replacement_fee, request.notes)
            .await
    }

    pub async fn pay_fine(&self, school_id: i64, loan_id: i64) -> AppResult<LoanTransaction> {
        self.repository.loans.pay_fine(school_id, loan_id).await
    }

    /// Live loans held by a member
    pub async fn member_loans(&self, school_id: i64, member_id: i64) -> AppResult<Vec<LoanDetails>> {
        // Verify the member exists
        self.repository.members.get_by_id(school_id, member_id).await?;
        self.repository.loans.member_loans(school_id, member_id).await
    }

    /// Loans currently past due
    pub async fn overdue_loans(&self, school_id: i64) -> AppResult<Vec<LoanDetails>> {
        self.repository.loans.overdue_loans(school_id).await
    }

    /// Materialize the overdue display status; returns the number of rows
    /// flipped
    pub async fn sweep_overdue(&self, school_id: i64) -> AppResult<u64> {
        let flipped = self.repository.loans.sweep_overdue(school_id).await?;
        if flipped > 0 {
            tracing::debug!(flipped, "overdue sweep materialized statuses");
        }
        Ok(flipped)
    }
}

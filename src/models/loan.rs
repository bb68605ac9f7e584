//! Loan transaction model and related types

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::{Decode, Encode, FromRow, Postgres};
use utoipa::ToSchema;

use super::member::MemberType;

/// Stored loan status.
///
/// `Overdue` is primarily a read-time projection of `Issued` past its due
/// date; a periodic sweep may materialize it for query performance, but the
/// stored value never drives fines. `Returned` and `Lost` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum LoanStatus {
    Issued,
    Returned,
    Overdue,
    Lost,
}

impl LoanStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            LoanStatus::Issued => "issued",
            LoanStatus::Returned => "returned",
            LoanStatus::Overdue => "overdue",
            LoanStatus::Lost => "lost",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, LoanStatus::Returned | LoanStatus::Lost)
    }
}

impl std::fmt::Display for LoanStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for LoanStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "issued" => Ok(LoanStatus::Issued),
            "returned" => Ok(LoanStatus::Returned),
            "overdue" => Ok(LoanStatus::Overdue),
            "lost" => Ok(LoanStatus::Lost),
            _ => Err(format!("Invalid loan status: {}", s)),
        }
    }
}

impl sqlx::Type<Postgres> for LoanStatus {
    fn type_info() -> sqlx::postgres::PgTypeInfo {
        <String as sqlx::Type<Postgres>>::type_info()
    }
}

impl<'r> Decode<'r, Postgres> for LoanStatus {
    fn decode(value: sqlx::postgres::PgValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
        let s: String = Decode::<Postgres>::decode(value)?;
        s.parse().map_err(|e: String| e.into())
    }
}

impl Encode<'_, Postgres> for LoanStatus {
    fn encode_by_ref(&self, buf: &mut sqlx::postgres::PgArgumentBuffer) -> sqlx::encode::IsNull {
        let s: String = self.as_str().to_string();
        <String as Encode<Postgres>>::encode(s, buf)
    }
}

/// Loan transaction from database
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct LoanTransaction {
    pub id: i64,
    pub school_id: i64,
    pub book_id: i64,
    pub member_id: i64,
    pub issue_date: DateTime<Utc>,
    pub due_date: DateTime<Utc>,
    pub return_date: Option<DateTime<Utc>>,
    pub status: LoanStatus,
    pub renewal_count: i16,
    /// Renewal cap snapshotted from the lending policy at issue time
    pub max_renewals: i16,
    pub fine_amount: Decimal,
    pub fine_paid: bool,
    pub notes: Option<String>,
}

impl LoanTransaction {
    /// Status as seen by callers: an issued loan past its due date reads as
    /// overdue whether or not a sweep has materialized it.
    pub fn effective_status(&self, now: DateTime<Utc>) -> LoanStatus {
        match self.status {
            LoanStatus::Issued | LoanStatus::Overdue => {
                if now > self.due_date {
                    LoanStatus::Overdue
                } else {
                    LoanStatus::Issued
                }
            }
            terminal => terminal,
        }
    }

    /// A live loan holds a copy: issued or overdue, not yet closed.
    pub fn is_live(&self) -> bool {
        !self.status.is_terminal()
    }

    /// Renewal is only open to a live loan that is not overdue and still
    /// under its cap. Overdue loans must be returned (extending the due
    /// date would silently erase the accrued fine).
    pub fn can_renew(&self, now: DateTime<Utc>) -> bool {
        self.effective_status(now) == LoanStatus::Issued && self.renewal_count < self.max_renewals
    }
}

/// Loan with book/member context for display
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct LoanDetails {
    pub id: i64,
    pub book_id: i64,
    pub book_title: String,
    pub member_id: i64,
    pub member_code: String,
    pub member_name: String,
    pub issue_date: DateTime<Utc>,
    pub due_date: DateTime<Utc>,
    pub return_date: Option<DateTime<Utc>>,
    pub status: LoanStatus,
    pub renewal_count: i16,
    pub max_renewals: i16,
    pub fine_amount: Decimal,
    pub fine_paid: bool,
    pub is_overdue: bool,
}

/// Lending policy for one member type within a school.
///
/// Stored rows override the configured defaults; `max_renewals` is copied
/// onto each loan at issue, the other fields are read when the operation
/// that needs them runs.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct LendingPolicy {
    pub member_type: MemberType,
    pub max_books: i32,
    pub max_renewals: i16,
    pub loan_period_days: i16,
    pub fine_rate_per_day: Decimal,
}

/// Issue loan request
#[derive(Debug, Deserialize, ToSchema)]
pub struct IssueLoan {
    pub school_id: i64,
    pub book_id: i64,
    pub member_id: i64,
    /// Defaults to now + the policy's loan period
    pub due_date: Option<DateTime<Utc>>,
    /// Per-loan renewal cap override; defaults to the policy's
    pub max_renewals: Option<i16>,
    pub notes: Option<String>,
}

/// Return loan request
#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct ReturnLoan {
    /// Defaults to now; the desk may back-date a return found in the drop box
    pub return_date: Option<DateTime<Utc>>,
    /// Manual fine adjustment at the point of return
    pub fine_override: Option<Decimal>,
}

/// Mark-lost request
#[derive(Debug, Deserialize, ToSchema)]
pub struct MarkLost {
    pub replacement_fee: Decimal,
    pub notes: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use rust_decimal::Decimal;

    fn loan(status: LoanStatus, due_in_days: i64, renewals: i16, max: i16) -> LoanTransaction {
        let now = Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap();
        LoanTransaction {
            id: 1,
            school_id: 1,
            book_id: 1,
            member_id: 1,
            issue_date: now - Duration::days(7),
            due_date: now + Duration::days(due_in_days),
            return_date: None,
            status,
            renewal_count: renewals,
            max_renewals: max,
            fine_amount: Decimal::ZERO,
            fine_paid: false,
            notes: None,
        }
    }

    fn now() -> chrono::DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn issued_past_due_reads_overdue() {
        let l = loan(LoanStatus::Issued, -1, 0, 2);
        assert_eq!(l.effective_status(now()), LoanStatus::Overdue);
        assert!(l.is_live());
    }

    #[test]
    fn issued_before_due_reads_issued() {
        let l = loan(LoanStatus::Issued, 3, 0, 2);
        assert_eq!(l.effective_status(now()), LoanStatus::Issued);
    }

    #[test]
    fn terminal_status_is_stable() {
        let l = loan(LoanStatus::Returned, -10, 0, 2);
        assert_eq!(l.effective_status(now()), LoanStatus::Returned);
        assert!(!l.is_live());
    }

    #[test]
    fn renewal_blocked_at_cap() {
        assert!(loan(LoanStatus::Issued, 3, 1, 2).can_renew(now()));
        assert!(!loan(LoanStatus::Issued, 3, 2, 2).can_renew(now()));
    }

    #[test]
    fn renewal_blocked_when_overdue() {
        assert!(!loan(LoanStatus::Issued, -1, 0, 2).can_renew(now()));
    }
}

//! Late-fine calculation.
//!
//! Fines are a pure function of the due date, the evaluation date and a
//! per-day rate. The difference is taken in calendar days, so a loan
//! returned any time on its due date owes nothing, and partial days never
//! round up.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

/// Number of whole calendar days `evaluation_date` is past `due_date`.
/// Zero when on time or early.
pub fn days_overdue(due_date: DateTime<Utc>, evaluation_date: DateTime<Utc>) -> i64 {
    let days = (evaluation_date.date_naive() - due_date.date_naive()).num_days();
    days.max(0)
}

/// Fine owed for a loan with the given due date when evaluated at
/// `evaluation_date`.
pub fn fine_for_period(
    due_date: DateTime<Utc>,
    evaluation_date: DateTime<Utc>,
    rate_per_day: Decimal,
) -> Decimal {
    Decimal::from(days_overdue(due_date, evaluation_date)) * rate_per_day
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rust_decimal_macros::dec;

    fn at(y: i32, m: u32, d: u32, h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, 0, 0).unwrap()
    }

    #[test]
    fn returned_on_due_date_owes_nothing() {
        let due = at(2025, 3, 10, 9);
        assert_eq!(fine_for_period(due, due, dec!(1.00)), dec!(0));
        // Later the same calendar day still counts as on time.
        assert_eq!(fine_for_period(due, at(2025, 3, 10, 23), dec!(1.00)), dec!(0));
    }

    #[test]
    fn returned_early_owes_nothing() {
        let due = at(2025, 3, 10, 9);
        assert_eq!(fine_for_period(due, at(2025, 3, 9, 9), dec!(1.00)), dec!(0));
        assert_eq!(days_overdue(due, at(2025, 2, 1, 0)), 0);
    }

    #[test]
    fn one_day_late_at_unit_rate() {
        let due = at(2025, 3, 10, 9);
        assert_eq!(fine_for_period(due, at(2025, 3, 11, 8), dec!(1.00)), dec!(1.00));
    }

    #[test]
    fn calendar_days_not_elapsed_hours() {
        // 23:00 due, returned 01:00 next day: two hours elapsed, one calendar day late.
        let due = at(2025, 3, 10, 23);
        let returned = at(2025, 3, 11, 1);
        assert_eq!(days_overdue(due, returned), 1);
        assert_eq!(fine_for_period(due, returned, dec!(2.50)), dec!(2.50));
    }

    #[test]
    fn three_days_late() {
        let due = at(2025, 3, 10, 9);
        assert_eq!(fine_for_period(due, at(2025, 3, 13, 9), dec!(1.00)), dec!(3.00));
        assert_eq!(fine_for_period(due, at(2025, 3, 13, 9), dec!(0.50)), dec!(1.50));
    }
}

//! Calendar helpers shared across the engine.
//!
//! The engine deals in whole days; expiration is a `NaiveDate` and all
//! remaining-time arithmetic floors at zero.

use chrono::{Months, NaiveDate, Utc};

/// How far out a one-time renewal may push the expire date.
const MAX_RENEWAL_MONTHS: u32 = 36;

/// Today's date in UTC.
pub fn today_utc() -> NaiveDate {
    Utc::now().date_naive()
}

/// Whole days from `from` until `until`, floored at zero.
pub fn days_remaining(until: NaiveDate, from: NaiveDate) -> i64 {
    (until - from).num_days().max(0)
}

/// True when `expire` falls inside the renewal window
/// `[today, today + 3 years]`.
///
/// One-time renewals beyond the window are refused so a user cannot
/// stockpile unbounded subscription time.
pub fn within_renewal_window(expire: NaiveDate, today: NaiveDate) -> bool {
    expire >= today && expire <= today + Months::new(MAX_RENEWAL_MONTHS)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn days_remaining_floors_at_zero() {
        let today = date(2026, 8, 29);
        assert_eq!(days_remaining(date(2026, 9, 8), today), 10);
        assert_eq!(days_remaining(today, today), 0);
        assert_eq!(days_remaining(date(2026, 8, 1), today), 0);
    }

    #[test]
    fn renewal_window_spans_exactly_three_years() {
        let today = date(2026, 8, 29);
        assert!(within_renewal_window(today, today));
        assert!(within_renewal_window(date(2029, 8, 29), today));
        assert!(!within_renewal_window(date(2029, 8, 30), today));
    }

    #[test]
    fn past_expire_is_outside_renewal_window() {
        let today = date(2026, 8, 29);
        assert!(!within_renewal_window(date(2026, 8, 28), today));
    }
}

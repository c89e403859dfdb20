//! Business-day and month arithmetic on [`NaiveDate`].
//!
//! Business days are Monday through Friday. Holidays are not modelled.

use chrono::{Datelike, Days, NaiveDate, Weekday};

/// Returns `true` for Monday through Friday.
#[must_use]
pub fn is_workday(date: NaiveDate) -> bool {
    !matches!(date.weekday(), Weekday::Sat | Weekday::Sun)
}

/// Number of days in `month` (1..=12) of `year`. Returns 0 for an invalid month.
#[must_use]
pub fn days_in_month(year: i32, month: u32) -> u32 {
    let (next_year, next_month) = if month == 12 {
        (year + 1, 1)
    } else {
        (year, month + 1)
    };
    NaiveDate::from_ymd_opt(next_year, next_month, 1)
        .and_then(|first_of_next| first_of_next.pred_opt())
        .map_or(0, |last| last.day())
}

/// The `n`th business day of the month, counting from the 1st.
///
/// Returns `None` when `n` is zero or the month has fewer than `n`
/// business days.
#[must_use]
pub fn nth_workday_of_month(year: i32, month: u32, n: u32) -> Option<NaiveDate> {
    if n == 0 {
        return None;
    }
    let mut count = 0;
    for day in 1..=days_in_month(year, month) {
        let date = NaiveDate::from_ymd_opt(year, month, day)?;
        if is_workday(date) {
            count += 1;
            if count == n {
                return Some(date);
            }
        }
    }
    None
}

/// The Monday starting the ISO week that contains `date`.
#[must_use]
pub fn monday_of_week(date: NaiveDate) -> NaiveDate {
    let back = u64::from(date.weekday().num_days_from_monday());
    date.checked_sub_days(Days::new(back)).unwrap_or(date)
}

/// Whole Monday-aligned weeks from the week of `from` to the week of `to`.
///
/// Negative when `to` lies in an earlier week.
#[must_use]
pub fn weeks_between(from: NaiveDate, to: NaiveDate) -> i64 {
    let days = monday_of_week(to)
        .signed_duration_since(monday_of_week(from))
        .num_days();
    days.div_euclid(7)
}

/// Calendar months from the month of `from` to the month of `to`.
#[must_use]
pub fn months_between(from: NaiveDate, to: NaiveDate) -> i64 {
    let years = i64::from(to.year()) - i64::from(from.year());
    let months = i64::from(to.month()) - i64::from(from.month());
    years * 12 + months
}

/// Business days in the half-open interval `[from, to)`.
///
/// Zero when `to` is not after `from`.
#[must_use]
pub fn workdays_between(from: NaiveDate, to: NaiveDate) -> i64 {
    let span = to.signed_duration_since(from).num_days();
    if span <= 0 {
        return 0;
    }
    let full_weeks = span / 7;
    let mut count = full_weeks * 5;
    let tail_start = from
        .checked_add_days(Days::new((full_weeks * 7) as u64))
        .unwrap_or(to);
    let mut cursor = tail_start;
    while cursor < to {
        if is_workday(cursor) {
            count += 1;
        }
        match cursor.succ_opt() {
            Some(next) => cursor = next,
            None => break,
        }
    }
    count
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
    }

    #[test]
    fn month_lengths() {
        assert_eq!(days_in_month(2024, 2), 29);
        assert_eq!(days_in_month(2023, 2), 28);
        assert_eq!(days_in_month(2024, 4), 30);
        assert_eq!(days_in_month(2024, 12), 31);
        assert_eq!(days_in_month(2024, 13), 0);
    }

    #[test]
    fn april_2024_business_days() {
        assert_eq!(nth_workday_of_month(2024, 4, 1), Some(date(2024, 4, 1)));
        assert_eq!(nth_workday_of_month(2024, 4, 22), Some(date(2024, 4, 30)));
        assert_eq!(nth_workday_of_month(2024, 4, 23), None);
        assert_eq!(nth_workday_of_month(2024, 4, 0), None);
    }

    #[test]
    fn first_workday_skips_weekend_start() {
        // June 2024 starts on a Saturday.
        assert_eq!(nth_workday_of_month(2024, 6, 1), Some(date(2024, 6, 3)));
    }

    #[test]
    fn monday_alignment() {
        assert_eq!(monday_of_week(date(2024, 1, 7)), date(2024, 1, 1));
        assert_eq!(monday_of_week(date(2024, 1, 8)), date(2024, 1, 8));
        assert_eq!(weeks_between(date(2024, 1, 7), date(2024, 1, 8)), 1);
        assert_eq!(weeks_between(date(2024, 1, 8), date(2024, 1, 7)), -1);
        assert_eq!(weeks_between(date(2024, 1, 1), date(2024, 1, 29)), 4);
    }

    #[test]
    fn month_distance_spans_years() {
        assert_eq!(months_between(date(2023, 11, 30), date(2024, 2, 1)), 3);
        assert_eq!(months_between(date(2024, 2, 1), date(2023, 11, 30)), -3);
    }

    #[test]
    fn workdays_in_half_open_interval() {
        let monday = date(2024, 1, 1);
        assert_eq!(workdays_between(monday, monday), 0);
        assert_eq!(workdays_between(monday, date(2024, 1, 2)), 1);
        assert_eq!(workdays_between(monday, date(2024, 1, 8)), 5);
        assert_eq!(workdays_between(monday, date(2024, 1, 17)), 12);
        // Saturday to Monday spans no business day.
        assert_eq!(workdays_between(date(2024, 1, 6), date(2024, 1, 8)), 0);
    }
}

//! Occurrence generation: which dates in a range are due for a rule.

use chrono::{Datelike, Days, NaiveDate};
use serde::Serialize;

use super::calendar::{
    is_workday, months_between, nth_workday_of_month, weeks_between, workdays_between,
};
use super::rule::{MonthDay, Recurrence, RuleError, ScheduleRule};
use crate::error::{ControlError, Result};

/// Inclusive calendar-date range `[start, end]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct DateRange {
    start: NaiveDate,
    end: NaiveDate,
}

impl DateRange {
    /// Build a range covering `start..=end`.
    ///
    /// # Errors
    ///
    /// Returns [`ControlError::Range`] when `end` precedes `start`.
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self> {
        if end < start {
            return Err(ControlError::Range(format!(
                "range end {end} precedes start {start}"
            )));
        }
        Ok(Self { start, end })
    }

    /// Build the range `start..=start + days`. A horizon of zero covers
    /// `start` alone, the same range as `new(start, start)`.
    ///
    /// # Errors
    ///
    /// Returns [`ControlError::Range`] when the end date overflows the calendar.
    pub fn from_horizon(start: NaiveDate, days: u32) -> Result<Self> {
        let end = start
            .checked_add_days(Days::new(u64::from(days)))
            .ok_or_else(|| ControlError::Range(format!("{days} days after {start} overflows")))?;
        Ok(Self { start, end })
    }

    /// First day of the range.
    #[must_use]
    pub fn start(&self) -> NaiveDate {
        self.start
    }

    /// Last day of the range (inclusive).
    #[must_use]
    pub fn end(&self) -> NaiveDate {
        self.end
    }

    /// Returns `true` if `date` lies within the range.
    #[must_use]
    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }

    /// Number of days covered, counting both ends.
    #[must_use]
    pub fn num_days(&self) -> i64 {
        self.end.signed_duration_since(self.start).num_days() + 1
    }

    /// Iterate every date in the range in ascending order.
    pub fn days(&self) -> impl Iterator<Item = NaiveDate> + '_ {
        self.start.iter_days().take_while(move |d| *d <= self.end)
    }
}

impl std::fmt::Display for DateRange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}..={}", self.start, self.end)
    }
}

/// Due dates of `rule` within `range`, ascending and without duplicates.
///
/// # Errors
///
/// Returns the [`RuleError`] when the rule is incomplete for its kind.
pub fn generate(
    rule: &ScheduleRule,
    range: &DateRange,
) -> std::result::Result<Vec<NaiveDate>, RuleError> {
    Ok(rule.compile()?.occurrences(range))
}

impl Recurrence {
    /// First date on which anything can fall due.
    #[must_use]
    pub fn anchor(&self) -> NaiveDate {
        match *self {
            Self::Once { on } => on,
            Self::Daily { anchor, .. }
            | Self::Weekly { anchor, .. }
            | Self::Monthly { anchor, .. } => anchor,
        }
    }

    /// Returns `true` if `date` is a due date of this recurrence.
    #[must_use]
    pub fn is_due(&self, date: NaiveDate) -> bool {
        if date < self.anchor() {
            return false;
        }
        match *self {
            Self::Once { on } => date == on,
            Self::Daily {
                anchor,
                every,
                workday_only,
            } => {
                let offset = if workday_only {
                    if !is_workday(date) {
                        return false;
                    }
                    workdays_between(anchor, date)
                } else {
                    date.signed_duration_since(anchor).num_days()
                };
                offset % i64::from(every) == 0
            }
            Self::Weekly {
                anchor,
                weekday,
                period_weeks,
                workday_only,
            } => {
                if date.weekday() != weekday || (workday_only && !is_workday(date)) {
                    return false;
                }
                let weeks = weeks_between(anchor, date);
                weeks >= 0 && weeks % i64::from(period_weeks) == 0
            }
            Self::Monthly { anchor, every, day } => {
                let months = months_between(anchor, date);
                if months < 0 || months % i64::from(every) != 0 {
                    return false;
                }
                match day {
                    MonthDay::Calendar(n) => date.day() == n,
                    MonthDay::Workday(n) => {
                        is_workday(date)
                            && nth_workday_of_month(date.year(), date.month(), n) == Some(date)
                    }
                }
            }
        }
    }

    /// Due dates within `range`, ascending.
    #[must_use]
    pub fn occurrences(&self, range: &DateRange) -> Vec<NaiveDate> {
        match *self {
            Self::Once { on } if range.contains(on) => vec![on],
            Self::Once { .. } => Vec::new(),
            _ => range.days().filter(|d| self.is_due(*d)).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
    }

    fn range(start: NaiveDate, end: NaiveDate) -> DateRange {
        DateRange::new(start, end).expect("valid range")
    }

    #[test]
    fn inverted_range_is_rejected() {
        let err = DateRange::new(date(2024, 2, 1), date(2024, 1, 31)).unwrap_err();
        assert!(matches!(err, ControlError::Range(_)));
    }

    #[test]
    fn zero_horizon_is_a_single_day() {
        let day = date(2024, 1, 1);
        let r = DateRange::from_horizon(day, 0).unwrap();
        assert_eq!(r, DateRange::new(day, day).unwrap());
        assert_eq!(r.num_days(), 1);
        assert_eq!(r.days().collect::<Vec<_>>(), vec![day]);
    }

    #[test]
    fn horizon_includes_both_ends() {
        let r = DateRange::from_horizon(date(2024, 1, 1), 30).unwrap();
        assert_eq!(r.end(), date(2024, 1, 31));
        assert_eq!(r.num_days(), 31);
        assert_eq!(r.days().count(), 31);
    }

    #[test]
    fn once_ignores_range_width() {
        let anchor = date(2024, 3, 5);
        let rule = ScheduleRule::once(anchor);
        let wide = range(date(2023, 1, 1), date(2025, 12, 31));
        assert_eq!(generate(&rule, &wide).unwrap(), vec![anchor]);
        let elsewhere = range(date(2024, 4, 1), date(2024, 4, 30));
        assert!(generate(&rule, &elsewhere).unwrap().is_empty());
    }

    #[test]
    fn weekly_mondays_in_january_2024() {
        let rule = ScheduleRule::weekly(1, date(2024, 1, 1));
        let got = generate(&rule, &range(date(2024, 1, 1), date(2024, 1, 31))).unwrap();
        assert_eq!(
            got,
            vec![
                date(2024, 1, 1),
                date(2024, 1, 8),
                date(2024, 1, 15),
                date(2024, 1, 22),
                date(2024, 1, 29)
            ]
        );
    }

    #[test]
    fn biweekly_counts_weeks_from_anchor_week() {
        // Anchor on a Wednesday; the Friday of the same week is the first due date.
        let rule = ScheduleRule::biweekly(5, date(2024, 1, 3));
        let got = generate(&rule, &range(date(2024, 1, 1), date(2024, 2, 29))).unwrap();
        assert_eq!(
            got,
            vec![
                date(2024, 1, 5),
                date(2024, 1, 19),
                date(2024, 2, 2),
                date(2024, 2, 16)
            ]
        );
    }

    #[test]
    fn weekly_skips_dates_before_anchor_in_anchor_week() {
        // Anchor on Wednesday; Monday of that week is before the anchor.
        let rule = ScheduleRule::weekly(1, date(2024, 1, 3));
        let got = generate(&rule, &range(date(2024, 1, 1), date(2024, 1, 14))).unwrap();
        assert_eq!(got, vec![date(2024, 1, 8)]);
    }

    #[test]
    fn weekly_on_weekend_with_workday_only_is_empty() {
        let rule = ScheduleRule::weekly(6, date(2024, 1, 1)).workday_only(true);
        let got = generate(&rule, &range(date(2024, 1, 1), date(2024, 3, 31))).unwrap();
        assert!(got.is_empty());
    }

    #[test]
    fn daily_workdays_only_over_one_week() {
        let rule = ScheduleRule::daily(date(2024, 1, 1)).workday_only(true);
        let got = generate(&rule, &range(date(2024, 1, 1), date(2024, 1, 7))).unwrap();
        assert_eq!(got.len(), 5);
        assert!(got.iter().all(|d| is_workday(*d)));
    }

    #[test]
    fn daily_every_two_business_days_crosses_weekend() {
        let rule = ScheduleRule::daily(date(2024, 1, 1))
            .every(2)
            .workday_only(true);
        let got = generate(&rule, &range(date(2024, 1, 1), date(2024, 1, 12))).unwrap();
        // Mon, Wed, Fri, then Tue, Thu of the next week.
        assert_eq!(
            got,
            vec![
                date(2024, 1, 1),
                date(2024, 1, 3),
                date(2024, 1, 5),
                date(2024, 1, 9),
                date(2024, 1, 11)
            ]
        );
    }

    #[test]
    fn daily_every_three_calendar_days() {
        let rule = ScheduleRule::daily(date(2024, 1, 30)).every(3);
        let got = generate(&rule, &range(date(2024, 1, 1), date(2024, 2, 8))).unwrap();
        assert_eq!(
            got,
            vec![date(2024, 1, 30), date(2024, 2, 2), date(2024, 2, 5), date(2024, 2, 8)]
        );
    }

    #[test]
    fn monthly_day_31_skips_short_months() {
        let rule = ScheduleRule::monthly_on_day(31, date(2024, 1, 1));
        let got = generate(&rule, &range(date(2024, 4, 1), date(2024, 4, 30))).unwrap();
        assert!(got.is_empty());

        let got = generate(&rule, &range(date(2024, 1, 1), date(2024, 6, 30))).unwrap();
        assert_eq!(got, vec![date(2024, 1, 31), date(2024, 3, 31), date(2024, 5, 31)]);
    }

    #[test]
    fn monthly_nth_business_day_in_april_2024() {
        let april = range(date(2024, 4, 1), date(2024, 4, 30));
        let anchor = date(2024, 1, 1);
        let first = ScheduleRule::monthly_on_workday(1, anchor);
        let last = ScheduleRule::monthly_on_workday(22, anchor);
        let missing = ScheduleRule::monthly_on_workday(23, anchor);
        assert_eq!(generate(&first, &april).unwrap(), vec![date(2024, 4, 1)]);
        assert_eq!(generate(&last, &april).unwrap(), vec![date(2024, 4, 30)]);
        assert!(generate(&missing, &april).unwrap().is_empty());
    }

    #[test]
    fn quarterly_respects_month_multiple() {
        let rule = ScheduleRule::monthly_on_day(10, date(2024, 1, 1)).every(3);
        let got = generate(&rule, &range(date(2024, 1, 1), date(2024, 12, 31))).unwrap();
        assert_eq!(
            got,
            vec![date(2024, 1, 10), date(2024, 4, 10), date(2024, 7, 10), date(2024, 10, 10)]
        );
    }

    #[test]
    fn monthly_never_precedes_anchor() {
        let rule = ScheduleRule::monthly_on_day(5, date(2024, 1, 15));
        let got = generate(&rule, &range(date(2024, 1, 1), date(2024, 2, 29))).unwrap();
        assert_eq!(got, vec![date(2024, 2, 5)]);
    }

    #[test]
    fn invalid_rule_surfaces_rule_error() {
        let mut rule = ScheduleRule::weekly(1, date(2024, 1, 1));
        rule.weekday = None;
        let err = generate(&rule, &range(date(2024, 1, 1), date(2024, 1, 31))).unwrap_err();
        assert!(matches!(err, RuleError::MissingWeekday { .. }));
    }
}

//! Schedule rule model and validation.

use chrono::{NaiveDate, Weekday};
use serde::{Deserialize, Serialize};

/// Largest value accepted for `day_of_month` (calendar day or Nth business day).
pub const MAX_DAY_OF_MONTH: u8 = 31;

/// Recurrence family of a template.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScheduleKind {
    /// A single due date on the anchor.
    Once,
    /// Every `every` days (or business days when `workday_only`).
    Daily,
    /// On one weekday every `every` weeks.
    Weekly,
    /// On one weekday every `2 * every` weeks.
    Biweekly,
    /// On one day (or Nth business day) every `every` months.
    #[default]
    Monthly,
}

impl ScheduleKind {
    /// Stable lowercase name, as persisted.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Once => "once",
            Self::Daily => "daily",
            Self::Weekly => "weekly",
            Self::Biweekly => "biweekly",
            Self::Monthly => "monthly",
        }
    }
}

impl std::fmt::Display for ScheduleKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ScheduleKind {
    type Err = RuleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "once" => Ok(Self::Once),
            "daily" => Ok(Self::Daily),
            "weekly" => Ok(Self::Weekly),
            "biweekly" => Ok(Self::Biweekly),
            "monthly" => Ok(Self::Monthly),
            other => Err(RuleError::UnknownKind(other.to_owned())),
        }
    }
}

/// A schedule rule is incomplete or inconsistent for its kind.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RuleError {
    /// Weekly/Biweekly rule without a weekday.
    #[error("{kind} rule requires a weekday")]
    MissingWeekday { kind: ScheduleKind },

    /// Weekday outside 0..=6.
    #[error("weekday {0} is out of range (expected 0=Sunday..6=Saturday)")]
    WeekdayOutOfRange(u8),

    /// Monthly rule without a day of month.
    #[error("monthly rule requires a day of month")]
    MissingDayOfMonth,

    /// Day of month outside 1..=31.
    #[error("day of month {0} is out of range (expected 1..=31)")]
    DayOfMonthOutOfRange(u8),

    /// `every` of zero.
    #[error("interval multiplier must be at least 1")]
    ZeroInterval,

    /// Persisted kind name not recognised.
    #[error("unknown schedule kind: {0:?}")]
    UnknownKind(String),
}

fn default_every() -> u32 {
    1
}

/// Recurrence rule attached to a task template.
///
/// Only the fields relevant to `kind` are read: `weekday` for Weekly and
/// Biweekly, `day_of_month` for Monthly. Once ignores both and falls due on
/// `anchor_date` alone.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleRule {
    /// Recurrence family.
    pub kind: ScheduleKind,
    /// Interval multiplier (2 with Monthly = bimonthly).
    #[serde(default = "default_every")]
    pub every: u32,
    /// 0=Sunday..6=Saturday.
    #[serde(default)]
    pub weekday: Option<u8>,
    /// Calendar day, or Nth business day when `workday_only` is set.
    #[serde(default)]
    pub day_of_month: Option<u8>,
    /// Restrict due dates to Monday-Friday.
    #[serde(default)]
    pub workday_only: bool,
    /// Origin of all periodic offsets. Nothing falls due before it.
    pub anchor_date: NaiveDate,
}

impl ScheduleRule {
    fn base(kind: ScheduleKind, anchor_date: NaiveDate) -> Self {
        Self {
            kind,
            every: 1,
            weekday: None,
            day_of_month: None,
            workday_only: false,
            anchor_date,
        }
    }

    /// Single due date on `anchor_date`.
    #[must_use]
    pub fn once(anchor_date: NaiveDate) -> Self {
        Self::base(ScheduleKind::Once, anchor_date)
    }

    /// Every day from `anchor_date`.
    #[must_use]
    pub fn daily(anchor_date: NaiveDate) -> Self {
        Self::base(ScheduleKind::Daily, anchor_date)
    }

    /// Every week on `weekday` (0=Sunday..6=Saturday).
    #[must_use]
    pub fn weekly(weekday: u8, anchor_date: NaiveDate) -> Self {
        Self {
            weekday: Some(weekday),
            ..Self::base(ScheduleKind::Weekly, anchor_date)
        }
    }

    /// Every other week on `weekday` (0=Sunday..6=Saturday).
    #[must_use]
    pub fn biweekly(weekday: u8, anchor_date: NaiveDate) -> Self {
        Self {
            weekday: Some(weekday),
            ..Self::base(ScheduleKind::Biweekly, anchor_date)
        }
    }

    /// Every month on calendar day `day`.
    #[must_use]
    pub fn monthly_on_day(day: u8, anchor_date: NaiveDate) -> Self {
        Self {
            day_of_month: Some(day),
            ..Self::base(ScheduleKind::Monthly, anchor_date)
        }
    }

    /// Every month on the `n`th business day.
    #[must_use]
    pub fn monthly_on_workday(n: u8, anchor_date: NaiveDate) -> Self {
        Self {
            day_of_month: Some(n),
            workday_only: true,
            ..Self::base(ScheduleKind::Monthly, anchor_date)
        }
    }

    /// Set the interval multiplier.
    #[must_use]
    pub fn every(mut self, every: u32) -> Self {
        self.every = every;
        self
    }

    /// Set the business-day restriction.
    #[must_use]
    pub fn workday_only(mut self, workday_only: bool) -> Self {
        self.workday_only = workday_only;
        self
    }

    /// Check the rule against its kind and produce an evaluable [`Recurrence`].
    pub fn compile(&self) -> Result<Recurrence, RuleError> {
        let anchor = self.anchor_date;
        if self.kind == ScheduleKind::Once {
            return Ok(Recurrence::Once { on: anchor });
        }
        if self.every == 0 {
            return Err(RuleError::ZeroInterval);
        }

        match self.kind {
            ScheduleKind::Once => Ok(Recurrence::Once { on: anchor }),
            ScheduleKind::Daily => Ok(Recurrence::Daily {
                anchor,
                every: self.every,
                workday_only: self.workday_only,
            }),
            ScheduleKind::Weekly | ScheduleKind::Biweekly => {
                let raw = self
                    .weekday
                    .ok_or(RuleError::MissingWeekday { kind: self.kind })?;
                let weekday = weekday_from_sunday0(raw).ok_or(RuleError::WeekdayOutOfRange(raw))?;
                let base_weeks = if self.kind == ScheduleKind::Biweekly { 2 } else { 1 };
                Ok(Recurrence::Weekly {
                    anchor,
                    weekday,
                    period_weeks: self.every.saturating_mul(base_weeks),
                    workday_only: self.workday_only,
                })
            }
            ScheduleKind::Monthly => {
                let day = self.day_of_month.ok_or(RuleError::MissingDayOfMonth)?;
                if day == 0 || day > MAX_DAY_OF_MONTH {
                    return Err(RuleError::DayOfMonthOutOfRange(day));
                }
                let day = u32::from(day);
                Ok(Recurrence::Monthly {
                    anchor,
                    every: self.every,
                    day: if self.workday_only {
                        MonthDay::Workday(day)
                    } else {
                        MonthDay::Calendar(day)
                    },
                })
            }
        }
    }
}

impl std::fmt::Display for ScheduleRule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.kind {
            ScheduleKind::Once => write!(f, "once on {}", self.anchor_date),
            ScheduleKind::Daily => {
                let unit = if self.workday_only { "business day" } else { "day" };
                if self.every > 1 {
                    write!(f, "every {} {unit}s", self.every)
                } else {
                    write!(f, "every {unit}")
                }
            }
            ScheduleKind::Weekly | ScheduleKind::Biweekly => {
                let day = self
                    .weekday
                    .and_then(weekday_from_sunday0)
                    .map_or_else(|| "?".to_owned(), |w| format!("{w:?}"));
                let weeks = if self.kind == ScheduleKind::Biweekly {
                    self.every.saturating_mul(2)
                } else {
                    self.every
                };
                if weeks > 1 {
                    write!(f, "every {weeks} weeks on {day}")
                } else {
                    write!(f, "weekly on {day}")
                }
            }
            ScheduleKind::Monthly => {
                let day = self
                    .day_of_month
                    .map_or_else(|| "?".to_owned(), |d| d.to_string());
                let what = if self.workday_only {
                    format!("business day {day}")
                } else {
                    format!("day {day}")
                };
                if self.every > 1 {
                    write!(f, "every {} months on {what}", self.every)
                } else {
                    write!(f, "monthly on {what}")
                }
            }
        }
    }
}

/// Which day of a qualifying month is due.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MonthDay {
    /// Literal calendar day. Months shorter than this produce nothing.
    Calendar(u32),
    /// Nth Monday-Friday day counted from the 1st.
    Workday(u32),
}

/// A validated recurrence, ready for evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Recurrence {
    /// Due only on `on`.
    Once { on: NaiveDate },
    /// Due every `every` days, or business days when `workday_only`.
    Daily {
        anchor: NaiveDate,
        every: u32,
        workday_only: bool,
    },
    /// Due on `weekday` every `period_weeks` Monday-aligned weeks.
    Weekly {
        anchor: NaiveDate,
        weekday: Weekday,
        period_weeks: u32,
        workday_only: bool,
    },
    /// Due on `day` every `every` months.
    Monthly {
        anchor: NaiveDate,
        every: u32,
        day: MonthDay,
    },
}

/// Convert a 0=Sunday..6=Saturday number to a [`Weekday`].
#[must_use]
pub fn weekday_from_sunday0(n: u8) -> Option<Weekday> {
    match n {
        0 => Some(Weekday::Sun),
        1 => Some(Weekday::Mon),
        2 => Some(Weekday::Tue),
        3 => Some(Weekday::Wed),
        4 => Some(Weekday::Thu),
        5 => Some(Weekday::Fri),
        6 => Some(Weekday::Sat),
        _ => None,
    }
}

/// Convert a [`Weekday`] to 0=Sunday..6=Saturday.
#[must_use]
pub fn weekday_to_sunday0(weekday: Weekday) -> u8 {
    // num_days_from_sunday is always 0..=6
    weekday.num_days_from_sunday() as u8
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
    }

    #[test]
    fn weekly_without_weekday_is_rejected() {
        let mut rule = ScheduleRule::weekly(1, date(2024, 1, 1));
        rule.weekday = None;
        assert_eq!(
            rule.compile(),
            Err(RuleError::MissingWeekday {
                kind: ScheduleKind::Weekly
            })
        );
    }

    #[test]
    fn weekday_seven_is_out_of_range() {
        let rule = ScheduleRule::biweekly(7, date(2024, 1, 1));
        assert_eq!(rule.compile(), Err(RuleError::WeekdayOutOfRange(7)));
    }

    #[test]
    fn monthly_day_bounds() {
        let anchor = date(2024, 1, 1);
        assert_eq!(
            ScheduleRule::monthly_on_day(0, anchor).compile(),
            Err(RuleError::DayOfMonthOutOfRange(0))
        );
        assert_eq!(
            ScheduleRule::monthly_on_day(32, anchor).compile(),
            Err(RuleError::DayOfMonthOutOfRange(32))
        );
        assert!(ScheduleRule::monthly_on_day(31, anchor).compile().is_ok());

        let mut missing = ScheduleRule::monthly_on_day(5, anchor);
        missing.day_of_month = None;
        assert_eq!(missing.compile(), Err(RuleError::MissingDayOfMonth));
    }

    #[test]
    fn zero_every_is_rejected_except_for_once() {
        let anchor = date(2024, 1, 1);
        assert_eq!(
            ScheduleRule::daily(anchor).every(0).compile(),
            Err(RuleError::ZeroInterval)
        );
        assert_eq!(
            ScheduleRule::once(anchor).every(0).compile(),
            Ok(Recurrence::Once { on: anchor })
        );
    }

    #[test]
    fn biweekly_doubles_the_period() {
        let anchor = date(2024, 1, 1);
        let compiled = ScheduleRule::biweekly(5, anchor).every(2).compile().unwrap();
        assert_eq!(
            compiled,
            Recurrence::Weekly {
                anchor,
                weekday: Weekday::Fri,
                period_weeks: 4,
                workday_only: false,
            }
        );
    }

    #[test]
    fn workday_only_selects_nth_business_day() {
        let anchor = date(2024, 1, 1);
        let compiled = ScheduleRule::monthly_on_workday(5, anchor).compile().unwrap();
        assert!(matches!(
            compiled,
            Recurrence::Monthly {
                day: MonthDay::Workday(5),
                ..
            }
        ));
    }

    #[test]
    fn weekday_conversion_round_trips() {
        for n in 0..=6u8 {
            let wd = weekday_from_sunday0(n).unwrap();
            assert_eq!(weekday_to_sunday0(wd), n);
        }
        assert_eq!(weekday_from_sunday0(0), Some(Weekday::Sun));
        assert_eq!(weekday_from_sunday0(7), None);
    }

    #[test]
    fn kind_parses_persisted_names() {
        assert_eq!("Biweekly".parse::<ScheduleKind>(), Ok(ScheduleKind::Biweekly));
        assert!(matches!(
            "fortnightly".parse::<ScheduleKind>(),
            Err(RuleError::UnknownKind(_))
        ));
    }

    #[test]
    fn rule_deserializes_with_defaults() {
        let rule: ScheduleRule =
            serde_json::from_str(r#"{"kind":"weekly","weekday":1,"anchor_date":"2024-01-01"}"#)
                .unwrap();
        assert_eq!(rule.every, 1);
        assert!(!rule.workday_only);
        assert_eq!(rule.day_of_month, None);
    }

    #[test]
    fn display_describes_rule() {
        let anchor = date(2024, 1, 1);
        assert_eq!(ScheduleRule::weekly(1, anchor).to_string(), "weekly on Mon");
        assert_eq!(
            ScheduleRule::biweekly(5, anchor).to_string(),
            "every 2 weeks on Fri"
        );
        assert_eq!(
            ScheduleRule::monthly_on_workday(5, anchor).every(3).to_string(),
            "every 3 months on business day 5"
        );
        assert_eq!(ScheduleRule::once(anchor).to_string(), "once on 2024-01-01");
    }
}

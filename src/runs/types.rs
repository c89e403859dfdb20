//! Templates, runs, and the keys that tie them together.

use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use crate::schedule::ScheduleRule;

/// Identifier of a task template.
pub type TemplateId = String;

fn default_true() -> bool {
    true
}

/// A recurring task definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Template {
    /// Store-assigned identifier.
    pub id: TemplateId,
    /// Human-facing code such as `CL-CAP-000001`.
    #[serde(default)]
    pub task_code: Option<String>,
    /// Planner (board) the template belongs to.
    pub planner: String,
    /// Owning sector, if any.
    #[serde(default)]
    pub sector: Option<String>,
    /// Activity title.
    pub title: String,
    /// Recurrence rule.
    pub rule: ScheduleRule,
    /// Inactive templates are never materialized.
    #[serde(default = "default_true")]
    pub active: bool,
}

impl Template {
    /// Create an active template with no sector or task code.
    pub fn new(
        id: impl Into<TemplateId>,
        planner: impl Into<String>,
        title: impl Into<String>,
        rule: ScheduleRule,
    ) -> Self {
        Self {
            id: id.into(),
            task_code: None,
            planner: planner.into(),
            sector: None,
            title: title.into(),
            rule,
            active: true,
        }
    }

    /// Set the sector.
    #[must_use]
    pub fn with_sector(mut self, sector: impl Into<String>) -> Self {
        self.sector = Some(sector.into());
        self
    }
}

/// Template fields supplied by an upsert; the store assigns `id` and `task_code`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewTemplate {
    pub planner: String,
    #[serde(default)]
    pub sector: Option<String>,
    pub title: String,
    pub rule: ScheduleRule,
    #[serde(default = "default_true")]
    pub active: bool,
}

impl NewTemplate {
    /// Build the stored template under `id`.
    pub fn into_template(self, id: impl Into<TemplateId>, task_code: Option<String>) -> Template {
        Template {
            id: id.into(),
            task_code,
            planner: self.planner,
            sector: self.sector,
            title: self.title,
            rule: self.rule,
            active: self.active,
        }
    }
}

/// Scopes template and run queries.
///
/// Passed explicitly on every call instead of living in ambient state.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemplateFilter {
    /// Restrict to one planner (case-insensitive).
    pub planner: Option<String>,
    /// Also return inactive templates.
    pub include_inactive: bool,
}

impl TemplateFilter {
    /// Active templates of every planner.
    #[must_use]
    pub fn active() -> Self {
        Self::default()
    }

    /// Active templates of one planner.
    #[must_use]
    pub fn for_planner(planner: impl Into<String>) -> Self {
        Self {
            planner: Some(planner.into()),
            include_inactive: false,
        }
    }

    /// Returns `true` if `template` passes the planner filter, ignoring `active`.
    #[must_use]
    pub fn matches_planner(&self, template: &Template) -> bool {
        match &self.planner {
            Some(p) => p.trim().eq_ignore_ascii_case(template.planner.trim()),
            None => true,
        }
    }

    /// Returns `true` if `template` passes the filter.
    #[must_use]
    pub fn matches(&self, template: &Template) -> bool {
        (self.include_inactive || template.active) && self.matches_planner(template)
    }
}

/// Uniqueness key of a run: at most one run per template and due date.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RunKey {
    pub template_id: TemplateId,
    pub due_date: NaiveDate,
}

impl RunKey {
    pub fn new(template_id: impl Into<TemplateId>, due_date: NaiveDate) -> Self {
        Self {
            template_id: template_id.into(),
            due_date,
        }
    }
}

impl std::fmt::Display for RunKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}|{}", self.template_id, self.due_date)
    }
}

/// Workflow status of a run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    #[default]
    Open,
    InProgress,
    Done,
}

impl RunStatus {
    /// Stable lowercase name, as persisted.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Open => "open",
            Self::InProgress => "in_progress",
            Self::Done => "done",
        }
    }
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.pad(self.as_str())
    }
}

impl std::str::FromStr for RunStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "open" => Ok(Self::Open),
            "in_progress" | "in-progress" | "doing" => Ok(Self::InProgress),
            "done" => Ok(Self::Done),
            other => Err(format!("unknown run status: {other:?}")),
        }
    }
}

/// Where a run stands relative to its due date.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DueState {
    /// Not done, due date still ahead.
    Upcoming,
    /// Not done, due today.
    DueToday,
    /// Not done, due date passed.
    Overdue,
    /// Done on or before the due date.
    Done,
    /// Done after the due date.
    DoneLate,
}

impl std::fmt::Display for DueState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.pad(match self {
            Self::Upcoming => "upcoming",
            Self::DueToday => "due today",
            Self::Overdue => "overdue",
            Self::Done => "done",
            Self::DoneLate => "done late",
        })
    }
}

/// A run waiting to be inserted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewRun {
    pub template_id: TemplateId,
    pub due_date: NaiveDate,
    pub start_date: Option<NaiveDate>,
    pub status: RunStatus,
    pub done_at: Option<DateTime<Utc>>,
    pub notes: Option<String>,
}

impl NewRun {
    /// Open run with no notes, as produced by materialization.
    pub fn open(template_id: impl Into<TemplateId>, due_date: NaiveDate) -> Self {
        Self {
            template_id: template_id.into(),
            due_date,
            start_date: None,
            status: RunStatus::Open,
            done_at: None,
            notes: None,
        }
    }

    #[must_use]
    pub fn key(&self) -> RunKey {
        RunKey::new(self.template_id.clone(), self.due_date)
    }
}

/// A persisted occurrence of a template on one due date.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Run {
    pub id: String,
    pub template_id: TemplateId,
    pub due_date: NaiveDate,
    pub start_date: Option<NaiveDate>,
    pub status: RunStatus,
    /// Set exactly when `status` is [`RunStatus::Done`].
    pub done_at: Option<DateTime<Utc>>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Run {
    /// Materialize a [`NewRun`] under the given id.
    ///
    /// A `Done` run without a completion time is stamped with `created_at`;
    /// any other status drops `done_at`.
    pub fn from_new(new: NewRun, id: impl Into<String>, created_at: DateTime<Utc>) -> Self {
        let done_at = match new.status {
            RunStatus::Done => Some(new.done_at.unwrap_or(created_at)),
            RunStatus::Open | RunStatus::InProgress => None,
        };
        Self {
            id: id.into(),
            template_id: new.template_id,
            due_date: new.due_date,
            start_date: new.start_date,
            status: new.status,
            done_at,
            notes: new.notes,
            created_at,
        }
    }

    #[must_use]
    pub fn key(&self) -> RunKey {
        RunKey::new(self.template_id.clone(), self.due_date)
    }

    /// Move to `status`, keeping `done_at` consistent.
    pub fn set_status(&mut self, status: RunStatus, at: DateTime<Utc>) {
        match status {
            RunStatus::Done => {
                if self.status != RunStatus::Done {
                    self.done_at = Some(at);
                }
            }
            RunStatus::Open | RunStatus::InProgress => self.done_at = None,
        }
        self.status = status;
    }

    /// Mark done at `at`.
    pub fn complete(&mut self, at: DateTime<Utc>) {
        self.set_status(RunStatus::Done, at);
    }

    /// Back to open, clearing the completion time.
    pub fn reopen(&mut self) {
        self.status = RunStatus::Open;
        self.done_at = None;
    }

    /// Mark in progress.
    pub fn start(&mut self) {
        self.status = RunStatus::InProgress;
        self.done_at = None;
    }

    /// Complete an unfinished run, or reopen a done one.
    pub fn toggle_done(&mut self, at: DateTime<Utc>) {
        if self.status == RunStatus::Done {
            self.reopen();
        } else {
            self.complete(at);
        }
    }

    /// Position relative to the due date as seen on `today`.
    ///
    /// `today` and the completion date are both read in `tz`, the zone the
    /// user works in.
    #[must_use]
    pub fn due_state<Tz: TimeZone>(&self, today: NaiveDate, tz: &Tz) -> DueState {
        if self.status == RunStatus::Done {
            return match self.done_at {
                Some(at) if at.with_timezone(tz).date_naive() > self.due_date => {
                    DueState::DoneLate
                }
                _ => DueState::Done,
            };
        }
        match today.cmp(&self.due_date) {
            std::cmp::Ordering::Less => DueState::Upcoming,
            std::cmp::Ordering::Equal => DueState::DueToday,
            std::cmp::Ordering::Greater => DueState::Overdue,
        }
    }
}

//! Persistence boundary consumed by the run materializer.

use std::collections::HashSet;

use chrono::NaiveDate;

use super::types::{NewRun, RunKey, RunStatus, Template, TemplateFilter};
use crate::schedule::DateRange;

/// The run store rejected a read or write.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// SQLite error.
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// Filesystem error while opening the store.
    #[error("I/O error: {0}")]
    Io(String),

    /// Row with the given id does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// A previous holder of the store lock panicked.
    #[error("store lock poisoned")]
    Poisoned,

    /// Write refused by the backend (constraint, connectivity, payload limits).
    #[error("write rejected: {0}")]
    Rejected(String),
}

/// Result of submitting one batch of runs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize)]
pub struct InsertOutcome {
    /// Rows written.
    pub inserted: usize,
    /// Rows skipped because their `(template_id, due_date)` already existed.
    pub ignored: usize,
}

impl InsertOutcome {
    /// Sum two outcomes.
    #[must_use]
    pub fn merge(self, other: Self) -> Self {
        Self {
            inserted: self.inserted + other.inserted,
            ignored: self.ignored + other.ignored,
        }
    }
}

/// Store operations needed to materialize runs.
///
/// `insert_runs` is insert-if-absent: a run whose `(template_id, due_date)`
/// already exists is skipped and counted in [`InsertOutcome::ignored`],
/// never overwritten. The store is the final arbiter of that uniqueness;
/// callers' own existence checks are only an optimization.
pub trait RunStore {
    /// Templates passing `filter`.
    fn list_templates(&self, filter: &TemplateFilter) -> Result<Vec<Template>, StoreError>;

    /// Keys of runs due within `range` whose template passes the planner filter.
    fn list_existing_run_keys(
        &self,
        range: &DateRange,
        filter: &TemplateFilter,
    ) -> Result<HashSet<RunKey>, StoreError>;

    /// Insert one batch. Either the whole batch is applied or none of it.
    fn insert_runs(&self, batch: &[NewRun]) -> Result<InsertOutcome, StoreError>;
}

/// Selection of runs for listing, counting, and manual bulk deletion.
///
/// Bounds are inclusive; `None` leaves that side open.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunQuery {
    pub filter: TemplateFilter,
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
    pub status: Option<RunStatus>,
}

impl RunQuery {
    /// Runs of every planner, any date, any status.
    #[must_use]
    pub fn all() -> Self {
        Self {
            filter: TemplateFilter {
                planner: None,
                include_inactive: true,
            },
            ..Self::default()
        }
    }

    /// Restrict to due dates within `range`.
    #[must_use]
    pub fn within(mut self, range: &DateRange) -> Self {
        self.from = Some(range.start());
        self.to = Some(range.end());
        self
    }

    /// Restrict to one planner.
    #[must_use]
    pub fn planner(mut self, planner: impl Into<String>) -> Self {
        self.filter.planner = Some(planner.into());
        self
    }

    /// Restrict to one status.
    #[must_use]
    pub fn status(mut self, status: RunStatus) -> Self {
        self.status = Some(status);
        self
    }

    /// Returns `true` if a run due on `due_date` with `status` is selected.
    /// The planner filter is checked separately against the template.
    #[must_use]
    pub fn matches_run(&self, due_date: NaiveDate, status: RunStatus) -> bool {
        self.from.is_none_or(|from| due_date >= from)
            && self.to.is_none_or(|to| due_date <= to)
            && self.status.is_none_or(|s| s == status)
    }
}

//! In-memory run store.
//!
//! Holds templates and runs behind mutexes with the same insert-if-absent
//! semantics as [`SqliteRunStore`](super::sqlite::SqliteRunStore). Used as
//! the test double for the materializer and for embedding without a database.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Utc};

use super::store::{InsertOutcome, RunQuery, RunStore, StoreError};
use super::types::{NewRun, Run, RunKey, RunStatus, Template, TemplateFilter, TemplateId};
use crate::schedule::DateRange;

/// Mutex-guarded in-memory store.
#[derive(Debug, Default)]
pub struct MemoryRunStore {
    templates: Mutex<Vec<Template>>,
    runs: Mutex<BTreeMap<RunKey, Run>>,
}

impl MemoryRunStore {
    /// Empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Store preloaded with `templates`.
    #[must_use]
    pub fn with_templates(templates: Vec<Template>) -> Self {
        Self {
            templates: Mutex::new(templates),
            runs: Mutex::new(BTreeMap::new()),
        }
    }

    fn templates(&self) -> Result<MutexGuard<'_, Vec<Template>>, StoreError> {
        self.templates.lock().map_err(|_| StoreError::Poisoned)
    }

    fn runs(&self) -> Result<MutexGuard<'_, BTreeMap<RunKey, Run>>, StoreError> {
        self.runs.lock().map_err(|_| StoreError::Poisoned)
    }

    /// Insert or replace a template by id.
    pub fn upsert_template(&self, template: Template) -> Result<(), StoreError> {
        let mut templates = self.templates()?;
        match templates.iter_mut().find(|t| t.id == template.id) {
            Some(existing) => *existing = template,
            None => templates.push(template),
        }
        Ok(())
    }

    /// Snapshot of runs selected by `query`, ordered by due date.
    pub fn list_runs(&self, query: &RunQuery) -> Result<Vec<Run>, StoreError> {
        let planners = self.template_planner_matches(&query.filter)?;
        let mut runs: Vec<Run> = self
            .runs()?
            .values()
            .filter(|r| query.matches_run(r.due_date, r.status))
            .filter(|r| planners.get(&r.template_id).copied().unwrap_or(false))
            .cloned()
            .collect();
        runs.sort_by(|a, b| {
            a.due_date
                .cmp(&b.due_date)
                .then_with(|| a.template_id.cmp(&b.template_id))
        });
        Ok(runs)
    }

    /// Run stored under `key`, if any.
    pub fn get_run(&self, key: &RunKey) -> Result<Option<Run>, StoreError> {
        Ok(self.runs()?.get(key).cloned())
    }

    /// Change a run's status, keeping `done_at` consistent.
    pub fn set_run_status(
        &self,
        run_id: &str,
        status: RunStatus,
        at: DateTime<Utc>,
    ) -> Result<Run, StoreError> {
        self.update_run(run_id, |run| run.set_status(status, at))
    }

    /// Replace a run's notes.
    pub fn set_run_notes(&self, run_id: &str, notes: Option<String>) -> Result<Run, StoreError> {
        self.update_run(run_id, |run| run.notes = notes)
    }

    fn update_run(&self, run_id: &str, f: impl FnOnce(&mut Run)) -> Result<Run, StoreError> {
        let mut runs = self.runs()?;
        let run = runs
            .values_mut()
            .find(|r| r.id == run_id)
            .ok_or_else(|| StoreError::NotFound(run_id.to_owned()))?;
        f(run);
        Ok(run.clone())
    }

    /// Delete runs selected by `query`. Returns the number removed.
    pub fn delete_runs(&self, query: &RunQuery) -> Result<usize, StoreError> {
        let planners = self.template_planner_matches(&query.filter)?;
        let mut runs = self.runs()?;
        let before = runs.len();
        runs.retain(|_, r| {
            let selected = query.matches_run(r.due_date, r.status)
                && planners.get(&r.template_id).copied().unwrap_or(false);
            !selected
        });
        Ok(before - runs.len())
    }

    fn template_planner_matches(
        &self,
        filter: &TemplateFilter,
    ) -> Result<HashMap<TemplateId, bool>, StoreError> {
        Ok(self
            .templates()?
            .iter()
            .map(|t| (t.id.clone(), filter.matches_planner(t)))
            .collect())
    }
}

impl RunStore for MemoryRunStore {
    fn list_templates(&self, filter: &TemplateFilter) -> Result<Vec<Template>, StoreError> {
        Ok(self
            .templates()?
            .iter()
            .filter(|t| filter.matches(t))
            .cloned()
            .collect())
    }

    fn list_existing_run_keys(
        &self,
        range: &DateRange,
        filter: &TemplateFilter,
    ) -> Result<HashSet<RunKey>, StoreError> {
        let planners = self.template_planner_matches(filter)?;
        Ok(self
            .runs()?
            .keys()
            .filter(|k| range.contains(k.due_date))
            .filter(|k| planners.get(&k.template_id).copied().unwrap_or(false))
            .cloned()
            .collect())
    }

    fn insert_runs(&self, batch: &[NewRun]) -> Result<InsertOutcome, StoreError> {
        let known: HashSet<TemplateId> = self.templates()?.iter().map(|t| t.id.clone()).collect();
        if let Some(orphan) = batch.iter().find(|r| !known.contains(&r.template_id)) {
            return Err(StoreError::Rejected(format!(
                "unknown template {}",
                orphan.template_id
            )));
        }

        let mut runs = self.runs()?;
        let now = Utc::now();
        let mut outcome = InsertOutcome::default();
        for new in batch {
            let key = new.key();
            if runs.contains_key(&key) {
                outcome.ignored += 1;
                continue;
            }
            let run = Run::from_new(new.clone(), uuid::Uuid::new_v4().to_string(), now);
            runs.insert(key, run);
            outcome.inserted += 1;
        }
        Ok(outcome)
    }
}

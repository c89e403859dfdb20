//! Run materialization: turn due dates into persisted runs, additively.
//!
//! [`plan_runs`] is the pure reconciliation step. [`RunGenerator`] wraps it
//! with the store reads and the batched, insert-if-absent writes.

use std::collections::HashSet;

use serde::Serialize;
use tracing::{debug, error, info, warn};

use super::store::{InsertOutcome, RunStore};
use super::types::{NewRun, RunKey, Template, TemplateFilter, TemplateId};
use crate::config::GenerationConfig;
use crate::error::{ControlError, Result};
use crate::schedule::{DateRange, RuleError};

/// Runs submitted to the store per insert call.
pub const DEFAULT_BATCH_SIZE: usize = 200;

/// Widest generation window, in days past the start date.
pub const DEFAULT_MAX_HORIZON_DAYS: u32 = 365;

/// A template left out of a pass because its rule does not compile.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedTemplate {
    pub template_id: TemplateId,
    #[serde(serialize_with = "serialize_display")]
    pub error: RuleError,
}

fn serialize_display<S: serde::Serializer>(
    err: &RuleError,
    serializer: S,
) -> std::result::Result<S::Ok, S::Error> {
    serializer.collect_str(err)
}

/// Outcome of reconciling occurrences against existing runs.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunPlan {
    /// New open runs, ordered by due date then template id.
    pub inserts: Vec<NewRun>,
    /// Templates whose rule failed validation.
    pub skipped: Vec<SkippedTemplate>,
    /// Occurrences that already had a run.
    pub already_present: usize,
}

/// Decide which runs to create for `templates` over `range`.
///
/// Inactive templates are ignored. Every occurrence whose
/// `(template_id, due_date)` is not in `existing` becomes an open run with
/// no notes. A template with an invalid rule is skipped with a warning and
/// reported in [`RunPlan::skipped`]; the rest of the pass continues.
#[must_use]
pub fn plan_runs(
    templates: &[Template],
    existing: &HashSet<RunKey>,
    range: &DateRange,
) -> RunPlan {
    let mut plan = RunPlan::default();

    for template in templates.iter().filter(|t| t.active) {
        let recurrence = match template.rule.compile() {
            Ok(r) => r,
            Err(err) => {
                warn!(
                    template_id = %template.id,
                    error = %err,
                    "skipping template with invalid schedule"
                );
                plan.skipped.push(SkippedTemplate {
                    template_id: template.id.clone(),
                    error: err,
                });
                continue;
            }
        };

        for due in recurrence.occurrences(range) {
            let key = RunKey::new(template.id.clone(), due);
            if existing.contains(&key) {
                plan.already_present += 1;
            } else {
                plan.inserts.push(NewRun::open(key.template_id, due));
            }
        }
    }

    plan.inserts.sort_by(|a, b| {
        a.due_date
            .cmp(&b.due_date)
            .then_with(|| a.template_id.cmp(&b.template_id))
    });
    plan
}

/// Summary of one generation pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GenerationReport {
    pub range: DateRange,
    /// Templates returned by the store for the filter.
    pub templates: usize,
    /// Runs the pass decided to insert.
    pub planned: usize,
    /// Runs written by the store.
    pub inserted: usize,
    /// Planned runs the store already had (a concurrent pass won the race).
    pub ignored: usize,
    /// Occurrences that already had a run before the pass.
    pub already_present: usize,
    /// Insert calls made.
    pub batches: usize,
    pub skipped: Vec<SkippedTemplate>,
}

/// Materializes runs into a [`RunStore`] in bounded batches.
pub struct RunGenerator<'a, S: RunStore + ?Sized> {
    store: &'a S,
    batch_size: usize,
    max_horizon_days: u32,
}

impl<'a, S: RunStore + ?Sized> RunGenerator<'a, S> {
    /// Generator with the default batch size and horizon limit.
    pub fn new(store: &'a S) -> Self {
        Self {
            store,
            batch_size: DEFAULT_BATCH_SIZE,
            max_horizon_days: DEFAULT_MAX_HORIZON_DAYS,
        }
    }

    /// Generator configured from the `[generation]` section.
    pub fn from_config(store: &'a S, config: &GenerationConfig) -> Self {
        Self::new(store)
            .with_batch_size(config.batch_size)
            .with_max_horizon_days(config.max_horizon_days)
    }

    /// Set the insert chunk size (at least one).
    #[must_use]
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    /// Set the widest accepted range, in days past its start.
    #[must_use]
    pub fn with_max_horizon_days(mut self, days: u32) -> Self {
        self.max_horizon_days = days;
        self
    }

    #[must_use]
    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    fn check_range(&self, range: &DateRange) -> Result<()> {
        let span = range.num_days() - 1;
        if span > i64::from(self.max_horizon_days) {
            return Err(ControlError::Range(format!(
                "range {range} spans {span} days, limit is {}",
                self.max_horizon_days
            )));
        }
        Ok(())
    }

    /// Compute the runs a pass would insert without writing anything.
    ///
    /// # Errors
    ///
    /// [`ControlError::Range`] when `range` exceeds the horizon limit, or
    /// [`ControlError::Store`] when a store read fails.
    pub fn plan(&self, filter: &TemplateFilter, range: &DateRange) -> Result<(usize, RunPlan)> {
        self.check_range(range)?;
        let templates = self.store.list_templates(filter)?;
        let existing = self.store.list_existing_run_keys(range, filter)?;
        debug!(
            templates = templates.len(),
            existing = existing.len(),
            %range,
            "loaded generation inputs"
        );
        Ok((templates.len(), plan_runs(&templates, &existing, range)))
    }

    /// Materialize every missing run for the templates passing `filter`.
    ///
    /// # Errors
    ///
    /// [`ControlError::Range`] before any work when `range` is too wide,
    /// [`ControlError::Store`] when a read fails, and
    /// [`ControlError::BatchInsert`] when a batch is rejected. Batches
    /// committed before the failure stay committed.
    pub fn generate(&self, filter: &TemplateFilter, range: &DateRange) -> Result<GenerationReport> {
        let (templates, plan) = self.plan(filter, range)?;
        let planned = plan.inserts.len();
        let batches = planned.div_ceil(self.batch_size);
        let outcome = self.insert_batched(plan.inserts)?;

        info!(
            %range,
            templates,
            planned,
            inserted = outcome.inserted,
            ignored = outcome.ignored,
            already_present = plan.already_present,
            skipped = plan.skipped.len(),
            "generation pass complete"
        );

        Ok(GenerationReport {
            range: *range,
            templates,
            planned,
            inserted: outcome.inserted,
            ignored: outcome.ignored,
            already_present: plan.already_present,
            batches,
            skipped: plan.skipped,
        })
    }

    /// Submit `runs` in chunks of [`batch_size`](Self::batch_size).
    ///
    /// Stops at the first rejected batch. The error carries that batch and
    /// every later run so the caller can retry them.
    ///
    /// # Errors
    ///
    /// [`ControlError::BatchInsert`] when the store rejects a batch.
    pub fn insert_batched(&self, runs: Vec<NewRun>) -> Result<InsertOutcome> {
        let total = runs.len();
        let mut outcome = InsertOutcome::default();
        let mut offset = 0;
        let mut batch_no = 0;

        while offset < total {
            batch_no += 1;
            let end = (offset + self.batch_size).min(total);
            match self.store.insert_runs(&runs[offset..end]) {
                Ok(done) => {
                    debug!(
                        batch = batch_no,
                        inserted = done.inserted,
                        ignored = done.ignored,
                        progress = end,
                        total,
                        "inserted run batch"
                    );
                    outcome = outcome.merge(done);
                    offset = end;
                }
                Err(source) => {
                    error!(
                        batch = batch_no,
                        committed = outcome.inserted,
                        pending = total - offset,
                        error = %source,
                        "run batch insert failed"
                    );
                    let mut runs = runs;
                    let remaining = runs.split_off(offset);
                    return Err(ControlError::BatchInsert {
                        committed: outcome.inserted,
                        remaining,
                        source,
                    });
                }
            }
        }
        Ok(outcome)
    }
}

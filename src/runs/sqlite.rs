//! SQLite-backed run store.
//!
//! One database file holds templates, runs, and the task-code counters.
//! The `UNIQUE(template_id, due_date)` constraint on `task_runs` is what
//! makes concurrent generation passes safe: inserts use
//! `ON CONFLICT DO NOTHING`, so a second writer can never overwrite or
//! duplicate a run.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::types::Type;
use rusqlite::{Connection, OptionalExtension, params};

use super::schema::{apply_schema, read_schema_version};
use super::store::{InsertOutcome, RunQuery, RunStore, StoreError};
use super::types::{NewRun, NewTemplate, Run, RunKey, RunStatus, Template, TemplateFilter};
use crate::import::task_code_prefix;
use crate::schedule::{DateRange, ScheduleKind, ScheduleRule};

const TEMPLATE_COLUMNS: &str = "id, task_code, planner, sector, title, schedule_kind, every, \
     weekday, day_of_month, workday_only, anchor_date, active";

const RUN_COLUMNS: &str =
    "r.id, r.template_id, r.due_date, r.start_date, r.status, r.done_at, r.notes, r.created_at";

/// Shared WHERE clause for [`RunQuery`]; parameters are
/// `from, to, status, planner` in that order.
const RUN_QUERY_WHERE: &str = "(?1 IS NULL OR r.due_date >= ?1) \
     AND (?2 IS NULL OR r.due_date <= ?2) \
     AND (?3 IS NULL OR r.status = ?3) \
     AND (?4 IS NULL OR t.planner = ?4)";

/// SQLite run store.
///
/// Thread-safe via an internal `Mutex<Connection>`; every operation holds
/// the lock for its whole duration.
pub struct SqliteRunStore {
    path: Option<PathBuf>,
    conn: Mutex<Connection>,
}

impl SqliteRunStore {
    /// Open (or create) the database at `path`, creating parent directories
    /// and applying the schema.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| StoreError::Io(e.to_string()))?;
        }
        let conn = Connection::open(path)?;
        apply_schema(&conn)?;
        tracing::debug!(path = %path.display(), "opened run store");
        Ok(Self {
            path: Some(path.to_path_buf()),
            conn: Mutex::new(conn),
        })
    }

    /// Fresh in-memory database.
    pub fn open_in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        apply_schema(&conn)?;
        Ok(Self {
            path: None,
            conn: Mutex::new(conn),
        })
    }

    /// Database file, or `None` for an in-memory store.
    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Schema version recorded in the database.
    pub fn schema_version(&self) -> Result<Option<u32>, StoreError> {
        let conn = self.lock()?;
        Ok(read_schema_version(&conn)?)
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, StoreError> {
        self.conn.lock().map_err(|_| StoreError::Poisoned)
    }

    /// Insert a template, or update the schedule and `active` flag of the
    /// existing one with the same planner, sector, and title.
    ///
    /// New templates get a fresh id and the next task code for their
    /// planner/sector prefix. Existing ids and task codes never change.
    pub fn upsert_template(&self, draft: NewTemplate) -> Result<Template, StoreError> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;

        let planner = draft.planner.trim().to_owned();
        let sector = draft.sector.as_deref().map(str::trim).unwrap_or_default().to_owned();
        let title = draft.title.trim().to_owned();
        let rule = &draft.rule;

        let existing: Option<(String, Option<String>)> = tx
            .query_row(
                "SELECT id, task_code FROM task_templates \
                 WHERE planner = ?1 AND sector = ?2 AND title = ?3",
                params![planner, sector, title],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;

        let (id, task_code) = match existing {
            Some((id, task_code)) => {
                tx.execute(
                    "UPDATE task_templates SET schedule_kind = ?1, every = ?2, weekday = ?3, \
                     day_of_month = ?4, workday_only = ?5, anchor_date = ?6, active = ?7 \
                     WHERE id = ?8",
                    params![
                        rule.kind.as_str(),
                        rule.every,
                        rule.weekday,
                        rule.day_of_month,
                        rule.workday_only,
                        rule.anchor_date,
                        draft.active,
                        id
                    ],
                )?;
                (id, task_code)
            }
            None => {
                let prefix = task_code_prefix(&planner, &sector);
                let number: i64 = tx.query_row(
                    "INSERT INTO task_code_counters (prefix, last_number) VALUES (?1, 1) \
                     ON CONFLICT(prefix) DO UPDATE SET last_number = last_number + 1 \
                     RETURNING last_number",
                    params![prefix],
                    |row| row.get(0),
                )?;
                let code = format!("{prefix}-{number:06}");
                let id = uuid::Uuid::new_v4().to_string();
                tx.execute(
                    &format!(
                        "INSERT INTO task_templates ({TEMPLATE_COLUMNS}) \
                         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)"
                    ),
                    params![
                        id,
                        code,
                        planner,
                        sector,
                        title,
                        rule.kind.as_str(),
                        rule.every,
                        rule.weekday,
                        rule.day_of_month,
                        rule.workday_only,
                        rule.anchor_date,
                        draft.active
                    ],
                )?;
                tracing::debug!(%id, task_code = %code, "inserted template");
                (id, Some(code))
            }
        };
        tx.commit()?;

        let sector = (!sector.is_empty()).then_some(sector);
        Ok(NewTemplate {
            planner,
            sector,
            title,
            ..draft
        }
        .into_template(id, task_code))
    }

    /// Template by id.
    pub fn get_template(&self, id: &str) -> Result<Option<Template>, StoreError> {
        let conn = self.lock()?;
        Ok(conn
            .query_row(
                &format!("SELECT {TEMPLATE_COLUMNS} FROM task_templates WHERE id = ?1"),
                params![id],
                row_to_template,
            )
            .optional()?)
    }

    /// Enable or disable materialization of a template.
    pub fn set_template_active(&self, id: &str, active: bool) -> Result<(), StoreError> {
        let conn = self.lock()?;
        let rows = conn.execute(
            "UPDATE task_templates SET active = ?1 WHERE id = ?2",
            params![active, id],
        )?;
        if rows == 0 {
            return Err(StoreError::NotFound(id.to_owned()));
        }
        Ok(())
    }

    /// Runs selected by `query`, ordered by due date then template.
    pub fn list_runs(&self, query: &RunQuery) -> Result<Vec<Run>, StoreError> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {RUN_COLUMNS} FROM task_runs r \
             JOIN task_templates t ON t.id = r.template_id \
             WHERE {RUN_QUERY_WHERE} ORDER BY r.due_date, t.planner, t.title"
        ))?;
        let bind = run_query_params(query);
        let rows = stmt.query_map(&bind.as_params()[..], row_to_run)?;
        let mut runs = Vec::new();
        for r in rows {
            runs.push(r?);
        }
        Ok(runs)
    }

    /// Number of runs selected by `query`.
    pub fn count_runs(&self, query: &RunQuery) -> Result<usize, StoreError> {
        let conn = self.lock()?;
        let bind = run_query_params(query);
        let count: i64 = conn.query_row(
            &format!(
                "SELECT COUNT(*) FROM task_runs r \
                 JOIN task_templates t ON t.id = r.template_id \
                 WHERE {RUN_QUERY_WHERE}"
            ),
            &bind.as_params()[..],
            |row| row.get(0),
        )?;
        Ok(usize::try_from(count).unwrap_or(0))
    }

    /// Delete runs selected by `query`. Returns the number removed.
    ///
    /// Manual bulk clean-up only; generation never deletes.
    pub fn delete_runs(&self, query: &RunQuery) -> Result<usize, StoreError> {
        let conn = self.lock()?;
        let bind = run_query_params(query);
        let removed = conn.execute(
            &format!(
                "DELETE FROM task_runs WHERE id IN (\
                 SELECT r.id FROM task_runs r \
                 JOIN task_templates t ON t.id = r.template_id \
                 WHERE {RUN_QUERY_WHERE})"
            ),
            &bind.as_params()[..],
        )?;
        tracing::info!(removed, "deleted runs");
        Ok(removed)
    }

    /// Run stored under `key`, if any.
    pub fn get_run(&self, key: &RunKey) -> Result<Option<Run>, StoreError> {
        let conn = self.lock()?;
        Ok(conn
            .query_row(
                &format!(
                    "SELECT {RUN_COLUMNS} FROM task_runs r \
                     WHERE r.template_id = ?1 AND r.due_date = ?2"
                ),
                params![key.template_id, key.due_date],
                row_to_run,
            )
            .optional()?)
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
        let conn = self.lock()?;
        let mut run = conn
            .query_row(
                &format!("SELECT {RUN_COLUMNS} FROM task_runs r WHERE r.id = ?1"),
                params![run_id],
                row_to_run,
            )
            .optional()?
            .ok_or_else(|| StoreError::NotFound(run_id.to_owned()))?;
        f(&mut run);
        conn.execute(
            "UPDATE task_runs SET status = ?1, done_at = ?2, notes = ?3, start_date = ?4 \
             WHERE id = ?5",
            params![
                run.status.as_str(),
                run.done_at,
                run.notes,
                run.start_date,
                run.id
            ],
        )?;
        Ok(run)
    }
}

impl RunStore for SqliteRunStore {
    fn list_templates(&self, filter: &TemplateFilter) -> Result<Vec<Template>, StoreError> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {TEMPLATE_COLUMNS} FROM task_templates \
             WHERE (?1 IS NULL OR planner = ?1) AND (?2 OR active = 1) \
             ORDER BY planner, sector, title"
        ))?;
        let planner = filter.planner.as_deref().map(str::trim);
        let rows = stmt.query_map(params![planner, filter.include_inactive], row_to_template)?;
        let mut templates = Vec::new();
        for r in rows {
            templates.push(r?);
        }
        Ok(templates)
    }

    fn list_existing_run_keys(
        &self,
        range: &DateRange,
        filter: &TemplateFilter,
    ) -> Result<HashSet<RunKey>, StoreError> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT r.template_id, r.due_date FROM task_runs r \
             JOIN task_templates t ON t.id = r.template_id \
             WHERE r.due_date BETWEEN ?1 AND ?2 AND (?3 IS NULL OR t.planner = ?3)",
        )?;
        let planner = filter.planner.as_deref().map(str::trim);
        let rows = stmt.query_map(params![range.start(), range.end(), planner], |row| {
            Ok(RunKey::new(row.get::<_, String>(0)?, row.get::<_, NaiveDate>(1)?))
        })?;
        let mut keys = HashSet::new();
        for r in rows {
            keys.insert(r?);
        }
        Ok(keys)
    }

    fn insert_runs(&self, batch: &[NewRun]) -> Result<InsertOutcome, StoreError> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        let now = Utc::now();
        let mut outcome = InsertOutcome::default();
        {
            let mut stmt = tx.prepare(
                "INSERT INTO task_runs \
                 (id, template_id, due_date, start_date, status, done_at, notes, created_at) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8) \
                 ON CONFLICT(template_id, due_date) DO NOTHING",
            )?;
            for new in batch {
                let run = Run::from_new(new.clone(), uuid::Uuid::new_v4().to_string(), now);
                let written = stmt.execute(params![
                    run.id,
                    run.template_id,
                    run.due_date,
                    run.start_date,
                    run.status.as_str(),
                    run.done_at,
                    run.notes,
                    run.created_at
                ])?;
                if written == 0 {
                    outcome.ignored += 1;
                } else {
                    outcome.inserted += 1;
                }
            }
        }
        tx.commit()?;
        Ok(outcome)
    }
}

/// Owned bind values for [`RUN_QUERY_WHERE`].
struct RunQueryParams {
    from: Option<NaiveDate>,
    to: Option<NaiveDate>,
    status: Option<&'static str>,
    planner: Option<String>,
}

impl RunQueryParams {
    fn as_params(&self) -> [&dyn rusqlite::ToSql; 4] {
        [&self.from, &self.to, &self.status, &self.planner]
    }
}

fn run_query_params(query: &RunQuery) -> RunQueryParams {
    RunQueryParams {
        from: query.from,
        to: query.to,
        status: query.status.map(RunStatus::as_str),
        planner: query.filter.planner.as_deref().map(|p| p.trim().to_owned()),
    }
}

fn conversion_error(
    idx: usize,
    err: impl Into<Box<dyn std::error::Error + Send + Sync>>,
) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, err.into())
}

fn row_to_template(row: &rusqlite::Row<'_>) -> rusqlite::Result<Template> {
    let sector: String = row.get(3)?;
    let kind_str: String = row.get(5)?;
    let kind: ScheduleKind = kind_str.parse().map_err(|e| conversion_error(5, e))?;
    Ok(Template {
        id: row.get(0)?,
        task_code: row.get(1)?,
        planner: row.get(2)?,
        sector: (!sector.is_empty()).then_some(sector),
        title: row.get(4)?,
        rule: ScheduleRule {
            kind,
            every: row.get(6)?,
            weekday: row.get(7)?,
            day_of_month: row.get(8)?,
            workday_only: row.get(9)?,
            anchor_date: row.get(10)?,
        },
        active: row.get(11)?,
    })
}

fn row_to_run(row: &rusqlite::Row<'_>) -> rusqlite::Result<Run> {
    let status_str: String = row.get(4)?;
    let status: RunStatus = status_str.parse().map_err(|e: String| conversion_error(4, e))?;
    Ok(Run {
        id: row.get(0)?,
        template_id: row.get(1)?,
        due_date: row.get(2)?,
        start_date: row.get(3)?,
        status,
        done_at: row.get(5)?,
        notes: row.get(6)?,
        created_at: row.get(7)?,
    })
}

//! SQLite DDL for the run store.

use rusqlite::Connection;

/// Version stamped into `schema_meta` on a fresh database.
pub(crate) const CURRENT_SCHEMA_VERSION: u32 = 1;

/// Complete DDL. Every statement is `IF NOT EXISTS` so `apply_schema` is idempotent.
pub(crate) const SCHEMA_SQL: &str = r#"
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

CREATE TABLE IF NOT EXISTS schema_meta (
    key   TEXT PRIMARY KEY,
    value TEXT NOT NULL
);

-- Recurring task definitions. Schedule columns mirror ScheduleRule.
CREATE TABLE IF NOT EXISTS task_templates (
    id            TEXT PRIMARY KEY,
    task_code     TEXT UNIQUE,
    planner       TEXT NOT NULL COLLATE NOCASE,
    sector        TEXT NOT NULL DEFAULT '' COLLATE NOCASE,
    title         TEXT NOT NULL COLLATE NOCASE,
    schedule_kind TEXT NOT NULL,      -- once | daily | weekly | biweekly | monthly
    every         INTEGER NOT NULL DEFAULT 1,
    weekday       INTEGER,            -- 0 = Sunday .. 6 = Saturday
    day_of_month  INTEGER,
    workday_only  INTEGER NOT NULL DEFAULT 0,
    anchor_date   TEXT NOT NULL,
    active        INTEGER NOT NULL DEFAULT 1,
    UNIQUE (planner, sector, title)
);

CREATE INDEX IF NOT EXISTS idx_templates_planner ON task_templates(planner);

-- At most one run per template and due date.
CREATE TABLE IF NOT EXISTS task_runs (
    id          TEXT PRIMARY KEY,
    template_id TEXT NOT NULL REFERENCES task_templates(id) ON DELETE CASCADE,
    due_date    TEXT NOT NULL,
    start_date  TEXT,
    status      TEXT NOT NULL DEFAULT 'open',
    done_at     TEXT,
    notes       TEXT,
    created_at  TEXT NOT NULL,
    UNIQUE (template_id, due_date)
);

CREATE INDEX IF NOT EXISTS idx_runs_due_date ON task_runs(due_date);

-- Last number handed out per task-code prefix.
CREATE TABLE IF NOT EXISTS task_code_counters (
    prefix      TEXT PRIMARY KEY,
    last_number INTEGER NOT NULL DEFAULT 0
);
"#;

/// Apply the schema and seed the version stamp on a fresh database.
pub(crate) fn apply_schema(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(SCHEMA_SQL)?;
    conn.execute(
        "INSERT OR IGNORE INTO schema_meta (key, value) VALUES ('schema_version', ?1)",
        rusqlite::params![CURRENT_SCHEMA_VERSION.to_string()],
    )?;
    Ok(())
}

/// Schema version recorded in `schema_meta`, if any.
pub(crate) fn read_schema_version(conn: &Connection) -> rusqlite::Result<Option<u32>> {
    let mut stmt = conn.prepare("SELECT value FROM schema_meta WHERE key = 'schema_version'")?;
    let mut rows = stmt.query([])?;
    match rows.next()? {
        Some(row) => {
            let val: String = row.get(0)?;
            Ok(val.parse::<u32>().ok())
        }
        None => Ok(None),
    }
}

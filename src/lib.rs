//! Controladoria: recurring task templates materialized into dated runs.
//!
//! A template carries a [`ScheduleRule`]. The occurrence generator turns a
//! rule and a date range into due dates, and the run materializer persists
//! one run per `(template, due date)` that does not exist yet. Generation is
//! additive: runs already in the store, with whatever status and notes
//! users gave them, are never touched.
//!
//! # Modules
//!
//! - [`schedule`]: rules, business-day calendar, occurrence generation
//! - [`runs`]: templates, runs, the [`RunStore`] boundary, and the materializer
//! - [`import`]: spreadsheet rows to templates and runs
//! - [`config`]: TOML configuration

pub mod app_dirs;
pub mod config;
pub mod error;
pub mod import;
pub mod runs;
pub mod schedule;

pub use config::ControlConfig;
pub use error::{ControlError, Result};
pub use runs::{
    GenerationReport, MemoryRunStore, NewRun, Run, RunGenerator, RunKey, RunStatus, RunStore,
    SqliteRunStore, Template, TemplateFilter,
};
pub use schedule::{DateRange, ScheduleKind, ScheduleRule, generate};

//! Task templates, runs, and their persistence.
//!
//! - [`types`]: templates, runs, keys, and status.
//! - [`store`]: the [`RunStore`] boundary.
//! - [`memory`] / [`sqlite`]: store implementations.
//! - [`materializer`]: turns due dates into runs, additively.

pub mod materializer;
pub mod memory;
mod schema;
pub mod sqlite;
pub mod store;
pub mod types;

pub use materializer::{
    DEFAULT_BATCH_SIZE, GenerationReport, RunGenerator, RunPlan, SkippedTemplate, plan_runs,
};
pub use memory::MemoryRunStore;
pub use sqlite::SqliteRunStore;
pub use store::{InsertOutcome, RunQuery, RunStore, StoreError};
pub use types::{
    DueState, NewRun, NewTemplate, Run, RunKey, RunStatus, Template, TemplateFilter, TemplateId,
};

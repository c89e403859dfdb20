//! Recurrence rules and due-date generation.
//!
//! A template's [`ScheduleRule`] is the raw, serializable form read from the
//! store. [`ScheduleRule::compile`] checks it against its kind and produces a
//! [`Recurrence`], which is the only thing the generator ever evaluates.
//!
//! Weekdays are numbered 0=Sunday..6=Saturday everywhere in this module.
//! Other conventions are translated at the ingestion boundary in
//! [`crate::import`].

pub mod calendar;
pub mod occurrence;
pub mod rule;

pub use occurrence::{DateRange, generate};
pub use rule::{MonthDay, Recurrence, RuleError, ScheduleKind, ScheduleRule};

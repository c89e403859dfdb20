//! CLI binary for controladoria.

use std::collections::HashMap;
use std::path::PathBuf;

use anyhow::{Context, bail};
use chrono::{Datelike, Local, NaiveDate, Utc};
use clap::{Args, Parser, Subcommand};
use controladoria::app_dirs;
use controladoria::import::{ImportFile, import_into, parse_date};
use controladoria::runs::{RunQuery, RunStatus, RunStore, SqliteRunStore, Template, TemplateFilter};
use controladoria::schedule::calendar::days_in_month;
use controladoria::{ControlConfig, ControlError, DateRange, RunGenerator};
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Recurring task runs for controllership checklists.
#[derive(Parser)]
#[command(name = "controladoria", version, about)]
struct Cli {
    /// Path to TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Run database, overriding `store.db_path`.
    #[arg(long)]
    db: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Create missing runs for a date window.
    Generate {
        /// First day (YYYY-MM-DD or DD/MM/YYYY). Defaults to today.
        #[arg(long, value_parser = cli_date)]
        from: Option<NaiveDate>,
        /// Last day. Defaults to `from` plus `generation.horizon_days`.
        #[arg(long, value_parser = cli_date, conflicts_with = "days")]
        to: Option<NaiveDate>,
        /// Window length in days past `from`.
        #[arg(long)]
        days: Option<u32>,
        /// Only templates of this planner.
        #[arg(long)]
        planner: Option<String>,
        /// Report what would be created without writing.
        #[arg(long)]
        dry_run: bool,
    },

    /// List templates with their task codes and schedules.
    Templates {
        #[arg(long)]
        planner: Option<String>,
        /// Include inactive templates.
        #[arg(long)]
        all: bool,
    },

    /// List runs.
    List {
        #[command(flatten)]
        selection: Selection,
        /// Only runs with this status (open, in_progress, done).
        #[arg(long)]
        status: Option<RunStatus>,
        /// Print JSON instead of a table.
        #[arg(long)]
        json: bool,
    },

    /// Mark a run done.
    Complete { run_id: String },

    /// Reopen a run, clearing its completion time.
    Reopen { run_id: String },

    /// Mark a run in progress.
    Start { run_id: String },

    /// Delete runs in a window. Generation never deletes; this is manual clean-up.
    Clear {
        #[command(flatten)]
        selection: Selection,
        /// Allow clearing with no date bounds.
        #[arg(long)]
        all: bool,
    },

    /// Import templates and run history from a JSON export of the workbook.
    Import {
        file: PathBuf,
        /// Anchor date for imported schedules. Defaults to the first of this month.
        #[arg(long, value_parser = cli_date)]
        anchor: Option<NaiveDate>,
        /// Also generate runs for the anchor's month.
        #[arg(long)]
        generate: bool,
    },
}

/// Date bounds and planner shared by `list` and `clear`.
#[derive(Args)]
struct Selection {
    #[arg(long, value_parser = cli_date)]
    from: Option<NaiveDate>,
    #[arg(long, value_parser = cli_date)]
    to: Option<NaiveDate>,
    #[arg(long)]
    planner: Option<String>,
}

impl Selection {
    fn query(&self) -> RunQuery {
        let mut query = RunQuery {
            from: self.from,
            to: self.to,
            ..RunQuery::all()
        };
        if let Some(planner) = &self.planner {
            query = query.planner(planner.clone());
        }
        query
    }
}

fn cli_date(s: &str) -> Result<NaiveDate, String> {
    parse_date(s).ok_or_else(|| format!("invalid date {s:?}, expected YYYY-MM-DD or DD/MM/YYYY"))
}

fn planner_filter(planner: Option<String>, include_inactive: bool) -> TemplateFilter {
    TemplateFilter {
        planner,
        include_inactive,
    }
}

fn month_of(date: NaiveDate) -> anyhow::Result<DateRange> {
    let first = date.with_day(1).context("first day of month")?;
    let last = date
        .with_day(days_in_month(date.year(), date.month()))
        .context("last day of month")?;
    Ok(DateRange::new(first, last)?)
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("controladoria=info")),
        )
        .init();

    let cli = Cli::parse();

    let config_path = cli
        .config
        .clone()
        .unwrap_or_else(ControlConfig::default_config_path);
    let config = ControlConfig::load_or_default(&config_path)
        .with_context(|| format!("loading {}", config_path.display()))?;
    let db_path = cli.db.clone().unwrap_or_else(|| config.store.db_path.clone());
    info!(db = %db_path.display(), data_dir = %app_dirs::data_dir().display(), "opening run store");
    let store = SqliteRunStore::open(&db_path)
        .with_context(|| format!("opening {}", db_path.display()))?;

    let today = Local::now().date_naive();

    match cli.command {
        Command::Generate {
            from,
            to,
            days,
            planner,
            dry_run,
        } => {
            let from = from.unwrap_or(today);
            let range = match to {
                Some(to) => DateRange::new(from, to)?,
                None => DateRange::from_horizon(
                    from,
                    days.unwrap_or(config.generation.horizon_days),
                )?,
            };
            let filter = planner_filter(planner, false);
            let generator = RunGenerator::from_config(&store, &config.generation);

            if dry_run {
                let (templates, plan) = generator.plan(&filter, &range)?;
                println!(
                    "{range}: {templates} template(s), {} run(s) to create, {} already present",
                    plan.inserts.len(),
                    plan.already_present
                );
                for run in &plan.inserts {
                    println!("  {}  {}", run.due_date, run.template_id);
                }
                for skipped in &plan.skipped {
                    println!("  skipped {}: {}", skipped.template_id, skipped.error);
                }
                return Ok(());
            }

            match generator.generate(&filter, &range) {
                Ok(report) => {
                    println!(
                        "{}: created {} run(s) in {} batch(es); {} already present, {} raced",
                        report.range,
                        report.inserted,
                        report.batches,
                        report.already_present,
                        report.ignored
                    );
                    for skipped in &report.skipped {
                        println!("  skipped {}: {}", skipped.template_id, skipped.error);
                    }
                }
                Err(ControlError::BatchInsert {
                    committed,
                    remaining,
                    source,
                }) => {
                    bail!(
                        "stopped after {committed} run(s): {source}; {} run(s) not written, \
                         re-run generate to retry",
                        remaining.len()
                    );
                }
                Err(e) => return Err(e.into()),
            }
        }

        Command::Templates { planner, all } => {
            for t in store.list_templates(&planner_filter(planner, all))? {
                println!(
                    "{:<16} {:<14} {:<20} {:<32} {}{}",
                    t.task_code.as_deref().unwrap_or("-"),
                    t.planner,
                    t.sector.as_deref().unwrap_or("-"),
                    t.title,
                    t.rule,
                    if t.active { "" } else { " (inactive)" }
                );
            }
        }

        Command::List {
            selection,
            status,
            json,
        } => {
            let mut query = selection.query();
            query.status = status;
            let runs = store.list_runs(&query)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&runs)?);
                return Ok(());
            }
            let templates: HashMap<String, Template> = store
                .list_templates(&planner_filter(None, true))?
                .into_iter()
                .map(|t| (t.id.clone(), t))
                .collect();
            for run in &runs {
                let (code, title) = templates
                    .get(&run.template_id)
                    .map(|t| (t.task_code.as_deref().unwrap_or("-"), t.title.as_str()))
                    .unwrap_or(("-", "?"));
                println!(
                    "{}  {:<11} {:<9} {:<16} {}  [{}]",
                    run.due_date,
                    run.status,
                    run.due_state(today, &Local),
                    code,
                    title,
                    run.id
                );
            }
            println!("{} run(s)", runs.len());
        }

        Command::Complete { run_id } => {
            let run = store.set_run_status(&run_id, RunStatus::Done, Utc::now())?;
            println!("{} done ({})", run.id, run.due_state(today, &Local));
        }

        Command::Reopen { run_id } => {
            let run = store.set_run_status(&run_id, RunStatus::Open, Utc::now())?;
            println!("{} reopened ({})", run.id, run.due_state(today, &Local));
        }

        Command::Start { run_id } => {
            let run = store.set_run_status(&run_id, RunStatus::InProgress, Utc::now())?;
            println!("{} in progress", run.id);
        }

        Command::Clear { selection, all } => {
            if selection.from.is_none() && selection.to.is_none() && !all {
                bail!("refusing to clear every run without --all; pass --from/--to to narrow");
            }
            let removed = store.delete_runs(&selection.query())?;
            println!("removed {removed} run(s)");
        }

        Command::Import {
            file,
            anchor,
            generate,
        } => {
            let anchor = match anchor {
                Some(a) => a,
                None => today.with_day(1).context("first day of month")?,
            };
            let contents = ImportFile::from_json_file(&file)?;
            let report = import_into(&store, contents, anchor, &config)?;
            println!(
                "templates: {} upserted, {} merged, {} rejected",
                report.templates_upserted, report.templates_merged, report.templates_rejected
            );
            println!(
                "runs: {} inserted, {} already present, {} merged, {} unmatched",
                report.runs.inserted, report.runs.ignored, report.runs_merged, report.runs_unmatched
            );

            if generate {
                let range = month_of(anchor)?;
                let generated = RunGenerator::from_config(&store, &config.generation)
                    .generate(&TemplateFilter::active(), &range)?;
                println!("{range}: created {} run(s)", generated.inserted);
            }
        }
    }

    Ok(())
}

//! Spreadsheet ingestion: template and run rows exported from the planning
//! workbook, converted into templates and runs.
//!
//! This is the only place that accepts the 1=Monday..7=Sunday weekday
//! convention and free-form frequency labels. Everything handed to the
//! store uses 0=Sunday..6=Saturday and a complete [`ScheduleRule`].

use std::collections::HashMap;
use std::path::Path;

use chrono::{DateTime, Days, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::ControlConfig;
use crate::error::{ControlError, Result};
use crate::runs::{
    InsertOutcome, NewRun, NewTemplate, RunGenerator, RunKey, RunStatus, SqliteRunStore,
    TemplateId,
};
use crate::schedule::ScheduleRule;

/// A spreadsheet cell holding either text or a number.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Cell {
    Number(f64),
    Text(String),
}

impl Cell {
    fn as_int(&self) -> Option<i64> {
        match self {
            Self::Number(n) if n.fract() == 0.0 => Some(*n as i64),
            Self::Number(_) => None,
            Self::Text(s) => s.trim().parse().ok(),
        }
    }
}

/// Collapse whitespace (including non-breaking spaces) and trim.
#[must_use]
pub fn normalize_cell(text: &str) -> String {
    text.split(|c: char| c.is_whitespace() || c == '\u{a0}')
        .filter(|p| !p.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Lowercase, strip Portuguese diacritics, and normalize whitespace.
#[must_use]
pub fn fold(text: &str) -> String {
    normalize_cell(text)
        .to_lowercase()
        .chars()
        .map(|c| match c {
            'á' | 'à' | 'â' | 'ã' | 'ä' => 'a',
            'é' | 'è' | 'ê' | 'ë' => 'e',
            'í' | 'ì' | 'î' | 'ï' => 'i',
            'ó' | 'ò' | 'ô' | 'õ' | 'ö' => 'o',
            'ú' | 'ù' | 'û' | 'ü' => 'u',
            'ç' => 'c',
            'ñ' => 'n',
            other => other,
        })
        .collect()
}

/// Weekday from a cell, as 0=Sunday..6=Saturday.
///
/// Numbers 0..=6 are taken as-is; 7 means Sunday (the 1=Monday..7=Sunday
/// convention). Names and three-letter abbreviations are accepted in
/// Portuguese and English, with or without accents or a `-feira` suffix.
#[must_use]
pub fn parse_weekday(text: &str) -> Option<u8> {
    if let Ok(n) = text.trim().parse::<i64>() {
        return match n {
            0..=6 => u8::try_from(n).ok(),
            7 => Some(0),
            _ => None,
        };
    }
    let folded = fold(text);
    let first = folded
        .split(|c: char| c.is_whitespace() || matches!(c, '-' | '_' | '/'))
        .next()?;
    match first {
        "dom" | "domingo" | "sun" | "sunday" => Some(0),
        "seg" | "segunda" | "mon" | "monday" => Some(1),
        "ter" | "terca" | "tue" | "tuesday" => Some(2),
        "qua" | "quarta" | "wed" | "wednesday" => Some(3),
        "qui" | "quinta" | "thu" | "thursday" => Some(4),
        "sex" | "sexta" | "fri" | "friday" => Some(5),
        "sab" | "sabado" | "sat" | "saturday" => Some(6),
        _ => None,
    }
}

fn weekday_from_cell(cell: &Cell) -> Option<u8> {
    match cell {
        Cell::Text(s) => parse_weekday(s),
        Cell::Number(_) => cell.as_int().and_then(|n| parse_weekday(&n.to_string())),
    }
}

/// Date from `YYYY-MM-DD` or `DD/MM/YYYY` text.
#[must_use]
pub fn parse_date(text: &str) -> Option<NaiveDate> {
    let s = text.trim();
    if s.is_empty() {
        return None;
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .or_else(|_| NaiveDate::parse_from_str(s, "%d/%m/%Y"))
        .ok()
}

/// Date from a cell; numbers are spreadsheet serial dates (days since 1899-12-30).
#[must_use]
pub fn date_from_cell(cell: &Cell) -> Option<NaiveDate> {
    match cell {
        Cell::Text(s) => parse_date(s),
        Cell::Number(_) => {
            let serial = u64::try_from(cell.as_int()?).ok()?;
            NaiveDate::from_ymd_opt(1899, 12, 30)?.checked_add_days(Days::new(serial))
        }
    }
}

/// Schedule rule for a frequency label such as `Semanal` or `Trimestral`.
///
/// Weekly and biweekly rows fall due on `weekday`, monthly families on the
/// `workday`th business day; missing or out-of-range values use the
/// configured defaults. Unknown labels are treated as monthly.
#[must_use]
pub fn rule_from_frequency(
    label: &str,
    workday: Option<i64>,
    weekday: Option<u8>,
    anchor: NaiveDate,
    defaults: &crate::config::ImportConfig,
) -> ScheduleRule {
    let f = fold(label);
    let workday = workday
        .and_then(|n| u8::try_from(n).ok())
        .filter(|n| (1..=31).contains(n))
        .unwrap_or(defaults.default_workday);
    let weekday = weekday.filter(|d| *d <= 6).unwrap_or(defaults.default_weekday);
    let monthly = |every: u32| ScheduleRule::monthly_on_workday(workday, anchor).every(every);

    if f.contains("diaria") {
        ScheduleRule::daily(anchor).workday_only(true)
    } else if f.contains("quinzenal") {
        ScheduleRule::biweekly(weekday, anchor).workday_only(true)
    } else if f.contains("semanal") {
        ScheduleRule::weekly(weekday, anchor).workday_only(true)
    } else if f.contains("bimestral") {
        monthly(2)
    } else if f.contains("trimestral") {
        monthly(3)
    } else if f.contains("semestral") {
        monthly(6)
    } else if f.contains("anual") {
        monthly(12)
    } else if f.contains("mensal") {
        monthly(1)
    } else if f.contains("pontual") {
        ScheduleRule::once(anchor)
    } else {
        monthly(1)
    }
}

/// Uppercase abbreviation: the first `max_len` characters of a single word,
/// or the initials of the first `max_len` words. `XXX` when nothing is left.
#[must_use]
pub fn abbreviate(text: &str, max_len: usize) -> String {
    let cleaned: String = text
        .trim()
        .to_uppercase()
        .chars()
        .filter(|c| c.is_alphanumeric() || c.is_whitespace())
        .collect();
    let parts: Vec<&str> = cleaned.split_whitespace().collect();
    let abbr: String = match parts.as_slice() {
        [] => String::new(),
        [word] => word.chars().take(max_len).collect(),
        words => words
            .iter()
            .take(max_len)
            .filter_map(|w| w.chars().next())
            .collect(),
    };
    if abbr.is_empty() { "XXX".to_owned() } else { abbr }
}

/// Task-code prefix for a planner and sector, e.g. `Check List` +
/// `Contas a Pagar` gives `CL-CAP`.
#[must_use]
pub fn task_code_prefix(planner: &str, sector: &str) -> String {
    format!("{}-{}", abbreviate(planner, 2), abbreviate(sector, 3))
}

/// One row of the template sheet.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TemplateRow {
    #[serde(alias = "Planner Name", alias = "Planner")]
    pub planner: String,
    #[serde(alias = "Setor", alias = "Sector")]
    pub sector: String,
    #[serde(alias = "Atividade", alias = "Title")]
    pub title: String,
    #[serde(alias = "Frequencia", alias = "Frequência")]
    pub frequency: Option<String>,
    #[serde(alias = "Dia Util", alias = "Dia Útil")]
    pub workday: Option<Cell>,
    #[serde(alias = "Dia Da Semana", alias = "Dia Semana")]
    pub weekday: Option<Cell>,
    pub active: Option<bool>,
}

impl TemplateRow {
    fn normalized(mut self) -> Self {
        self.planner = normalize_cell(&self.planner);
        self.sector = normalize_cell(&self.sector);
        self.title = normalize_cell(&self.title);
        self.frequency = self.frequency.map(|f| normalize_cell(&f)).filter(|f| !f.is_empty());
        self
    }

    fn is_complete(&self) -> bool {
        !self.planner.is_empty() && !self.sector.is_empty() && !self.title.is_empty()
    }

    /// Identity used to merge rows: planner, sector, and title, folded.
    #[must_use]
    pub fn key(&self) -> String {
        template_key(&self.planner, &self.sector, &self.title)
    }

    /// Template draft anchored at `anchor`.
    #[must_use]
    pub fn to_template(
        &self,
        anchor: NaiveDate,
        defaults: &crate::config::ImportConfig,
    ) -> NewTemplate {
        let rule = rule_from_frequency(
            self.frequency.as_deref().unwrap_or_default(),
            self.workday.as_ref().and_then(Cell::as_int),
            self.weekday.as_ref().and_then(weekday_from_cell),
            anchor,
            defaults,
        );
        NewTemplate {
            planner: self.planner.clone(),
            sector: Some(self.sector.clone()),
            title: self.title.clone(),
            rule,
            active: self.active.unwrap_or(true),
        }
    }
}

fn template_key(planner: &str, sector: &str, title: &str) -> String {
    format!("{}|{}|{}", fold(planner), fold(sector), fold(title))
}

/// Merge rows that share planner, sector, and title.
///
/// The later row wins field by field; fields it leaves empty keep the
/// earlier row's value. Output keeps first-seen order. Returns the merged
/// rows and the number of duplicates folded in.
#[must_use]
pub fn dedupe_rows(rows: Vec<TemplateRow>) -> (Vec<TemplateRow>, usize) {
    let mut index: HashMap<String, usize> = HashMap::new();
    let mut out: Vec<TemplateRow> = Vec::new();
    let mut duplicates = 0;

    for row in rows {
        let key = row.key();
        match index.get(&key).copied() {
            Some(i) => {
                duplicates += 1;
                let prev = &mut out[i];
                prev.planner = row.planner;
                prev.sector = row.sector;
                prev.title = row.title;
                prev.frequency = row.frequency.or(prev.frequency.take());
                prev.workday = row.workday.or(prev.workday.take());
                prev.weekday = row.weekday.or(prev.weekday.take());
                prev.active = row.active.or(prev.active);
            }
            None => {
                index.insert(key, out.len());
                out.push(row);
            }
        }
    }
    (out, duplicates)
}

/// One row of the run history sheet.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunRow {
    #[serde(alias = "Planner Name", alias = "Planner")]
    pub planner: String,
    #[serde(alias = "Setor", alias = "Sector")]
    pub sector: String,
    #[serde(alias = "Atividade", alias = "Title")]
    pub title: String,
    #[serde(alias = "Data Inicial", alias = "Start Date")]
    pub start_date: Option<Cell>,
    #[serde(alias = "Data Fim", alias = "Due Date")]
    pub due_date: Option<Cell>,
    #[serde(alias = "Data Conclusão", alias = "Done Date")]
    pub done_date: Option<Cell>,
    #[serde(alias = "Status")]
    pub status: Option<String>,
    #[serde(alias = "Notas", alias = "Notes")]
    pub notes: Option<String>,
}

impl RunRow {
    /// Run for `template_id`, or `None` without a readable due date.
    ///
    /// A completion date or a status reading "concluído"/"done" makes the
    /// run done; completion is stamped at noon UTC of the completion date.
    #[must_use]
    pub fn to_run(&self, template_id: &str) -> Option<NewRun> {
        let due_date = self.due_date.as_ref().and_then(date_from_cell)?;
        let done_date = self.done_date.as_ref().and_then(date_from_cell);
        let status_text = self.status.as_deref().map(fold).unwrap_or_default();
        let done = done_date.is_some() || status_text.contains("concl") || status_text == "done";

        Some(NewRun {
            template_id: template_id.to_owned(),
            due_date,
            start_date: self.start_date.as_ref().and_then(date_from_cell),
            status: if done { RunStatus::Done } else { RunStatus::Open },
            done_at: done_date.and_then(noon_utc),
            notes: self
                .notes
                .as_deref()
                .map(normalize_cell)
                .filter(|n| !n.is_empty()),
        })
    }
}

fn noon_utc(date: NaiveDate) -> Option<DateTime<Utc>> {
    date.and_hms_opt(12, 0, 0).map(|dt| dt.and_utc())
}

/// Merge runs sharing `(template_id, due_date)`.
///
/// Done wins over any other status. Start date, completion time, and notes
/// come from the first row that has them. Returns the merged runs and the
/// number of duplicates folded in.
#[must_use]
pub fn merge_runs(runs: Vec<NewRun>) -> (Vec<NewRun>, usize) {
    let mut index: HashMap<RunKey, usize> = HashMap::new();
    let mut out: Vec<NewRun> = Vec::new();
    let mut duplicates = 0;

    for run in runs {
        let key = run.key();
        match index.get(&key).copied() {
            Some(i) => {
                duplicates += 1;
                let prev = &mut out[i];
                if run.status == RunStatus::Done {
                    prev.status = RunStatus::Done;
                }
                prev.start_date = prev.start_date.or(run.start_date);
                prev.done_at = prev.done_at.or(run.done_at);
                if prev.notes.is_none() {
                    prev.notes = run.notes;
                }
            }
            None => {
                index.insert(key, out.len());
                out.push(run);
            }
        }
    }
    (out, duplicates)
}

/// Contents of an import file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImportFile {
    pub templates: Vec<TemplateRow>,
    pub runs: Vec<RunRow>,
}

impl ImportFile {
    /// Read a JSON import file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or is not valid JSON.
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        serde_json::from_str(&content)
            .map_err(|e| ControlError::Import(format!("{}: {e}", path.display())))
    }
}

/// What an import did.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ImportReport {
    /// Template rows missing planner, sector, or title.
    pub templates_rejected: usize,
    /// Template rows folded into an earlier row.
    pub templates_merged: usize,
    pub templates_upserted: usize,
    /// Ids of the upserted templates, in row order.
    pub template_ids: Vec<TemplateId>,
    /// Run rows with no matching template or no due date.
    pub runs_unmatched: usize,
    pub runs_merged: usize,
    pub runs: InsertOutcome,
}

/// Upsert the file's templates and insert its run history.
///
/// Templates are anchored at `anchor`. Run rows are matched to templates by
/// planner, sector, and title; runs that already exist are left untouched.
///
/// # Errors
///
/// Returns an error if the store rejects a template or a run batch.
pub fn import_into(
    store: &SqliteRunStore,
    file: ImportFile,
    anchor: NaiveDate,
    config: &ControlConfig,
) -> Result<ImportReport> {
    let mut report = ImportReport::default();

    let rows: Vec<TemplateRow> = file
        .templates
        .into_iter()
        .map(TemplateRow::normalized)
        .filter(|row| {
            let keep = row.is_complete();
            if !keep {
                report.templates_rejected += 1;
            }
            keep
        })
        .collect();
    let (rows, merged) = dedupe_rows(rows);
    report.templates_merged = merged;

    let mut ids: HashMap<String, TemplateId> = HashMap::new();
    for row in &rows {
        let template = store.upsert_template(row.to_template(anchor, &config.import))?;
        debug!(
            id = %template.id,
            task_code = ?template.task_code,
            rule = %template.rule,
            "upserted template"
        );
        ids.insert(row.key(), template.id.clone());
        report.template_ids.push(template.id);
    }
    report.templates_upserted = rows.len();

    let mut runs = Vec::new();
    for row in &file.runs {
        let key = template_key(&row.planner, &row.sector, &row.title);
        match ids.get(&key).and_then(|id| row.to_run(id)) {
            Some(run) => runs.push(run),
            None => report.runs_unmatched += 1,
        }
    }
    if report.runs_unmatched > 0 {
        warn!(
            count = report.runs_unmatched,
            "run rows without a template or due date were ignored"
        );
    }
    let (runs, merged) = merge_runs(runs);
    report.runs_merged = merged;
    report.runs = RunGenerator::from_config(store, &config.generation).insert_batched(runs)?;

    info!(
        templates = report.templates_upserted,
        rejected = report.templates_rejected,
        inserted = report.runs.inserted,
        ignored = report.runs.ignored,
        "import complete"
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;
    use crate::config::ImportConfig;
    use crate::schedule::ScheduleKind;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
    }

    fn row(planner: &str, sector: &str, title: &str, frequency: &str) -> TemplateRow {
        TemplateRow {
            planner: planner.to_owned(),
            sector: sector.to_owned(),
            title: title.to_owned(),
            frequency: Some(frequency.to_owned()),
            ..TemplateRow::default()
        }
    }

    #[test]
    fn weekday_conventions() {
        assert_eq!(parse_weekday("0"), Some(0));
        assert_eq!(parse_weekday("6"), Some(6));
        assert_eq!(parse_weekday("7"), Some(0));
        assert_eq!(parse_weekday("8"), None);
        assert_eq!(parse_weekday("Segunda-feira"), Some(1));
        assert_eq!(parse_weekday("terça"), Some(2));
        assert_eq!(parse_weekday("SÁB"), Some(6));
        assert_eq!(parse_weekday("Friday"), Some(5));
        assert_eq!(parse_weekday(""), None);
        assert_eq!(weekday_from_cell(&Cell::Number(7.0)), Some(0));
    }

    #[test]
    fn dates_in_both_layouts() {
        assert_eq!(parse_date("2024-03-05"), Some(date(2024, 3, 5)));
        assert_eq!(parse_date("5/3/2024"), Some(date(2024, 3, 5)));
        assert_eq!(parse_date("05/03/2024"), Some(date(2024, 3, 5)));
        assert_eq!(parse_date("2024/03/05"), None);
        assert_eq!(date_from_cell(&Cell::Number(45356.0)), Some(date(2024, 3, 5)));
    }

    #[test]
    fn frequency_labels_map_to_rules() {
        let anchor = date(2024, 3, 1);
        let d = ImportConfig::default();

        let daily = rule_from_frequency("Diária", None, None, anchor, &d);
        assert_eq!(daily.kind, ScheduleKind::Daily);
        assert!(daily.workday_only);

        let weekly = rule_from_frequency("Semanal", None, Some(3), anchor, &d);
        assert_eq!((weekly.kind, weekly.weekday), (ScheduleKind::Weekly, Some(3)));

        let biweekly = rule_from_frequency("Quinzenal", None, None, anchor, &d);
        assert_eq!((biweekly.kind, biweekly.weekday), (ScheduleKind::Biweekly, Some(1)));

        let quarterly = rule_from_frequency("TRIMESTRAL", Some(2), None, anchor, &d);
        assert_eq!(quarterly.kind, ScheduleKind::Monthly);
        assert_eq!((quarterly.every, quarterly.day_of_month), (3, Some(2)));
        assert!(quarterly.workday_only);

        assert_eq!(rule_from_frequency("Bimestral", None, None, anchor, &d).every, 2);
        assert_eq!(rule_from_frequency("Anual", None, None, anchor, &d).every, 12);

        let once = rule_from_frequency("Pontual", None, None, anchor, &d);
        assert_eq!(once.kind, ScheduleKind::Once);
        assert!(!once.workday_only);

        let fallback = rule_from_frequency("sob demanda", Some(0), None, anchor, &d);
        assert_eq!((fallback.every, fallback.day_of_month), (1, Some(5)));
        assert!(fallback.compile().is_ok());
    }

    #[test]
    fn task_code_abbreviations() {
        assert_eq!(abbreviate("Check List", 2), "CL");
        assert_eq!(abbreviate("Contas a Pagar", 3), "CAP");
        assert_eq!(abbreviate("fiscal", 3), "FIS");
        assert_eq!(abbreviate("  --  ", 3), "XXX");
        assert_eq!(task_code_prefix("Check List", "Contas a Pagar"), "CL-CAP");
    }

    #[test]
    fn dedupe_keeps_earlier_fields_when_later_is_empty() {
        let mut later = row("check list", "CAP", "Pagamentos", "Semanal");
        later.frequency = None;
        later.weekday = Some(Cell::Text("sexta".to_owned()));
        let rows = vec![
            row("Check List", "CAP", "Pagamentos", "Mensal"),
            row("Check List", "CAP", "Boletos", "Diária"),
            later,
        ];
        let (rows, dup) = dedupe_rows(rows);
        assert_eq!(dup, 1);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].frequency.as_deref(), Some("Mensal"));
        assert_eq!(rows[0].weekday, Some(Cell::Text("sexta".to_owned())));
        assert_eq!(rows[0].planner, "check list");
    }

    #[test]
    fn run_rows_prefer_done() {
        let open = RunRow {
            due_date: Some(Cell::Text("05/03/2024".to_owned())),
            notes: Some("primeira".to_owned()),
            ..RunRow::default()
        };
        let done = RunRow {
            due_date: Some(Cell::Text("2024-03-05".to_owned())),
            done_date: Some(Cell::Text("2024-03-06".to_owned())),
            notes: Some("segunda".to_owned()),
            ..RunRow::default()
        };
        let by_status = RunRow {
            due_date: Some(Cell::Text("2024-03-12".to_owned())),
            status: Some("Concluído".to_owned()),
            ..RunRow::default()
        };
        let runs = vec![
            open.to_run("t1").unwrap(),
            done.to_run("t1").unwrap(),
            by_status.to_run("t1").unwrap(),
        ];
        let (runs, dup) = merge_runs(runs);
        assert_eq!(dup, 1);
        assert_eq!(runs[0].status, RunStatus::Done);
        assert_eq!(runs[0].notes.as_deref(), Some("primeira"));
        assert_eq!(runs[0].done_at, noon_utc(date(2024, 3, 6)));
        assert_eq!(runs[1].status, RunStatus::Done);
        assert!(RunRow::default().to_run("t1").is_none());
    }

    #[test]
    fn rows_deserialize_from_sheet_headers() {
        let file: ImportFile = serde_json::from_str(
            r#"{
                "templates": [
                    {"Planner Name": "Check List", "Setor": "Contas a Pagar",
                     "Atividade": "Pagamentos", "Frequência": "Semanal", "Dia Da Semana": 5}
                ],
                "runs": [
                    {"Planner": "Check List", "Setor": "Contas a Pagar",
                     "Atividade": "Pagamentos", "Data Fim": "08/03/2024"}
                ]
            }"#,
        )
        .unwrap();
        assert_eq!(file.templates[0].title, "Pagamentos");
        assert_eq!(file.templates[0].weekday, Some(Cell::Number(5.0)));
        assert_eq!(file.runs[0].due_date, Some(Cell::Text("08/03/2024".to_owned())));
    }

    #[test]
    fn import_upserts_templates_and_history() {
        let store = SqliteRunStore::open_in_memory().unwrap();
        let mut incomplete = row("Check List", "", "Sem setor", "Mensal");
        incomplete.sector = "   ".to_owned();
        let file = ImportFile {
            templates: vec![
                row("Check List", "Contas a Pagar", "Pagamentos", "Semanal"),
                row("Check List", "Contas a Pagar", " Pagamentos ", "Semanal"),
                incomplete,
            ],
            runs: vec![
                RunRow {
                    planner: "check list".to_owned(),
                    sector: "contas a pagar".to_owned(),
                    title: "pagamentos".to_owned(),
                    due_date: Some(Cell::Text("2024-03-04".to_owned())),
                    status: Some("done".to_owned()),
                    ..RunRow::default()
                },
                RunRow {
                    planner: "Fiscal".to_owned(),
                    sector: "Tributos".to_owned(),
                    title: "DCTF".to_owned(),
                    due_date: Some(Cell::Text("2024-03-04".to_owned())),
                    ..RunRow::default()
                },
            ],
        };
        let report =
            import_into(&store, file.clone(), date(2024, 3, 1), &ControlConfig::default())
                .unwrap();
        assert_eq!(report.templates_rejected, 1);
        assert_eq!(report.templates_merged, 1);
        assert_eq!(report.templates_upserted, 1);
        assert_eq!(report.runs_unmatched, 1);
        assert_eq!(report.runs, InsertOutcome { inserted: 1, ignored: 0 });

        let template = store.get_template(&report.template_ids[0]).unwrap().unwrap();
        assert_eq!(template.task_code.as_deref(), Some("CL-CAP-000001"));

        // Re-importing keeps identities and never duplicates history.
        let again = import_into(&store, file, date(2024, 3, 1), &ControlConfig::default()).unwrap();
        assert_eq!(again.template_ids, report.template_ids);
        assert_eq!(again.runs, InsertOutcome { inserted: 0, ignored: 1 });
    }
}

//! Report filtering, summary figures and the semicolon CSV export.

use std::collections::HashSet;

use chrono::{NaiveDate, NaiveTime};
use csv::{QuoteStyle, Terminator, WriterBuilder};
use serde::Serialize;
use thiserror::Error;

use crate::{DATE_FORMAT, TIME_FORMAT};

pub const CSV_DELIMITER: u8 = b';';

pub const CSV_HEADER: [&str; 11] = [
    "EmployeeID",
    "OvertimeDate(dd.MM.yyyy)",
    "CalculationBasedOnTime",
    "PlanOvertimeHour",
    "DateIn(dd.MM.yyyy)",
    "FromTime",
    "DateOut(dd.MM.yyyy)",
    "ToTime",
    "BreakFromTime",
    "BreakToTime",
    "Reason",
];

#[derive(Debug, Error)]
pub enum CsvError {
    #[error("failed to write csv: {0}")]
    Write(#[from] csv::Error),
    #[error("failed to flush csv buffer: {0}")]
    Flush(String),
    #[error("csv output is not utf-8")]
    Encoding(#[from] std::string::FromUtf8Error),
}

/// One persisted overtime record joined with the employee's display name.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ReportRow {
    pub employee_id: String,
    pub employee_name: Option<String>,
    pub overtime_date: NaiveDate,
    pub calculation_based_on_time: bool,
    pub plan_overtime_hour: f64,
    pub date_in: NaiveDate,
    pub from_time: NaiveTime,
    pub date_out: NaiveDate,
    pub to_time: NaiveTime,
    pub break_from_time: Option<NaiveTime>,
    pub break_to_time: Option<NaiveTime>,
    pub reason: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ReportFilter {
    pub search: Option<String>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
}

impl ReportFilter {
    pub fn date_range(start_date: Option<NaiveDate>, end_date: Option<NaiveDate>) -> Self {
        Self {
            search: None,
            start_date,
            end_date,
        }
    }

    fn needle(&self) -> Option<String> {
        self.search
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_lowercase)
    }

    pub fn matches(&self, row: &ReportRow) -> bool {
        if let Some(needle) = self.needle() {
            let hit = row.employee_id.to_lowercase().contains(&needle)
                || row.reason.to_lowercase().contains(&needle)
                || row
                    .employee_name
                    .as_deref()
                    .is_some_and(|name| name.to_lowercase().contains(&needle));
            if !hit {
                return false;
            }
        }
        if self.start_date.is_some_and(|start| row.overtime_date < start) {
            return false;
        }
        if self.end_date.is_some_and(|end| row.overtime_date > end) {
            return false;
        }
        true
    }

    /// Keep the matching rows, preserving their order.
    pub fn apply(&self, rows: impl IntoIterator<Item = ReportRow>) -> Vec<ReportRow> {
        rows.into_iter().filter(|row| self.matches(row)).collect()
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct ReportSummary {
    pub records: usize,
    pub total_hours: f64,
    pub unique_employees: usize,
}

impl ReportSummary {
    pub fn of(rows: &[ReportRow]) -> Self {
        let employees: HashSet<&str> = rows.iter().map(|r| r.employee_id.as_str()).collect();
        Self {
            records: rows.len(),
            total_hours: rows.iter().map(|r| r.plan_overtime_hour).sum(),
            unique_employees: employees.len(),
        }
    }
}

pub fn format_date(date: NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}

pub fn format_time(time: NaiveTime) -> String {
    time.format(TIME_FORMAT).to_string()
}

pub fn format_flag(flag: bool) -> &'static str {
    if flag { "Y" } else { "N" }
}

/// `3.0` renders as `3`, `2.5` as `2.5`.
pub fn format_hours(hours: f64) -> String {
    format!("{hours}")
}

fn csv_record(row: &ReportRow) -> [String; 11] {
    [
        row.employee_id.clone(),
        format_date(row.overtime_date),
        format_flag(row.calculation_based_on_time).to_string(),
        format_hours(row.plan_overtime_hour),
        format_date(row.date_in),
        format_time(row.from_time),
        format_date(row.date_out),
        format_time(row.to_time),
        row.break_from_time.map(format_time).unwrap_or_default(),
        row.break_to_time.map(format_time).unwrap_or_default(),
        row.reason.clone(),
    ]
}

/// Serialize rows with a header line, `;` separators and `\n` line endings.
///
/// Values holding the delimiter, quotes or line breaks are quoted so a row
/// never spills into extra columns; anything else is written verbatim.
pub fn write_csv(rows: &[ReportRow]) -> Result<String, CsvError> {
    let mut writer = WriterBuilder::new()
        .delimiter(CSV_DELIMITER)
        .terminator(Terminator::Any(b'\n'))
        .quote_style(QuoteStyle::Necessary)
        .from_writer(Vec::new());
    writer.write_record(CSV_HEADER)?;
    for row in rows {
        writer.write_record(csv_record(row))?;
    }
    let bytes = writer
        .into_inner()
        .map_err(|err| CsvError::Flush(err.to_string()))?;
    Ok(String::from_utf8(bytes)?)
}

/// Download name for an export produced on `today`.
pub fn export_filename(today: NaiveDate) -> String {
    format!("overtime_report_{}.csv", today.format("%Y-%m-%d"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(employee_id: &str, date: (i32, u32, u32), reason: &str) -> ReportRow {
        let day = NaiveDate::from_ymd_opt(date.0, date.1, date.2).unwrap();
        ReportRow {
            employee_id: employee_id.into(),
            employee_name: None,
            overtime_date: day,
            calculation_based_on_time: false,
            plan_overtime_hour: 3.0,
            date_in: day,
            from_time: NaiveTime::from_hms_opt(15, 0, 0).unwrap(),
            date_out: day,
            to_time: NaiveTime::from_hms_opt(18, 0, 0).unwrap(),
            break_from_time: None,
            break_to_time: None,
            reason: reason.into(),
        }
    }

    fn sample() -> Vec<ReportRow> {
        vec![
            row("A1", (2025, 8, 19), "Cable trimming at plant"),
            row("B2", (2025, 8, 20), "Network panel maintenance"),
            row("B2", (2025, 8, 19), "CCTV repair on bridge"),
        ]
    }

    #[test]
    fn search_is_case_insensitive_on_employee_id() {
        let filter = ReportFilter {
            search: Some("a1".into()),
            ..Default::default()
        };
        let hits = filter.apply(sample());
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].employee_id, "A1");
    }

    #[test]
    fn search_matches_reason_and_employee_name() {
        let mut rows = sample();
        rows[1].employee_name = Some("Siti Rahma".into());
        let by_name = ReportFilter {
            search: Some("RAHMA".into()),
            ..Default::default()
        };
        assert_eq!(by_name.apply(rows.clone()).len(), 1);
        let by_reason = ReportFilter {
            search: Some("cctv".into()),
            ..Default::default()
        };
        assert_eq!(by_reason.apply(rows).len(), 1);
    }

    #[test]
    fn date_range_is_inclusive() {
        let day = NaiveDate::from_ymd_opt(2025, 8, 19);
        let filter = ReportFilter::date_range(day, day);
        let hits = filter.apply(sample());
        assert_eq!(hits.len(), 2);
        assert!(hits.iter().all(|r| Some(r.overtime_date) == day));
    }

    #[test]
    fn blank_search_keeps_everything() {
        let filter = ReportFilter {
            search: Some("   ".into()),
            ..Default::default()
        };
        assert_eq!(filter.apply(sample()).len(), 3);
    }

    #[test]
    fn summary_counts_hours_and_employees() {
        let summary = ReportSummary::of(&sample());
        assert_eq!(summary.records, 3);
        assert_eq!(summary.total_hours, 9.0);
        assert_eq!(summary.unique_employees, 2);
    }

    #[test]
    fn csv_uses_header_and_semicolons() {
        let mut rows = sample();
        rows.truncate(1);
        rows[0].calculation_based_on_time = true;
        let csv = write_csv(&rows).unwrap();
        let lines: Vec<_> = csv.lines().collect();
        assert_eq!(
            lines[0],
            "EmployeeID;OvertimeDate(dd.MM.yyyy);CalculationBasedOnTime;PlanOvertimeHour;DateIn(dd.MM.yyyy);FromTime;DateOut(dd.MM.yyyy);ToTime;BreakFromTime;BreakToTime;Reason"
        );
        assert_eq!(
            lines[1],
            "A1;19.08.2025;Y;3;19.08.2025;15:00;19.08.2025;18:00;;;Cable trimming at plant"
        );
    }

    #[test]
    fn csv_flag_and_fractional_hours() {
        let mut rows = sample();
        rows.truncate(1);
        rows[0].plan_overtime_hour = 2.5;
        rows[0].break_from_time = NaiveTime::from_hms_opt(16, 0, 0);
        rows[0].break_to_time = NaiveTime::from_hms_opt(16, 30, 0);
        let csv = write_csv(&rows).unwrap();
        let fields: Vec<_> = csv.lines().nth(1).unwrap().split(';').collect();
        assert_eq!(fields[2], "N");
        assert_eq!(fields[3], "2.5");
        assert_eq!(fields[8], "16:00");
        assert_eq!(fields[9], "16:30");
    }

    #[test]
    fn csv_quotes_values_containing_the_delimiter() {
        let rows = vec![row("A1", (2025, 8, 19), "Fixed pump; replaced seal")];
        let csv = write_csv(&rows).unwrap();
        assert!(csv.lines().nth(1).unwrap().ends_with(";\"Fixed pump; replaced seal\""));
    }

    #[test]
    fn filename_carries_export_day() {
        let day = NaiveDate::from_ymd_opt(2025, 8, 21).unwrap();
        assert_eq!(export_filename(day), "overtime_report_2025-08-21.csv");
    }
}

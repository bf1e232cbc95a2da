//! Report command for rendering aggregate totals.
//!
//! Supports day/week/custom ranges with human-readable and JSON output.
//! All period boundaries are local calendar dates, matching the store's
//! partition key.

use std::collections::BTreeMap;
use std::io::Write;

use anyhow::Result;
use chrono::{DateTime, Datelike, Local, NaiveDate, Utc};
use serde::Serialize;
use wl_store::RecordStore;

use super::util::format_duration_ms;

/// Report period.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Period {
    /// Today.
    Day,
    /// The current week, Monday through Sunday.
    Week,
    /// A custom inclusive date range.
    Range(NaiveDate, NaiveDate),
}

impl Period {
    /// Resolves the period to inclusive date bounds relative to `today`.
    #[must_use]
    pub fn bounds(self, today: NaiveDate) -> (NaiveDate, NaiveDate) {
        match self {
            Self::Day => (today, today),
            Self::Week => {
                let days_since_monday = today.weekday().num_days_from_monday();
                let monday = today - chrono::Duration::days(i64::from(days_since_monday));
                (monday, monday + chrono::Duration::days(6))
            }
            Self::Range(start, end) => (start, end),
        }
    }
}

/// Per-day total for JSON output.
#[derive(Debug, Serialize)]
struct DayTotal {
    date: NaiveDate,
    total_ms: i64,
}

/// Per-project total for JSON output.
#[derive(Debug, Serialize)]
struct ProjectTotal {
    name: String,
    total_ms: i64,
}

/// Computed report data.
#[derive(Debug, Serialize)]
struct ReportData {
    generated_at: DateTime<Utc>,
    start: NaiveDate,
    end: NaiveDate,
    total_ms: i64,
    categories: BTreeMap<String, i64>,
    days: Vec<DayTotal>,
    #[serde(skip_serializing_if = "Option::is_none")]
    project: Option<ProjectTotal>,
}

fn gather(
    store: &RecordStore,
    start: NaiveDate,
    end: NaiveDate,
    project: Option<&str>,
) -> Result<ReportData> {
    let categories = store.category_totals(Some((start, end)))?;
    let days: Vec<DayTotal> = store
        .daily_totals(start, end)?
        .into_iter()
        .map(|(date, total_ms)| DayTotal { date, total_ms })
        .collect();
    let total_ms = days.iter().map(|d| d.total_ms).sum();
    let project = match project {
        Some(name) => Some(ProjectTotal {
            name: name.to_string(),
            total_ms: store.project_total(name, Some((start, end)))?,
        }),
        None => None,
    };

    Ok(ReportData {
        generated_at: Utc::now(),
        start,
        end,
        total_ms,
        categories,
        days,
        project,
    })
}

/// Renders a report for the period to the writer.
pub fn run<W: Write>(
    writer: &mut W,
    store: &RecordStore,
    period: Period,
    project: Option<&str>,
    json: bool,
) -> Result<()> {
    let today = Local::now().date_naive();
    let (start, end) = period.bounds(today);
    let data = gather(store, start, end, project)?;

    if json {
        serde_json::to_writer_pretty(&mut *writer, &data)?;
        writeln!(writer)?;
        return Ok(());
    }

    writeln!(writer, "Report {} to {}", data.start, data.end)?;
    writeln!(writer, "Total: {}", format_duration_ms(data.total_ms))?;

    if !data.categories.is_empty() {
        writeln!(writer)?;
        writeln!(writer, "By category:")?;
        for (category, total) in &data.categories {
            writeln!(writer, "  {category:<20} {}", format_duration_ms(*total))?;
        }
    }

    writeln!(writer)?;
    writeln!(writer, "By day:")?;
    for day in &data.days {
        writeln!(writer, "  {}  {}", day.date, format_duration_ms(day.total_ms))?;
    }

    if let Some(project) = &data.project {
        writeln!(writer)?;
        writeln!(
            writer,
            "Project {}: {}",
            project.name,
            format_duration_ms(project.total_ms)
        )?;
    }

    Ok(())
}

//! Status command for showing storage location and today's totals.

use std::io::Write;

use anyhow::Result;
use chrono::Local;
use wl_store::RecordStore;

use super::util::format_duration_ms;

pub fn run<W: Write>(writer: &mut W, store: &RecordStore) -> Result<()> {
    let partitions = store.list_partitions()?;
    let today = Local::now().date_naive();
    let today_records = store.load_partition(today)?;
    let today_total: i64 = today_records.iter().map(|r| r.duration_ms).sum();

    writeln!(writer, "Worklog status")?;
    writeln!(writer, "Storage: {}", store.base_dir().display())?;
    writeln!(writer, "Partitions: {}", partitions.len())?;
    writeln!(
        writer,
        "Today ({today}): {} across {} sessions",
        format_duration_ms(today_total),
        today_records.len()
    )?;

    let today_categories = store.category_totals(Some((today, today)))?;
    if !today_categories.is_empty() {
        writeln!(writer, "By category:")?;
        for (category, total) in &today_categories {
            writeln!(writer, "- {category}: {}", format_duration_ms(*total))?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};
    use tempfile::TempDir;
    use wl_core::{SessionContext, TimeSession};

    use super::*;

    #[test]
    fn status_reports_today_totals() {
        let temp = TempDir::new().unwrap();
        let store = RecordStore::open(temp.path().join("data")).unwrap();

        let start = Utc::now();
        let mut session = TimeSession::begin(
            SessionContext::new("main.rs", "/p/main.rs", "demo"),
            start,
        );
        session.close(start + Duration::minutes(40));
        session.category = Some("Coding".to_string());
        store.save(&session).unwrap();

        let mut out = Vec::new();
        run(&mut out, &store).unwrap();
        let out = String::from_utf8(out).unwrap();

        assert!(out.contains("Partitions: 1"));
        assert!(out.contains("40m across 1 sessions"));
        assert!(out.contains("- Coding: 40m"));
    }

    #[test]
    fn status_with_empty_store() {
        let temp = TempDir::new().unwrap();
        let store = RecordStore::open(temp.path().join("data")).unwrap();

        let mut out = Vec::new();
        run(&mut out, &store).unwrap();
        let out = String::from_utf8(out).unwrap();

        assert!(out.contains("Partitions: 0"));
        assert!(out.contains("0s across 0 sessions"));
    }
}

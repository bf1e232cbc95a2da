//! Storage layer for the worklog time tracker.
//!
//! Closed sessions are persisted one file per calendar day
//! (`time-tracking-YYYY-MM-DD.csv`) under a base directory. Appends are
//! the fast path; replacing an existing record rewrites the whole
//! partition behind a backup-and-atomic-rename swap so a crash mid-write
//! never truncates a day's data.
//!
//! # Failure semantics
//!
//! - Creating the base directory fails loudly at construction; the store
//!   cannot function without it.
//! - A malformed record is skipped at load time with a warning; the rest
//!   of the partition stays readable.
//! - A failed rewrite restores the partition from its backup and surfaces
//!   the error; in-memory state is untouched so the caller may retry.

use std::collections::BTreeMap;
use std::fs;
use std::io::Write as _;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use thiserror::Error;
use wl_core::TimeSession;

pub mod codec;

/// Storage errors.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The storage directory could not be created or opened.
    #[error("cannot initialize storage directory {path}: {source}")]
    Init {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    /// A partition read failed.
    #[error("cannot read partition {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    /// A partition write failed. The previous contents were restored from
    /// backup where possible.
    #[error("cannot write partition {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    /// The legacy store could not be migrated.
    #[error("legacy migration failed: {0}")]
    Migration(String),
}

/// Outcome of a legacy-store migration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MigrationReport {
    /// Records moved into day partitions.
    pub migrated: usize,
    /// Distinct partitions written to.
    pub partitions: usize,
    /// True when there was no legacy store to migrate.
    pub already_migrated: bool,
}

/// Day-partitioned session store rooted at a base directory.
#[derive(Debug, Clone)]
pub struct RecordStore {
    base_dir: PathBuf,
}

const FILE_PREFIX: &str = "time-tracking-";
const FILE_SUFFIX: &str = ".csv";

impl RecordStore {
    /// Opens a store, creating the base directory if necessary.
    pub fn open(base_dir: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let base_dir = base_dir.into();
        fs::create_dir_all(&base_dir).map_err(|source| StoreError::Init {
            path: base_dir.clone(),
            source,
        })?;
        Ok(Self { base_dir })
    }

    /// The directory partitions live in.
    #[must_use]
    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    /// Path of the partition file for a date.
    #[must_use]
    pub fn partition_path(&self, date: NaiveDate) -> PathBuf {
        self.base_dir
            .join(format!("{FILE_PREFIX}{}{FILE_SUFFIX}", date.format("%Y-%m-%d")))
    }

    /// Persists a closed session into its day partition.
    ///
    /// The partition is chosen by the session's `start_time` local date.
    /// A new id is appended (fast path); an id already present in the
    /// partition supersedes the old record via a full rewrite.
    pub fn save(&self, session: &TimeSession) -> Result<(), StoreError> {
        let date = session.partition_date();
        let path = self.partition_path(date);

        if !path.exists() {
            let mut content = String::from(codec::HEADER);
            content.push('\n');
            content.push_str(&codec::encode_record(session));
            return self.write_new(&path, &content);
        }

        let mut records = self.load_partition(date)?;
        if let Some(existing) = records.iter_mut().find(|r| r.id == session.id) {
            *existing = session.clone();
            self.rewrite(&path, &records)
        } else {
            self.append(&path, session)
        }
    }

    /// Loads all records for a date, oldest first as stored.
    ///
    /// Missing partitions load as empty. Malformed records are skipped
    /// with a warning rather than failing the whole partition.
    pub fn load_partition(&self, date: NaiveDate) -> Result<Vec<TimeSession>, StoreError> {
        let path = self.partition_path(date);
        let content = match fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(source) => return Err(StoreError::Read { path, source }),
        };

        let mut records = Vec::new();
        for row in codec::parse_rows(&content) {
            if codec::is_header(&row) {
                continue;
            }
            match codec::decode_record(&row) {
                Ok(session) => records.push(session),
                Err(e) => {
                    tracing::warn!(partition = %path.display(), error = %e, "skipping malformed record");
                }
            }
        }
        Ok(records)
    }

    /// Loads every record whose partition date falls in the inclusive
    /// range, sorted ascending by start time.
    pub fn load_range(
        &self,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<TimeSession>, StoreError> {
        let mut all = Vec::new();
        let mut date = start;
        while date <= end {
            all.extend(self.load_partition(date)?);
            let Some(next) = date.succ_opt() else { break };
            date = next;
        }
        all.sort_by_key(|s| s.start_time);
        Ok(all)
    }

    /// Discovers existing partitions by enumerating the base directory.
    pub fn list_partitions(&self) -> Result<Vec<NaiveDate>, StoreError> {
        let entries = fs::read_dir(&self.base_dir).map_err(|source| StoreError::Read {
            path: self.base_dir.clone(),
            source,
        })?;

        let mut dates = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|source| StoreError::Read {
                path: self.base_dir.clone(),
                source,
            })?;
            let name = entry.file_name();
            let Some(name) = name.to_str() else { continue };
            let Some(date_part) = name
                .strip_prefix(FILE_PREFIX)
                .and_then(|rest| rest.strip_suffix(FILE_SUFFIX))
            else {
                continue;
            };
            match NaiveDate::parse_from_str(date_part, "%Y-%m-%d") {
                Ok(date) => dates.push(date),
                Err(_) => {
                    tracing::debug!(file = name, "ignoring non-partition file");
                }
            }
        }
        dates.sort_unstable();
        Ok(dates)
    }

    /// Loads every record from every partition, sorted by start time.
    pub fn load_all(&self) -> Result<Vec<TimeSession>, StoreError> {
        let mut all = Vec::new();
        for date in self.list_partitions()? {
            all.extend(self.load_partition(date)?);
        }
        all.sort_by_key(|s| s.start_time);
        Ok(all)
    }

    /// Sums durations grouped by category over the given range (or all
    /// data). Records without a category fold into `"Uncategorized"`.
    pub fn category_totals(
        &self,
        range: Option<(NaiveDate, NaiveDate)>,
    ) -> Result<BTreeMap<String, i64>, StoreError> {
        let records = self.load_in(range)?;
        let mut totals = BTreeMap::new();
        for record in records {
            let category = record
                .category
                .unwrap_or_else(|| "Uncategorized".to_string());
            *totals.entry(category).or_insert(0) += record.duration_ms;
        }
        Ok(totals)
    }

    /// Sums durations for one project over the given range (or all data).
    pub fn project_total(
        &self,
        project: &str,
        range: Option<(NaiveDate, NaiveDate)>,
    ) -> Result<i64, StoreError> {
        Ok(self
            .load_in(range)?
            .into_iter()
            .filter(|r| r.project == project)
            .map(|r| r.duration_ms)
            .sum())
    }

    /// Per-date duration sums over an inclusive range, zero for dates with
    /// no partition.
    ///
    /// A session counts entirely toward its `start_time`'s local date; a
    /// session spanning midnight is not split, so the day it ends on may
    /// undercount its final minutes.
    pub fn daily_totals(
        &self,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<(NaiveDate, i64)>, StoreError> {
        let mut totals = Vec::new();
        let mut date = start;
        while date <= end {
            let sum = self.load_partition(date)?.iter().map(|r| r.duration_ms).sum();
            totals.push((date, sum));
            let Some(next) = date.succ_opt() else { break };
            date = next;
        }
        Ok(totals)
    }

    /// One-time migration from a legacy single-file store into day
    /// partitions.
    ///
    /// Loads every legacy record, groups by partition date, saves each
    /// group (existing ids are superseded, so re-running after a partial
    /// failure converges), then renames the legacy file to `<name>.bak`.
    /// The rename is both the retained backup and the idempotency marker:
    /// a second run finds no legacy file and is a no-op.
    pub fn migrate_legacy(&self, legacy_path: &Path) -> Result<MigrationReport, StoreError> {
        if !legacy_path.exists() {
            return Ok(MigrationReport {
                already_migrated: true,
                ..MigrationReport::default()
            });
        }

        let content = fs::read_to_string(legacy_path).map_err(|source| StoreError::Read {
            path: legacy_path.to_path_buf(),
            source,
        })?;

        let mut report = MigrationReport::default();
        let mut partitions_touched = std::collections::BTreeSet::new();
        for row in codec::parse_rows(&content) {
            if codec::is_header(&row) {
                continue;
            }
            match codec::decode_record(&row) {
                Ok(session) => {
                    self.save(&session)?;
                    partitions_touched.insert(session.partition_date());
                    report.migrated += 1;
                }
                Err(e) => {
                    tracing::warn!(legacy = %legacy_path.display(), error = %e, "skipping malformed legacy record");
                }
            }
        }
        report.partitions = partitions_touched.len();

        let backup = backup_name(legacy_path);
        fs::rename(legacy_path, &backup).map_err(|e| {
            StoreError::Migration(format!(
                "records migrated but legacy store could not be renamed to {}: {e}",
                backup.display()
            ))
        })?;
        tracing::info!(
            migrated = report.migrated,
            partitions = report.partitions,
            backup = %backup.display(),
            "legacy store migrated"
        );
        Ok(report)
    }

    fn load_in(
        &self,
        range: Option<(NaiveDate, NaiveDate)>,
    ) -> Result<Vec<TimeSession>, StoreError> {
        match range {
            Some((start, end)) => self.load_range(start, end),
            None => self.load_all(),
        }
    }

    /// First write of a partition. Goes through a temp file so a crash
    /// cannot leave a half-written partition behind.
    fn write_new(&self, path: &Path, content: &str) -> Result<(), StoreError> {
        let tmp = tmp_name(path);
        let result = write_file(&tmp, content).and_then(|()| fs::rename(&tmp, path));
        if let Err(source) = result {
            let _ = fs::remove_file(&tmp);
            return Err(StoreError::Write {
                path: path.to_path_buf(),
                source,
            });
        }
        Ok(())
    }

    /// Fast path: append one record to an existing partition.
    fn append(&self, path: &Path, session: &TimeSession) -> Result<(), StoreError> {
        let result = fs::OpenOptions::new()
            .append(true)
            .open(path)
            .and_then(|mut file| file.write_all(codec::encode_record(session).as_bytes()));
        result.map_err(|source| StoreError::Write {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Full rewrite behind a backup: copy the current partition aside,
    /// write the new contents to a temp file, atomically rename it over
    /// the partition, then drop the backup. On failure the backup is
    /// restored and the error surfaced.
    fn rewrite(&self, path: &Path, records: &[TimeSession]) -> Result<(), StoreError> {
        let mut content = String::from(codec::HEADER);
        content.push('\n');
        for record in records {
            content.push_str(&codec::encode_record(record));
        }

        let backup = backup_name(path);
        let tmp = tmp_name(path);

        let result = fs::copy(path, &backup)
            .and_then(|_| write_file(&tmp, &content))
            .and_then(|()| fs::rename(&tmp, path));

        match result {
            Ok(()) => {
                if let Err(e) = fs::remove_file(&backup) {
                    tracing::warn!(backup = %backup.display(), error = %e, "could not remove partition backup");
                }
                Ok(())
            }
            Err(source) => {
                if backup.exists() {
                    match fs::copy(&backup, path) {
                        Ok(_) => {
                            let _ = fs::remove_file(&backup);
                            tracing::warn!(partition = %path.display(), "partition restored from backup after failed write");
                        }
                        Err(e) => {
                            tracing::error!(backup = %backup.display(), error = %e, "could not restore partition from backup");
                        }
                    }
                }
                let _ = fs::remove_file(&tmp);
                Err(StoreError::Write {
                    path: path.to_path_buf(),
                    source,
                })
            }
        }
    }
}

fn write_file(path: &Path, content: &str) -> std::io::Result<()> {
    let mut file = fs::File::create(path)?;
    file.write_all(content.as_bytes())?;
    file.sync_all()
}

fn backup_name(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".bak");
    PathBuf::from(name)
}

fn tmp_name(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".tmp");
    PathBuf::from(name)
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, Local, TimeZone, Utc};
    use tempfile::TempDir;
    use wl_core::SessionContext;

    use super::*;

    /// A closed session starting at the given local clock time.
    fn session_at(
        y: i32,
        m: u32,
        d: u32,
        h: u32,
        minutes: i64,
        project: &str,
    ) -> TimeSession {
        let start = Local
            .with_ymd_and_hms(y, m, d, h, 0, 0)
            .unwrap()
            .with_timezone(&Utc);
        let mut session = TimeSession::begin(
            SessionContext::new("main.rs", "/home/sami/demo/main.rs", project),
            start,
        );
        session.close(start + Duration::minutes(minutes));
        session
    }

    fn store() -> (TempDir, RecordStore) {
        let temp = TempDir::new().unwrap();
        let store = RecordStore::open(temp.path().join("data")).unwrap();
        (temp, store)
    }

    #[test]
    fn open_creates_base_directory() {
        let temp = TempDir::new().unwrap();
        let dir = temp.path().join("nested/worklog");
        let store = RecordStore::open(&dir).unwrap();
        assert!(dir.is_dir());
        assert_eq!(store.base_dir(), dir);
    }

    #[test]
    fn open_fails_loudly_when_directory_cannot_be_created() {
        let temp = TempDir::new().unwrap();
        let blocker = temp.path().join("blocker");
        std::fs::write(&blocker, b"not a directory").unwrap();
        let result = RecordStore::open(blocker.join("sub"));
        assert!(matches!(result, Err(StoreError::Init { .. })));
    }

    #[test]
    fn save_appends_with_header_on_first_write() {
        let (_temp, store) = store();
        let session = session_at(2025, 5, 6, 10, 30, "demo");
        store.save(&session).unwrap();

        let path = store.partition_path(session.partition_date());
        let content = std::fs::read_to_string(&path).unwrap();
        let mut lines = content.lines();
        assert_eq!(lines.next(), Some(codec::HEADER));
        assert_eq!(lines.clone().count(), 1);

        let loaded = store.load_partition(session.partition_date()).unwrap();
        assert_eq!(loaded, vec![session]);
    }

    #[test]
    fn save_existing_id_rewrites_not_duplicates() {
        let (_temp, store) = store();
        let mut session = session_at(2025, 5, 6, 10, 30, "demo");
        store.save(&session).unwrap();

        session.notes = Some("revised".to_string());
        store.save(&session).unwrap();

        let date = session.partition_date();
        let loaded = store.load_partition(date).unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].notes.as_deref(), Some("revised"));

        // Header plus exactly one data row on disk.
        let content = std::fs::read_to_string(store.partition_path(date)).unwrap();
        assert_eq!(content.lines().count(), 2);
        // No backup or temp residue after a clean rewrite.
        assert!(!backup_name(&store.partition_path(date)).exists());
        assert!(!tmp_name(&store.partition_path(date)).exists());
    }

    #[test]
    fn failed_rewrite_restores_partition_and_surfaces_error() {
        let (_temp, store) = store();
        let mut session = session_at(2025, 5, 6, 10, 30, "demo");
        store.save(&session).unwrap();
        let path = store.partition_path(session.partition_date());
        let before = std::fs::read_to_string(&path).unwrap();

        // A directory squatting on the staging file's name makes the
        // rewrite fail after the backup copy was taken.
        std::fs::create_dir(tmp_name(&path)).unwrap();

        session.notes = Some("revised".to_string());
        let result = store.save(&session);
        assert!(matches!(result, Err(StoreError::Write { .. })));

        // Prior contents intact, no backup residue.
        assert_eq!(std::fs::read_to_string(&path).unwrap(), before);
        assert!(!backup_name(&path).exists());

        // With the obstruction cleared the same save goes through.
        std::fs::remove_dir(tmp_name(&path)).unwrap();
        store.save(&session).unwrap();
        let loaded = store.load_partition(session.partition_date()).unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].notes.as_deref(), Some("revised"));
    }

    #[test]
    fn sessions_partition_by_local_start_date() {
        let (_temp, store) = store();
        let days = [(2025, 5, 6), (2025, 5, 7), (2025, 5, 8)];
        for (y, m, d) in days {
            // Two sessions per day.
            store.save(&session_at(y, m, d, 9, 15, "demo")).unwrap();
            store.save(&session_at(y, m, d, 14, 45, "demo")).unwrap();
        }

        let partitions = store.list_partitions().unwrap();
        assert_eq!(partitions.len(), 3);
        for ((y, m, d), date) in days.iter().zip(&partitions) {
            assert_eq!(*date, NaiveDate::from_ymd_opt(*y, *m, *d).unwrap());
            let records = store.load_partition(*date).unwrap();
            assert_eq!(records.len(), 2);
            assert!(records.iter().all(|r| r.partition_date() == *date));
        }
    }

    #[test]
    fn load_partition_skips_malformed_records() {
        let (_temp, store) = store();
        let session = session_at(2025, 5, 6, 10, 30, "demo");
        store.save(&session).unwrap();

        let path = store.partition_path(session.partition_date());
        let mut content = std::fs::read_to_string(&path).unwrap();
        content.push_str("garbage line that is not a record\n");
        content.push_str(&codec::encode_record(&session_at(2025, 5, 6, 12, 10, "demo")));
        std::fs::write(&path, content).unwrap();

        let loaded = store.load_partition(session.partition_date()).unwrap();
        // Both valid records survive the corrupt line between them.
        assert_eq!(loaded.len(), 2);
    }

    #[test]
    fn load_missing_partition_is_empty() {
        let (_temp, store) = store();
        let date = NaiveDate::from_ymd_opt(1999, 1, 1).unwrap();
        assert!(store.load_partition(date).unwrap().is_empty());
    }

    #[test]
    fn load_range_merges_and_sorts() {
        let (_temp, store) = store();
        let late = session_at(2025, 5, 7, 16, 10, "demo");
        let early = session_at(2025, 5, 6, 9, 10, "demo");
        let middle = session_at(2025, 5, 7, 8, 10, "demo");
        for s in [&late, &early, &middle] {
            store.save(s).unwrap();
        }

        let range = store
            .load_range(
                NaiveDate::from_ymd_opt(2025, 5, 6).unwrap(),
                NaiveDate::from_ymd_opt(2025, 5, 8).unwrap(),
            )
            .unwrap();
        assert_eq!(range, vec![early, middle, late]);
    }

    #[test]
    fn load_all_discovers_partitions() {
        let (_temp, store) = store();
        store.save(&session_at(2025, 5, 6, 10, 30, "a")).unwrap();
        store.save(&session_at(2025, 6, 1, 10, 30, "b")).unwrap();
        // Residue files that are not partitions are ignored.
        std::fs::write(store.base_dir().join("notes.txt"), "x").unwrap();

        let all = store.load_all().unwrap();
        assert_eq!(all.len(), 2);
        assert!(all[0].start_time < all[1].start_time);
    }

    #[test]
    fn category_totals_fold_missing_into_uncategorized() {
        let (_temp, store) = store();
        let mut a = session_at(2025, 5, 6, 9, 0, "demo");
        a.duration_ms = 1000;
        a.category = Some("Coding".to_string());
        let mut b = session_at(2025, 5, 6, 10, 0, "demo");
        b.duration_ms = 2000;
        b.category = Some("Coding".to_string());
        let mut c = session_at(2025, 5, 6, 11, 0, "demo");
        c.duration_ms = 3000;
        for s in [&a, &b, &c] {
            store.save(s).unwrap();
        }

        let totals = store.category_totals(None).unwrap();
        assert_eq!(totals.get("Coding"), Some(&3000));
        assert_eq!(totals.get("Uncategorized"), Some(&3000));
        assert_eq!(totals.len(), 2);
    }

    #[test]
    fn project_total_filters_by_project() {
        let (_temp, store) = store();
        let mut a = session_at(2025, 5, 6, 9, 0, "alpha");
        a.duration_ms = 500;
        let mut b = session_at(2025, 5, 6, 10, 0, "beta");
        b.duration_ms = 700;
        let mut c = session_at(2025, 5, 7, 9, 0, "alpha");
        c.duration_ms = 250;
        for s in [&a, &b, &c] {
            store.save(s).unwrap();
        }

        assert_eq!(store.project_total("alpha", None).unwrap(), 750);
        assert_eq!(store.project_total("beta", None).unwrap(), 700);
        assert_eq!(
            store
                .project_total(
                    "alpha",
                    Some((
                        NaiveDate::from_ymd_opt(2025, 5, 6).unwrap(),
                        NaiveDate::from_ymd_opt(2025, 5, 6).unwrap(),
                    ))
                )
                .unwrap(),
            500
        );
    }

    #[test]
    fn daily_totals_cover_absent_partitions_with_zero() {
        let (_temp, store) = store();
        let mut a = session_at(2025, 5, 6, 9, 0, "demo");
        a.duration_ms = 100;
        let mut b = session_at(2025, 5, 8, 9, 0, "demo");
        b.duration_ms = 300;
        store.save(&a).unwrap();
        store.save(&b).unwrap();

        let totals = store
            .daily_totals(
                NaiveDate::from_ymd_opt(2025, 5, 6).unwrap(),
                NaiveDate::from_ymd_opt(2025, 5, 8).unwrap(),
            )
            .unwrap();
        assert_eq!(
            totals,
            vec![
                (NaiveDate::from_ymd_opt(2025, 5, 6).unwrap(), 100),
                (NaiveDate::from_ymd_opt(2025, 5, 7).unwrap(), 0),
                (NaiveDate::from_ymd_opt(2025, 5, 8).unwrap(), 300),
            ]
        );
    }

    #[test]
    fn migrate_legacy_partitions_by_date_and_keeps_backup() {
        let temp = TempDir::new().unwrap();
        let store = RecordStore::open(temp.path().join("data")).unwrap();

        let day_one = session_at(2025, 5, 6, 9, 30, "demo");
        let day_one_later = session_at(2025, 5, 6, 15, 30, "demo");
        let day_two = session_at(2025, 5, 7, 9, 30, "demo");

        let legacy = temp.path().join("time-tracking.csv");
        let mut content = String::from(codec::HEADER);
        content.push('\n');
        for s in [&day_one, &day_one_later, &day_two] {
            content.push_str(&codec::encode_record(s));
        }
        std::fs::write(&legacy, &content).unwrap();

        let report = store.migrate_legacy(&legacy).unwrap();
        assert_eq!(report.migrated, 3);
        assert_eq!(report.partitions, 2);
        assert!(!report.already_migrated);

        // Original retained as backup, not deleted.
        assert!(!legacy.exists());
        assert!(temp.path().join("time-tracking.csv.bak").exists());

        assert_eq!(store.load_partition(day_one.partition_date()).unwrap().len(), 2);
        assert_eq!(store.load_partition(day_two.partition_date()).unwrap().len(), 1);

        // Second run is a no-op.
        let second = store.migrate_legacy(&legacy).unwrap();
        assert!(second.already_migrated);
        assert_eq!(second.migrated, 0);
    }
}

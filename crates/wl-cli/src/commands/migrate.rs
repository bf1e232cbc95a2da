//! Legacy-store migration command.

use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result};
use wl_store::RecordStore;

pub fn run<W: Write>(writer: &mut W, store: &RecordStore, legacy_path: &Path) -> Result<()> {
    let report = store
        .migrate_legacy(legacy_path)
        .with_context(|| format!("failed to migrate {}", legacy_path.display()))?;

    if report.already_migrated {
        writeln!(
            writer,
            "nothing to migrate: {} does not exist",
            legacy_path.display()
        )?;
    } else {
        writeln!(
            writer,
            "migrated {} records into {} partitions; legacy store kept as {}.bak",
            report.migrated,
            report.partitions,
            legacy_path.display()
        )?;
    }
    Ok(())
}

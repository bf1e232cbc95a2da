//! Command-line argument definitions.

use std::path::PathBuf;

use chrono::NaiveDate;
use clap::{Parser, Subcommand};

/// Editor time tracker.
///
/// Tracks elapsed active-work time per file and project, persists
/// completed sessions to day-partitioned storage, and renders aggregate
/// reports.
#[derive(Debug, Parser)]
#[command(name = "wl", version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Path to config file.
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available subcommands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Run the tracking loop.
    ///
    /// Reads newline-delimited JSON events on stdin (activity and context
    /// changes from the editor side, plus start/stop/toggle/set-category/
    /// add-notes commands) until stdin closes or Ctrl-C.
    Track,

    /// Render a time report.
    Report {
        /// Report on today only.
        #[arg(long, conflicts_with_all = ["week", "from", "to"])]
        day: bool,

        /// Report on the current week (Monday through Sunday). Default.
        #[arg(long, conflicts_with_all = ["from", "to"])]
        week: bool,

        /// Start of a custom inclusive date range (YYYY-MM-DD).
        #[arg(long, requires = "to")]
        from: Option<NaiveDate>,

        /// End of a custom inclusive date range (YYYY-MM-DD).
        #[arg(long, requires = "from")]
        to: Option<NaiveDate>,

        /// Restrict totals to one project.
        #[arg(long)]
        project: Option<String>,

        /// Emit JSON instead of a human-readable table.
        #[arg(long)]
        json: bool,
    },

    /// Show storage location and today's totals.
    Status,

    /// Migrate a legacy single-file store into day partitions.
    Migrate {
        /// Legacy store file. Defaults to `time-tracking.csv` next to the
        /// storage directory (or the configured legacy path).
        #[arg(long)]
        legacy: Option<PathBuf>,
    },
}

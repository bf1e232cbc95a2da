//! CLI subcommand implementations.

pub mod migrate;
pub mod report;
pub mod status;
pub mod track;
pub mod util;

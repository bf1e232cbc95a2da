//! Shared utilities for CLI commands.

/// Formats a millisecond total as `Xh Ym` (or `Ym`, or `Zs` under a
/// minute). Display only; stored values stay in milliseconds.
#[must_use]
pub fn format_duration_ms(ms: i64) -> String {
    let total_secs = ms.max(0) / 1000;
    let hours = total_secs / 3600;
    let minutes = (total_secs % 3600) / 60;
    let seconds = total_secs % 60;

    if hours > 0 {
        format!("{hours}h {minutes}m")
    } else if minutes > 0 {
        format!("{minutes}m")
    } else {
        format!("{seconds}s")
    }
}

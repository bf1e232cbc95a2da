//! Inactivity detection.
//!
//! [`IdleMonitor`] is a pure state machine: callers feed it activity
//! timestamps and drive the periodic check with explicit `now` values.
//! The periodic cadence is deliberately coarse (the track loop checks on
//! the order of once per minute) since idle episodes span minutes to
//! hours. The monitor owns no durable state and never fails.

use chrono::{DateTime, Duration, Utc};

/// A transition emitted by the monitor.
///
/// Each idle episode produces exactly one `Detected` and, once activity
/// resumes, exactly one `Returned`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdleSignal {
    /// Inactivity exceeded the threshold.
    Detected {
        /// How long the user had been inactive when detection fired.
        idle_for: Duration,
    },
    /// Activity resumed after an idle episode.
    Returned {
        /// Total length of the idle episode.
        idle_for: Duration,
    },
}

/// Tracks the last-activity timestamp against a configurable threshold.
#[derive(Debug, Clone)]
pub struct IdleMonitor {
    last_activity: DateTime<Utc>,
    threshold: Duration,
    idle_since: Option<DateTime<Utc>>,
}

impl IdleMonitor {
    /// Creates a monitor that considers inactivity beyond `threshold` idle.
    #[must_use]
    pub const fn new(threshold: Duration, now: DateTime<Utc>) -> Self {
        Self {
            last_activity: now,
            threshold,
            idle_since: None,
        }
    }

    /// Updates the threshold. Takes effect on the next [`check`](Self::check).
    pub const fn set_threshold(&mut self, threshold: Duration) {
        self.threshold = threshold;
    }

    /// Whether the monitor is currently in an idle episode.
    #[must_use]
    pub const fn is_idle(&self) -> bool {
        self.idle_since.is_some()
    }

    /// Records user activity.
    ///
    /// Ends a running idle episode, emitting `Returned` exactly once.
    pub fn record_activity(&mut self, now: DateTime<Utc>) -> Option<IdleSignal> {
        self.last_activity = now;
        self.idle_since.take().map(|since| IdleSignal::Returned {
            idle_for: (now - since).max(Duration::zero()),
        })
    }

    /// Periodic threshold check.
    ///
    /// Emits `Detected` exactly once per episode; repeated checks while
    /// already idle are silent.
    pub fn check(&mut self, now: DateTime<Utc>) -> Option<IdleSignal> {
        if self.idle_since.is_some() {
            return None;
        }
        let inactive_for = now - self.last_activity;
        if inactive_for > self.threshold {
            self.idle_since = Some(now);
            return Some(IdleSignal::Detected {
                idle_for: inactive_for,
            });
        }
        None
    }
}

//! The tracked-work session record and its lifecycle.

use chrono::{DateTime, Local, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::types::SessionId;

/// The file/project context a session is opened against.
///
/// `file_name` and `file_path` may be empty for workspace-level tracking
/// (no open file); `project` is an opaque label resolved by the caller.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SessionContext {
    pub file_name: String,
    pub file_path: String,
    pub project: String,
}

impl SessionContext {
    #[must_use]
    pub fn new(
        file_name: impl Into<String>,
        file_path: impl Into<String>,
        project: impl Into<String>,
    ) -> Self {
        Self {
            file_name: file_name.into(),
            file_path: file_path.into(),
            project: project.into(),
        }
    }
}

/// One contiguous tracked interval of work on a file/project.
///
/// A session is open while `end_time` is `None`. While open, `duration_ms`
/// is a display value refreshed from the wall clock; the authoritative
/// duration is fixed at close time as `end_time - start_time`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeSession {
    pub id: SessionId,
    pub file_name: String,
    pub file_path: String,
    pub project: String,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    /// Elapsed milliseconds. Never negative.
    pub duration_ms: i64,
    pub category: Option<String>,
    pub notes: Option<String>,
}

impl TimeSession {
    /// Opens a new session in the given context, starting now.
    #[must_use]
    pub fn begin(context: SessionContext, now: DateTime<Utc>) -> Self {
        Self {
            id: SessionId::generate(),
            file_name: context.file_name,
            file_path: context.file_path,
            project: context.project,
            start_time: now,
            end_time: None,
            duration_ms: 0,
            category: None,
            notes: None,
        }
    }

    /// Whether the session is still open.
    #[must_use]
    pub const fn is_open(&self) -> bool {
        self.end_time.is_none()
    }

    /// Recomputes the display duration from the wall clock.
    ///
    /// No-op on a closed session; the close-time duration is final.
    pub fn refresh_duration(&mut self, now: DateTime<Utc>) {
        if self.is_open() {
            self.duration_ms = (now - self.start_time).num_milliseconds().max(0);
        }
    }

    /// Closes the session, finalizing `end_time` and the duration.
    ///
    /// A clock that stepped backwards is clamped so `end_time >= start_time`
    /// and `duration_ms >= 0` always hold.
    pub fn close(&mut self, now: DateTime<Utc>) {
        if !self.is_open() {
            return;
        }
        let end = now.max(self.start_time);
        self.end_time = Some(end);
        self.duration_ms = (end - self.start_time).num_milliseconds();
    }

    /// The context this session was opened against.
    #[must_use]
    pub fn context(&self) -> SessionContext {
        SessionContext {
            file_name: self.file_name.clone(),
            file_path: self.file_path.clone(),
            project: self.project.clone(),
        }
    }

    /// The day partition this session belongs to: the local calendar date
    /// of `start_time`.
    ///
    /// Sessions spanning midnight are not split; a session starting at
    /// 23:58 belongs entirely to that date.
    #[must_use]
    pub fn partition_date(&self) -> NaiveDate {
        self.start_time.with_timezone(&Local).date_naive()
    }
}

//! The session state machine.
//!
//! [`Tracker`] owns the single open session (or none). It reacts to
//! explicit commands and context-change events, and hands every closed
//! session back to the caller, which persists it and then dispatches any
//! notification. Returning closed sessions instead of writing them here
//! keeps the close/persist/notify ordering in one place and leaves the
//! state machine free of I/O.
//!
//! `&mut self` on every transition makes `start` non-reentrant by
//! construction: a second start cannot begin until the first has closed
//! and replaced the open session.

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::session::{SessionContext, TimeSession};

/// State machine command errors.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TrackerError {
    /// A command that mutates the open session was issued with none open.
    #[error("no active session")]
    NoActiveSession,
}

/// Result of a [`Tracker::toggle`] call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Toggled {
    /// No session was open; one was started.
    Started,
    /// The open session was closed.
    Stopped(TimeSession),
}

/// Owns the current tracking session.
#[derive(Debug, Default)]
pub struct Tracker {
    current: Option<TimeSession>,
}

impl Tracker {
    #[must_use]
    pub const fn new() -> Self {
        Self { current: None }
    }

    /// The open session, if any.
    #[must_use]
    pub const fn current(&self) -> Option<&TimeSession> {
        self.current.as_ref()
    }

    /// Whether a session is open.
    #[must_use]
    pub const fn is_tracking(&self) -> bool {
        self.current.is_some()
    }

    /// Starts a session in the given context.
    ///
    /// If a session is already open it is closed first (rotation); the
    /// closed session is returned for persistence. The new session is open
    /// when this returns.
    pub fn start(&mut self, context: SessionContext, now: DateTime<Utc>) -> Option<TimeSession> {
        let closed = self.stop(now);
        self.current = Some(TimeSession::begin(context, now));
        closed
    }

    /// Closes the open session and returns it; no-op when none is open.
    pub fn stop(&mut self, now: DateTime<Utc>) -> Option<TimeSession> {
        let mut session = self.current.take()?;
        session.close(now);
        Some(session)
    }

    /// Stops if tracking, starts otherwise.
    pub fn toggle(&mut self, context: SessionContext, now: DateTime<Utc>) -> Toggled {
        match self.stop(now) {
            Some(closed) => Toggled::Stopped(closed),
            None => {
                self.current = Some(TimeSession::begin(context, now));
                Toggled::Started
            }
        }
    }

    /// File-switch rotation: if a session is open and the new context names
    /// a different file, close it and open a fresh session in the new
    /// context, returning the closed one.
    ///
    /// With no session open this is a no-op; an idle tracker does not
    /// auto-resume on context changes.
    pub fn handle_context_change(
        &mut self,
        context: SessionContext,
        now: DateTime<Utc>,
    ) -> Option<TimeSession> {
        let open = self.current.as_ref()?;
        if open.file_path == context.file_path && open.file_name == context.file_name {
            return None;
        }
        self.start(context, now)
    }

    /// Called when the idle monitor detects inactivity.
    ///
    /// Never closes the session itself: forcibly discarding active time is
    /// worse than asking. Returns the open session so the caller can
    /// surface a continue-or-stop choice, or `None` when nothing is open.
    #[must_use]
    pub const fn on_idle_detected(&self) -> Option<&TimeSession> {
        self.current.as_ref()
    }

    /// Sets the category on the open session.
    pub fn set_category(&mut self, category: impl Into<String>) -> Result<(), TrackerError> {
        let session = self.current.as_mut().ok_or(TrackerError::NoActiveSession)?;
        session.category = Some(category.into());
        Ok(())
    }

    /// Appends a note line to the open session.
    pub fn add_notes(&mut self, notes: &str) -> Result<(), TrackerError> {
        let session = self.current.as_mut().ok_or(TrackerError::NoActiveSession)?;
        match &mut session.notes {
            Some(existing) => {
                existing.push('\n');
                existing.push_str(notes);
            }
            None => session.notes = Some(notes.to_string()),
        }
        Ok(())
    }

    /// Display-only duration refresh for the open session.
    pub fn refresh(&mut self, now: DateTime<Utc>) {
        if let Some(session) = self.current.as_mut() {
            session.refresh_duration(now);
        }
    }
}

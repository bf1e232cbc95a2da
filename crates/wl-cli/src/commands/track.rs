//! The tracking loop.
//!
//! `wl track` wires the pieces together on one cooperative event loop:
//! newline-delimited JSON events on stdin (the editor side reduced to its
//! interface boundary), the coarse idle check, and the display-only
//! duration refresh. All state lives in [`Engine`], which is synchronous
//! and clock-injected so the whole policy surface is testable without
//! timers.
//!
//! Ordering contract: a session is fully closed before its store write is
//! issued, and the webhook dispatch happens only after the write
//! succeeds. The open session exists only in memory; terminating the
//! process without a clean stop loses it. That is a documented
//! limitation, not masked here.

use anyhow::{Context as _, Result};
use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;
use tokio::io::AsyncBufReadExt;

use wl_core::{IdleMonitor, IdleSignal, SessionContext, TimeSession, Toggled, Tracker, TrackerError};
use wl_hook::WebhookSink;
use wl_store::RecordStore;

use super::util::format_duration_ms;
use crate::Config;

/// Cadence of the idle threshold check. Idle episodes span minutes to
/// hours, so sub-second checking buys nothing.
const IDLE_CHECK_PERIOD: std::time::Duration = std::time::Duration::from_secs(60);

/// One stdin event.
///
/// `activity` and `context` come from the editor's event source;
/// the rest are the user-facing commands.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum InputEvent {
    /// Cursor/document/window activity with no file switch.
    Activity,
    /// The editor focused a different file or workspace context.
    Context {
        #[serde(default)]
        file_name: String,
        #[serde(default)]
        file_path: String,
        #[serde(default)]
        project: String,
    },
    /// Start tracking in the current context (rotating any open session).
    Start,
    /// Stop tracking and persist the session.
    Stop,
    /// Stop if tracking, start otherwise.
    Toggle,
    /// Set the open session's category.
    SetCategory { category: String },
    /// Append a note line to the open session.
    AddNotes { notes: String },
}

/// The tracking loop's state: tracker, idle monitor, store, sink, and
/// the last-resolved editor context.
pub struct Engine {
    tracker: Tracker,
    idle: IdleMonitor,
    store: RecordStore,
    sink: Option<WebhookSink>,
    context: SessionContext,
    /// Auto-track fires once, on the first context event; an explicit
    /// stop disarms it for the rest of the run.
    auto_start_armed: bool,
    auto_dismiss_idle: bool,
    /// An idle prompt is awaiting the user's continue-or-stop choice.
    idle_prompt_pending: bool,
}

impl Engine {
    #[must_use]
    pub fn new(
        store: RecordStore,
        sink: Option<WebhookSink>,
        config: &Config,
        now: DateTime<Utc>,
    ) -> Self {
        // A threshold past chrono's range clamps to "never idle" rather
        // than silently shrinking to some shorter duration.
        let threshold = i64::try_from(config.idle_threshold_secs)
            .ok()
            .and_then(Duration::try_seconds)
            .unwrap_or(Duration::MAX);
        Self {
            tracker: Tracker::new(),
            idle: IdleMonitor::new(threshold, now),
            store,
            sink,
            context: SessionContext::default(),
            auto_start_armed: config.auto_track,
            auto_dismiss_idle: config.auto_dismiss_idle,
            idle_prompt_pending: false,
        }
    }

    /// Parses and handles one stdin line, returning user-visible output.
    pub fn handle_line(&mut self, line: &str, now: DateTime<Utc>) -> Vec<String> {
        match serde_json::from_str::<InputEvent>(line) {
            Ok(event) => self.handle_event(event, now),
            Err(e) => {
                tracing::debug!(error = %e, "unparseable input line");
                vec![format!("warning: ignoring unparseable event: {e}")]
            }
        }
    }

    /// Handles one event. Every event counts as user activity.
    pub fn handle_event(&mut self, event: InputEvent, now: DateTime<Utc>) -> Vec<String> {
        let mut out = Vec::new();
        self.note_activity(now, &mut out);

        match event {
            InputEvent::Activity => {}
            InputEvent::Context {
                file_name,
                file_path,
                project,
            } => {
                let context = SessionContext::new(file_name, file_path, project);
                self.on_context(context, now, &mut out);
            }
            InputEvent::Start => {
                self.auto_start_armed = false;
                if let Some(closed) = self.tracker.start(self.context.clone(), now) {
                    self.commit(closed, &mut out);
                }
                out.push(format!("tracking {}", describe(&self.context)));
            }
            InputEvent::Stop => {
                self.auto_start_armed = false;
                self.idle_prompt_pending = false;
                match self.tracker.stop(now) {
                    Some(closed) => {
                        out.push(format!(
                            "stopped after {}",
                            format_duration_ms(closed.duration_ms)
                        ));
                        self.commit(closed, &mut out);
                    }
                    None => out.push("no active session".to_string()),
                }
            }
            InputEvent::Toggle => match self.tracker.toggle(self.context.clone(), now) {
                Toggled::Started => {
                    self.auto_start_armed = false;
                    out.push(format!("tracking {}", describe(&self.context)));
                }
                Toggled::Stopped(closed) => {
                    self.idle_prompt_pending = false;
                    out.push(format!(
                        "stopped after {}",
                        format_duration_ms(closed.duration_ms)
                    ));
                    self.commit(closed, &mut out);
                }
            },
            InputEvent::SetCategory { category } => {
                match self.tracker.set_category(category) {
                    Ok(()) => out.push("category set".to_string()),
                    Err(TrackerError::NoActiveSession) => {
                        out.push("no active session".to_string());
                    }
                }
            }
            InputEvent::AddNotes { notes } => match self.tracker.add_notes(&notes) {
                Ok(()) => out.push("notes added".to_string()),
                Err(TrackerError::NoActiveSession) => {
                    out.push("no active session".to_string());
                }
            },
        }
        out
    }

    /// Periodic idle check. Emits the continue-or-stop prompt at most once
    /// per idle episode, and only while a session is open.
    pub fn on_idle_tick(&mut self, now: DateTime<Utc>) -> Vec<String> {
        let mut out = Vec::new();
        if let Some(IdleSignal::Detected { idle_for }) = self.idle.check(now) {
            if let Some(open) = self.tracker.on_idle_detected() {
                self.idle_prompt_pending = true;
                out.push(format!(
                    "idle for {} while tracking {}; still working? send {{\"type\":\"stop\"}} to stop",
                    format_duration_ms(idle_for.num_milliseconds()),
                    describe(&open.context()),
                ));
            }
        }
        out
    }

    /// Display-only refresh; returns the status line while tracking.
    pub fn on_refresh_tick(&mut self, now: DateTime<Utc>) -> Option<String> {
        self.tracker.refresh(now);
        self.tracker.current().map(|session| {
            format!(
                "tracking {} ({})",
                describe(&session.context()),
                format_duration_ms(session.duration_ms)
            )
        })
    }

    /// Clean teardown: closes and persists any open session.
    pub fn shutdown(&mut self, now: DateTime<Utc>) -> Vec<String> {
        let mut out = Vec::new();
        if let Some(closed) = self.tracker.stop(now) {
            out.push(format!(
                "stopped after {}",
                format_duration_ms(closed.duration_ms)
            ));
            self.commit(closed, &mut out);
        }
        out
    }

    /// Whether a session is currently open.
    #[must_use]
    pub const fn is_tracking(&self) -> bool {
        self.tracker.is_tracking()
    }

    fn note_activity(&mut self, now: DateTime<Utc>, out: &mut Vec<String>) {
        if let Some(IdleSignal::Returned { idle_for }) = self.idle.record_activity(now) {
            if self.idle_prompt_pending && self.auto_dismiss_idle {
                self.idle_prompt_pending = false;
                out.push(format!(
                    "back after {} idle; tracking continues",
                    format_duration_ms(idle_for.num_milliseconds())
                ));
            }
        }
    }

    fn on_context(&mut self, context: SessionContext, now: DateTime<Utc>, out: &mut Vec<String>) {
        self.context = context.clone();
        if self.auto_start_armed && !self.tracker.is_tracking() {
            self.auto_start_armed = false;
            self.tracker.start(context, now);
            out.push(format!("auto-tracking {}", describe(&self.context)));
        } else if let Some(closed) = self.tracker.handle_context_change(context, now) {
            out.push(format!(
                "switched from {} after {}",
                closed.file_name,
                format_duration_ms(closed.duration_ms)
            ));
            self.commit(closed, out);
        }
    }

    /// Persist a closed session, then (and only then) dispatch the
    /// webhook. A failed write surfaces as a warning without touching the
    /// tracker; the caller may retry with another stop/save.
    fn commit(&mut self, session: TimeSession, out: &mut Vec<String>) {
        match self.store.save(&session) {
            Ok(()) => {
                tracing::debug!(id = %session.id, "session persisted");
                if let Some(sink) = &self.sink {
                    sink.notify_detached(session);
                }
            }
            Err(e) => {
                tracing::error!(error = %e, id = %session.id, "failed to persist session");
                out.push(format!("warning: session not saved: {e}"));
            }
        }
    }
}

fn describe(context: &SessionContext) -> String {
    if context.file_name.is_empty() {
        "workspace".to_string()
    } else {
        context.file_name.clone()
    }
}

/// Runs the tracking loop until stdin closes or Ctrl-C.
pub async fn run(config: &Config) -> Result<()> {
    let store =
        RecordStore::open(config.storage_dir()).context("cannot initialize session storage")?;
    let sink = match &config.webhook_url {
        Some(url) => Some(
            WebhookSink::new(url, config.webhook_secret.clone())
                .context("invalid webhook configuration")?,
        ),
        None => None,
    };
    let mut engine = Engine::new(store, sink, config, Utc::now());

    let mut lines = tokio::io::BufReader::new(tokio::io::stdin()).lines();
    let mut idle_tick = tokio::time::interval(IDLE_CHECK_PERIOD);
    idle_tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
    let refresh_period = std::time::Duration::from_secs(config.refresh_interval_secs.max(1));
    let mut refresh_tick = tokio::time::interval(refresh_period);
    refresh_tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        tokio::select! {
            line = lines.next_line() => {
                match line.context("failed to read stdin")? {
                    Some(line) => {
                        if line.trim().is_empty() {
                            continue;
                        }
                        for msg in engine.handle_line(&line, Utc::now()) {
                            println!("{msg}");
                        }
                    }
                    None => break,
                }
            }
            _ = idle_tick.tick() => {
                for msg in engine.on_idle_tick(Utc::now()) {
                    println!("{msg}");
                }
            }
            _ = refresh_tick.tick() => {
                if let Some(status) = engine.on_refresh_tick(Utc::now()) {
                    use std::io::Write as _;
                    print!("\r{status}  ");
                    let _ = std::io::stdout().flush();
                }
            }
            _ = &mut ctrl_c => break,
        }
    }

    // Dropping the loop cancels both interval timers with it.
    for msg in engine.shutdown(Utc::now()) {
        println!("{msg}");
    }
    Ok(())
}

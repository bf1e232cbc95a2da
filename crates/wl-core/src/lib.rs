//! Core domain logic for the worklog time tracker.
//!
//! This crate contains the fundamental types and logic for:
//! - Sessions: the tracked-work record and its open/close lifecycle
//! - Tracking: the state machine owning the single open session
//! - Idle detection: the last-activity threshold state machine
//!
//! Everything here is pure: state machines take explicit `now` values and
//! perform no I/O, so the CLI event loop can drive them from timers while
//! tests drive them from fixed timestamps.

pub mod idle;
pub mod session;
pub mod tracker;
mod types;

pub use idle::{IdleMonitor, IdleSignal};
pub use session::{SessionContext, TimeSession};
pub use tracker::{Toggled, Tracker, TrackerError};
pub use types::{EventId, SessionId, ValidationError};

//! Webhook delivery for completed sessions.
//!
//! When a destination URL is configured, every closed session is wrapped
//! in an event envelope and posted to it. Delivery is best-effort by
//! contract: it runs as a detached task, its failures are logged and
//! swallowed, and nothing here can affect session persistence. Callers
//! must persist the session *before* dispatching the notification.

use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use serde::Serialize;
use sha2::Sha256;
use thiserror::Error;
use wl_core::{EventId, TimeSession};

/// Event-type tag attached to every completed-session envelope.
pub const SESSION_COMPLETED: &str = "time.session.completed";

/// Default request timeout for deliveries.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Signature header carrying the hex HMAC-SHA-256 of the request body.
pub const SIGNATURE_HEADER: &str = "x-worklog-signature";
/// Header carrying the envelope's event id.
pub const EVENT_ID_HEADER: &str = "x-worklog-event-id";
/// Header carrying the envelope's emission timestamp.
pub const TIMESTAMP_HEADER: &str = "x-worklog-timestamp";

type HmacSha256 = Hmac<Sha256>;

/// Webhook delivery errors. These never propagate past the sink's
/// detached task; they exist so the task can log something useful.
#[derive(Debug, Error)]
pub enum HookError {
    /// The configured destination URL was empty.
    #[error("webhook URL cannot be empty")]
    EmptyUrl,
    /// Failed to build the HTTP client.
    #[error("failed to build HTTP client: {0}")]
    ClientBuild(#[source] reqwest::Error),
    /// Failed to serialize the event payload.
    #[error("failed to serialize event: {0}")]
    Serialize(#[from] serde_json::Error),
    /// The HTTP request failed.
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),
    /// The destination answered with a non-success status.
    #[error("destination rejected event: HTTP {status}")]
    Rejected { status: u16 },
}

/// The envelope posted for each closed session.
#[derive(Debug, Clone, Serialize)]
pub struct SessionCompletedEvent {
    /// Unique per delivery, for receiver-side deduplication.
    pub event_id: EventId,
    /// When the envelope was built.
    pub emitted_at: DateTime<Utc>,
    #[serde(rename = "type")]
    pub event_type: &'static str,
    /// The full closed session.
    pub session: TimeSession,
}

impl SessionCompletedEvent {
    /// Wraps a closed session in a fresh envelope.
    #[must_use]
    pub fn new(session: TimeSession, now: DateTime<Utc>) -> Self {
        Self {
            event_id: EventId::generate(),
            emitted_at: now,
            event_type: SESSION_COMPLETED,
            session,
        }
    }
}

/// Best-effort outbound event sink.
///
/// # Thread Safety
///
/// The sink is safe to clone and share across tasks. Each clone shares
/// the underlying HTTP connection pool.
#[derive(Clone)]
pub struct WebhookSink {
    http: reqwest::Client,
    url: String,
    secret: Option<String>,
}

impl fmt::Debug for WebhookSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WebhookSink")
            .field("url", &self.url)
            .field("secret", &self.secret.as_ref().map(|_| "[REDACTED]"))
            .finish_non_exhaustive()
    }
}

impl WebhookSink {
    /// Creates a sink for the given destination.
    ///
    /// When `secret` is set, every delivery carries an HMAC-SHA-256
    /// signature over the serialized body.
    pub fn new(url: impl Into<String>, secret: Option<String>) -> Result<Self, HookError> {
        let url = url.into();
        if url.trim().is_empty() {
            return Err(HookError::EmptyUrl);
        }

        let http = reqwest::Client::builder()
            .timeout(DEFAULT_TIMEOUT)
            .build()
            .map_err(HookError::ClientBuild)?;

        Ok(Self { http, url, secret })
    }

    /// Dispatches a completed-session event without awaiting the result.
    ///
    /// The delivery runs on a detached task. Failures are logged at warn
    /// level and otherwise discarded; the caller is never blocked and
    /// never sees an error.
    pub fn notify_detached(&self, session: TimeSession) {
        let sink = self.clone();
        let event = SessionCompletedEvent::new(session, Utc::now());
        tokio::spawn(async move {
            let event_id = event.event_id.clone();
            match sink.deliver(&event).await {
                Ok(()) => {
                    tracing::debug!(%event_id, "webhook delivered");
                }
                Err(e) => {
                    tracing::warn!(%event_id, error = %e, "webhook delivery failed");
                }
            }
        });
    }

    /// Delivers one event, returning the failure for logging.
    pub async fn deliver(&self, event: &SessionCompletedEvent) -> Result<(), HookError> {
        let body = serde_json::to_vec(event)?;

        let mut request = self
            .http
            .post(&self.url)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .header(EVENT_ID_HEADER, event.event_id.as_str())
            .header(TIMESTAMP_HEADER, event.emitted_at.to_rfc3339());

        if let Some(secret) = &self.secret {
            request = request.header(SIGNATURE_HEADER, sign(secret, &body));
        }

        let response = request.body(body).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(HookError::Rejected {
                status: status.as_u16(),
            });
        }
        Ok(())
    }
}

/// Hex-encoded HMAC-SHA-256 of `body` keyed by `secret`.
#[must_use]
pub fn sign(secret: &str, body: &[u8]) -> String {
    // HMAC accepts keys of any length.
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .unwrap_or_else(|_| unreachable!("HMAC accepts any key length"));
    mac.update(body);
    let digest = mac.finalize().into_bytes();
    let mut out = String::with_capacity(digest.len() * 2);
    use std::fmt::Write as _;
    for byte in digest {
        let _ = write!(out, "{byte:02x}");
    }
    out
}

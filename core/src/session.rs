//! Call identity and the reconstructed per-call session state.
//!
//! A [`CallSession`] is never constructed from the wire directly. It is built
//! by the session reducer from `call_started` events and then updated by every
//! subsequent event referencing the same [`CallId`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Producer-assigned event time, in milliseconds since the Unix epoch.
pub type Millis = i64;

/// Opaque identifier for a phone call.
///
/// Unique for the lifetime of the process. The console never interprets the
/// contents, it only uses it as the registry key.
///
/// # Examples
///
/// ```
/// use liveops_core::session::CallId;
///
/// let id = CallId::new("call_8f3k2m1q");
/// assert_eq!(id.as_str(), "call_8f3k2m1q");
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CallId(String);

impl CallId {
    /// Create a new `CallId` from a string.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get the call ID as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CallId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for CallId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for CallId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// Status of a call as shown in the console.
///
/// There is no enforced transition graph: any status may follow any other,
/// including leaving `Ended`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CallStatus {
    /// The assistant is handling the call
    #[default]
    Active,
    /// Flagged for supervisor attention
    Watch,
    /// Blocked by policy
    Blocked,
    /// Call finished
    Ended,
    /// A human operator took over
    Human,
}

impl CallStatus {
    /// All statuses, in console display order.
    pub const ALL: [Self; 5] = [
        Self::Active,
        Self::Watch,
        Self::Blocked,
        Self::Ended,
        Self::Human,
    ];

    /// Wire name of the status.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Watch => "watch",
            Self::Blocked => "blocked",
            Self::Ended => "ended",
            Self::Human => "human",
        }
    }

    /// Label shown on the status badge.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Active => "Active",
            Self::Watch => "Watch",
            Self::Blocked => "Blocked",
            Self::Ended => "Ended",
            Self::Human => "Takeover",
        }
    }

    /// Whether the call is finished.
    #[must_use]
    pub const fn is_ended(self) -> bool {
        matches!(self, Self::Ended)
    }
}

impl fmt::Display for CallStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Who spoke a transcript line.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TranscriptRole {
    /// The caller
    Customer,
    /// The voice assistant
    Assistant,
    /// System annotations
    System,
}

impl TranscriptRole {
    /// Wire name of the role.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Customer => "customer",
            Self::Assistant => "assistant",
            Self::System => "system",
        }
    }

    /// Short speaker prefix used in the call queue preview.
    #[must_use]
    pub const fn speaker_label(self) -> &'static str {
        match self {
            Self::Customer => "Caller",
            Self::Assistant => "AI",
            Self::System => "System",
        }
    }
}

impl fmt::Display for TranscriptRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One line of a call transcript.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranscriptEntry {
    /// `<callId>-<at>`; not unique when two lines share a timestamp
    pub id: String,
    /// Speaker
    pub role: TranscriptRole,
    /// Spoken text
    pub text: String,
    /// Event time of the line
    pub at: Millis,
}

impl TranscriptEntry {
    /// Build an entry with the synthesized `<callId>-<at>` identifier.
    #[must_use]
    pub fn new(call_id: &CallId, role: TranscriptRole, text: impl Into<String>, at: Millis) -> Self {
        Self {
            id: format!("{call_id}-{at}"),
            role,
            text: text.into(),
            at,
        }
    }
}

/// Reconstructed state of one phone call.
///
/// The transcript is kept in arrival order, not timestamp order.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallSession {
    /// Registry key
    pub call_id: CallId,
    /// Caller number as displayed
    pub phone_e164: String,
    /// Current status
    pub status: CallStatus,
    /// Time of the first `call_started` seen for this call
    pub started_at: Millis,
    /// Time of the last event that touched this call
    pub updated_at: Millis,
    /// Append-only transcript
    pub transcript: Vec<TranscriptEntry>,
    /// Recording link, once available
    pub recording_url: Option<String>,
    /// Reason attached to the latest status change that carried one
    pub reason: Option<String>,
}

impl CallSession {
    /// Create a fresh session as produced by a first `call_started` event.
    #[must_use]
    pub fn new(call_id: CallId, phone_e164: impl Into<String>, at: Millis) -> Self {
        Self {
            call_id,
            phone_e164: phone_e164.into(),
            status: CallStatus::default(),
            started_at: at,
            updated_at: at,
            transcript: Vec::new(),
            recording_url: None,
            reason: None,
        }
    }

    /// The most recent transcript line, if any.
    #[must_use]
    pub fn latest_entry(&self) -> Option<&TranscriptEntry> {
        self.transcript.last()
    }

    /// Last-update time as a UTC timestamp.
    ///
    /// Returns `None` if the producer sent a time outside chrono's range.
    #[must_use]
    pub fn updated_at_utc(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp_millis(self.updated_at)
    }

    /// One-line preview of the latest transcript line, as shown in the queue.
    #[must_use]
    pub fn preview(&self) -> String {
        self.latest_entry().map_or_else(
            || "Awaiting transcript...".to_string(),
            |entry| format!("{}: {}", entry.role.speaker_label(), entry.text),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transcript_entry_id_is_call_and_time() {
        let entry = TranscriptEntry::new(&CallId::new("c1"), TranscriptRole::Customer, "hi", 10);
        assert_eq!(entry.id, "c1-10");
    }

    #[test]
    fn new_session_defaults() {
        let session = CallSession::new(CallId::new("c1"), "+12125550199", 42);
        assert_eq!(session.status, CallStatus::Active);
        assert_eq!(session.started_at, 42);
        assert_eq!(session.updated_at, 42);
        assert!(session.transcript.is_empty());
        assert!(session.recording_url.is_none());
        assert!(session.reason.is_none());
    }

    #[test]
    fn preview_uses_latest_line() {
        let id = CallId::new("c1");
        let mut session = CallSession::new(id.clone(), "+1", 0);
        assert_eq!(session.preview(), "Awaiting transcript...");

        session
            .transcript
            .push(TranscriptEntry::new(&id, TranscriptRole::Customer, "hi", 1));
        session
            .transcript
            .push(TranscriptEntry::new(&id, TranscriptRole::Assistant, "hello", 2));
        assert_eq!(session.preview(), "AI: hello");
    }

    #[test]
    fn updated_at_converts_to_utc() {
        let mut session = CallSession::new(CallId::new("c1"), "+1", 0);
        session.updated_at = 1_735_689_600_000;
        assert_eq!(
            session.updated_at_utc().map(|t| t.to_rfc3339()),
            Some("2025-01-01T00:00:00+00:00".to_string())
        );

        session.updated_at = Millis::MAX;
        assert!(session.updated_at_utc().is_none());
    }

    #[test]
    fn status_labels() {
        assert_eq!(CallStatus::Human.label(), "Takeover");
        assert_eq!(CallStatus::Watch.as_str(), "watch");
        assert!(CallStatus::Ended.is_ended());
        assert!(!CallStatus::Blocked.is_ended());
    }

    #[test]
    fn status_serializes_snake_case() {
        let json = serde_json::to_string(&CallStatus::Human).unwrap();
        assert_eq!(json, "\"human\"");
    }
}

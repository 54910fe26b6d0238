//! The wire-level event envelope shared by event producers and the console.
//!
//! Every message is a JSON object discriminated by its `type` field:
//!
//! | `type` | fields |
//! |---|---|
//! | `call_started` | `callId`, `phoneE164`, `at` |
//! | `transcript_appended` | `callId`, `role`, `text`, `at` |
//! | `call_status` | `callId`, `status`, `at`, `reason?` |
//! | `recording_ready` | `callId`, `url`, `at` |
//!
//! Unrecognized discriminants decode to [`LiveOpsEvent::Unrecognized`] instead
//! of failing, so newer producers never break older consoles.
//!
//! # Example
//!
//! ```
//! use liveops_core::event::{decode, LiveOpsEvent};
//!
//! let event = decode(r#"{"type":"call_started","callId":"c1","phoneE164":"+1","at":0}"#).unwrap();
//! assert_eq!(event.kind(), "call_started");
//!
//! let future = decode(r#"{"type":"sentiment_scored","callId":"c1","score":0.4}"#).unwrap();
//! assert!(matches!(future, LiveOpsEvent::Unrecognized));
//! ```

use crate::session::{CallId, CallStatus, Millis, TranscriptRole};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Discriminants the console understands.
pub const KNOWN_KINDS: [&str; 4] = [
    CALL_STARTED,
    TRANSCRIPT_APPENDED,
    CALL_STATUS,
    RECORDING_READY,
];

/// `type` of a call start event.
pub const CALL_STARTED: &str = "call_started";
/// `type` of a transcript line event.
pub const TRANSCRIPT_APPENDED: &str = "transcript_appended";
/// `type` of a status change event.
pub const CALL_STATUS: &str = "call_status";
/// `type` of a recording availability event.
pub const RECORDING_READY: &str = "recording_ready";

/// Errors produced while decoding a raw message.
///
/// All of these are per-message problems: the caller drops the message and
/// keeps consuming the stream.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    /// The message carried no payload.
    #[error("Empty event payload")]
    Empty,

    /// The payload is not valid JSON.
    #[error("Invalid JSON payload: {0}")]
    InvalidJson(String),

    /// The payload has no string `type` field.
    #[error("Event payload has no type field")]
    MissingType,

    /// A known discriminant with missing or mistyped fields.
    #[error("Invalid {kind} payload: {reason}")]
    InvalidPayload {
        /// The discriminant that failed to decode
        kind: String,
        /// Decoder message
        reason: String,
    },
}

/// One state change reported by an event source.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LiveOpsEvent {
    /// A call was connected (or re-announced)
    #[serde(rename_all = "camelCase")]
    CallStarted {
        /// Call identifier
        call_id: CallId,
        /// Caller number
        phone_e164: String,
        /// Event time
        at: Millis,
    },

    /// A transcript line was spoken
    #[serde(rename_all = "camelCase")]
    TranscriptAppended {
        /// Call identifier
        call_id: CallId,
        /// Speaker
        role: TranscriptRole,
        /// Spoken text
        text: String,
        /// Event time
        at: Millis,
    },

    /// The call changed status
    #[serde(rename_all = "camelCase")]
    CallStatus {
        /// Call identifier
        call_id: CallId,
        /// New status
        status: CallStatus,
        /// Event time
        at: Millis,
        /// Optional human-readable reason
        #[serde(default, skip_serializing_if = "Option::is_none")]
        reason: Option<String>,
    },

    /// A recording of the call can be fetched
    #[serde(rename_all = "camelCase")]
    RecordingReady {
        /// Call identifier
        call_id: CallId,
        /// Recording link
        url: String,
        /// Event time
        at: Millis,
    },

    /// Any discriminant this build does not know about
    #[serde(other)]
    Unrecognized,
}

impl LiveOpsEvent {
    /// Wire discriminant of the event.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::CallStarted { .. } => CALL_STARTED,
            Self::TranscriptAppended { .. } => TRANSCRIPT_APPENDED,
            Self::CallStatus { .. } => CALL_STATUS,
            Self::RecordingReady { .. } => RECORDING_READY,
            Self::Unrecognized => "unrecognized",
        }
    }

    /// Call the event refers to; `None` for unrecognized events.
    #[must_use]
    pub const fn call_id(&self) -> Option<&CallId> {
        match self {
            Self::CallStarted { call_id, .. }
            | Self::TranscriptAppended { call_id, .. }
            | Self::CallStatus { call_id, .. }
            | Self::RecordingReady { call_id, .. } => Some(call_id),
            Self::Unrecognized => None,
        }
    }

    /// Producer-assigned event time; `None` for unrecognized events.
    #[must_use]
    pub const fn at(&self) -> Option<Millis> {
        match self {
            Self::CallStarted { at, .. }
            | Self::TranscriptAppended { at, .. }
            | Self::CallStatus { at, .. }
            | Self::RecordingReady { at, .. } => Some(*at),
            Self::Unrecognized => None,
        }
    }

    /// Encode the event as its JSON wire form.
    ///
    /// # Errors
    ///
    /// Returns the serializer error; none of the event fields can actually
    /// fail to serialize.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

/// Decode one raw message into an event.
///
/// A message must be a JSON object with a string `type`. Known discriminants
/// must carry their fields; unknown discriminants decode to
/// [`LiveOpsEvent::Unrecognized`] regardless of their other fields.
///
/// # Errors
///
/// Returns a [`DecodeError`] describing why the message must be dropped.
pub fn decode(raw: &str) -> Result<LiveOpsEvent, DecodeError> {
    if raw.trim().is_empty() {
        return Err(DecodeError::Empty);
    }

    let value: serde_json::Value =
        serde_json::from_str(raw).map_err(|e| DecodeError::InvalidJson(e.to_string()))?;

    let Some(kind) = value.get("type").and_then(serde_json::Value::as_str) else {
        return Err(DecodeError::MissingType);
    };

    if !KNOWN_KINDS.contains(&kind) {
        tracing::trace!(kind, "Decoded unrecognized event kind");
        return Ok(LiveOpsEvent::Unrecognized);
    }

    let kind = kind.to_string();
    serde_json::from_value(value).map_err(|e| DecodeError::InvalidPayload {
        kind,
        reason: e.to_string(),
    })
}

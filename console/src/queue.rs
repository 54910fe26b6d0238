//! Flattened view of the call queue for display.

use liveops_core::registry::SessionRegistry;
use liveops_core::session::{CallStatus, TranscriptRole};
use liveops_core::{DateTime, Utc};

/// One line of the queue, most recently active first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueRow {
    /// Call identifier
    pub call_id: String,
    /// Caller number
    pub phone: String,
    /// Status badge label
    pub status: &'static str,
    /// Reason for the current status
    pub reason: Option<String>,
    /// Latest transcript line with its speaker
    pub last_line: String,
    /// Recording available
    pub has_recording: bool,
    /// Time of the last event on this call
    pub updated_at: Option<DateTime<Utc>>,
}

/// Per-status counts in [`CallStatus::ALL`] order.
pub fn status_counts(registry: &SessionRegistry) -> Vec<(&'static str, usize)> {
    CallStatus::ALL
        .iter()
        .map(|status| (status.label(), registry.count_by_status(*status)))
        .collect()
}

/// Rows ordered by recent activity.
pub fn rows(registry: &SessionRegistry) -> Vec<QueueRow> {
    registry
        .by_recent_activity()
        .into_iter()
        .map(|session| QueueRow {
            call_id: session.call_id.to_string(),
            phone: session.phone_e164.clone(),
            status: session.status.label(),
            reason: session.reason.clone(),
            last_line: session.preview(),
            has_recording: session.recording_url.is_some(),
            updated_at: session.updated_at_utc(),
        })
        .collect()
}

/// Calls still waiting on the assistant or a human.
pub fn open_calls(registry: &SessionRegistry) -> usize {
    registry.iter().filter(|s| !s.status.is_ended()).count()
}

/// Whether the caller spoke last on any open call.
pub fn callers_waiting(registry: &SessionRegistry) -> usize {
    registry
        .iter()
        .filter(|s| !s.status.is_ended())
        .filter(|s| matches!(s.latest_entry(), Some(e) if e.role == TranscriptRole::Customer))
        .count()
}

//! Folding source events into the session registry.
//!
//! [`reduce`] is the whole reconciliation policy:
//!
//! - `call_started` upserts: the phone number is always overwritten, every
//!   other field is kept from the existing session or defaulted.
//! - `transcript_appended`, `call_status` and `recording_ready` for an unknown
//!   call return the registry unchanged. They are not errors.
//! - Every event applied to a known call moves its `updated_at` to the event
//!   time.
//! - Unrecognized events return the registry unchanged.
//!
//! No event checks the current status before applying, so a recording can land
//! on an ended call and an ended call can become active again.

use crate::event::LiveOpsEvent;
use crate::registry::SessionRegistry;
use crate::reducer::Reducer;
use crate::session::{CallSession, TranscriptEntry};

/// Apply one event to a registry and return the next registry.
///
/// Pure: no I/O, no clock, no hidden state. Duplicate `call_started` events
/// and events for unknown calls are absorbed, which makes at-least-once
/// delivery safe to feed through this function.
///
/// # Example
///
/// ```
/// use liveops_core::event::LiveOpsEvent;
/// use liveops_core::reconcile::reduce;
/// use liveops_core::registry::SessionRegistry;
/// use liveops_core::session::CallId;
///
/// let registry = reduce(
///     SessionRegistry::new(),
///     LiveOpsEvent::CallStarted {
///         call_id: CallId::new("c1"),
///         phone_e164: "+1".to_string(),
///         at: 0,
///     },
/// );
/// assert_eq!(registry.len(), 1);
/// ```
#[must_use]
pub fn reduce(mut registry: SessionRegistry, event: LiveOpsEvent) -> SessionRegistry {
    match event {
        LiveOpsEvent::CallStarted {
            call_id,
            phone_e164,
            at,
        } => {
            if let Some(session) = registry.get_mut(&call_id) {
                session.phone_e164 = phone_e164;
                session.updated_at = at;
            } else {
                registry.insert(CallSession::new(call_id, phone_e164, at));
            }
        }

        LiveOpsEvent::TranscriptAppended {
            call_id,
            role,
            text,
            at,
        } => {
            let Some(session) = registry.get_mut(&call_id) else {
                tracing::trace!(%call_id, "Transcript line for unknown call ignored");
                return registry;
            };
            session
                .transcript
                .push(TranscriptEntry::new(&call_id, role, text, at));
            session.updated_at = at;
        }

        LiveOpsEvent::CallStatus {
            call_id,
            status,
            at,
            reason,
        } => {
            let Some(session) = registry.get_mut(&call_id) else {
                tracing::trace!(%call_id, "Status change for unknown call ignored");
                return registry;
            };
            session.status = status;
            if reason.is_some() {
                session.reason = reason;
            }
            session.updated_at = at;
        }

        LiveOpsEvent::RecordingReady { call_id, url, at } => {
            let Some(session) = registry.get_mut(&call_id) else {
                tracing::trace!(%call_id, "Recording for unknown call ignored");
                return registry;
            };
            session.recording_url = Some(url);
            session.updated_at = at;
        }

        LiveOpsEvent::Unrecognized => {}
    }

    registry
}

/// [`Reducer`] adapter around [`reduce`] for source events.
#[derive(Clone, Copy, Debug, Default)]
pub struct SessionReducer;

impl SessionReducer {
    /// Create a new `SessionReducer`
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl Reducer for SessionReducer {
    type State = SessionRegistry;
    type Action = LiveOpsEvent;
    type Environment = ();

    fn reduce(
        &self,
        state: Self::State,
        action: Self::Action,
        _env: &Self::Environment,
    ) -> Self::State {
        reduce(state, action)
    }
}

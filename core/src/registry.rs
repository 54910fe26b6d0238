//! The keyed collection of all known call sessions.
//!
//! The registry is a value: the reducer consumes one registry and returns the
//! next. Sessions are held behind `Arc` so that cloning a registry for a new
//! snapshot only copies pointers, and updating one call only copies that call.

use crate::session::{CallId, CallSession, CallStatus};
use std::collections::HashMap;
use std::sync::Arc;

/// Mapping from call identifier to reconstructed session.
///
/// Iteration order is unspecified. Use [`SessionRegistry::by_recent_activity`]
/// or [`SessionRegistry::by_start_time`] for display order.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SessionRegistry {
    sessions: HashMap<CallId, Arc<CallSession>>,
}

impl SessionRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of known calls.
    #[must_use]
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    /// Whether no call has been seen yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Look up a call.
    #[must_use]
    pub fn get(&self, call_id: &CallId) -> Option<&CallSession> {
        self.sessions.get(call_id).map(AsRef::as_ref)
    }

    /// Whether the call is known.
    #[must_use]
    pub fn contains(&self, call_id: &CallId) -> bool {
        self.sessions.contains_key(call_id)
    }

    /// Iterate over all sessions in unspecified order.
    pub fn iter(&self) -> impl Iterator<Item = &CallSession> {
        self.sessions.values().map(AsRef::as_ref)
    }

    /// Sessions ordered by most recent update first.
    ///
    /// Ties are broken by call id so the order is stable between snapshots.
    #[must_use]
    pub fn by_recent_activity(&self) -> Vec<&CallSession> {
        let mut sessions: Vec<_> = self.iter().collect();
        sessions.sort_by(|a, b| {
            b.updated_at
                .cmp(&a.updated_at)
                .then_with(|| a.call_id.cmp(&b.call_id))
        });
        sessions
    }

    /// Sessions ordered by start time, oldest first.
    #[must_use]
    pub fn by_start_time(&self) -> Vec<&CallSession> {
        let mut sessions: Vec<_> = self.iter().collect();
        sessions.sort_by(|a, b| {
            a.started_at
                .cmp(&b.started_at)
                .then_with(|| a.call_id.cmp(&b.call_id))
        });
        sessions
    }

    /// Number of sessions currently in `status`.
    #[must_use]
    pub fn count_by_status(&self, status: CallStatus) -> usize {
        self.iter().filter(|s| s.status == status).count()
    }

    /// Insert or replace a session under its own call id.
    pub(crate) fn insert(&mut self, session: CallSession) {
        self.sessions
            .insert(session.call_id.clone(), Arc::new(session));
    }

    /// Mutable access to one session, copying it first if a snapshot shares it.
    pub(crate) fn get_mut(&mut self, call_id: &CallId) -> Option<&mut CallSession> {
        self.sessions.get_mut(call_id).map(Arc::make_mut)
    }
}

impl FromIterator<CallSession> for SessionRegistry {
    fn from_iter<I: IntoIterator<Item = CallSession>>(iter: I) -> Self {
        let mut registry = Self::new();
        for session in iter {
            registry.insert(session);
        }
        registry
    }
}

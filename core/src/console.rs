//! Console-level actions: source events plus operator overrides.
//!
//! Operators can force a call's status from the console (for example taking a
//! call over from the assistant). Those commands are turned into ordinary
//! `call_status` events stamped by the injected [`Clock`], so the registry only
//! ever changes through [`reduce`].

use crate::environment::Clock;
use crate::event::LiveOpsEvent;
use crate::reconcile::reduce;
use crate::reducer::Reducer;
use crate::registry::SessionRegistry;
use crate::session::{CallId, CallStatus};
use std::sync::Arc;

/// Reason attached when an operator takes a call over.
pub const TAKEOVER_REASON: &str = "Manual takeover initiated";

/// Everything that can change the console's registry.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ConsoleAction {
    /// An event delivered by the stream client or the synthetic generator
    Event(LiveOpsEvent),

    /// Operator forces a status on a call
    SetStatus {
        /// Target call
        call_id: CallId,
        /// Status to apply
        status: CallStatus,
        /// Reason shown next to the status
        reason: String,
    },

    /// Operator takes the call over from the assistant
    TakeOver {
        /// Target call
        call_id: CallId,
    },
}

impl From<LiveOpsEvent> for ConsoleAction {
    fn from(event: LiveOpsEvent) -> Self {
        Self::Event(event)
    }
}

/// Environment dependencies for the console reducer
#[derive(Clone)]
pub struct ConsoleEnvironment {
    /// Clock used to stamp operator commands
    pub clock: Arc<dyn Clock>,
}

impl ConsoleEnvironment {
    /// Creates a new `ConsoleEnvironment`
    #[must_use]
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self { clock }
    }
}

impl std::fmt::Debug for ConsoleEnvironment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConsoleEnvironment").finish_non_exhaustive()
    }
}

/// Reducer for [`ConsoleAction`]s
#[derive(Clone, Copy, Debug, Default)]
pub struct ConsoleReducer;

impl ConsoleReducer {
    /// Creates a new `ConsoleReducer`
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    fn status_event(
        call_id: CallId,
        status: CallStatus,
        reason: String,
        env: &ConsoleEnvironment,
    ) -> LiveOpsEvent {
        LiveOpsEvent::CallStatus {
            call_id,
            status,
            at: env.clock.now_millis(),
            reason: Some(reason),
        }
    }
}

impl Reducer for ConsoleReducer {
    type State = SessionRegistry;
    type Action = ConsoleAction;
    type Environment = ConsoleEnvironment;

    fn reduce(
        &self,
        state: Self::State,
        action: Self::Action,
        env: &Self::Environment,
    ) -> Self::State {
        match action {
            ConsoleAction::Event(event) => reduce(state, event),

            ConsoleAction::SetStatus {
                call_id,
                status,
                reason,
            } => {
                tracing::info!(%call_id, %status, "Operator status override");
                reduce(state, Self::status_event(call_id, status, reason, env))
            }

            ConsoleAction::TakeOver { call_id } => {
                tracing::info!(%call_id, "Operator takeover");
                reduce(
                    state,
                    Self::status_event(call_id, CallStatus::Human, TAKEOVER_REASON.to_string(), env),
                )
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, TimeZone, Utc};

    struct StoppedClock(DateTime<Utc>);

    impl Clock for StoppedClock {
        fn now(&self) -> DateTime<Utc> {
            self.0
        }
    }

    fn env_at(millis: i64) -> ConsoleEnvironment {
        let time = Utc.timestamp_millis_opt(millis).single().unwrap();
        ConsoleEnvironment::new(Arc::new(StoppedClock(time)))
    }

    fn with_call(id: &str) -> SessionRegistry {
        reduce(
            SessionRegistry::new(),
            LiveOpsEvent::CallStarted {
                call_id: CallId::new(id),
                phone_e164: "+1".to_string(),
                at: 0,
            },
        )
    }

    #[test]
    fn take_over_sets_human_with_reason_and_clock_time() {
        let env = env_at(1_700_000_000_000);
        let registry = ConsoleReducer.reduce(
            with_call("c1"),
            ConsoleAction::TakeOver {
                call_id: CallId::new("c1"),
            },
            &env,
        );
        let session = registry.get(&CallId::new("c1")).unwrap();

        assert_eq!(session.status, CallStatus::Human);
        assert_eq!(session.reason.as_deref(), Some(TAKEOVER_REASON));
        assert_eq!(session.updated_at, 1_700_000_000_000);
    }

    #[test]
    fn set_status_on_unknown_call_is_a_no_op() {
        let before = with_call("c1");
        let after = ConsoleReducer.reduce(
            before.clone(),
            ConsoleAction::SetStatus {
                call_id: CallId::new("ghost"),
                status: CallStatus::Blocked,
                reason: "nope".to_string(),
            },
            &env_at(5),
        );
        assert_eq!(before, after);
    }

    #[test]
    fn source_events_pass_through() {
        let registry = ConsoleReducer.reduce(
            SessionRegistry::new(),
            LiveOpsEvent::CallStarted {
                call_id: CallId::new("c9"),
                phone_e164: "+9".to_string(),
                at: 3,
            }
            .into(),
            &env_at(0),
        );
        assert!(registry.contains(&CallId::new("c9")));
    }
}

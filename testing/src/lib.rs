//! # LiveOps Testing
//!
//! Testing utilities for the live call console.
//!
//! This crate provides:
//! - Deterministic [`Clock`] implementations
//! - [`EventRecorder`], a handler that captures delivered events
//! - Terse builders for wire events
//! - [`ReducerTest`], a Given-When-Then harness for reducers
//!
//! ## Example
//!
//! ```
//! use liveops_core::reconcile::SessionReducer;
//! use liveops_core::registry::SessionRegistry;
//! use liveops_core::session::TranscriptRole;
//! use liveops_testing::{events, ReducerTest};
//!
//! ReducerTest::new(SessionReducer)
//!     .with_env(())
//!     .given_state(SessionRegistry::new())
//!     .when_actions([
//!         events::call_started("c1", "+1", 0),
//!         events::transcript("c1", TranscriptRole::Customer, "hi", 10),
//!     ])
//!     .then_state(|registry| assert_eq!(registry.len(), 1))
//!     .run();
//! ```

use chrono::{DateTime, Utc};
use liveops_core::environment::Clock;

/// Reducer test harness
pub mod reducer_test;

/// Mock implementations of environment traits.
pub mod mocks {
    use super::{Clock, DateTime, Utc};
    use std::sync::{Mutex, PoisonError};

    /// Fixed clock for deterministic tests
    ///
    /// Always returns the same time, making tests reproducible.
    ///
    /// # Example
    ///
    /// ```
    /// use liveops_testing::mocks::FixedClock;
    /// use liveops_core::environment::Clock;
    /// use chrono::Utc;
    ///
    /// let clock = FixedClock::new(Utc::now());
    /// assert_eq!(clock.now(), clock.now());
    /// ```
    #[derive(Debug, Clone)]
    pub struct FixedClock {
        time: DateTime<Utc>,
    }

    impl FixedClock {
        /// Create a new fixed clock with the given time
        #[must_use]
        pub const fn new(time: DateTime<Utc>) -> Self {
            Self { time }
        }
    }

    impl Clock for FixedClock {
        fn now(&self) -> DateTime<Utc> {
            self.time
        }
    }

    /// Clock that only moves when told to.
    #[derive(Debug)]
    pub struct ManualClock {
        time: Mutex<DateTime<Utc>>,
    }

    impl ManualClock {
        /// Create a clock stopped at `time`.
        #[must_use]
        pub const fn new(time: DateTime<Utc>) -> Self {
            Self {
                time: Mutex::new(time),
            }
        }

        /// Move the clock forward by `millis` milliseconds.
        pub fn advance_millis(&self, millis: i64) {
            let mut time = self.time.lock().unwrap_or_else(PoisonError::into_inner);
            *time += chrono::Duration::milliseconds(millis);
        }

        /// Jump to `time`.
        pub fn set(&self, time: DateTime<Utc>) {
            *self.time.lock().unwrap_or_else(PoisonError::into_inner) = time;
        }
    }

    impl Clock for ManualClock {
        fn now(&self) -> DateTime<Utc> {
            *self.time.lock().unwrap_or_else(PoisonError::into_inner)
        }
    }

    /// Create a default fixed clock for tests (2025-01-01 00:00:00 UTC)
    ///
    /// # Panics
    ///
    /// This function will panic if the hardcoded timestamp fails to parse,
    /// which should never happen in practice.
    #[must_use]
    #[allow(clippy::expect_used)]
    pub fn test_clock() -> FixedClock {
        FixedClock::new(
            DateTime::parse_from_rfc3339("2025-01-01T00:00:00Z")
                .expect("hardcoded timestamp should always parse")
                .with_timezone(&Utc),
        )
    }
}

/// Handler that records every event it is given.
pub mod recorder {
    use liveops_core::event::LiveOpsEvent;
    use std::sync::{Arc, Mutex, PoisonError};

    /// Shared log of delivered events.
    ///
    /// Clones share the same log, so one copy can be handed to a source as
    /// the handler while the test keeps another.
    #[derive(Debug, Clone, Default)]
    pub struct EventRecorder {
        events: Arc<Mutex<Vec<LiveOpsEvent>>>,
    }

    impl EventRecorder {
        /// Create an empty recorder.
        #[must_use]
        pub fn new() -> Self {
            Self::default()
        }

        /// A handler closure that appends to this recorder.
        #[must_use]
        pub fn handler(&self) -> impl FnMut(LiveOpsEvent) + Send + 'static {
            let events = Arc::clone(&self.events);
            move |event| {
                events
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .push(event);
            }
        }

        /// Snapshot of everything recorded so far.
        #[must_use]
        pub fn events(&self) -> Vec<LiveOpsEvent> {
            self.events
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .clone()
        }

        /// Wire discriminants of the recorded events, in order.
        #[must_use]
        pub fn kinds(&self) -> Vec<&'static str> {
            self.events
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .iter()
                .map(LiveOpsEvent::kind)
                .collect()
        }

        /// Number of recorded events.
        #[must_use]
        pub fn len(&self) -> usize {
            self.events
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .len()
        }

        /// Whether nothing has been recorded.
        #[must_use]
        pub fn is_empty(&self) -> bool {
            self.len() == 0
        }
    }
}

/// Builders for wire events with string ids.
pub mod events {
    use liveops_core::event::LiveOpsEvent;
    use liveops_core::session::{CallId, CallStatus, Millis, TranscriptRole};

    /// `call_started`
    #[must_use]
    pub fn call_started(call_id: &str, phone_e164: &str, at: Millis) -> LiveOpsEvent {
        LiveOpsEvent::CallStarted {
            call_id: CallId::new(call_id),
            phone_e164: phone_e164.to_string(),
            at,
        }
    }

    /// `transcript_appended`
    #[must_use]
    pub fn transcript(call_id: &str, role: TranscriptRole, text: &str, at: Millis) -> LiveOpsEvent {
        LiveOpsEvent::TranscriptAppended {
            call_id: CallId::new(call_id),
            role,
            text: text.to_string(),
            at,
        }
    }

    /// `call_status`
    #[must_use]
    pub fn status(call_id: &str, status: CallStatus, at: Millis, reason: Option<&str>) -> LiveOpsEvent {
        LiveOpsEvent::CallStatus {
            call_id: CallId::new(call_id),
            status,
            at,
            reason: reason.map(str::to_string),
        }
    }

    /// `recording_ready`
    #[must_use]
    pub fn recording(call_id: &str, url: &str, at: Millis) -> LiveOpsEvent {
        LiveOpsEvent::RecordingReady {
            call_id: CallId::new(call_id),
            url: url.to_string(),
            at,
        }
    }
}

// Re-export commonly used items
pub use mocks::{FixedClock, ManualClock, test_clock};
pub use recorder::EventRecorder;
pub use reducer_test::ReducerTest;

#[cfg(test)]
mod tests {
    use super::*;
    use liveops_core::event::LiveOpsEvent;

    #[test]
    fn test_fixed_clock() {
        let clock = test_clock();
        assert_eq!(clock.now(), clock.now());
        assert_eq!(clock.now_millis(), 1_735_689_600_000);
    }

    #[test]
    fn test_manual_clock_advances() {
        let clock = ManualClock::new(test_clock().now());
        let start = clock.now_millis();

        clock.advance_millis(1_500);
        assert_eq!(clock.now_millis(), start + 1_500);

        clock.set(test_clock().now());
        assert_eq!(clock.now_millis(), start);
    }

    #[test]
    fn test_recorder_shares_its_log_with_handlers() {
        let recorder = EventRecorder::new();
        let mut handler = recorder.handler();

        handler(events::call_started("c1", "+1", 0));
        handler(events::recording("c1", "https://example.com/a.wav", 5));

        assert_eq!(recorder.len(), 2);
        assert_eq!(recorder.kinds(), ["call_started", "recording_ready"]);
        assert!(matches!(recorder.events()[1], LiveOpsEvent::RecordingReady { at: 5, .. }));
    }
}

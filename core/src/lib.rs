//! # LiveOps Core
//!
//! Event envelope, session registry and reducers for the live call console.
//!
//! The console reconstructs the state of many concurrent phone calls from a
//! stream of independently delivered events. This crate is the functional
//! core of that: it has no I/O and no timers.
//!
//! ## Core Concepts
//!
//! - **Event**: [`event::LiveOpsEvent`], the discriminated wire message
//! - **Session**: [`session::CallSession`], the reconstructed state of one call
//! - **Registry**: [`registry::SessionRegistry`], every known call keyed by id
//! - **Reducer**: pure function `(Registry, Event) → Registry`
//!   ([`reconcile::reduce`])
//! - **Environment**: injected dependencies ([`environment::Clock`]) for
//!   operator commands
//!
//! ## Example
//!
//! ```
//! use liveops_core::event::decode;
//! use liveops_core::reconcile::reduce;
//! use liveops_core::registry::SessionRegistry;
//!
//! let messages = [
//!     r#"{"type":"call_started","callId":"c1","phoneE164":"+12125550199","at":0}"#,
//!     r#"{"type":"transcript_appended","callId":"c1","role":"customer","text":"hi","at":10}"#,
//! ];
//!
//! let registry = messages
//!     .iter()
//!     .filter_map(|raw| decode(raw).ok())
//!     .fold(SessionRegistry::new(), reduce);
//!
//! assert_eq!(registry.len(), 1);
//! ```

// Re-export commonly used types
pub use chrono::{DateTime, Utc};

pub mod console;
pub mod event;
pub mod reconcile;
pub mod registry;
pub mod session;

/// Reducer module - The core trait for state transitions
///
/// Reducers are pure functions: `(State, Action, Environment) → State`.
/// They take the current state by value and hand back the next one, so a
/// caller holding an older snapshot never observes a change.
pub mod reducer {
    /// The Reducer trait - core abstraction for state transitions
    ///
    /// # Type Parameters
    ///
    /// - `State`: The state this reducer folds actions into
    /// - `Action`: The action type this reducer processes
    /// - `Environment`: The injected dependencies this reducer needs
    ///
    /// # Example
    ///
    /// ```
    /// use liveops_core::reducer::Reducer;
    ///
    /// struct Tally;
    ///
    /// impl Reducer for Tally {
    ///     type State = u32;
    ///     type Action = u32;
    ///     type Environment = ();
    ///
    ///     fn reduce(&self, state: u32, action: u32, _env: &()) -> u32 {
    ///         state + action
    ///     }
    /// }
    ///
    /// assert_eq!(Tally.reduce(1, 2, &()), 3);
    /// ```
    pub trait Reducer {
        /// The state type this reducer operates on
        type State;

        /// The action type this reducer processes
        type Action;

        /// The environment type with injected dependencies
        type Environment;

        /// Fold one action into the state
        ///
        /// Must not perform I/O and must not panic for well-formed actions.
        fn reduce(
            &self,
            state: Self::State,
            action: Self::Action,
            env: &Self::Environment,
        ) -> Self::State;
    }
}

/// Environment module - Dependency injection traits
///
/// All external dependencies are abstracted behind traits and injected
/// via the Environment parameter.
pub mod environment {
    use chrono::{DateTime, Utc};

    /// Clock trait - abstracts time operations for testability
    ///
    /// # Examples
    ///
    /// ```
    /// use liveops_core::environment::{Clock, SystemClock};
    ///
    /// let now = SystemClock.now();
    /// assert!(now.timestamp_millis() > 0);
    /// ```
    pub trait Clock: Send + Sync {
        /// Get the current time
        fn now(&self) -> DateTime<Utc>;

        /// Current time in milliseconds since the Unix epoch
        fn now_millis(&self) -> i64 {
            self.now().timestamp_millis()
        }
    }

    /// Wall-clock time
    #[derive(Debug, Clone, Copy, Default)]
    pub struct SystemClock;

    impl Clock for SystemClock {
        fn now(&self) -> DateTime<Utc> {
            Utc::now()
        }
    }
}

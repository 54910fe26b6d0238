//! Given-When-Then harness for reducers.
//!
//! Reducers here take state by value, so the harness keeps the given state
//! around and can compare it with the result.

#![allow(clippy::module_name_repetitions)] // ReducerTest is the natural name

use liveops_core::reducer::Reducer;
use std::fmt::Debug;

/// Type alias for state assertion functions
type StateAssertion<S> = Box<dyn FnOnce(&S, &S)>;

/// Fluent API for testing reducers with Given-When-Then syntax
///
/// # Example
///
/// ```ignore
/// ReducerTest::new(ConsoleReducer)
///     .with_env(ConsoleEnvironment::new(Arc::new(test_clock())))
///     .given_state(registry_with_call("c1"))
///     .when_action(ConsoleAction::TakeOver { call_id: CallId::new("c1") })
///     .then_state(|registry| {
///         assert_eq!(registry.get(&CallId::new("c1")).unwrap().status, CallStatus::Human);
///     })
///     .run();
/// ```
pub struct ReducerTest<R>
where
    R: Reducer,
{
    reducer: R,
    environment: Option<R::Environment>,
    initial_state: Option<R::State>,
    actions: Vec<R::Action>,
    state_assertions: Vec<StateAssertion<R::State>>,
}

impl<R> ReducerTest<R>
where
    R: Reducer + 'static,
    R::State: Clone + 'static,
{
    /// Create a new reducer test with the given reducer
    #[must_use]
    pub const fn new(reducer: R) -> Self {
        Self {
            reducer,
            environment: None,
            initial_state: None,
            actions: Vec::new(),
            state_assertions: Vec::new(),
        }
    }

    /// Set the environment for the test
    #[must_use]
    pub fn with_env(mut self, env: R::Environment) -> Self {
        self.environment = Some(env);
        self
    }

    /// Set the initial state (Given)
    #[must_use]
    pub fn given_state(mut self, state: R::State) -> Self {
        self.initial_state = Some(state);
        self
    }

    /// Add an action to apply (When)
    #[must_use]
    pub fn when_action(mut self, action: R::Action) -> Self {
        self.actions.push(action);
        self
    }

    /// Add several actions, applied in order (When)
    #[must_use]
    pub fn when_actions(mut self, actions: impl IntoIterator<Item = R::Action>) -> Self {
        self.actions.extend(actions);
        self
    }

    /// Add an assertion about the resulting state (Then)
    #[must_use]
    pub fn then_state<F>(mut self, assertion: F) -> Self
    where
        F: FnOnce(&R::State) + 'static,
    {
        self.state_assertions
            .push(Box::new(move |_given: &R::State, result: &R::State| assertion(result)));
        self
    }

    /// Assert the actions left the state exactly as given (Then)
    #[must_use]
    pub fn then_unchanged(mut self) -> Self
    where
        R::State: PartialEq + Debug,
    {
        self.state_assertions.push(Box::new(|given: &R::State, result: &R::State| {
            assert_eq!(given, result, "Expected state to be unchanged");
        }));
        self
    }

    /// Run the test and execute all assertions
    ///
    /// # Panics
    ///
    /// Panics if initial state, actions, or environment is not set,
    /// or if any assertions fail.
    #[allow(clippy::panic)] // Test code can panic
    #[allow(clippy::expect_used)] // Test code can use expect
    pub fn run(self) {
        let given = self
            .initial_state
            .expect("Initial state must be set with given_state()");

        assert!(
            !self.actions.is_empty(),
            "Action must be set with when_action()"
        );

        let env = self
            .environment
            .expect("Environment must be set with with_env()");

        let result = self
            .actions
            .into_iter()
            .fold(given.clone(), |state, action| {
                self.reducer.reduce(state, action, &env)
            });

        for assertion in self.state_assertions {
            assertion(&given, &result);
        }
    }
}

/// Helper assertions for the session registry
pub mod assertions {
    use liveops_core::registry::SessionRegistry;
    use liveops_core::session::{CallId, CallSession};

    /// Fetch a session that must exist
    ///
    /// # Panics
    ///
    /// Panics if `call_id` is not in the registry.
    #[allow(clippy::panic)] // Test assertion
    #[must_use]
    pub fn session<'a>(registry: &'a SessionRegistry, call_id: &str) -> &'a CallSession {
        registry
            .get(&CallId::new(call_id))
            .unwrap_or_else(|| panic!("Expected session {call_id} in the registry"))
    }

    /// Assert the transcript texts, in order
    ///
    /// # Panics
    ///
    /// Panics if the texts differ.
    #[allow(clippy::panic)] // Test assertion
    pub fn assert_transcript(session: &CallSession, expected: &[&str]) {
        let texts: Vec<&str> = session.transcript.iter().map(|e| e.text.as_str()).collect();
        assert_eq!(
            texts, expected,
            "Unexpected transcript for {}",
            session.call_id
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Clone, Debug, PartialEq)]
    struct TestState {
        count: i32,
    }

    #[derive(Clone, Debug)]
    enum TestAction {
        Increment,
        Decrement,
        Noop,
    }

    struct TestReducer;

    impl Reducer for TestReducer {
        type State = TestState;
        type Action = TestAction;
        type Environment = ();

        fn reduce(&self, state: Self::State, action: Self::Action, _env: &()) -> Self::State {
            match action {
                TestAction::Increment => TestState {
                    count: state.count + 1,
                },
                TestAction::Decrement => TestState {
                    count: state.count - 1,
                },
                TestAction::Noop => state,
            }
        }
    }

    #[test]
    fn test_reducer_test_increment() {
        ReducerTest::new(TestReducer)
            .with_env(())
            .given_state(TestState { count: 0 })
            .when_action(TestAction::Increment)
            .then_state(|state| {
                assert_eq!(state.count, 1);
            })
            .run();
    }

    #[test]
    fn test_reducer_test_applies_actions_in_order() {
        ReducerTest::new(TestReducer)
            .with_env(())
            .given_state(TestState { count: 5 })
            .when_actions([TestAction::Decrement, TestAction::Decrement, TestAction::Increment])
            .then_state(|state| {
                assert_eq!(state.count, 4);
            })
            .run();
    }

    #[test]
    fn test_then_unchanged() {
        ReducerTest::new(TestReducer)
            .with_env(())
            .given_state(TestState { count: 3 })
            .when_action(TestAction::Noop)
            .then_unchanged()
            .run();
    }

    #[test]
    #[should_panic(expected = "Expected state to be unchanged")]
    fn test_then_unchanged_detects_changes() {
        ReducerTest::new(TestReducer)
            .with_env(())
            .given_state(TestState { count: 3 })
            .when_action(TestAction::Increment)
            .then_unchanged()
            .run();
    }
}

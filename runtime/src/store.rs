//! The Store: single writer of the console state.
//!
//! Every action is folded through the reducer synchronously, and each result
//! is published as a fresh immutable `Arc` snapshot. Readers never observe a
//! half-applied event: they either hold the previous snapshot or the next one.
//!
//! ```ignore
//! let store = Arc::new(Store::new(SessionRegistry::new(), ConsoleReducer, env));
//!
//! let subscription = source.connect(store.handler())?;
//! store.send(ConsoleAction::TakeOver { call_id });
//!
//! let active = store.state(|r| r.count_by_status(CallStatus::Active));
//! ```

use crate::metrics::StoreMetrics;
use crate::source::EventHandler;
use liveops_core::event::LiveOpsEvent;
use liveops_core::reducer::Reducer;
use std::fmt;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::watch;

/// Owns the current state snapshot, the reducer and its environment.
pub struct Store<R: Reducer> {
    reducer: R,
    environment: R::Environment,
    state: watch::Sender<Arc<R::State>>,
}

impl<R> Store<R>
where
    R: Reducer,
    R::State: Clone,
{
    /// Create a store with initial state, reducer, and environment.
    #[must_use]
    pub fn new(initial_state: R::State, reducer: R, environment: R::Environment) -> Self {
        let (state, _) = watch::channel(Arc::new(initial_state));
        Self {
            reducer,
            environment,
            state,
        }
    }

    /// Fold `action` into the state and return the new snapshot.
    ///
    /// Concurrent callers are serialized; each sees the result of the ones
    /// before it.
    #[tracing::instrument(skip_all, name = "store_send")]
    pub fn send(&self, action: R::Action) -> Arc<R::State> {
        let mut next = None;

        self.state.send_modify(|current| {
            let start = Instant::now();
            let reduced = self
                .reducer
                .reduce((**current).clone(), action, &self.environment);
            StoreMetrics::record_applied(start.elapsed());

            *current = Arc::new(reduced);
            next = Some(Arc::clone(current));
        });

        tracing::trace!("Action applied");
        next.unwrap_or_else(|| self.snapshot())
    }

    /// The current snapshot.
    #[must_use]
    pub fn snapshot(&self) -> Arc<R::State> {
        Arc::clone(&self.state.borrow())
    }

    /// Read the current state through a closure.
    pub fn state<F, T>(&self, f: F) -> T
    where
        F: FnOnce(&R::State) -> T,
    {
        f(&self.state.borrow())
    }

    /// Receiver that observes every published snapshot.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<Arc<R::State>> {
        self.state.subscribe()
    }
}

impl<R> Store<R>
where
    R: Reducer + Send + Sync + 'static,
    R::State: Clone + Send + Sync + 'static,
    R::Action: From<LiveOpsEvent>,
    R::Environment: Send + Sync + 'static,
{
    /// An [`EventHandler`] that feeds each delivered event into this store.
    #[must_use]
    pub fn handler(self: &Arc<Self>) -> StoreHandler<R> {
        StoreHandler {
            store: Arc::clone(self),
        }
    }
}

impl<R> fmt::Debug for Store<R>
where
    R: Reducer + fmt::Debug,
    R::State: fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Store")
            .field("reducer", &self.reducer)
            .field("state", &*self.state.borrow())
            .finish_non_exhaustive()
    }
}

/// Handler returned by [`Store::handler`].
pub struct StoreHandler<R: Reducer> {
    store: Arc<Store<R>>,
}

impl<R> EventHandler for StoreHandler<R>
where
    R: Reducer + Send + Sync + 'static,
    R::State: Clone + Send + Sync + 'static,
    R::Action: From<LiveOpsEvent>,
    R::Environment: Send + Sync + 'static,
{
    fn handle(&mut self, event: LiveOpsEvent) {
        self.store.send(R::Action::from(event));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use liveops_core::console::{ConsoleAction, ConsoleEnvironment, ConsoleReducer};
    use liveops_core::reconcile::SessionReducer;
    use liveops_core::registry::SessionRegistry;
    use liveops_core::session::{CallId, CallStatus, TranscriptRole};
    use liveops_testing::{events, test_clock};

    fn console_store() -> Arc<Store<ConsoleReducer>> {
        Arc::new(Store::new(
            SessionRegistry::new(),
            ConsoleReducer::new(),
            ConsoleEnvironment::new(Arc::new(test_clock())),
        ))
    }

    #[test]
    fn send_publishes_a_new_snapshot() {
        let store = Store::new(SessionRegistry::new(), SessionReducer, ());
        let before = store.snapshot();

        let after = store.send(events::call_started("c1", "+1", 0));

        assert!(before.is_empty());
        assert_eq!(after.len(), 1);
        assert!(Arc::ptr_eq(&after, &store.snapshot()));
    }

    #[test]
    fn old_snapshots_are_untouched() {
        let store = Store::new(SessionRegistry::new(), SessionReducer, ());
        store.send(events::call_started("c1", "+1", 0));
        let held = store.snapshot();

        store.send(events::transcript("c1", TranscriptRole::Customer, "hi", 10));

        let id = CallId::new("c1");
        assert!(held.get(&id).unwrap().transcript.is_empty());
        assert_eq!(store.state(|r| r.get(&id).unwrap().transcript.len()), 1);
    }

    #[tokio::test]
    async fn subscribers_see_updates() {
        let store = console_store();
        let mut rx = store.subscribe();

        store.send(ConsoleAction::Event(events::call_started("c1", "+1", 0)));

        rx.changed().await.unwrap();
        assert!(rx.borrow().contains(&CallId::new("c1")));
    }

    #[test]
    fn handler_feeds_events_and_operator_actions_share_the_state() {
        let store = console_store();
        let mut handler = store.handler();

        handler.handle(events::call_started("c1", "+1", 0));
        store.send(ConsoleAction::TakeOver {
            call_id: CallId::new("c1"),
        });

        assert_eq!(
            store.state(|r| r.get(&CallId::new("c1")).map(|s| s.status)),
            Some(CallStatus::Human)
        );
    }
}

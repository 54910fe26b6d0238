//! The contract shared by every event source, and the subscription handle.
//!
//! Both the HTTP stream client and the synthetic generator implement
//! [`EventSource`]: `connect(handler)` starts delivery and returns a
//! [`Subscription`]. Consumers cannot tell which one is wired in.
//!
//! # Delivery guarantees
//!
//! - The handler is invoked once per event, one event at a time, in the order
//!   the source produced them.
//! - After [`Subscription::close`] returns, the handler is never invoked again.
//!   `close` waits for an in-flight invocation to finish, then drops the
//!   handler. Calling `close` from inside the handler deadlocks.
//! - `close` is idempotent.

use liveops_core::event::LiveOpsEvent;
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::runtime::Handle;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::error::SourceError;

/// Receives decoded events from a source.
///
/// Implemented for every `FnMut(LiveOpsEvent) + Send + 'static`.
pub trait EventHandler: Send + 'static {
    /// Handle one event.
    fn handle(&mut self, event: LiveOpsEvent);
}

impl<F> EventHandler for F
where
    F: FnMut(LiveOpsEvent) + Send + 'static,
{
    fn handle(&mut self, event: LiveOpsEvent) {
        self(event);
    }
}

/// Something that can push [`LiveOpsEvent`]s to a handler.
pub trait EventSource {
    /// Start delivering events to `handler`.
    ///
    /// Must be called from within a tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError::NoRuntime`] if no tokio runtime is available,
    /// or a source-specific error if the source is misconfigured.
    fn connect<H: EventHandler>(&self, handler: H) -> Result<Subscription, SourceError>;
}

/// Why a connection reached its terminal state.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CloseReason {
    /// [`Subscription::close`] was called
    ByCaller,
    /// The source went away and no reconnect attempt is left
    Unexpected(String),
}

/// Lifecycle of a subscription's connection.
///
/// `Connecting` → `Open` → `Closed`. A dropped connection goes back to
/// `Connecting` while reconnect attempts remain. `Closed` is terminal.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ConnectionState {
    /// Opening the connection; `attempt` is 0 for the first one
    Connecting {
        /// Reconnect attempt number
        attempt: u32,
    },
    /// Events are flowing
    Open,
    /// No further events will be delivered
    Closed(CloseReason),
}

impl ConnectionState {
    /// Whether the state is terminal.
    #[must_use]
    pub const fn is_closed(&self) -> bool {
        matches!(self, Self::Closed(_))
    }

    /// Whether the connection was lost rather than closed by the caller.
    #[must_use]
    pub const fn is_closed_unexpectedly(&self) -> bool {
        matches!(self, Self::Closed(CloseReason::Unexpected(_)))
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Connecting { attempt: 0 } => write!(f, "connecting"),
            Self::Connecting { attempt } => write!(f, "reconnecting (attempt {attempt})"),
            Self::Open => write!(f, "open"),
            Self::Closed(CloseReason::ByCaller) => write!(f, "closed"),
            Self::Closed(CloseReason::Unexpected(reason)) => {
                write!(f, "closed unexpectedly: {reason}")
            }
        }
    }
}

/// Serializes handler invocations against `close`.
///
/// The handler lives behind a mutex; taking it out is what closes the gate.
pub(crate) struct DeliveryGate {
    handler: Mutex<Option<Box<dyn EventHandler>>>,
}

impl DeliveryGate {
    pub(crate) fn new<H: EventHandler>(handler: H) -> Self {
        Self {
            handler: Mutex::new(Some(Box::new(handler))),
        }
    }

    /// Deliver one event. Returns `false` once the gate is closed.
    pub(crate) fn deliver(&self, event: LiveOpsEvent) -> bool {
        let mut guard = self
            .handler
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        match guard.as_mut() {
            Some(handler) => {
                handler.handle(event);
                true
            }
            None => false,
        }
    }

    /// Deliver a batch without letting `close` interleave between its events.
    pub(crate) fn deliver_all(&self, events: impl IntoIterator<Item = LiveOpsEvent>) -> bool {
        let mut guard = self
            .handler
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let Some(handler) = guard.as_mut() else {
            return false;
        };
        for event in events {
            handler.handle(event);
        }
        true
    }

    pub(crate) fn is_open(&self) -> bool {
        self.handler
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    /// Drop the handler. Returns `true` if this call closed the gate.
    pub(crate) fn close(&self) -> bool {
        self.handler
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
            .is_some()
    }
}

/// Publishes [`ConnectionState`] transitions; `Closed` is sticky.
#[derive(Clone)]
pub(crate) struct StateReporter {
    tx: Arc<watch::Sender<ConnectionState>>,
}

impl StateReporter {
    pub(crate) fn new(initial: ConnectionState) -> (Self, watch::Receiver<ConnectionState>) {
        let (tx, rx) = watch::channel(initial);
        (Self { tx: Arc::new(tx) }, rx)
    }

    /// Move to `next` unless already closed. Returns whether the state changed.
    pub(crate) fn set(&self, next: ConnectionState) -> bool {
        self.tx.send_if_modified(|current| {
            if current.is_closed() || *current == next {
                return false;
            }
            *current = next;
            true
        })
    }

    pub(crate) fn subscribe(&self) -> watch::Receiver<ConnectionState> {
        self.tx.subscribe()
    }
}

/// Handle to a running event source.
///
/// Dropping the subscription closes it.
pub struct Subscription {
    gate: Arc<DeliveryGate>,
    task: Mutex<Option<JoinHandle<()>>>,
    reporter: StateReporter,
    state: watch::Receiver<ConnectionState>,
}

impl Subscription {
    pub(crate) fn new(
        gate: Arc<DeliveryGate>,
        task: JoinHandle<()>,
        reporter: StateReporter,
    ) -> Self {
        let state = reporter.subscribe();
        Self {
            gate,
            task: Mutex::new(Some(task)),
            reporter,
            state,
        }
    }

    /// Stop delivery and release the underlying connection or timer.
    ///
    /// Synchronous: once this returns the handler has been dropped and will
    /// never be invoked again. Safe to call more than once.
    pub fn close(&self) {
        let closed_now = self.gate.close();

        if let Some(task) = self
            .task
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
        {
            task.abort();
        }

        if self
            .reporter
            .set(ConnectionState::Closed(CloseReason::ByCaller))
        {
            tracing::info!("Event subscription closed by caller");
        } else if closed_now {
            tracing::debug!("Event subscription closed after connection loss");
        }
    }

    /// Whether events can still be delivered.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.gate.is_open() && !self.state.borrow().is_closed()
    }

    /// Current connection state.
    #[must_use]
    pub fn state(&self) -> ConnectionState {
        self.state.borrow().clone()
    }

    /// Receiver for connection state transitions.
    #[must_use]
    pub fn state_changes(&self) -> watch::Receiver<ConnectionState> {
        self.reporter.subscribe()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.close();
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("state", &*self.state.borrow())
            .finish_non_exhaustive()
    }
}

/// Handle to the runtime `connect` was called from.
pub(crate) fn current_runtime() -> Result<Handle, SourceError> {
    Handle::try_current().map_err(|_| SourceError::NoRuntime)
}

/// Spawn `task` on the current runtime or report that there is none.
pub(crate) fn spawn_on_current<F>(task: F) -> Result<JoinHandle<()>, SourceError>
where
    F: std::future::Future<Output = ()> + Send + 'static,
{
    Ok(current_runtime()?.spawn(task))
}

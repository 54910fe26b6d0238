//! # LiveOps Runtime
//!
//! Event sources and the state store for the live call console.
//!
//! ## Core Components
//!
//! - **[`EventSource`]**: anything that can `connect` a handler and hand back a
//!   [`Subscription`]. Two implementations ship here:
//!   - [`StreamClient`]: a server-sent-event client for `GET /public/events`
//!   - [`SyntheticEventSource`]: a self-contained generator of plausible calls
//! - **[`Store`]**: owns the current state snapshot and folds every action
//!   through a [`Reducer`](liveops_core::reducer::Reducer)
//! - **[`ReconnectPolicy`]**: backoff for the stream client after a drop
//!
//! ## Example
//!
//! ```no_run
//! use liveops_core::console::{ConsoleEnvironment, ConsoleReducer};
//! use liveops_core::environment::SystemClock;
//! use liveops_core::registry::SessionRegistry;
//! use liveops_runtime::{EventSource, Store, SyntheticEventSource};
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), liveops_runtime::error::SourceError> {
//! let store = Arc::new(Store::new(
//!     SessionRegistry::new(),
//!     ConsoleReducer::new(),
//!     ConsoleEnvironment::new(Arc::new(SystemClock)),
//! ));
//!
//! let subscription = SyntheticEventSource::new().connect(store.handler())?;
//!
//! let live = store.state(SessionRegistry::len);
//! println!("{live} calls");
//!
//! subscription.close();
//! # Ok(())
//! # }
//! ```

/// Reconnect policy with exponential backoff
pub mod retry;

/// Prometheus metrics for observability
pub mod metrics;

/// Environment-driven configuration
pub mod config;

/// Server-sent-event framing
pub mod sse;

pub mod source;

/// HTTP event-stream client
pub mod client;

/// Synthetic call generator
pub mod generator;

/// State store
pub mod store;

/// Error types for event sources
pub mod error {
    use thiserror::Error;

    /// Errors raised while connecting to or reading from an event source.
    ///
    /// Malformed individual messages are not errors at this level; they are
    /// dropped and logged by the stream client.
    #[derive(Error, Debug, Clone, PartialEq, Eq)]
    pub enum SourceError {
        /// `connect` was called outside a tokio runtime
        #[error("No tokio runtime available to drive the event source")]
        NoRuntime,

        /// The HTTP request could not be sent
        #[error("Event stream request failed: {0}")]
        Request(String),

        /// The endpoint answered with a non-success status
        #[error("Event stream returned HTTP {0}")]
        Status(u16),

        /// Reading the response body failed mid-stream
        #[error("Event stream read failed: {0}")]
        Stream(String),

        /// The configured base URL cannot be turned into an events endpoint
        #[error("Invalid event stream endpoint: {0}")]
        InvalidEndpoint(String),

        /// The synthetic generator was given a zero tick period
        #[error("Generator tick period must be greater than zero")]
        ZeroTick,
    }
}

pub use client::StreamClient;
pub use generator::SyntheticEventSource;
pub use retry::ReconnectPolicy;
pub use source::{CloseReason, ConnectionState, EventHandler, EventSource, Subscription};
pub use store::Store;

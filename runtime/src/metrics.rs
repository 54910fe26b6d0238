//! Prometheus metrics for the event sources and the store.
//!
//! Metrics are recorded through the `metrics` facade unconditionally; they
//! only become visible once a recorder is installed.
//!
//! # Example
//!
//! ```rust,no_run
//! use liveops_runtime::metrics::MetricsRecorder;
//!
//! # fn example() -> Result<(), liveops_runtime::metrics::MetricsError> {
//! let mut recorder = MetricsRecorder::new();
//! recorder.install()?;
//!
//! if let Some(text) = recorder.render() {
//!     println!("{text}");
//! }
//! # Ok(())
//! # }
//! ```

use metrics::{describe_counter, describe_histogram};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};
use std::time::Duration;
use thiserror::Error;

pub use metrics::{counter, histogram};

/// Errors from metrics operations.
#[derive(Error, Debug)]
pub enum MetricsError {
    /// Failed to build metrics exporter
    #[error("Failed to build metrics exporter: {0}")]
    Build(String),
    /// Failed to install metrics exporter
    #[error("Failed to install metrics exporter: {0}")]
    Install(String),
}

/// Installs the Prometheus recorder and renders its text exposition.
#[derive(Default)]
pub struct MetricsRecorder {
    handle: Option<PrometheusHandle>,
}

impl MetricsRecorder {
    /// Create a recorder that has not been installed yet.
    #[must_use]
    pub const fn new() -> Self {
        Self { handle: None }
    }

    /// Describe every metric and install the global Prometheus recorder.
    ///
    /// # Errors
    ///
    /// Returns [`MetricsError`] if the exporter cannot be built or installed.
    /// A recorder that is already installed (another test, say) is tolerated:
    /// metrics keep flowing to it and [`render`](Self::render) returns `None`.
    pub fn install(&mut self) -> Result<(), MetricsError> {
        register_metrics();

        let builder = PrometheusBuilder::new()
            .set_buckets_for_metric(
                Matcher::Suffix("duration_seconds".to_string()),
                &[
                    0.000_01, 0.000_05, 0.000_1, 0.000_5, 0.001, 0.005, 0.01, 0.05, 0.1,
                ],
            )
            .map_err(|e| MetricsError::Build(e.to_string()))?;

        match builder.install_recorder() {
            Ok(handle) => {
                self.handle = Some(handle);
                tracing::info!("Metrics recorder installed");
                Ok(())
            }
            Err(e) => {
                let err_msg = e.to_string();
                if err_msg.contains("already initialized") {
                    tracing::warn!("Metrics recorder already initialized, skipping re-initialization");
                    Ok(())
                } else {
                    Err(MetricsError::Install(err_msg))
                }
            }
        }
    }

    /// Get the Prometheus handle, if this recorder was installed.
    #[must_use]
    pub const fn handle(&self) -> Option<&PrometheusHandle> {
        self.handle.as_ref()
    }

    /// Render current metrics in Prometheus text format.
    #[must_use]
    pub fn render(&self) -> Option<String> {
        self.handle.as_ref().map(PrometheusHandle::render)
    }
}

fn register_metrics() {
    describe_counter!(
        "liveops_stream_events_delivered_total",
        "Events decoded from the stream and handed to the handler"
    );
    describe_counter!(
        "liveops_stream_frames_dropped_total",
        "Stream frames dropped, labelled by reason"
    );
    describe_counter!(
        "liveops_stream_duplicates_dropped_total",
        "Frames dropped because another channel already carried the same payload"
    );
    describe_counter!(
        "liveops_stream_reconnects_total",
        "Reconnect attempts after an unexpected drop"
    );
    describe_counter!(
        "liveops_generator_events_emitted_total",
        "Synthetic events emitted, labelled by kind"
    );
    describe_counter!(
        "liveops_store_events_applied_total",
        "Actions folded into the store"
    );
    describe_histogram!(
        "liveops_store_reduce_duration_seconds",
        "Time taken by one reducer call"
    );
}

/// Why a stream frame was not delivered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropReason {
    /// The payload failed to decode
    Malformed,
    /// The frame arrived on a channel the client does not listen to
    UnknownChannel,
}

impl DropReason {
    const fn as_label(self) -> &'static str {
        match self {
            Self::Malformed => "malformed",
            Self::UnknownChannel => "unknown_channel",
        }
    }
}

/// Stream client metrics recorder.
pub struct StreamMetrics;

impl StreamMetrics {
    /// Record an event handed to the handler.
    pub fn record_delivered() {
        counter!("liveops_stream_events_delivered_total").increment(1);
    }

    /// Record a dropped frame.
    pub fn record_dropped(reason: DropReason) {
        counter!("liveops_stream_frames_dropped_total", "reason" => reason.as_label())
            .increment(1);
    }

    /// Record a cross-channel duplicate.
    pub fn record_duplicate() {
        counter!("liveops_stream_duplicates_dropped_total").increment(1);
    }

    /// Record a reconnect attempt.
    pub fn record_reconnect() {
        counter!("liveops_stream_reconnects_total").increment(1);
    }
}

/// Generator metrics recorder.
pub struct GeneratorMetrics;

impl GeneratorMetrics {
    /// Record one emitted event of `kind`.
    pub fn record_emitted(kind: &'static str) {
        counter!("liveops_generator_events_emitted_total", "kind" => kind).increment(1);
    }
}

/// Store metrics recorder.
pub struct StoreMetrics;

impl StoreMetrics {
    /// Record one applied action.
    pub fn record_applied(duration: Duration) {
        counter!("liveops_store_events_applied_total").increment(1);
        histogram!("liveops_store_reduce_duration_seconds").record(duration.as_secs_f64());
    }
}

//! Server-sent-event client for `GET /public/events?since=<cursor>`.
//!
//! The client listens on the generic `message` channel and on one named
//! channel per known event kind. Every frame goes through the same path:
//! channel filter, decode, cross-channel dedup, deliver. Frames that fail to
//! decode are dropped with a warning and the connection stays up.
//!
//! When the body ends or the connection fails, the [`ReconnectPolicy`] decides
//! between another attempt and [`CloseReason::Unexpected`]. The `since` cursor
//! is sent unchanged on every attempt.
//!
//! [`ReconnectPolicy`]: crate::retry::ReconnectPolicy

use crate::config::StreamConfig;
use crate::error::SourceError;
use crate::metrics::{DropReason, StreamMetrics};
use crate::source::{
    spawn_on_current, CloseReason, ConnectionState, DeliveryGate, EventHandler, EventSource,
    StateReporter, Subscription,
};
use crate::sse::{SseDecoder, SseFrame, DEFAULT_CHANNEL};
use async_stream::stream;
use futures::stream::{Stream, StreamExt};
use liveops_core::event::{decode, LiveOpsEvent, KNOWN_KINDS};
use reqwest::header::{ACCEPT, CACHE_CONTROL};
use reqwest::{Client, Url};
use std::collections::VecDeque;
use std::pin::Pin;
use std::sync::Arc;
use tokio::time::Instant;

type FrameStream = Pin<Box<dyn Stream<Item = Result<SseFrame, SourceError>> + Send>>;

/// HTTP event-stream source.
#[derive(Clone, Debug)]
pub struct StreamClient {
    client: Client,
    endpoint: Url,
    config: StreamConfig,
}

impl StreamClient {
    /// Create a client for `config.base_url`.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError::InvalidEndpoint`] if the base URL does not parse
    /// or cannot carry a path.
    pub fn new(config: StreamConfig) -> Result<Self, SourceError> {
        let endpoint = events_endpoint(&config.base_url, config.since)?;
        Ok(Self {
            client: Client::new(),
            endpoint,
            config,
        })
    }

    /// The full URL requested on every attempt, cursor included.
    #[must_use]
    pub const fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    async fn open(&self) -> Result<FrameStream, SourceError> {
        let response = self
            .client
            .get(self.endpoint.clone())
            .header(ACCEPT, "text/event-stream")
            .header(CACHE_CONTROL, "no-cache")
            .send()
            .await
            .map_err(|e| SourceError::Request(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(SourceError::Status(status.as_u16()));
        }

        let byte_stream = response.bytes_stream();

        Ok(Box::pin(stream! {
            let mut decoder = SseDecoder::new();

            for await chunk in byte_stream {
                match chunk {
                    Ok(bytes) => {
                        for frame in decoder.feed(&bytes) {
                            yield Ok(frame);
                        }
                    }
                    Err(e) => {
                        yield Err(SourceError::Stream(e.to_string()));
                        break;
                    }
                }
            }
        }))
    }

    #[tracing::instrument(skip_all, fields(endpoint = %self.endpoint))]
    async fn run(self, gate: Arc<DeliveryGate>, reporter: StateReporter) {
        let policy = &self.config.reconnect;
        let mut dedup = DedupWindow::new(self.config.dedup_window);
        let mut attempt: u32 = 0;

        loop {
            reporter.set(ConnectionState::Connecting { attempt });
            dedup.clear();
            let started = Instant::now();

            let reason = match self.pump(&gate, &reporter, &mut dedup).await {
                Ok(()) => "event stream ended".to_string(),
                Err(error) => error.to_string(),
            };

            if !gate.is_open() {
                return;
            }

            if started.elapsed() >= policy.stable_after {
                attempt = 0;
            }

            if !policy.should_retry(attempt) {
                tracing::error!(%reason, "Event stream lost");
                reporter.set(ConnectionState::Closed(CloseReason::Unexpected(reason)));
                return;
            }

            let delay = policy.delay_for_attempt(attempt);
            attempt += 1;
            tracing::warn!(%reason, attempt, ?delay, "Event stream dropped, reconnecting");
            StreamMetrics::record_reconnect();
            reporter.set(ConnectionState::Connecting { attempt });

            tokio::time::sleep(delay).await;
        }
    }

    /// Deliver frames from one connection until it ends or the gate closes.
    async fn pump(
        &self,
        gate: &DeliveryGate,
        reporter: &StateReporter,
        dedup: &mut DedupWindow,
    ) -> Result<(), SourceError> {
        let mut frames = self.open().await?;

        if reporter.set(ConnectionState::Open) {
            tracing::info!("Event stream open");
        }

        while let Some(frame) = frames.next().await {
            if !dispatch(frame?, gate, dedup) {
                break;
            }
        }

        Ok(())
    }
}

impl EventSource for StreamClient {
    fn connect<H: EventHandler>(&self, handler: H) -> Result<Subscription, SourceError> {
        let gate = Arc::new(DeliveryGate::new(handler));
        let (reporter, _) = StateReporter::new(ConnectionState::Connecting { attempt: 0 });

        let task = spawn_on_current(self.clone().run(Arc::clone(&gate), reporter.clone()))?;
        tracing::info!(endpoint = %self.endpoint, "Connecting to event stream");

        Ok(Subscription::new(gate, task, reporter))
    }
}

/// Handle one frame. Returns `false` once the gate is closed.
fn dispatch(frame: SseFrame, gate: &DeliveryGate, dedup: &mut DedupWindow) -> bool {
    if !is_subscribed(&frame.event) {
        tracing::trace!(channel = %frame.event, "Ignoring frame on unknown channel");
        StreamMetrics::record_dropped(DropReason::UnknownChannel);
        return true;
    }

    let event = match decode(&frame.data) {
        Ok(event) => event,
        Err(error) => {
            tracing::warn!(channel = %frame.event, %error, "Dropping malformed event");
            StreamMetrics::record_dropped(DropReason::Malformed);
            return true;
        }
    };

    if dedup.is_duplicate(&frame.event, &event) {
        tracing::debug!(
            channel = %frame.event,
            kind = event.kind(),
            "Dropping event already seen on another channel"
        );
        StreamMetrics::record_duplicate();
        return true;
    }

    tracing::debug!(kind = event.kind(), channel = %frame.event, "Delivering event");
    let delivered = gate.deliver(event);
    if delivered {
        StreamMetrics::record_delivered();
    }
    delivered
}

fn is_subscribed(channel: &str) -> bool {
    channel == DEFAULT_CHANNEL || KNOWN_KINDS.contains(&channel)
}

fn events_endpoint(base_url: &str, since: u64) -> Result<Url, SourceError> {
    let mut url =
        Url::parse(base_url).map_err(|e| SourceError::InvalidEndpoint(format!("{base_url}: {e}")))?;

    url.path_segments_mut()
        .map_err(|()| SourceError::InvalidEndpoint(base_url.to_string()))?
        .pop_if_empty()
        .extend(["public", "events"]);
    url.set_fragment(None);
    url.query_pairs_mut()
        .append_pair("since", &since.to_string());
    Ok(url)
}

/// Recently delivered events, remembered to catch the same event arriving
/// on both the generic and a named channel.
///
/// Events are compared decoded, so copies that differ only in key order or
/// whitespace still match.
#[derive(Debug)]
struct DedupWindow {
    capacity: usize,
    recent: VecDeque<(String, LiveOpsEvent)>,
}

impl DedupWindow {
    fn new(capacity: usize) -> Self {
        Self {
            capacity,
            recent: VecDeque::with_capacity(capacity),
        }
    }

    /// Whether `event` was already seen on a different channel. Events that
    /// are not duplicates are remembered.
    fn is_duplicate(&mut self, channel: &str, event: &LiveOpsEvent) -> bool {
        // Unrecognized events carry no identity to compare.
        if self.capacity == 0 || *event == LiveOpsEvent::Unrecognized {
            return false;
        }

        if let Some(index) = self
            .recent
            .iter()
            .position(|(seen_channel, seen)| seen_channel != channel && seen == event)
        {
            // One match cancels one copy; a later repeat is delivered again.
            self.recent.remove(index);
            return true;
        }

        if self.recent.len() == self.capacity {
            self.recent.pop_front();
        }
        self.recent.push_back((channel.to_string(), event.clone()));
        false
    }

    fn clear(&mut self) {
        self.recent.clear();
    }
}

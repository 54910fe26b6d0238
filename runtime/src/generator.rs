//! Self-contained source of plausible call traffic.
//!
//! [`SyntheticEventSource`] fabricates a small, evolving set of concurrent
//! calls and emits them through the same [`EventSource`] contract as the
//! stream client. Two calls are started when a handler connects; after that a
//! fixed-period tick advances the workload:
//!
//! 1. With fewer than [`MAX_LIVE_CALLS`] live calls, start one with
//!    probability [`SPAWN_PROBABILITY`].
//! 2. With no live call left, start one and stop.
//! 3. Otherwise pick a live call uniformly and roll once:
//!    - below [`WATCH_TOGGLE_THRESHOLD`]: toggle it between watch and active
//!    - below [`BLOCK_THRESHOLD`]: block it
//!
//!    Failing both, a second draw ends it with probability
//!    [`END_PROBABILITY`] (`ended` then `recording_ready`), otherwise the
//!    next speaker says a line.
//!
//! Randomness comes from a seedable [`StdRng`]; the same seed and clock replay
//! the same run.

use crate::config::GeneratorConfig;
use crate::error::SourceError;
use crate::metrics::GeneratorMetrics;
use crate::source::{
    current_runtime, ConnectionState, DeliveryGate, EventHandler, EventSource, StateReporter,
    Subscription,
};
use liveops_core::environment::{Clock, SystemClock};
use liveops_core::event::LiveOpsEvent;
use liveops_core::session::{CallId, CallStatus, Millis, TranscriptRole};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use smallvec::SmallVec;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{interval_at, Instant, MissedTickBehavior};

/// Upper bound on simultaneously live (non-ended) calls.
pub const MAX_LIVE_CALLS: usize = 4;
/// Calls started when a handler connects.
pub const SEEDED_CALLS: usize = 2;
/// Chance per tick of starting a call while below [`MAX_LIVE_CALLS`].
pub const SPAWN_PROBABILITY: f64 = 0.25;
/// Status roll below this toggles watch/active.
pub const WATCH_TOGGLE_THRESHOLD: f64 = 0.08;
/// Status roll below this (and not below the toggle threshold) blocks the call.
pub const BLOCK_THRESHOLD: f64 = 0.10;
/// Chance of ending a call that kept its status.
pub const END_PROBABILITY: f64 = 0.12;

/// Reason attached when a call enters watch.
pub const WATCH_REASON: &str = "Keyword flagged: refund request";
/// Reason attached when a call leaves watch.
pub const CLEARED_REASON: &str = "Cleared by supervisor";
/// Reason attached when a call is blocked.
pub const BLOCKED_REASON: &str = "Repeated chargeback risk";
/// Reason attached when a call ends.
pub const ENDED_REASON: &str = "Order confirmed";

const PHONE_POOL: [&str; 4] = [
    "+12125550199",
    "+14155552671",
    "+17185551234",
    "+12135557890",
];

const CUSTOMER_LINES: [&str; 6] = [
    "hi i want general tso chicken",
    "can i get two spicy ramen and a miso soup",
    "is the orange tofu available?",
    "add extra chili oil to the order please",
    "what is the wait time for pickup?",
    "can you make it gluten free?",
];

const ASSISTANT_LINES: [&str; 6] = [
    "Absolutely. Would you like that as a combo?",
    "Got it. Any modifications for the spicy ramen?",
    "Orange tofu is available today.",
    "Noted. Extra chili oil added.",
    "Pickup is about 20 minutes right now.",
    "We can do gluten free for that item.",
];

const RECORDING_URLS: [&str; 2] = [
    "https://www2.cs.uic.edu/~i101/SoundFiles/StarWars60.wav",
    "https://www2.cs.uic.edu/~i101/SoundFiles/BabyElephantWalk60.wav",
];

const ID_ALPHABET: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";
const ID_SUFFIX_LEN: usize = 8;

/// Events produced by one step; a tick emits at most three.
type Batch = SmallVec<[LiveOpsEvent; 4]>;

/// Generator-side view of a live call.
#[derive(Debug, Clone)]
struct SyntheticCall {
    call_id: CallId,
    status: CallStatus,
    last_speaker: TranscriptRole,
}

/// The generator's private workload. Ended calls are dropped from it.
///
/// Kept in a `Vec` so that selection by index is reproducible for a seed.
#[derive(Debug, Default)]
struct CallRoster {
    calls: Vec<SyntheticCall>,
}

impl CallRoster {
    fn live_calls(&self) -> usize {
        self.calls.len()
    }

    fn seed<R: Rng + ?Sized>(&mut self, rng: &mut R, now: Millis) -> Batch {
        (0..SEEDED_CALLS).map(|_| self.start_call(rng, now)).collect()
    }

    fn tick<R: Rng + ?Sized>(&mut self, rng: &mut R, now: Millis) -> Batch {
        let mut events = Batch::new();

        if self.calls.len() < MAX_LIVE_CALLS && rng.gen_bool(SPAWN_PROBABILITY) {
            events.push(self.start_call(rng, now));
        }

        if self.calls.is_empty() {
            events.push(self.start_call(rng, now));
            return events;
        }

        let index = rng.gen_range(0..self.calls.len());
        let roll: f64 = rng.r#gen();

        if roll < WATCH_TOGGLE_THRESHOLD {
            let call = &mut self.calls[index];
            let (status, reason) = if call.status == CallStatus::Watch {
                (CallStatus::Active, CLEARED_REASON)
            } else {
                (CallStatus::Watch, WATCH_REASON)
            };
            call.status = status;
            events.push(status_event(&call.call_id, status, reason, now));
            return events;
        }

        if roll < BLOCK_THRESHOLD {
            let call = &mut self.calls[index];
            call.status = CallStatus::Blocked;
            events.push(status_event(&call.call_id, CallStatus::Blocked, BLOCKED_REASON, now));
            return events;
        }

        if rng.gen_bool(END_PROBABILITY) {
            let call = self.calls.remove(index);
            events.push(status_event(&call.call_id, CallStatus::Ended, ENDED_REASON, now));
            events.push(LiveOpsEvent::RecordingReady {
                call_id: call.call_id,
                url: pick(rng, &RECORDING_URLS).to_string(),
                at: now,
            });
            return events;
        }

        let call = &mut self.calls[index];
        let (role, lines) = match call.last_speaker {
            TranscriptRole::Assistant => (TranscriptRole::Customer, &CUSTOMER_LINES),
            _ => (TranscriptRole::Assistant, &ASSISTANT_LINES),
        };
        call.last_speaker = role;
        events.push(LiveOpsEvent::TranscriptAppended {
            call_id: call.call_id.clone(),
            role,
            text: pick(rng, lines).to_string(),
            at: now,
        });
        events
    }

    fn start_call<R: Rng + ?Sized>(&mut self, rng: &mut R, now: Millis) -> LiveOpsEvent {
        let call_id = new_call_id(rng);
        self.calls.push(SyntheticCall {
            call_id: call_id.clone(),
            status: CallStatus::Active,
            // The caller speaks first.
            last_speaker: TranscriptRole::Assistant,
        });

        LiveOpsEvent::CallStarted {
            call_id,
            phone_e164: pick(rng, &PHONE_POOL).to_string(),
            at: now,
        }
    }
}

fn status_event(call_id: &CallId, status: CallStatus, reason: &str, at: Millis) -> LiveOpsEvent {
    LiveOpsEvent::CallStatus {
        call_id: call_id.clone(),
        status,
        at,
        reason: Some(reason.to_string()),
    }
}

fn new_call_id<R: Rng + ?Sized>(rng: &mut R) -> CallId {
    let suffix: String = (0..ID_SUFFIX_LEN)
        .map(|_| char::from(ID_ALPHABET[rng.gen_range(0..ID_ALPHABET.len())]))
        .collect();
    CallId::new(format!("call_{suffix}"))
}

fn pick<R: Rng + ?Sized>(rng: &mut R, items: &[&'static str]) -> &'static str {
    items[rng.gen_range(0..items.len())]
}

/// Synthetic [`EventSource`] for development and tests.
///
/// # Example
///
/// ```no_run
/// use liveops_core::event::LiveOpsEvent;
/// use liveops_runtime::{EventSource, SyntheticEventSource};
/// use std::time::Duration;
///
/// # async fn example() -> Result<(), liveops_runtime::error::SourceError> {
/// let source = SyntheticEventSource::new()
///     .with_seed(7)
///     .with_tick(Duration::from_millis(200));
///
/// let subscription = source.connect(|event: LiveOpsEvent| println!("{}", event.kind()))?;
/// tokio::time::sleep(Duration::from_secs(2)).await;
/// subscription.close();
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct SyntheticEventSource {
    tick: Duration,
    seed: Option<u64>,
    clock: Arc<dyn Clock>,
}

impl SyntheticEventSource {
    /// Generator with the default tick, an OS-drawn seed and the system clock.
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(&GeneratorConfig::default())
    }

    /// Generator built from configuration.
    #[must_use]
    pub fn with_config(config: &GeneratorConfig) -> Self {
        Self {
            tick: config.tick,
            seed: config.seed,
            clock: Arc::new(SystemClock),
        }
    }

    /// Fix the seed so runs are reproducible.
    #[must_use]
    pub const fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Change the tick period.
    ///
    /// A zero period is rejected by [`connect`](EventSource::connect).
    #[must_use]
    pub const fn with_tick(mut self, tick: Duration) -> Self {
        self.tick = tick;
        self
    }

    /// Stamp events with `clock` instead of the system clock.
    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    fn rng(&self) -> StdRng {
        self.seed
            .map_or_else(StdRng::from_entropy, StdRng::seed_from_u64)
    }
}

impl Default for SyntheticEventSource {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for SyntheticEventSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SyntheticEventSource")
            .field("tick", &self.tick)
            .field("seed", &self.seed)
            .finish_non_exhaustive()
    }
}

impl EventSource for SyntheticEventSource {
    fn connect<H: EventHandler>(&self, handler: H) -> Result<Subscription, SourceError> {
        if self.tick.is_zero() {
            return Err(SourceError::ZeroTick);
        }
        let runtime = current_runtime()?;

        let mut rng = self.rng();
        let mut roster = CallRoster::default();
        let gate = Arc::new(DeliveryGate::new(handler));
        let (reporter, _) = StateReporter::new(ConnectionState::Open);

        emit(&gate, roster.seed(&mut rng, self.clock.now_millis()));
        tracing::info!(seed = ?self.seed, tick = ?self.tick, "Synthetic event source started");

        let period = self.tick;
        let clock = Arc::clone(&self.clock);
        let task_gate = Arc::clone(&gate);
        let task = runtime.spawn(async move {
            let mut ticker = interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                ticker.tick().await;
                let events = roster.tick(&mut rng, clock.now_millis());
                tracing::trace!(
                    emitted = events.len(),
                    live = roster.live_calls(),
                    "Generator tick"
                );
                if !emit(&task_gate, events) {
                    break;
                }
            }
        });

        Ok(Subscription::new(gate, task, reporter))
    }
}

/// Deliver one step's events as a unit, so `ended` and its `recording_ready`
/// are never split by `close`.
fn emit(gate: &DeliveryGate, events: Batch) -> bool {
    let kinds: SmallVec<[&'static str; 4]> = events.iter().map(LiveOpsEvent::kind).collect();
    let delivered = gate.deliver_all(events);
    if delivered {
        for kind in kinds {
            GeneratorMetrics::record_emitted(kind);
        }
    }
    delivered
}

#[cfg(test)]
mod tests {
    use super::*;
    use liveops_testing::{test_clock, EventRecorder};
    use proptest::prelude::*;
    use std::collections::HashSet;

    /// Replay `ticks` steps and return every emitted event in order.
    fn run(seed: u64, ticks: usize) -> Vec<LiveOpsEvent> {
        let mut rng = StdRng::seed_from_u64(seed);
        let mut roster = CallRoster::default();
        let mut events: Vec<LiveOpsEvent> = roster.seed(&mut rng, 0).into_vec();
        for step in 1..=ticks {
            events.extend(roster.tick(&mut rng, i64::try_from(step).unwrap() * 1400));
        }
        events
    }

    #[test]
    fn seeding_starts_two_active_calls() {
        let mut rng = StdRng::seed_from_u64(1);
        let mut roster = CallRoster::default();
        let events = roster.seed(&mut rng, 0);

        assert_eq!(events.len(), SEEDED_CALLS);
        assert!(events.iter().all(|e| matches!(e, LiveOpsEvent::CallStarted { .. })));
        assert_eq!(roster.live_calls(), 2);
        for event in &events {
            let LiveOpsEvent::CallStarted { call_id, phone_e164, .. } = event else {
                unreachable!()
            };
            assert!(call_id.as_str().starts_with("call_"));
            assert_eq!(call_id.as_str().len(), 5 + ID_SUFFIX_LEN);
            assert!(PHONE_POOL.contains(&phone_e164.as_str()));
        }
    }

    #[test]
    fn same_seed_replays_the_same_run() {
        assert_eq!(run(42, 300), run(42, 300));
        assert_ne!(run(42, 300), run(43, 300));
    }

    #[test]
    fn first_line_of_a_call_comes_from_the_customer() {
        let events = run(9, 500);
        let mut spoken: HashSet<&CallId> = HashSet::new();

        for event in &events {
            if let LiveOpsEvent::TranscriptAppended { call_id, role, text, .. } = event {
                if spoken.insert(call_id) {
                    assert_eq!(*role, TranscriptRole::Customer);
                }
                let pool: &[&str] = match role {
                    TranscriptRole::Customer => &CUSTOMER_LINES,
                    _ => &ASSISTANT_LINES,
                };
                assert!(pool.contains(&text.as_str()));
            }
        }
    }

    proptest! {
        #[test]
        fn live_calls_never_exceed_the_cap(seed in any::<u64>()) {
            let mut live: HashSet<CallId> = HashSet::new();

            for event in run(seed, 400) {
                match event {
                    LiveOpsEvent::CallStarted { call_id, .. } => {
                        live.insert(call_id);
                    }
                    LiveOpsEvent::CallStatus { call_id, status: CallStatus::Ended, .. } => {
                        live.remove(&call_id);
                    }
                    _ => {}
                }
                prop_assert!(live.len() <= MAX_LIVE_CALLS);
            }
        }

        #[test]
        fn every_end_is_followed_by_one_recording(seed in any::<u64>()) {
            let events = run(seed, 400);

            for (i, event) in events.iter().enumerate() {
                if let LiveOpsEvent::CallStatus { call_id, status: CallStatus::Ended, .. } = event {
                    let next = events.get(i + 1);
                    prop_assert!(
                        matches!(next, Some(LiveOpsEvent::RecordingReady { call_id: id, url, .. })
                            if id == call_id && RECORDING_URLS.contains(&url.as_str())),
                        "ended call {} not followed by its recording", call_id
                    );
                    let recordings = events
                        .iter()
                        .filter(|e| matches!(e, LiveOpsEvent::RecordingReady { call_id: id, .. } if id == call_id))
                        .count();
                    prop_assert_eq!(recordings, 1);
                }
            }
        }
    }

    #[tokio::test(start_paused = true)]
    async fn connect_seeds_synchronously_and_ticks_on_the_period() {
        let recorder = EventRecorder::new();
        let source = SyntheticEventSource::new()
            .with_seed(5)
            .with_clock(Arc::new(test_clock()));

        let subscription = source.connect(recorder.handler()).unwrap();
        assert_eq!(recorder.len(), SEEDED_CALLS);
        assert_eq!(subscription.state(), ConnectionState::Open);

        tokio::time::sleep(Duration::from_millis(1399)).await;
        assert_eq!(recorder.len(), SEEDED_CALLS);

        tokio::time::sleep(Duration::from_millis(1400 * 3)).await;
        assert!(recorder.len() >= SEEDED_CALLS + 3);

        subscription.close();
    }

    #[tokio::test(start_paused = true)]
    async fn no_event_after_close() {
        let recorder = EventRecorder::new();
        let subscription = SyntheticEventSource::new()
            .with_seed(11)
            .with_tick(Duration::from_millis(10))
            .connect(recorder.handler())
            .unwrap();

        tokio::time::sleep(Duration::from_millis(105)).await;
        subscription.close();
        let seen = recorder.len();

        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(recorder.len(), seen);
        assert!(!subscription.is_active());
    }

    #[tokio::test(start_paused = true)]
    async fn zero_tick_is_rejected_before_any_delivery() {
        let recorder = EventRecorder::new();
        let result = SyntheticEventSource::new()
            .with_seed(3)
            .with_tick(Duration::ZERO)
            .connect(recorder.handler());

        assert!(matches!(result, Err(SourceError::ZeroTick)));
        assert!(recorder.is_empty());
    }

    #[test]
    fn connect_outside_runtime_never_calls_the_handler() {
        let recorder = EventRecorder::new();
        let result = SyntheticEventSource::new().connect(recorder.handler());

        assert!(matches!(result, Err(SourceError::NoRuntime)));
        assert!(recorder.is_empty());
    }
}

//! Headless live call console.
//!
//! Connects the configured event source (the synthetic generator by default,
//! or the HTTP stream with `LIVEOPS_USE_MOCK_SSE=false`) to a [`Store`] and
//! logs the call queue every few seconds until Ctrl-C.
//!
//! ```bash
//! RUST_LOG=liveops_console=info cargo run -p liveops-console
//! ```

mod queue;

use anyhow::Context;
use liveops_core::console::{ConsoleEnvironment, ConsoleReducer};
use liveops_core::environment::SystemClock;
use liveops_core::registry::SessionRegistry;
use liveops_runtime::config::{Config, SourceKind};
use liveops_runtime::metrics::MetricsRecorder;
use liveops_runtime::{
    ConnectionState, EventSource, Store, StreamClient, Subscription, SyntheticEventSource,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// How often the queue is logged.
const SUMMARY_PERIOD: Duration = Duration::from_secs(5);

type ConsoleStore = Store<ConsoleReducer>;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "liveops_console=info,liveops_runtime=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env().context("Invalid configuration")?;
    info!(
        source = ?config.source,
        api_url = %config.stream.base_url,
        reconnect_max_retries = config.stream.reconnect.max_retries,
        "Configuration loaded"
    );

    let mut metrics = MetricsRecorder::new();
    if config.metrics_enabled {
        metrics.install().context("Failed to install metrics recorder")?;
    }

    let store = Arc::new(Store::new(
        SessionRegistry::new(),
        ConsoleReducer::new(),
        ConsoleEnvironment::new(Arc::new(SystemClock)),
    ));

    let subscription = connect(&config, &store)?;
    follow(&store, &subscription).await;

    subscription.close();
    log_queue(&store);

    if let Some(rendered) = metrics.render() {
        info!("Final metrics:\n{rendered}");
    }

    info!("Console stopped");
    Ok(())
}

fn connect(config: &Config, store: &Arc<ConsoleStore>) -> anyhow::Result<Subscription> {
    let subscription = match config.source {
        SourceKind::Synthetic => {
            info!("Using synthetic event source");
            SyntheticEventSource::with_config(&config.generator).connect(store.handler())?
        }
        SourceKind::Stream => {
            let client = StreamClient::new(config.stream.clone())?;
            info!(endpoint = %client.endpoint(), "Using event stream");
            client.connect(store.handler())?
        }
    };
    Ok(subscription)
}

/// Log connection changes and the queue until Ctrl-C.
async fn follow(store: &ConsoleStore, subscription: &Subscription) {
    let mut states = subscription.state_changes();
    let mut summary = tokio::time::interval(SUMMARY_PERIOD);
    let shutdown = signal::ctrl_c();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            result = &mut shutdown => {
                if let Err(e) = result {
                    warn!(error = %e, "Failed to listen for shutdown signal");
                }
                info!("Shutdown signal received");
                return;
            }
            changed = states.changed() => {
                if changed.is_err() {
                    return;
                }
                let state = states.borrow_and_update().clone();
                log_state(&state);
            }
            _ = summary.tick() => log_queue(store),
        }
    }
}

fn log_state(state: &ConnectionState) {
    match state {
        ConnectionState::Closed(_) if state.is_closed_unexpectedly() => {
            error!(%state, "No further events will arrive; the queue below is frozen");
        }
        ConnectionState::Connecting { attempt } if *attempt > 0 => warn!(%state, "Connection"),
        _ => info!(%state, "Connection"),
    }
}

fn log_queue(store: &ConsoleStore) {
    let registry = store.snapshot();

    let counts = queue::status_counts(&registry)
        .into_iter()
        .map(|(label, count)| format!("{label}={count}"))
        .collect::<Vec<_>>()
        .join(" ");
    info!(
        calls = registry.len(),
        open = queue::open_calls(&registry),
        callers_waiting = queue::callers_waiting(&registry),
        "Queue {counts}"
    );

    for row in queue::rows(&registry) {
        info!(
            call_id = %row.call_id,
            phone = %row.phone,
            status = row.status,
            reason = row.reason.as_deref().unwrap_or("-"),
            recording = row.has_recording,
            updated_at = ?row.updated_at,
            "{}",
            row.last_line
        );
    }
}

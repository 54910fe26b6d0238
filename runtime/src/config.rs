//! Configuration for the event sources.
//!
//! Loaded from environment variables with sensible defaults. Values that are
//! present but unparseable are rejected rather than silently defaulted.

use crate::retry::ReconnectPolicy;
use std::env;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

/// Default base URL of the event source.
pub const DEFAULT_API_URL: &str = "http://localhost:8080";

/// Default generator tick period.
pub const DEFAULT_TICK: Duration = Duration::from_millis(1400);

/// Default number of recent frames remembered for cross-channel dedup.
pub const DEFAULT_DEDUP_WINDOW: usize = 64;

/// Invalid configuration value.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// A variable is set but does not parse
    #[error("Invalid value for {key}: {value:?}")]
    Invalid {
        /// Environment variable name
        key: &'static str,
        /// Offending value
        value: String,
    },

    /// A variable parses but is outside its allowed range
    #[error("{key} {reason}")]
    OutOfRange {
        /// Environment variable name
        key: &'static str,
        /// What is wrong with it
        reason: &'static str,
    },
}

/// Which event source the console is wired to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    /// The in-process synthetic generator
    Synthetic,
    /// The HTTP event stream
    Stream,
}

/// Top-level configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// Selected source
    pub source: SourceKind,
    /// Stream client settings
    pub stream: StreamConfig,
    /// Generator settings
    pub generator: GeneratorConfig,
    /// Install the Prometheus recorder
    pub metrics_enabled: bool,
}

/// Stream client settings.
#[derive(Debug, Clone, PartialEq)]
pub struct StreamConfig {
    /// Base URL; the client requests `{base_url}/public/events`
    pub base_url: String,
    /// Cursor sent as `since`
    pub since: u64,
    /// Reconnect behavior after an unexpected drop
    pub reconnect: ReconnectPolicy,
    /// Recent frames remembered for cross-channel dedup (0 disables it)
    pub dedup_window: usize,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_API_URL.to_string(),
            since: 0,
            reconnect: ReconnectPolicy::default(),
            dedup_window: DEFAULT_DEDUP_WINDOW,
        }
    }
}

impl StreamConfig {
    /// Settings for `base_url` with every other field defaulted.
    #[must_use]
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Self::default()
        }
    }

    /// Replace the reconnect policy.
    #[must_use]
    pub fn with_reconnect(mut self, reconnect: ReconnectPolicy) -> Self {
        self.reconnect = reconnect;
        self
    }

    /// Replace the dedup window size.
    #[must_use]
    pub const fn with_dedup_window(mut self, dedup_window: usize) -> Self {
        self.dedup_window = dedup_window;
        self
    }
}

/// Generator settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratorConfig {
    /// Tick period
    pub tick: Duration,
    /// Seed for a reproducible run; `None` draws one from the OS
    pub seed: Option<u64>,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            tick: DEFAULT_TICK,
            seed: None,
        }
    }
}

impl Config {
    /// Load configuration from the process environment.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if a variable is set to an invalid value.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if a variable is set to an invalid value.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        // Anything but an explicit "false" keeps the generator.
        let source = match lookup("LIVEOPS_USE_MOCK_SSE").as_deref() {
            Some("false") => SourceKind::Stream,
            _ => SourceKind::Synthetic,
        };

        let initial_delay_ms = parse(&lookup, "LIVEOPS_RECONNECT_INITIAL_DELAY_MS", 500_u64)?;
        let max_delay_ms = parse(&lookup, "LIVEOPS_RECONNECT_MAX_DELAY_MS", 30_000_u64)?;
        if max_delay_ms < initial_delay_ms {
            return Err(ConfigError::OutOfRange {
                key: "LIVEOPS_RECONNECT_MAX_DELAY_MS",
                reason: "must not be below LIVEOPS_RECONNECT_INITIAL_DELAY_MS",
            });
        }

        let reconnect = ReconnectPolicy::builder()
            .max_retries(parse(&lookup, "LIVEOPS_RECONNECT_MAX_RETRIES", 0)?)
            .initial_delay(Duration::from_millis(initial_delay_ms))
            .max_delay(Duration::from_millis(max_delay_ms))
            .build();

        let tick_ms = parse(&lookup, "LIVEOPS_GENERATOR_TICK_MS", 1400_u64)?;
        if tick_ms == 0 {
            return Err(ConfigError::OutOfRange {
                key: "LIVEOPS_GENERATOR_TICK_MS",
                reason: "must be greater than zero",
            });
        }

        Ok(Self {
            source,
            stream: StreamConfig {
                base_url: lookup("LIVEOPS_API_URL").unwrap_or_else(|| DEFAULT_API_URL.to_string()),
                since: parse(&lookup, "LIVEOPS_EVENTS_SINCE", 0)?,
                reconnect,
                dedup_window: parse(&lookup, "LIVEOPS_DEDUP_WINDOW", DEFAULT_DEDUP_WINDOW)?,
            },
            generator: GeneratorConfig {
                tick: Duration::from_millis(tick_ms),
                seed: lookup("LIVEOPS_GENERATOR_SEED")
                    .map(|raw| parse_value("LIVEOPS_GENERATOR_SEED", raw))
                    .transpose()?,
            },
            metrics_enabled: parse(&lookup, "LIVEOPS_METRICS", false)?,
        })
    }
}

fn parse<F, T>(lookup: &F, key: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    lookup(key).map_or(Ok(default), |raw| parse_value(key, raw))
}

fn parse_value<T: FromStr>(key: &'static str, raw: String) -> Result<T, ConfigError> {
    raw.trim()
        .parse()
        .map_err(|_| ConfigError::Invalid { key, value: raw })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(vars: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults_select_the_generator() {
        let config = load(&[]).unwrap();

        assert_eq!(config.source, SourceKind::Synthetic);
        assert_eq!(config.stream, StreamConfig::default());
        assert_eq!(config.generator, GeneratorConfig::default());
        assert!(!config.metrics_enabled);
        assert_eq!(config.stream.reconnect.max_retries, 0);
    }

    #[test]
    fn only_false_selects_the_stream_client() {
        assert_eq!(
            load(&[("LIVEOPS_USE_MOCK_SSE", "false")]).unwrap().source,
            SourceKind::Stream
        );
        assert_eq!(
            load(&[("LIVEOPS_USE_MOCK_SSE", "no")]).unwrap().source,
            SourceKind::Synthetic
        );
    }

    #[test]
    fn reads_overrides() {
        let config = load(&[
            ("LIVEOPS_API_URL", "https://ops.example.com"),
            ("LIVEOPS_RECONNECT_MAX_RETRIES", "3"),
            ("LIVEOPS_GENERATOR_TICK_MS", "250"),
            ("LIVEOPS_GENERATOR_SEED", "42"),
            ("LIVEOPS_METRICS", "true"),
        ])
        .unwrap();

        assert_eq!(config.stream.base_url, "https://ops.example.com");
        assert_eq!(config.stream.reconnect.max_retries, 3);
        assert_eq!(config.generator.tick, Duration::from_millis(250));
        assert_eq!(config.generator.seed, Some(42));
        assert!(config.metrics_enabled);
    }

    #[test]
    fn rejects_unparseable_values() {
        let error = load(&[("LIVEOPS_DEDUP_WINDOW", "lots")]).unwrap_err();
        assert_eq!(
            error,
            ConfigError::Invalid {
                key: "LIVEOPS_DEDUP_WINDOW",
                value: "lots".to_string()
            }
        );
    }

    #[test]
    fn rejects_zero_tick_and_inverted_backoff() {
        assert!(matches!(
            load(&[("LIVEOPS_GENERATOR_TICK_MS", "0")]),
            Err(ConfigError::OutOfRange { .. })
        ));
        assert!(matches!(
            load(&[
                ("LIVEOPS_RECONNECT_INITIAL_DELAY_MS", "5000"),
                ("LIVEOPS_RECONNECT_MAX_DELAY_MS", "10"),
            ]),
            Err(ConfigError::OutOfRange { .. })
        ));
    }
}

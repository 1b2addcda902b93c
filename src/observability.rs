//! Tracing setup for benchmark runs.
//!
//! Event levels used across the crate:
//! - `info`: run start/end, settings correction, saved suites
//! - `warn`: tests frozen by a sentinel, units killed at their deadline,
//!   unreadable tokens or suite fields falling back to defaults
//! - `debug`: scheduler transitions, per-wave and per-unit replies
//!
//! Hosts that install their own subscriber can skip this module entirely.

use std::sync::OnceLock;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::types::ObservabilityConfig;

static TRACING_INIT: OnceLock<()> = OnceLock::new();

/// Environment variable switching log output to JSON (`json`) or text.
pub const LOG_FORMAT_ENV: &str = "PERFLINK_LOG_FORMAT";

/// Install the default subscriber: `info` unless `RUST_LOG` says otherwise,
/// compact text unless `PERFLINK_LOG_FORMAT=json`.
pub fn init_tracing() {
    init_tracing_with(&ObservabilityConfig::default());
}

/// Install the subscriber with level and format fallbacks from `config`.
/// Only the first call in a process has any effect.
pub fn init_tracing_with(config: &ObservabilityConfig) {
    TRACING_INIT.get_or_init(|| {
        let env_filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(config.log_level.as_str()));
        let format = std::env::var(LOG_FORMAT_ENV).ok();

        let result = if wants_json(format.as_deref(), config) {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(fmt::layer().json().with_current_span(false))
                .try_init()
        } else {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(fmt::layer().compact().with_target(false))
                .try_init()
        };

        if let Err(err) = result {
            eprintln!("perflink: tracing already initialised elsewhere: {err}");
        }
    });
}

/// `PERFLINK_LOG_FORMAT` wins over the config flag when set.
fn wants_json(format: Option<&str>, config: &ObservabilityConfig) -> bool {
    match format {
        Some(value) => value.trim().eq_ignore_ascii_case("json"),
        None => config.json_logs,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_selection() {
        let text = ObservabilityConfig::default();
        let json = ObservabilityConfig {
            json_logs: true,
            ..ObservabilityConfig::default()
        };

        assert!(!wants_json(None, &text));
        assert!(wants_json(None, &json));
        assert!(wants_json(Some(" JSON "), &text));
        assert!(!wants_json(Some("text"), &json));
    }

    #[test]
    fn test_repeated_init_is_harmless() {
        init_tracing();
        init_tracing_with(&ObservabilityConfig {
            log_level: "debug".to_string(),
            json_logs: true,
        });
    }
}

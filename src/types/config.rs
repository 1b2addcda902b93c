//! Configuration structures.
//!
//! Configuration is built from defaults and, optionally, environment variables.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Environment variable naming the interpreter used for execution units.
pub const INTERPRETER_ENV: &str = "PERFLINK_INTERPRETER";

/// Global engine configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Observability configuration.
    #[serde(default)]
    pub observability: ObservabilityConfig,

    /// Execution unit configuration.
    #[serde(default)]
    pub sandbox: SandboxConfig,
}

impl Config {
    /// Defaults, with the interpreter overridden by `PERFLINK_INTERPRETER`.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(program) = std::env::var(INTERPRETER_ENV) {
            if !program.trim().is_empty() {
                config.sandbox.program = program;
            }
        }
        config
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    /// Tracing log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable JSON log formatting.
    pub json_logs: bool,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            json_logs: false,
        }
    }
}

/// Execution unit configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SandboxConfig {
    /// Interpreter executable.
    pub program: String,

    /// Arguments placed before the harness script path (which is always last).
    pub args: Vec<String>,

    /// Extra time a run unit gets on top of the suite duration before it is
    /// killed and reported as timed out.
    #[serde(with = "humantime_serde")]
    pub grace: Duration,

    /// Deadline for a single check execution.
    #[serde(with = "humantime_serde")]
    pub check_timeout: Duration,

    /// Maximum number of live execution units. Further units wait for a slot.
    pub max_units: usize,
}

impl Default for SandboxConfig {
    fn default() -> Self {
        Self {
            program: "node".to_string(),
            args: Vec::new(),
            grace: Duration::from_secs(2),
            check_timeout: Duration::from_secs(5),
            max_units: 64,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sandbox_defaults() {
        let config = SandboxConfig::default();
        assert_eq!(config.program, "node");
        assert!(config.args.is_empty());
        assert_eq!(config.grace, Duration::from_secs(2));
        assert!(config.max_units > 0);
    }

    #[test]
    fn test_humantime_durations() {
        let json = serde_json::json!({
            "program": "deno",
            "args": ["run", "--allow-read"],
            "grace": "500ms",
            "check_timeout": "3s",
            "max_units": 4,
        });
        let config: SandboxConfig = serde_json::from_value(json).unwrap();
        assert_eq!(config.grace, Duration::from_millis(500));
        assert_eq!(config.check_timeout, Duration::from_secs(3));
        assert_eq!(config.max_units, 4);
    }

    #[test]
    fn test_missing_sections_fall_back() {
        let config: Config = serde_json::from_str("{}").unwrap();
        assert_eq!(config.sandbox.program, "node");
        assert_eq!(config.observability.log_level, "info");
    }
}

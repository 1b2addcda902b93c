//! Execution pool - one isolated unit per request.
//!
//! Every [`Sandbox::execute`] call gets a brand-new unit, sends it one request,
//! waits for one reply and reclaims it. Nothing is reused across tests or
//! waves, so a unit that crashes or spins only costs its own measurement.
//!
//! Unlike a bare message round-trip, every call here carries a deadline
//! ([`Request::deadline`]). A unit that has not answered by then is killed and
//! reported as [`UnitOutcome::TimedOut`].

mod subprocess;

pub use subprocess::SubprocessSandbox;

use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;

use crate::harness::Harness;
use crate::suite::Test;
use crate::types::Result;

/// Message sent to a unit.
#[derive(Debug, Clone, PartialEq)]
pub enum Request {
    /// `[test]`
    Check(Test),
    /// `[test, durationMs]`
    Run { test: Test, duration_ms: u64 },
}

impl Request {
    pub fn test(&self) -> &Test {
        match self {
            Request::Check(test) => test,
            Request::Run { test, .. } => test,
        }
    }

    /// Wire payload.
    pub fn to_payload(&self) -> serde_json::Value {
        match self {
            Request::Check(test) => serde_json::json!([test]),
            Request::Run { test, duration_ms } => serde_json::json!([test, duration_ms]),
        }
    }

    /// How long the unit may take to answer: the run duration plus `grace`,
    /// or `check_timeout` for a check.
    pub fn deadline(&self, grace: Duration, check_timeout: Duration) -> Duration {
        match self {
            Request::Check(_) => check_timeout,
            Request::Run { duration_ms, .. } => Duration::from_millis(*duration_ms) + grace,
        }
    }
}

/// Message received from a unit.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum Reply {
    /// Setup code threw before the request could be handled.
    SetupFailed { setup_error: String },
    /// `[test, elapsedMs]`, or `[test, -1]` if the code threw.
    Checked(Test, f64),
    /// Iterations completed, or `-1` if the code threw.
    Ran(i64),
}

impl Reply {
    /// Parse the first non-empty line of a unit's stdout.
    pub fn parse(stdout: &str) -> Option<Self> {
        let line = stdout.lines().map(str::trim).find(|l| !l.is_empty())?;
        serde_json::from_str(line).ok()
    }
}

/// What happened to one unit.
#[derive(Debug, Clone, PartialEq)]
pub enum UnitOutcome {
    Replied(Reply),
    /// Deadline passed; the unit was killed.
    TimedOut,
    /// The unit exited without a usable reply.
    Crashed(String),
}

/// Creates, drives and reclaims isolated execution units.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Sandbox: Send + Sync {
    /// Run `request` in a fresh unit loaded with `harness`.
    ///
    /// Per-unit failures (crash, timeout) are outcomes, not errors. An `Err`
    /// means no unit could be started at all and aborts the run.
    async fn execute(&self, harness: &Harness, request: Request) -> Result<UnitOutcome>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::suite::Measurement;

    #[test]
    fn test_request_payloads() {
        let test = Test::new("a", "1+1");
        assert_eq!(
            Request::Check(test.clone()).to_payload(),
            serde_json::json!([{"name": "a", "code": "1+1", "ops": 0}])
        );
        assert_eq!(
            Request::Run { test, duration_ms: 50 }.to_payload(),
            serde_json::json!([{"name": "a", "code": "1+1", "ops": 0}, 50])
        );
    }

    #[test]
    fn test_deadlines() {
        let grace = Duration::from_secs(2);
        let check = Duration::from_secs(5);
        let run = Request::Run { test: Test::default(), duration_ms: 100 };
        assert_eq!(run.deadline(grace, check), Duration::from_millis(2100));
        assert_eq!(Request::Check(Test::default()).deadline(grace, check), check);
    }

    #[test]
    fn test_parse_replies() {
        assert_eq!(Reply::parse("12345\n"), Some(Reply::Ran(12345)));
        assert_eq!(Reply::parse("-1"), Some(Reply::Ran(-1)));
        assert_eq!(
            Reply::parse("\n{\"setup_error\":\"ReferenceError: x\"}\n"),
            Some(Reply::SetupFailed { setup_error: "ReferenceError: x".to_string() })
        );

        let reply = Reply::parse(r#"[{"name":"a","code":"throw 1","ops":0},-1]"#).unwrap();
        match reply {
            Reply::Checked(test, flag) => {
                assert_eq!(test.code, "throw 1");
                assert_eq!(test.ops, Measurement::Pending);
                assert_eq!(flag, -1.0);
            }
            other => panic!("unexpected reply: {other:?}"),
        }

        assert_eq!(Reply::parse(""), None);
        assert_eq!(Reply::parse("Segmentation fault"), None);
    }
}

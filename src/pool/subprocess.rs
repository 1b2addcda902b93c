//! Child-process execution units.

use async_trait::async_trait;
use std::io::Write;
use std::process::Stdio;
use std::sync::Arc;
use tempfile::NamedTempFile;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tokio::sync::Semaphore;

use super::{Reply, Request, Sandbox, UnitOutcome};
use crate::harness::Harness;
use crate::types::{Error, Result, SandboxConfig};

/// Longest stderr excerpt kept in a crash report.
const STDERR_EXCERPT_BYTES: usize = 2048;

/// Runs each unit as `program args... <harness script path>`.
#[derive(Debug, Clone)]
pub struct SubprocessSandbox {
    config: SandboxConfig,
    permits: Arc<Semaphore>,
}

impl SubprocessSandbox {
    pub fn new(config: SandboxConfig) -> Self {
        let permits = Arc::new(Semaphore::new(config.max_units.max(1)));
        Self { config, permits }
    }

    pub fn config(&self) -> &SandboxConfig {
        &self.config
    }
}

impl Default for SubprocessSandbox {
    fn default() -> Self {
        Self::new(SandboxConfig::default())
    }
}

#[async_trait]
impl Sandbox for SubprocessSandbox {
    async fn execute(&self, harness: &Harness, request: Request) -> Result<UnitOutcome> {
        // Held for the unit's whole lifetime.
        let _permit = self
            .permits
            .acquire()
            .await
            .map_err(|_| Error::sandbox("execution pool closed"))?;

        // Removed on drop, after the unit has been reaped.
        let script = write_script(harness.source())?;

        let mut child = Command::new(&self.config.program)
            .args(&self.config.args)
            .arg(script.path())
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()?;

        let mut payload = serde_json::to_vec(&request.to_payload())?;
        payload.push(b'\n');
        let mut stdin = child
            .stdin
            .take()
            .ok_or_else(|| Error::sandbox("unit stdin not captured"))?;

        let deadline = request.deadline(self.config.grace, self.config.check_timeout);
        let test_name = request.test().name.as_str();

        // The unit only drains stdin once setup is done, so the write must sit
        // under the same deadline as the wait.
        let write_request = async move {
            if let Err(e) = stdin.write_all(&payload).await {
                // A unit that died during startup closes its end early; the
                // exit status tells the real story.
                tracing::debug!(error = %e, "Request write failed");
            }
        };
        let exchange = async {
            let ((), output) = tokio::join!(write_request, child.wait_with_output());
            output
        };

        // Dropping the exchange on timeout drops the child, which kills it.
        let output = match tokio::time::timeout(deadline, exchange).await {
            Err(_elapsed) => {
                tracing::warn!(
                    test = test_name,
                    purpose = %harness.purpose(),
                    deadline_ms = deadline.as_millis() as u64,
                    "Execution unit timed out, killed"
                );
                return Ok(UnitOutcome::TimedOut);
            }
            Ok(output) => output?,
        };

        let stdout = String::from_utf8_lossy(&output.stdout);
        if let Some(reply) = Reply::parse(&stdout) {
            tracing::debug!(test = test_name, purpose = %harness.purpose(), ?reply, "Unit replied");
            return Ok(UnitOutcome::Replied(reply));
        }

        let stderr = String::from_utf8_lossy(&output.stderr);
        let excerpt = excerpt(&stderr, STDERR_EXCERPT_BYTES);
        tracing::warn!(
            test = test_name,
            purpose = %harness.purpose(),
            status = %output.status,
            "Execution unit exited without a reply"
        );
        Ok(UnitOutcome::Crashed(format!("{}: {}", output.status, excerpt)))
    }
}

/// Harness source goes through a file, not argv: setup code can be far larger
/// than a single argument may be.
fn write_script(source: &str) -> Result<NamedTempFile> {
    let mut script = tempfile::Builder::new()
        .prefix("perflink-unit-")
        .suffix(".cjs")
        .tempfile()?;
    script.write_all(source.as_bytes())?;
    script.flush()?;
    Ok(script)
}

fn excerpt(text: &str, max_bytes: usize) -> &str {
    let text = text.trim();
    if text.len() <= max_bytes {
        return text;
    }
    let mut end = max_bytes;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    &text[..end]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::harness::{generate, Purpose};
    use crate::suite::Test;
    use std::time::Duration;

    fn shell_sandbox(script: &str, grace: Duration) -> SubprocessSandbox {
        // `sh -c <script> <harness path>`: the path lands in $0.
        SubprocessSandbox::new(SandboxConfig {
            program: "sh".to_string(),
            args: vec!["-c".to_string(), script.to_string()],
            grace,
            check_timeout: grace,
            max_units: 2,
        })
    }

    fn run_request() -> Request {
        Request::Run {
            test: Test::new("a", "1"),
            duration_ms: 10,
        }
    }

    #[test]
    fn test_excerpt_respects_char_boundaries() {
        assert_eq!(excerpt("  short  ", 100), "short");
        assert_eq!(excerpt("ééé", 3), "é");
    }

    #[tokio::test]
    async fn test_reply_is_read_from_stdout() {
        let sandbox = shell_sandbox("cat > /dev/null; echo 4242", Duration::from_secs(5));
        let outcome = sandbox
            .execute(&generate("", Purpose::Run), run_request())
            .await
            .unwrap();
        assert_eq!(outcome, UnitOutcome::Replied(Reply::Ran(4242)));
    }

    #[tokio::test]
    async fn test_silent_exit_is_a_crash() {
        let sandbox = shell_sandbox("cat > /dev/null; echo oops >&2; exit 3", Duration::from_secs(5));
        let outcome = sandbox
            .execute(&generate("", Purpose::Run), run_request())
            .await
            .unwrap();
        match outcome {
            UnitOutcome::Crashed(detail) => assert!(detail.contains("oops")),
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_hanging_unit_times_out() {
        let sandbox = shell_sandbox("sleep 30", Duration::from_millis(100));
        let started = std::time::Instant::now();
        let outcome = sandbox
            .execute(&generate("", Purpose::Run), run_request())
            .await
            .unwrap();
        assert_eq!(outcome, UnitOutcome::TimedOut);
        assert!(started.elapsed() < Duration::from_secs(10));
    }

    #[tokio::test]
    async fn test_harness_is_delivered_as_a_file() {
        // Well past the 128 KiB limit on a single argv entry.
        let harness = generate(&"x".repeat(300_000), Purpose::Run);
        let sandbox = shell_sandbox(r#"cat > /dev/null; wc -c < "$0""#, Duration::from_secs(5));
        let outcome = sandbox.execute(&harness, run_request()).await.unwrap();
        assert_eq!(
            outcome,
            UnitOutcome::Replied(Reply::Ran(harness.source().len() as i64))
        );
    }

    #[tokio::test]
    async fn test_unread_request_is_bounded_by_deadline() {
        // Never drains stdin, so a request larger than the pipe buffer cannot
        // be written in full.
        let sandbox = shell_sandbox("sleep 30", Duration::from_millis(200));
        let request = Request::Check(Test::new("big", "x".repeat(512 * 1024)));
        let outcome = tokio::time::timeout(
            Duration::from_secs(10),
            sandbox.execute(&generate("", Purpose::Check), request),
        )
        .await
        .expect("unit deadline did not fire")
        .unwrap();
        assert_eq!(outcome, UnitOutcome::TimedOut);
    }

    #[tokio::test]
    async fn test_missing_interpreter_is_an_error() {
        let sandbox = SubprocessSandbox::new(SandboxConfig {
            program: "perflink-no-such-interpreter".to_string(),
            ..SandboxConfig::default()
        });
        let err = sandbox
            .execute(&generate("", Purpose::Check), Request::Check(Test::default()))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Io(_)));
    }
}

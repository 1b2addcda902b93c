//! End-to-end runs through real `node` execution units.
//!
//! Each test returns early when the interpreter (`node`, or
//! `PERFLINK_INTERPRETER`) is not on PATH.

use perflink::harness::{self, Purpose};
use perflink::pool::{Reply, Request, Sandbox, SubprocessSandbox, UnitOutcome};
use perflink::types::SandboxConfig;
use perflink::{BenchmarkState, Config, Error, Measurement, Test, WaveScheduler};
use std::time::Duration;

/// Unit config from the environment (`PERFLINK_INTERPRETER`), with tracing
/// installed so unit logs show up in test output.
fn sandbox_config() -> SandboxConfig {
    perflink::observability::init_tracing();
    Config::from_env().sandbox
}

fn node_available() -> bool {
    let program = sandbox_config().program;
    let found = std::process::Command::new(&program)
        .arg("--version")
        .output()
        .map(|out| out.status.success())
        .unwrap_or(false);
    if !found {
        eprintln!("{program} not found on PATH, skipping");
    }
    found
}

fn scheduler(config: SandboxConfig) -> WaveScheduler<SubprocessSandbox> {
    WaveScheduler::new(SubprocessSandbox::new(config))
}

fn bench(before: &str, tests: Vec<Test>, runs: i64, duration: i64) -> BenchmarkState {
    let mut state = BenchmarkState::default();
    state.suite.before = before.to_string();
    state.suite.tests = tests;
    state.suite.runs = runs;
    state.suite.duration = duration;
    state
}

#[tokio::test]
async fn test_throwing_test_is_invalid_and_other_is_measured() {
    if !node_available() {
        return;
    }
    let scheduler = scheduler(sandbox_config());
    let mut state = bench(
        "",
        vec![Test::new("add", "1+1"), Test::new("throws", "throw 1")],
        2,
        50,
    );

    scheduler.run(&mut state).await.unwrap();

    assert!(matches!(state.suite.tests[0].ops, Measurement::Value(n) if n > 0));
    assert_eq!(state.suite.tests[1].ops, Measurement::Invalid);
    assert_eq!(state.progress, 2);
}

#[tokio::test]
async fn test_setup_bindings_are_visible_to_tests() {
    if !node_available() {
        return;
    }
    let scheduler = scheduler(sandbox_config());
    let mut state = bench(
        "const data = [...Array(100).keys()];",
        vec![
            Test::new("find", "data.find(x => x == 50)"),
            Test::new("missing", "undefinedThing.length"),
        ],
        1,
        20,
    );

    scheduler.run(&mut state).await.unwrap();

    assert!(matches!(state.suite.tests[0].ops, Measurement::Value(n) if n > 0));
    assert_eq!(state.suite.tests[1].ops, Measurement::Invalid);
}

#[tokio::test]
async fn test_setup_error_aborts_run() {
    if !node_available() {
        return;
    }
    let scheduler = scheduler(sandbox_config());
    let mut state = bench(
        "throw new Error('boom')",
        vec![Test::new("a", "1")],
        2,
        20,
    );

    let err = scheduler.run(&mut state).await.unwrap_err();

    assert!(matches!(err, Error::Setup(ref msg) if msg.contains("boom")));
    assert_eq!(state.suite.tests[0].ops, Measurement::Pending);
}

#[tokio::test]
async fn test_endless_check_times_out() {
    if !node_available() {
        return;
    }
    let config = SandboxConfig {
        check_timeout: Duration::from_millis(500),
        ..sandbox_config()
    };
    let scheduler = scheduler(config);
    let mut state = bench(
        "",
        vec![Test::new("spin", "while (true) {}"), Test::new("ok", "1")],
        1,
        20,
    );

    scheduler.run(&mut state).await.unwrap();

    assert_eq!(state.suite.tests[0].ops, Measurement::TimedOut);
    assert!(matches!(state.suite.tests[1].ops, Measurement::Value(n) if n > 0));
}

#[tokio::test]
async fn test_check_unit_echoes_test() {
    if !node_available() {
        return;
    }
    let sandbox = SubprocessSandbox::new(sandbox_config());
    let check = harness::generate("", Purpose::Check);
    let test = Test::new("echo", "'\u{2028}' + \"quoted\"");

    let outcome = sandbox
        .execute(&check, Request::Check(test.clone()))
        .await
        .unwrap();

    match outcome {
        UnitOutcome::Replied(Reply::Checked(echoed, elapsed)) => {
            assert_eq!(echoed.name, test.name);
            assert_eq!(echoed.code, test.code);
            assert!(elapsed >= 0.0);
        }
        other => panic!("unexpected outcome: {other:?}"),
    }
}

#[tokio::test]
async fn test_setup_larger_than_an_argument_runs() {
    if !node_available() {
        return;
    }
    let scheduler = scheduler(sandbox_config());
    let before = format!("const s = '{}';", "x".repeat(200_000));
    let mut state = bench(&before, vec![Test::new("len", "s.length")], 1, 20);

    scheduler.run(&mut state).await.unwrap();

    assert!(matches!(state.suite.tests[0].ops, Measurement::Value(n) if n > 0));
}

#[tokio::test]
async fn test_stuck_setup_with_large_request_times_out() {
    if !node_available() {
        return;
    }
    let config = SandboxConfig {
        check_timeout: Duration::from_secs(1),
        ..sandbox_config()
    };
    let scheduler = scheduler(config);
    let code = format!("'{}'", "y".repeat(200_000));
    let mut state = bench("while (true) {}", vec![Test::new("big", code)], 1, 20);

    let run = tokio::time::timeout(Duration::from_secs(15), scheduler.run(&mut state)).await;

    assert!(run.is_ok(), "run outlived the unit deadline");
    assert_eq!(state.suite.tests[0].ops, Measurement::TimedOut);
}

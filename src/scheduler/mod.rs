//! Wave scheduler - drives a full benchmark run.
//!
//! One run is: correct `runs`/`duration`, check every test once, then run
//! `runs` sequential waves over the tests that are still valid, then fold the
//! samples into per-test means. Within a phase all units execute concurrently
//! and are joined before the next phase starts.
//!
//! Per-test failures become sentinels and freeze the test for the rest of the
//! run. Setup failures and sandbox errors abort the whole run.

mod state;

pub use state::SchedulerState;

use futures::future::join_all;
use tokio::sync::{watch, Mutex};

use crate::aggregate::{ResultAggregator, WaveSample};
use crate::harness::{self, Purpose};
use crate::pool::{Reply, Request, Sandbox, SubprocessSandbox, UnitOutcome};
use crate::suite::{BenchmarkState, Measurement, Test};
use crate::types::{Config, Error, Result};

/// Runs benchmark waves against a [`Sandbox`]. One run at a time.
#[derive(Debug)]
pub struct WaveScheduler<S> {
    sandbox: S,
    state: Mutex<SchedulerState>,
    progress: watch::Sender<u32>,
}

impl WaveScheduler<SubprocessSandbox> {
    /// Scheduler backed by child-process units.
    pub fn from_config(config: &Config) -> Self {
        Self::new(SubprocessSandbox::new(config.sandbox.clone()))
    }
}

impl<S: Sandbox> WaveScheduler<S> {
    pub fn new(sandbox: S) -> Self {
        let (progress, _) = watch::channel(0);
        Self {
            sandbox,
            state: Mutex::new(SchedulerState::Idle),
            progress,
        }
    }

    pub fn sandbox(&self) -> &S {
        &self.sandbox
    }

    /// Current run state.
    pub async fn state(&self) -> SchedulerState {
        *self.state.lock().await
    }

    /// Waves started in the current (or last) run.
    pub fn subscribe_progress(&self) -> watch::Receiver<u32> {
        self.progress.subscribe()
    }

    /// Start signal: run the benchmark described by `bench` to completion.
    ///
    /// On success the aggregated measurements are written back onto
    /// `bench.suite.tests` and `bench.started` is cleared. On error the tests
    /// are left pending, `bench.started` is cleared and the error is returned.
    /// Fails with [`Error::StateTransition`] if a run is already in progress.
    pub async fn run(&self, bench: &mut BenchmarkState) -> Result<()> {
        self.begin().await?;

        let result = self.drive(bench).await;
        *self.state.lock().await = SchedulerState::Idle;

        match result {
            Ok(tests) => {
                bench.finish(tests);
                tracing::info!(suite = %bench.suite.id, waves = bench.progress, "Benchmark run complete");
                Ok(())
            }
            Err(e) => {
                bench.started = false;
                tracing::error!(suite = %bench.suite.id, error = %e, code = e.code(), "Benchmark run aborted");
                Err(e)
            }
        }
    }

    async fn begin(&self) -> Result<()> {
        let mut state = self.state.lock().await;
        if !state.can_transition_to(SchedulerState::Checking) {
            return Err(Error::state_transition(format!(
                "cannot start run: scheduler is {}, expected idle",
                *state
            )));
        }
        *state = SchedulerState::Checking;
        Ok(())
    }

    async fn transition(&self, to: SchedulerState) -> Result<()> {
        let mut state = self.state.lock().await;
        if !state.can_transition_to(to) {
            return Err(Error::state_transition(format!(
                "cannot move from {} to {}",
                *state, to
            )));
        }
        let from = *state;
        tracing::debug!(from = %from, to = %to, "Scheduler transition");
        *state = to;
        Ok(())
    }

    async fn drive(&self, bench: &mut BenchmarkState) -> Result<Vec<Test>> {
        if bench.correct_settings() {
            tracing::info!(
                runs = bench.suite.runs,
                duration_ms = bench.suite.duration,
                "Corrected non-positive runs/duration to defaults"
            );
        }
        bench.start_testing();
        self.progress.send_replace(0);

        let runs = u32::try_from(bench.suite.runs).unwrap_or(u32::MAX);
        let duration_ms = u64::try_from(bench.suite.duration).unwrap_or(u64::MAX);
        let before = bench.suite.before.clone();
        let tests = bench.suite.tests.clone();

        // Per-index status; a sentinel here freezes the test.
        let mut status: Vec<Measurement> = tests.iter().map(|t| t.ops).collect();

        tracing::info!(
            suite = %bench.suite.id,
            tests = tests.len(),
            runs,
            duration_ms,
            "Checking tests"
        );
        let check = harness::generate(&before, Purpose::Check);
        let targets = active_indices(&status);
        let outcomes = join_all(
            targets
                .iter()
                .map(|&i| self.sandbox.execute(&check, Request::Check(tests[i].clone()))),
        )
        .await;
        for (&i, outcome) in targets.iter().zip(outcomes) {
            if let Some(sentinel) = check_verdict(outcome?)? {
                tracing::warn!(index = i, test = %tests[i].name, status = %sentinel, "Test excluded from run");
                status[i] = sentinel;
            }
        }

        let mut aggregator = ResultAggregator::new(tests.len());
        for wave in 1..=runs {
            self.transition(SchedulerState::Running { wave, of: runs })
                .await?;
            self.progress.send_replace(bench.update_progress());

            // Fresh harness (and units) every wave.
            let run_harness = harness::generate(&before, Purpose::Run);
            let targets = active_indices(&status);
            tracing::debug!(wave, of = runs, active = targets.len(), "Starting wave");

            let outcomes = join_all(targets.iter().map(|&i| {
                self.sandbox.execute(
                    &run_harness,
                    Request::Run {
                        test: tests[i].clone(),
                        duration_ms,
                    },
                )
            }))
            .await;

            for (&i, outcome) in targets.iter().zip(outcomes) {
                let measurement = run_verdict(outcome?)?;
                if measurement.is_sentinel() {
                    tracing::warn!(index = i, wave, test = %tests[i].name, status = %measurement, "Test frozen");
                    status[i] = measurement;
                }
                aggregator.consume(WaveSample::new(i, measurement));
            }
        }

        self.transition(SchedulerState::Aggregating).await?;
        let checked: Vec<Test> = tests
            .into_iter()
            .zip(&status)
            .map(|(mut test, &s)| {
                if s.is_sentinel() {
                    test.ops = s;
                }
                test
            })
            .collect();
        Ok(aggregator.finish(&checked))
    }
}

/// Indices of tests not frozen by a sentinel.
fn active_indices(status: &[Measurement]) -> Vec<usize> {
    status
        .iter()
        .enumerate()
        .filter(|(_, s)| !s.is_sentinel())
        .map(|(i, _)| i)
        .collect()
}

/// `Some(sentinel)` if the test must sit out the run.
fn check_verdict(outcome: UnitOutcome) -> Result<Option<Measurement>> {
    match outcome {
        UnitOutcome::Replied(Reply::SetupFailed { setup_error }) => Err(Error::setup(setup_error)),
        UnitOutcome::Replied(Reply::Checked(_, flag)) if flag < 0.0 => Ok(Some(Measurement::Invalid)),
        UnitOutcome::Replied(Reply::Checked(_, _)) => Ok(None),
        UnitOutcome::Replied(Reply::Ran(_)) => {
            tracing::warn!("Run reply to a check request");
            Ok(Some(Measurement::Invalid))
        }
        UnitOutcome::TimedOut => Ok(Some(Measurement::TimedOut)),
        UnitOutcome::Crashed(detail) => {
            tracing::debug!(%detail, "Check unit crashed");
            Ok(Some(Measurement::Invalid))
        }
    }
}

fn run_verdict(outcome: UnitOutcome) -> Result<Measurement> {
    match outcome {
        UnitOutcome::Replied(Reply::SetupFailed { setup_error }) => Err(Error::setup(setup_error)),
        UnitOutcome::Replied(Reply::Ran(count)) => Ok(Measurement::from_count(count)),
        UnitOutcome::Replied(Reply::Checked(_, _)) => {
            tracing::warn!("Check reply to a run request");
            Ok(Measurement::Invalid)
        }
        UnitOutcome::TimedOut => Ok(Measurement::TimedOut),
        UnitOutcome::Crashed(detail) => {
            tracing::debug!(%detail, "Run unit crashed");
            Ok(Measurement::Invalid)
        }
    }
}

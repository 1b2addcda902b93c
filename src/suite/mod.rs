//! Benchmark data model: tests, suites and the session state around them.
//!
//! A [`Suite`] is the durable unit (stored and shared as a token). A
//! [`BenchmarkState`] wraps a suite with session-only fields that are never
//! persisted.

mod measurement;

pub use measurement::Measurement;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::SuiteId;

/// Waves per run when the suite carries a non-positive value.
pub const DEFAULT_RUNS: i64 = 5;

/// Per-wave duration in milliseconds when the suite carries a non-positive value.
pub const DEFAULT_DURATION_MS: i64 = 100;

/// One snippet under test. Identity is its position in [`Suite::tests`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Test {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub code: String,
    #[serde(default)]
    pub ops: Measurement,
}

impl Test {
    pub fn new(name: impl Into<String>, code: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            code: code.into(),
            ops: Measurement::Pending,
        }
    }

    pub fn with_ops(mut self, ops: Measurement) -> Self {
        self.ops = ops;
        self
    }
}

/// The durable benchmark configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Suite {
    pub id: SuiteId,
    pub title: String,
    /// Setup code run once per harness, visible to every test.
    pub before: String,
    pub runs: i64,
    /// Milliseconds each test is looped for in a wave.
    pub duration: i64,
    pub tests: Vec<Test>,
    pub updated: DateTime<Utc>,
}

impl Suite {
    /// Whether the suite holds enough to be worth saving.
    pub fn is_valid(&self) -> bool {
        !self.tests.is_empty()
    }
}

impl Default for Suite {
    fn default() -> Self {
        Self {
            id: SuiteId::new(),
            title: "Finding numbers in an array of 1000".to_string(),
            before: "const data = [...Array(1000).keys()]".to_string(),
            runs: DEFAULT_RUNS,
            duration: DEFAULT_DURATION_MS,
            tests: vec![
                Test::new("Find item 100", "data.find(x => x == 100)")
                    .with_ops(Measurement::Value(3_479_502)),
                Test::new("Find item 200", "data.find(x => x == 200)")
                    .with_ops(Measurement::Value(2_679_182)),
                Test::new("Find item 400", "data.find(x => x == 400)")
                    .with_ops(Measurement::Value(1_795_812)),
                Test::new("Find item 800", "data.find(x => x == 800)")
                    .with_ops(Measurement::Value(1_019_190)),
            ],
            updated: Utc::now(),
        }
    }
}

/// Side pane shown next to the editor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Aside {
    #[default]
    Results,
    Archive,
}

impl Aside {
    pub fn toggled(self) -> Self {
        match self {
            Aside::Results => Aside::Archive,
            Aside::Archive => Aside::Results,
        }
    }
}

/// A suite plus session-only fields.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct BenchmarkState {
    pub suite: Suite,
    /// Waves started in the current (or last) run.
    pub progress: u32,
    pub aside: Aside,
    pub started: bool,
}

impl BenchmarkState {
    pub fn new(suite: Suite) -> Self {
        Self {
            suite,
            progress: 0,
            aside: Aside::default(),
            started: false,
        }
    }

    /// Mark a run as started: progress resets and every measured or failed
    /// test goes back to pending. `NotApplicable` tests keep their status.
    pub fn start_testing(&mut self) {
        self.started = true;
        self.progress = 0;
        for test in &mut self.suite.tests {
            if test.ops != Measurement::NotApplicable {
                test.ops = Measurement::Pending;
            }
        }
    }

    /// Counts one more started wave.
    pub fn update_progress(&mut self) -> u32 {
        self.progress += 1;
        self.progress
    }

    /// Edits take any value; [`correct_settings`](Self::correct_settings)
    /// fixes non-positive ones when a run starts.
    pub fn update_runs(&mut self, runs: i64) {
        self.suite.runs = runs;
    }

    pub fn update_duration(&mut self, duration: i64) {
        self.suite.duration = duration;
    }

    /// Replace non-positive `runs`/`duration` with the defaults, writing the
    /// corrected values back. Returns true if anything changed.
    pub fn correct_settings(&mut self) -> bool {
        let mut changed = false;
        if self.suite.runs <= 0 {
            self.update_runs(DEFAULT_RUNS);
            changed = true;
        }
        if self.suite.duration <= 0 {
            self.update_duration(DEFAULT_DURATION_MS);
            changed = true;
        }
        changed
    }

    /// Ends a run with its aggregated tests.
    pub fn finish(&mut self, tests: Vec<Test>) {
        self.suite.tests = tests;
        self.started = false;
    }

    pub fn toggle_aside(&mut self) {
        self.aside = self.aside.toggled();
    }
}

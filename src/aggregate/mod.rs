//! Result aggregation across waves.
//!
//! Samples are keyed by test index, never by completion order. Each test gets a
//! small mergeable accumulator (count, sum, first sentinel); the final mean is
//! only derived in [`ResultAggregator::finish`].

use crate::suite::{Measurement, Test};

/// One measurement of one test (by index) in one wave.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WaveSample {
    pub index: usize,
    pub measurement: Measurement,
}

impl WaveSample {
    pub fn new(index: usize, measurement: Measurement) -> Self {
        Self { index, measurement }
    }
}

/// Per-test running totals.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct Tally {
    count: u64,
    sum: u128,
    sentinel: Option<Measurement>,
}

impl Tally {
    fn consume(&mut self, measurement: Measurement) {
        match measurement {
            // Zero iterations carry no data.
            Measurement::Pending | Measurement::Value(0) => {}
            Measurement::Value(ops) => {
                self.count += 1;
                self.sum += u128::from(ops);
            }
            sentinel => {
                self.sentinel.get_or_insert(sentinel);
            }
        }
    }

    fn merge(&mut self, other: Tally) {
        self.count += other.count;
        self.sum += other.sum;
        if self.sentinel.is_none() {
            self.sentinel = other.sentinel;
        }
    }

    /// `None` when nothing was recorded for the test.
    fn result(&self) -> Option<Measurement> {
        if let Some(sentinel) = self.sentinel {
            return Some(sentinel);
        }
        if self.count == 0 {
            return None;
        }
        // Nearest integer, halves rounded up.
        let mean = (self.sum + u128::from(self.count / 2)) / u128::from(self.count);
        Some(Measurement::Value(u64::try_from(mean).unwrap_or(u64::MAX)))
    }
}

/// Folds wave samples into one measurement per test.
#[derive(Debug, Clone, Default)]
pub struct ResultAggregator {
    tallies: Vec<Tally>,
}

impl ResultAggregator {
    /// Aggregator for `test_count` tests.
    pub fn new(test_count: usize) -> Self {
        Self {
            tallies: vec![Tally::default(); test_count],
        }
    }

    /// Record one sample. Samples for unknown indices are ignored.
    pub fn consume(&mut self, sample: WaveSample) {
        match self.tallies.get_mut(sample.index) {
            Some(tally) => tally.consume(sample.measurement),
            None => {
                tracing::warn!(index = sample.index, "Dropping sample for unknown test index");
            }
        }
    }

    /// Record many samples.
    pub fn extend(&mut self, samples: impl IntoIterator<Item = WaveSample>) {
        samples.into_iter().for_each(|s| self.consume(s));
    }

    /// Combine with another aggregator over the same tests.
    pub fn merge(&mut self, other: ResultAggregator) {
        if other.tallies.len() > self.tallies.len() {
            self.tallies.resize(other.tallies.len(), Tally::default());
        }
        for (mine, theirs) in self.tallies.iter_mut().zip(other.tallies) {
            mine.merge(theirs);
        }
    }

    /// Number of value samples recorded for the test at `index`.
    pub fn sample_count(&self, index: usize) -> u64 {
        self.tallies.get(index).map_or(0, |t| t.count)
    }

    /// Final tests in input order. A test with no samples is passed through
    /// unchanged; a test with a sentinel sample carries that sentinel.
    pub fn finish(&self, tests: &[Test]) -> Vec<Test> {
        tests
            .iter()
            .enumerate()
            .map(|(index, test)| {
                let mut out = test.clone();
                if let Some(result) = self.tallies.get(index).and_then(Tally::result) {
                    out.ops = result;
                }
                out
            })
            .collect()
    }
}

/// One-shot aggregation of flattened samples from every wave.
pub fn aggregate(tests: &[Test], samples: impl IntoIterator<Item = WaveSample>) -> Vec<Test> {
    let mut aggregator = ResultAggregator::new(tests.len());
    aggregator.extend(samples);
    aggregator.finish(tests)
}

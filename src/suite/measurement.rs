//! Per-test measurement with explicit status variants.
//!
//! On the wire and in storage a measurement is a single integer where values
//! `<= 0` are reserved status codes:
//!
//! ```text
//!  n > 0  → Value(n)
//!  0      → Pending
//! -1      → Invalid        (code threw)
//! -2      → NotApplicable  (excluded from the graph)
//! -3      → TimedOut       (unit missed its deadline)
//! ```

use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// Status or operations count for one test.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Measurement {
    /// No wave has produced data yet.
    #[default]
    Pending,
    /// Iterations completed within the duration (or their mean). Always
    /// positive when produced by the engine; zero has no integer form of its own.
    Value(u64),
    /// The code threw during check or run.
    Invalid,
    /// Explicitly left out of the graph and of runs.
    NotApplicable,
    /// The execution unit did not answer before its deadline.
    TimedOut,
}

impl Measurement {
    pub const PENDING: i64 = 0;
    pub const INVALID: i64 = -1;
    pub const NOT_APPLICABLE: i64 = -2;
    pub const TIMED_OUT: i64 = -3;

    /// Decode the integer form. Unknown negative codes are treated as invalid.
    pub fn from_ops(ops: i64) -> Self {
        match ops {
            n if n > 0 => Measurement::Value(n as u64),
            Self::PENDING => Measurement::Pending,
            Self::NOT_APPLICABLE => Measurement::NotApplicable,
            Self::TIMED_OUT => Measurement::TimedOut,
            _ => Measurement::Invalid,
        }
    }

    /// Interpret a raw run reply: a positive count is a measurement, zero
    /// iterations carry no data and stay pending, `-1` marks the code as
    /// invalid.
    pub fn from_count(count: i64) -> Self {
        match count {
            n if n > 0 => Measurement::Value(n as u64),
            0 => Measurement::Pending,
            _ => Measurement::Invalid,
        }
    }

    /// Integer form.
    pub fn to_ops(self) -> i64 {
        match self {
            Measurement::Value(n) => i64::try_from(n).unwrap_or(i64::MAX),
            Measurement::Pending => Self::PENDING,
            Measurement::Invalid => Self::INVALID,
            Measurement::NotApplicable => Self::NOT_APPLICABLE,
            Measurement::TimedOut => Self::TIMED_OUT,
        }
    }

    /// Operations count, if this is a real measurement.
    pub fn ops(self) -> Option<u64> {
        match self {
            Measurement::Value(n) => Some(n),
            _ => None,
        }
    }

    /// Sentinels freeze a test for the rest of a run.
    pub fn is_sentinel(self) -> bool {
        matches!(
            self,
            Measurement::Invalid | Measurement::NotApplicable | Measurement::TimedOut
        )
    }

    /// Whether the test failed to execute (threw or timed out).
    pub fn is_failure(self) -> bool {
        matches!(self, Measurement::Invalid | Measurement::TimedOut)
    }

    /// Whether the test takes part in the results graph at all.
    pub fn is_graphed(self) -> bool {
        self != Measurement::NotApplicable
    }
}

impl From<i64> for Measurement {
    fn from(ops: i64) -> Self {
        Self::from_ops(ops)
    }
}

impl From<Measurement> for i64 {
    fn from(m: Measurement) -> Self {
        m.to_ops()
    }
}

impl fmt::Display for Measurement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Measurement::Value(n) => write!(f, "{n} ops"),
            Measurement::Pending => write!(f, "pending"),
            Measurement::Invalid => write!(f, "invalid"),
            Measurement::NotApplicable => write!(f, "n/a"),
            Measurement::TimedOut => write!(f, "timed out"),
        }
    }
}

impl Serialize for Measurement {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_i64(self.to_ops())
    }
}

struct MeasurementVisitor;

impl<'de> Visitor<'de> for MeasurementVisitor {
    type Value = Measurement;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("an integer or float operations count")
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<Measurement, E> {
        Ok(Measurement::from_ops(v))
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<Measurement, E> {
        Ok(if v == 0 {
            Measurement::Pending
        } else {
            Measurement::Value(v)
        })
    }

    // Older links stored unrounded means.
    fn visit_f64<E: de::Error>(self, v: f64) -> Result<Measurement, E> {
        if !v.is_finite() {
            return Ok(Measurement::Invalid);
        }
        Ok(Measurement::from_ops(v.round() as i64))
    }
}

impl<'de> Deserialize<'de> for Measurement {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(MeasurementVisitor)
    }
}

//! Results graph model.
//!
//! Turns aggregated tests into bar data for whatever draws the graph. Tests
//! marked not-applicable are dropped; failed tests keep a full-height bar with
//! a `0%` label; pending tests show an in-progress label.

use serde::Serialize;

use crate::suite::{Measurement, Test};

/// Text under a bar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BarLabel {
    Percent(u32),
    InProgress,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Bar {
    /// 1-based position among the drawn bars.
    pub position: usize,
    /// Bar height, 0-100.
    pub height: f64,
    /// Position on the colour scale, 0.0 (worst) to 1.0 (best).
    pub shade: f64,
    pub label: BarLabel,
    pub failed: bool,
}

/// Bars for `tests`, in order.
pub fn bars(tests: &[Test]) -> Vec<Bar> {
    let max = tests
        .iter()
        .filter_map(|t| t.ops.ops())
        .max()
        .unwrap_or(0);

    tests
        .iter()
        .filter(|t| t.ops.is_graphed())
        .enumerate()
        .map(|(i, test)| bar(i + 1, test.ops, max))
        .collect()
}

fn bar(position: usize, ops: Measurement, max: u64) -> Bar {
    match ops {
        Measurement::Invalid | Measurement::TimedOut => Bar {
            position,
            height: 100.0,
            shade: 0.0,
            label: BarLabel::Percent(0),
            failed: true,
        },
        Measurement::Pending | Measurement::Value(0) => Bar {
            position,
            height: 0.0,
            shade: 0.0,
            label: BarLabel::InProgress,
            failed: false,
        },
        Measurement::Value(n) => {
            let percent = if max == 0 {
                0.0
            } else {
                n as f64 / max as f64 * 100.0
            };
            Bar {
                position,
                height: percent,
                shade: percent / 100.0,
                label: BarLabel::Percent(percent.floor() as u32),
                failed: false,
            }
        }
        // Filtered out by `bars`.
        Measurement::NotApplicable => Bar {
            position,
            height: 0.0,
            shade: 0.0,
            label: BarLabel::Percent(0),
            failed: false,
        },
    }
}

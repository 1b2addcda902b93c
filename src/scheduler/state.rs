//! Scheduler run states.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Where the scheduler is in a run.
///
/// State transitions:
/// ```text
/// IDLE → CHECKING → RUNNING(1/r) → … → RUNNING(r/r) → AGGREGATING → IDLE
///            ↓            ↓                                ↓
///          IDLE         IDLE  (aborted run)              IDLE
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case", tag = "state")]
pub enum SchedulerState {
    #[default]
    Idle,
    Checking,
    Running {
        wave: u32,
        of: u32,
    },
    Aggregating,
}

impl SchedulerState {
    /// Whether a run is in progress.
    pub fn is_busy(self) -> bool {
        self != SchedulerState::Idle
    }

    /// Check if transition is valid.
    pub fn can_transition_to(self, to: SchedulerState) -> bool {
        match (self, to) {
            // IDLE
            (SchedulerState::Idle, SchedulerState::Checking) => true,
            // CHECKING
            (SchedulerState::Checking, SchedulerState::Running { wave, of }) => wave == 1 && of >= 1,
            // RUNNING
            (
                SchedulerState::Running { wave, of },
                SchedulerState::Running {
                    wave: next,
                    of: next_of,
                },
            ) => of == next_of && next == wave + 1 && next <= of,
            (SchedulerState::Running { wave, of }, SchedulerState::Aggregating) => wave == of,
            // Completion, or abort from any busy state
            (from, SchedulerState::Idle) => from.is_busy(),
            // All other transitions invalid
            _ => false,
        }
    }
}

impl fmt::Display for SchedulerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SchedulerState::Idle => f.write_str("idle"),
            SchedulerState::Checking => f.write_str("checking"),
            SchedulerState::Running { wave, of } => write!(f, "running wave {wave}/{of}"),
            SchedulerState::Aggregating => f.write_str("aggregating"),
        }
    }
}

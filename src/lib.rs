//! # Perflink - snippet benchmark engine
//!
//! Runs small JavaScript snippets in isolated execution units to measure
//! operations per second, and packs the whole benchmark into a shareable token:
//! - Harness generation for check and run units
//! - One child process per test per phase, with per-unit deadlines
//! - Sequential timed waves with concurrent units inside each wave
//! - Per-test aggregation across waves, in input order
//! - Compressed, URL-safe suite tokens and durable suite storage
//!
//! ## Architecture
//!
//! ```text
//!                 ┌──────────────────────────────────────────┐
//!  start signal → │              WaveScheduler               │
//!                 │  ┌─────────┐  ┌─────────┐  ┌──────────┐  │
//!                 │  │ Harness │  │ Sandbox │  │  Result  │  │
//!                 │  │Generator│→ │  (pool) │→ │Aggregator│  │
//!                 │  └─────────┘  └─────────┘  └──────────┘  │
//!                 └──────────────────────────────────────────┘
//!                                    │ Suite
//!                                    ▼
//!                        codec (token) / storage (text)
//! ```

// Enforce strict safety at compile time
#![deny(unsafe_code)]
#![warn(missing_debug_implementations)]
#![warn(rust_2018_idioms)]

pub mod aggregate;
pub mod codec;
pub mod graph;
pub mod harness;
pub mod pool;
pub mod scheduler;
pub mod storage;
pub mod suite;
pub mod types;

// Internal utilities
pub mod observability;

pub use scheduler::{SchedulerState, WaveScheduler};
pub use suite::{BenchmarkState, Measurement, Suite, Test};
pub use types::{Config, Error, Result, SuiteId};

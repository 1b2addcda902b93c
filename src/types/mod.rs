//! Core types for the benchmark engine.
//!
//! This module provides foundational types used throughout the system:
//! - **IDs**: Strongly-typed identifiers (SuiteId)
//! - **Errors**: Application error types with thiserror derives
//! - **Config**: Configuration structures for observability and execution units

mod config;
mod errors;
mod ids;

pub use config::{Config, ObservabilityConfig, SandboxConfig, INTERPRETER_ENV};
pub use errors::{Error, Result};
pub use ids::SuiteId;

//! Repeater - retry orchestration for fallible async operations
//!
//! The [`retry`] module holds the engine: delay strategies, the
//! [`retry::Repeater`] orchestrator, terminal-error matching, cancellation
//! contexts and the per-run record. [`config`] builds repeaters from YAML
//! policy files, and [`logging`] installs a `tracing` subscriber.

pub mod config;
pub mod error;
pub mod logging;
pub mod retry;

pub use error::{Error, Result};

//! Retry execution engine
//!
//! This module provides a policy-based retry loop for fallible async
//! operations.
//!
//! # Features
//!
//! - Delay strategies: fixed delay, constant/linear/exponential backoff with
//!   cap and jitter, and custom strategies via the `Strategy` trait
//! - Terminal errors matched anywhere in an error's source chain, plus the
//!   `Terminal::Any` sentinel for stop-on-first-failure
//! - Cancellation and deadlines through `Context`, checked before every
//!   attempt and raced against every delay
//! - Per-run statistics via `Repeater::stats`
//! - Observable runs via the `RetryObserver` trait, logged with `tracing` by default
//!
//! # Example
//!
//! ```rust,no_run
//! use repeater::retry::{Context, Repeater, RetryError, Terminal};
//! use std::io;
//! use std::time::Duration;
//!
//! async fn example() -> Result<String, RetryError<io::Error>> {
//!     let mut repeater = Repeater::fixed(3, Duration::from_millis(100));
//!
//!     repeater
//!         .execute(&Context::background(), || async {
//!             // Your fallible operation here
//!             Ok("success".to_string())
//!         }, &[Terminal::kind::<std::num::ParseIntError>()])
//!         .await
//! }
//! ```

mod context;
mod error;
mod executor;
mod observer;
mod stats;
mod strategies;
mod terminal;

pub use context::{Context, ContextError};
pub use error::RetryError;
pub use executor::{Repeater, DEFAULT_DELAY};
pub use observer::{NoOpObserver, RetryObserver, StatsObserver, TracingObserver};
pub use stats::{RunOutcome, RunStats};
pub use strategies::{
    Backoff, BackoffType, FixedDelay, FnStrategy, Strategy, DEFAULT_JITTER, DEFAULT_MAX_DELAY,
    DEFAULT_MULTIPLIER,
};
pub use terminal::{matches_any, Terminal};

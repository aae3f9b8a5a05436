//! Retry execution engine
//!
//! [`Repeater`] owns an attempt budget, a delay strategy and the run record of
//! its most recent invocation. Attempts run strictly one after another on the
//! caller's task; nothing is spawned.

use std::error::Error;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;

use super::context::{Context, ContextError};
use super::error::RetryError;
use super::observer::{RetryObserver, TracingObserver};
use super::stats::{RunOutcome, RunRecorder, RunStats};
use super::strategies::{Backoff, FixedDelay, Strategy};
use super::terminal::{matches_any, Terminal};

/// Delay used when no strategy is supplied
pub const DEFAULT_DELAY: Duration = Duration::from_secs(1);

/// Retries a fallible async operation under an attempt budget
///
/// A repeater keeps the statistics of its last run, so [`Repeater::execute`]
/// takes `&mut self`: concurrent retries need one repeater each. The
/// strategy is behind an `Arc` and can be shared freely.
///
/// # Example
///
/// ```rust,no_run
/// use repeater::retry::{Context, Repeater, Terminal};
/// use std::time::Duration;
///
/// async fn example() {
///     let mut repeater = Repeater::backoff(5, Duration::from_millis(100));
///
///     let result = repeater
///         .execute(&Context::background(), || async {
///             Ok::<_, std::io::Error>("done")
///         }, &[])
///         .await;
///
///     assert_eq!(result.unwrap(), "done");
///     assert_eq!(repeater.stats().attempts, 1);
/// }
/// ```
pub struct Repeater {
    attempts: u32,
    strategy: Arc<dyn Strategy>,
    observer: Arc<dyn RetryObserver>,
    stats: RunStats,
}

impl Repeater {
    /// A budget of `attempts` calls (0 is raised to 1) using `strategy`
    pub fn new<S: Strategy + 'static>(attempts: u32, strategy: S) -> Self {
        Self::with_shared_strategy(attempts, Arc::new(strategy))
    }

    /// Like [`Repeater::new`], sharing an existing strategy
    pub fn with_shared_strategy(attempts: u32, strategy: Arc<dyn Strategy>) -> Self {
        Self {
            attempts: attempts.max(1),
            strategy,
            observer: Arc::new(TracingObserver::default()),
            stats: RunStats::default(),
        }
    }

    /// Falls back to a fixed one-second delay when `strategy` is `None`
    pub fn with_optional_strategy(attempts: u32, strategy: Option<Arc<dyn Strategy>>) -> Self {
        let strategy =
            strategy.unwrap_or_else(|| Arc::new(FixedDelay::new(DEFAULT_DELAY)) as Arc<dyn Strategy>);
        Self::with_shared_strategy(attempts, strategy)
    }

    /// Fixed `delay` between attempts
    pub fn fixed(attempts: u32, delay: Duration) -> Self {
        Self::new(attempts, FixedDelay::new(delay))
    }

    /// Exponential backoff from `initial`, capped at 30s, with 10% jitter
    pub fn backoff(attempts: u32, initial: Duration) -> Self {
        Self::new(attempts, Backoff::new(initial))
    }

    /// Backoff configured by the caller
    pub fn backoff_with(attempts: u32, backoff: Backoff) -> Self {
        Self::new(attempts, backoff)
    }

    /// Replace the default [`TracingObserver`]
    pub fn with_observer<O: RetryObserver + 'static>(mut self, observer: O) -> Self {
        self.observer = Arc::new(observer);
        self
    }

    /// Maximum number of operation calls per run
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn strategy(&self) -> &Arc<dyn Strategy> {
        &self.strategy
    }

    /// Snapshot of the most recent run; `RunStats::default()` before the first
    pub fn stats(&self) -> RunStats {
        self.stats.clone()
    }

    /// Run `op` until it succeeds, fails terminally, runs out of attempts or
    /// `ctx` is cancelled
    ///
    /// `ctx` is checked before every call and raced against every delay; a
    /// cancelled context always yields [`RetryError::Cancelled`]. An error
    /// matching any entry of `terminal` (anywhere in its source chain) ends
    /// the run at once.
    pub async fn execute<F, Fut, T, E>(
        &mut self,
        ctx: &Context,
        mut op: F,
        terminal: &[Terminal],
    ) -> Result<T, RetryError<E>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Error + 'static,
    {
        let max_attempts = self.attempts;
        let strategy = &self.strategy;
        let observer = self.observer.as_ref();
        let mut run = RunRecorder::start(&mut self.stats);
        let mut last_error: Option<E> = None;

        loop {
            if let Some(reason) = ctx.err() {
                return Err(cancelled(run, observer, reason, last_error));
            }

            let attempt = run.begin_attempt();
            observer.on_attempt_start(attempt, max_attempts);

            let work_started = Instant::now();
            let result = op().await;
            run.record_work(work_started.elapsed());

            let err = match result {
                Ok(value) => {
                    observer.on_success(attempt, run.elapsed());
                    run.finish(RunOutcome::Succeeded);
                    return Ok(value);
                }
                Err(err) => err,
            };
            run.record_error(&err);

            if matches_any(&err, terminal) {
                observer.on_terminal(attempt, &err);
                run.finish(RunOutcome::Terminal);
                return Err(RetryError::terminal(attempt, err));
            }

            if attempt >= max_attempts {
                observer.on_exhausted(attempt, &err);
                let total_duration = run.elapsed();
                run.finish(RunOutcome::Exhausted);
                return Err(RetryError::exhausted(attempt, err, total_duration));
            }

            let delay = strategy.next_delay(attempt);
            observer.on_attempt_failed(attempt, &err, delay);
            last_error = Some(err);

            if delay.is_zero() {
                continue;
            }

            // Dropping the losing `Sleep` deregisters its timer.
            let wait_started = Instant::now();
            tokio::select! {
                biased;
                reason = ctx.done() => {
                    run.record_delay(wait_started.elapsed());
                    return Err(cancelled(run, observer, reason, last_error));
                }
                _ = tokio::time::sleep(delay) => run.record_delay(delay),
            }
        }
    }
}

fn cancelled<E>(
    mut run: RunRecorder<'_>,
    observer: &dyn RetryObserver,
    reason: ContextError,
    last_error: Option<E>,
) -> RetryError<E> {
    let attempts = run.attempts();
    run.record_error(&reason);
    observer.on_cancelled(attempts, reason);
    run.finish(RunOutcome::Cancelled);
    RetryError::cancelled(attempts, reason, last_error)
}

impl fmt::Debug for Repeater {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Repeater")
            .field("attempts", &self.attempts)
            .field("stats", &self.stats)
            .finish_non_exhaustive()
    }
}

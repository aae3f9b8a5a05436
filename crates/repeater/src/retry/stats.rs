//! Run record for the most recent retry run

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt::Display;
use std::time::Duration;
use tokio::time::Instant;

/// How the most recent run ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum RunOutcome {
    /// No run has completed yet
    #[default]
    NotRun,

    /// An attempt succeeded
    Succeeded,

    /// An attempt failed with a terminal error
    Terminal,

    /// The attempt budget was spent
    Exhausted,

    /// The context was cancelled or expired
    Cancelled,

    /// The run's future was dropped before it finished
    Abandoned,
}

/// Statistics of one retry run
///
/// `RunStats::default()` is the record of a repeater that has not run yet.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct RunStats {
    /// Operation calls made
    pub attempts: u32,
    pub success: bool,
    pub outcome: RunOutcome,
    /// Message of the error that ended the run, `None` on success
    pub last_error: Option<String>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    /// Wall time from start to finish
    pub total_duration: Duration,
    /// Time spent inside the operation
    pub work_duration: Duration,
    /// Time spent waiting between attempts
    pub delay_duration: Duration,
}

/// Exclusive writer for a [`RunStats`] during one run
///
/// Starting a recorder resets the record; it is finalized exactly once, by
/// [`RunRecorder::finish`] or, if the run is dropped early, on drop.
pub(crate) struct RunRecorder<'a> {
    stats: &'a mut RunStats,
    started: Instant,
    finished: bool,
}

impl<'a> RunRecorder<'a> {
    pub(crate) fn start(stats: &'a mut RunStats) -> Self {
        *stats = RunStats {
            started_at: Some(Utc::now()),
            ..RunStats::default()
        };
        Self {
            stats,
            started: Instant::now(),
            finished: false,
        }
    }

    /// Count an operation call about to be made
    pub(crate) fn begin_attempt(&mut self) -> u32 {
        self.stats.attempts += 1;
        self.stats.attempts
    }

    pub(crate) fn record_work(&mut self, elapsed: Duration) {
        self.stats.work_duration += elapsed;
    }

    pub(crate) fn record_delay(&mut self, elapsed: Duration) {
        self.stats.delay_duration += elapsed;
    }

    pub(crate) fn record_error(&mut self, err: &dyn Display) {
        self.stats.last_error = Some(err.to_string());
    }

    pub(crate) fn attempts(&self) -> u32 {
        self.stats.attempts
    }

    pub(crate) fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    pub(crate) fn finish(mut self, outcome: RunOutcome) {
        self.finalize(outcome);
    }

    fn finalize(&mut self, outcome: RunOutcome) {
        if self.finished {
            return;
        }
        self.finished = true;
        self.stats.outcome = outcome;
        self.stats.success = outcome == RunOutcome::Succeeded;
        if self.stats.success {
            self.stats.last_error = None;
        }
        self.stats.finished_at = Some(Utc::now());
        self.stats.total_duration = self.started.elapsed();
    }
}

impl Drop for RunRecorder<'_> {
    fn drop(&mut self) {
        self.finalize(RunOutcome::Abandoned);
    }
}

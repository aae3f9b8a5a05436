//! Error types for the retry executor
//!
//! `RetryError` records why a run stopped without changing the error that
//! caused it: it displays exactly as the triggering error, and `source()`
//! yields that error (or the context error), so chain walks reach it.

use std::error::Error;
use std::fmt;
use std::time::Duration;

use super::context::ContextError;

/// Reasons a retry run ended without success
///
/// Generic over `E`, the error type of the operation being retried.
#[derive(Debug)]
pub enum RetryError<E> {
    /// The operation returned an error from the terminal set
    Terminal {
        /// Attempts made, including the one that failed terminally
        attempts: u32,
        /// The terminal error, unchanged
        source: E,
    },

    /// Every attempt in the budget failed
    Exhausted {
        /// Number of attempts made before giving up
        attempts: u32,
        /// The error from the final attempt
        source: E,
        /// Wall time of the whole run
        total_duration: Duration,
    },

    /// The context was cancelled or its deadline passed
    Cancelled {
        /// Operation calls completed before cancellation was observed
        attempts: u32,
        /// What stopped the run
        reason: ContextError,
        /// The last operation error, if any attempt had failed
        last_error: Option<E>,
    },
}

impl<E: fmt::Display> fmt::Display for RetryError<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RetryError::Terminal { source, .. } | RetryError::Exhausted { source, .. } => {
                fmt::Display::fmt(source, f)
            }
            RetryError::Cancelled { reason, .. } => fmt::Display::fmt(reason, f),
        }
    }
}

impl<E: Error + 'static> Error for RetryError<E> {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            RetryError::Terminal { source, .. } | RetryError::Exhausted { source, .. } => {
                Some(source as &(dyn Error + 'static))
            }
            RetryError::Cancelled { reason, .. } => Some(reason as &(dyn Error + 'static)),
        }
    }
}

impl<E> RetryError<E> {
    pub fn terminal(attempts: u32, source: E) -> Self {
        RetryError::Terminal { attempts, source }
    }

    pub fn exhausted(attempts: u32, source: E, total_duration: Duration) -> Self {
        RetryError::Exhausted {
            attempts,
            source,
            total_duration,
        }
    }

    pub fn cancelled(attempts: u32, reason: ContextError, last_error: Option<E>) -> Self {
        RetryError::Cancelled {
            attempts,
            reason,
            last_error,
        }
    }

    /// Get the number of attempts made
    pub fn attempts(&self) -> u32 {
        match self {
            RetryError::Terminal { attempts, .. }
            | RetryError::Exhausted { attempts, .. }
            | RetryError::Cancelled { attempts, .. } => *attempts,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, RetryError::Terminal { .. })
    }

    pub fn is_exhausted(&self) -> bool {
        matches!(self, RetryError::Exhausted { .. })
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, RetryError::Cancelled { .. })
    }

    /// The context error, when the run was cancelled
    pub fn cancel_reason(&self) -> Option<ContextError> {
        match self {
            RetryError::Cancelled { reason, .. } => Some(*reason),
            _ => None,
        }
    }

    /// The operation error that ended the run
    ///
    /// For a cancelled run this is the last failure seen before
    /// cancellation, if any.
    pub fn source_ref(&self) -> Option<&E> {
        match self {
            RetryError::Terminal { source, .. } | RetryError::Exhausted { source, .. } => {
                Some(source)
            }
            RetryError::Cancelled { last_error, .. } => last_error.as_ref(),
        }
    }

    /// Get the underlying error, consuming this error
    pub fn into_source(self) -> Option<E> {
        match self {
            RetryError::Terminal { source, .. } | RetryError::Exhausted { source, .. } => {
                Some(source)
            }
            RetryError::Cancelled { last_error, .. } => last_error,
        }
    }

    /// Map the error type using a closure
    pub fn map_err<F, E2>(self, f: F) -> RetryError<E2>
    where
        F: FnOnce(E) -> E2,
    {
        match self {
            RetryError::Terminal { attempts, source } => RetryError::Terminal {
                attempts,
                source: f(source),
            },
            RetryError::Exhausted {
                attempts,
                source,
                total_duration,
            } => RetryError::Exhausted {
                attempts,
                source: f(source),
                total_duration,
            },
            RetryError::Cancelled {
                attempts,
                reason,
                last_error,
            } => RetryError::Cancelled {
                attempts,
                reason,
                last_error: last_error.map(f),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    #[derive(Debug, thiserror::Error)]
    #[error("upload failed")]
    struct UploadFailed(#[source] io::Error);

    #[test]
    fn test_terminal_error() {
        let err: RetryError<io::Error> =
            RetryError::terminal(1, io::Error::new(io::ErrorKind::NotFound, "not found"));

        assert!(err.is_terminal());
        assert!(!err.is_exhausted());
        assert!(!err.is_cancelled());
        assert_eq!(err.attempts(), 1);
        assert_eq!(err.cancel_reason(), None);
    }

    #[test]
    fn test_exhausted_error() {
        let err: RetryError<io::Error> = RetryError::exhausted(
            3,
            io::Error::new(io::ErrorKind::TimedOut, "timeout"),
            Duration::from_secs(5),
        );

        assert!(err.is_exhausted());
        assert_eq!(err.attempts(), 3);
        assert_eq!(err.source_ref().map(io::Error::kind), Some(io::ErrorKind::TimedOut));
    }

    #[test]
    fn test_cancelled_error() {
        let err: RetryError<io::Error> =
            RetryError::cancelled(2, ContextError::DeadlineExceeded, None);

        assert!(err.is_cancelled());
        assert_eq!(err.attempts(), 2);
        assert_eq!(err.cancel_reason(), Some(ContextError::DeadlineExceeded));
        assert!(err.source_ref().is_none());
    }

    #[test]
    fn test_display_is_the_triggering_error() {
        let exhausted: RetryError<io::Error> = RetryError::exhausted(
            3,
            io::Error::other("connection timeout"),
            Duration::from_secs(5),
        );
        assert_eq!(exhausted.to_string(), "connection timeout");

        let terminal: RetryError<io::Error> =
            RetryError::terminal(1, io::Error::other("permission denied"));
        assert_eq!(terminal.to_string(), "permission denied");

        let cancelled: RetryError<io::Error> = RetryError::cancelled(
            2,
            ContextError::Cancelled,
            Some(io::Error::other("ignored")),
        );
        assert_eq!(cancelled.to_string(), "context canceled");
    }

    #[test]
    fn test_source_chain_reaches_operation_error() {
        let err: RetryError<UploadFailed> =
            RetryError::terminal(1, UploadFailed(io::Error::other("disk full")));

        let source = err.source().expect("operation error");
        assert!(source.is::<UploadFailed>());
        let inner = source.source().expect("inner source");
        assert_eq!(inner.to_string(), "disk full");

        let cancelled: RetryError<UploadFailed> =
            RetryError::cancelled(1, ContextError::Cancelled, None);
        let reason = cancelled.source().expect("context error");
        assert_eq!(
            reason.downcast_ref::<ContextError>(),
            Some(&ContextError::Cancelled)
        );
    }

    #[test]
    fn test_returned_error_matches_terminal_set() {
        use crate::retry::{matches_any, Terminal};

        let exhausted: RetryError<ContextError> =
            RetryError::exhausted(3, ContextError::DeadlineExceeded, Duration::from_secs(1));
        assert!(matches_any(
            &exhausted,
            &[Terminal::value(ContextError::DeadlineExceeded)]
        ));

        let cancelled: RetryError<io::Error> =
            RetryError::cancelled(2, ContextError::Cancelled, None);
        assert!(matches_any(&cancelled, &[Terminal::kind::<ContextError>()]));
        assert!(!matches_any(&cancelled, &[Terminal::kind::<io::Error>()]));
    }

    #[test]
    fn test_into_source() {
        let err: RetryError<String> =
            RetryError::exhausted(3, "first failure".to_string(), Duration::from_secs(1));
        assert_eq!(err.into_source(), Some("first failure".to_string()));

        let err: RetryError<String> =
            RetryError::cancelled(2, ContextError::Cancelled, Some("last".to_string()));
        assert_eq!(err.into_source(), Some("last".to_string()));

        let err: RetryError<String> = RetryError::cancelled(0, ContextError::Cancelled, None);
        assert_eq!(err.into_source(), None);
    }

    #[test]
    fn test_map_err() {
        let err: RetryError<i32> = RetryError::terminal(1, 42);

        let mapped = err.map_err(|n| format!("error code: {}", n));
        assert!(matches!(
            mapped,
            RetryError::Terminal { attempts: 1, ref source } if source == "error code: 42"
        ));
    }
}

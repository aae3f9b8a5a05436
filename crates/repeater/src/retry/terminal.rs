//! Terminal error matching
//!
//! A terminal error stops the retry loop on the attempt that produced it.
//! Matching walks the `source()` chain, so an error that wraps a terminal
//! error is terminal too.

use std::error::Error;
use std::fmt;

type ChainPredicate = Box<dyn Fn(&(dyn Error + 'static)) -> bool + Send + Sync>;

/// One entry in the set of errors that end a retry run immediately
///
/// # Example
///
/// ```rust
/// use repeater::retry::Terminal;
/// use std::io;
///
/// let terminal = [
///     Terminal::when(|err| err.to_string().contains("forbidden")),
///     Terminal::kind::<std::num::ParseIntError>(),
/// ];
///
/// let err = io::Error::new(io::ErrorKind::PermissionDenied, "403 forbidden");
/// assert!(repeater::retry::matches_any(&err, &terminal));
/// ```
pub enum Terminal {
    /// Every error is terminal: the run stops on the first failure
    Any,

    /// Errors for which the predicate holds on some link of the chain
    Matching(ChainPredicate),
}

impl Terminal {
    /// Matches a chain link of type `T` that compares equal to `value`
    pub fn value<T>(value: T) -> Self
    where
        T: Error + PartialEq + Send + Sync + 'static,
    {
        Terminal::Matching(Box::new(move |err: &(dyn Error + 'static)| {
            err.downcast_ref::<T>().is_some_and(|candidate| *candidate == value)
        }))
    }

    /// Matches any chain link of type `T`
    pub fn kind<T>() -> Self
    where
        T: Error + 'static,
    {
        Terminal::Matching(Box::new(|err: &(dyn Error + 'static)| err.is::<T>()))
    }

    /// Matches when `predicate` holds for any chain link
    pub fn when<F>(predicate: F) -> Self
    where
        F: Fn(&(dyn Error + 'static)) -> bool + Send + Sync + 'static,
    {
        Terminal::Matching(Box::new(predicate))
    }

    /// Whether this entry is the "any error" sentinel
    pub fn is_any(&self) -> bool {
        matches!(self, Terminal::Any)
    }

    /// Check `err` and every error in its `source()` chain
    pub fn matches(&self, err: &(dyn Error + 'static)) -> bool {
        match self {
            Terminal::Any => true,
            Terminal::Matching(predicate) => chain(err).any(|link| predicate(link)),
        }
    }
}

impl fmt::Debug for Terminal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Terminal::Any => f.write_str("Terminal::Any"),
            Terminal::Matching(_) => f.write_str("Terminal::Matching(..)"),
        }
    }
}

/// Whether `err` is terminal under the given set
///
/// The `Any` sentinel is honoured before any other entry is consulted.
pub fn matches_any(err: &(dyn Error + 'static), terminal: &[Terminal]) -> bool {
    if terminal.iter().any(Terminal::is_any) {
        return true;
    }
    terminal.iter().any(|entry| entry.matches(err))
}

fn chain<'a>(err: &'a (dyn Error + 'static)) -> impl Iterator<Item = &'a (dyn Error + 'static)> {
    std::iter::successors(Some(err), |&link| link.source())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
    #[error("quota exceeded for {0}")]
    struct QuotaExceeded(&'static str);

    #[derive(Debug, thiserror::Error)]
    enum FetchError {
        #[error("connection reset")]
        Reset,

        #[error("request rejected")]
        Rejected(#[source] QuotaExceeded),

        #[error("upstream failed")]
        Upstream(#[source] Box<FetchError>),
    }

    #[test]
    fn test_empty_set_matches_nothing() {
        assert!(!matches_any(&FetchError::Reset, &[]));
    }

    #[test]
    fn test_any_sentinel_matches_everything() {
        assert!(matches_any(&FetchError::Reset, &[Terminal::Any]));
        assert!(Terminal::Any.is_any());
    }

    #[test]
    fn test_any_sentinel_wins_over_other_entries() {
        let terminal = [Terminal::value(QuotaExceeded("other")), Terminal::Any];
        assert!(matches_any(&FetchError::Reset, &terminal));
    }

    #[test]
    fn test_value_matches_top_level() {
        let err = QuotaExceeded("builds");

        assert!(matches_any(&err, &[Terminal::value(QuotaExceeded("builds"))]));
        assert!(!matches_any(&err, &[Terminal::value(QuotaExceeded("pushes"))]));
    }

    #[test]
    fn test_value_matches_wrapped_source() {
        let err = FetchError::Rejected(QuotaExceeded("builds"));

        assert!(matches_any(&err, &[Terminal::value(QuotaExceeded("builds"))]));
        assert!(!matches_any(&err, &[Terminal::value(QuotaExceeded("pushes"))]));
    }

    #[test]
    fn test_kind_matches_deep_in_chain() {
        let err = FetchError::Upstream(Box::new(FetchError::Rejected(QuotaExceeded("x"))));

        assert!(matches_any(&err, &[Terminal::kind::<QuotaExceeded>()]));
        assert!(!matches_any(&FetchError::Reset, &[Terminal::kind::<QuotaExceeded>()]));
    }

    #[test]
    fn test_predicate_checks_every_link() {
        let terminal = [Terminal::when(|err| err.to_string() == "request rejected")];

        let wrapped = FetchError::Upstream(Box::new(FetchError::Rejected(QuotaExceeded("x"))));
        assert!(terminal[0].matches(&wrapped));
        assert!(!terminal[0].matches(&FetchError::Reset));
    }

    #[test]
    fn test_debug_format() {
        assert_eq!(format!("{:?}", Terminal::Any), "Terminal::Any");
        assert_eq!(
            format!("{:?}", Terminal::kind::<QuotaExceeded>()),
            "Terminal::Matching(..)"
        );
    }
}

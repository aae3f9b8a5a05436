//! Tracing subscriber setup
//!
//! Repeaters emit structured `tracing` events through `TracingObserver`;
//! binaries embedding the crate call [`init_tracing`] once at startup.

use tracing_subscriber::util::TryInitError;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Filter for the given verbosity. `RUST_LOG` takes precedence when set.
pub fn env_filter(verbose: u8, quiet: bool) -> EnvFilter {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return filter;
    }

    if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("info"),
            1 => EnvFilter::new("debug"),
            _ => EnvFilter::new("trace"),
        }
    }
}

/// Install the global subscriber, panicking if one is already set
pub fn init_tracing(verbose: u8, quiet: bool) {
    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false))
        .with(env_filter(verbose, quiet))
        .init();
}

/// Like [`init_tracing`], but reports an already installed subscriber as an error
pub fn try_init_tracing(verbose: u8, quiet: bool) -> Result<(), TryInitError> {
    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false))
        .with(env_filter(verbose, quiet))
        .try_init()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    #[serial]
    fn test_filter_follows_verbosity() {
        std::env::remove_var("RUST_LOG");

        assert_eq!(env_filter(0, true).to_string(), "error");
        assert_eq!(env_filter(0, false).to_string(), "info");
        assert_eq!(env_filter(1, false).to_string(), "debug");
        assert_eq!(env_filter(5, false).to_string(), "trace");
    }

    #[test]
    #[serial]
    fn test_rust_log_takes_precedence() {
        std::env::set_var("RUST_LOG", "warn");
        let filter = env_filter(2, false);
        std::env::remove_var("RUST_LOG");

        assert_eq!(filter.to_string(), "warn");
    }
}

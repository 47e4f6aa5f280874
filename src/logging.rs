//! Logging setup for hosts embedding the provider.
//!
//! Everything goes to **stderr**: a host talking to the provider over stdout
//! must not see log lines there. Filtering follows `RUST_LOG`; without it the
//! provider logs at the requested level while the HTTP stack underneath stays
//! at `warn`, since connection pool chatter drowns the lifecycle events.
//!
//! ```bash
//! # lifecycle events only
//! RUST_LOG=info ./host
//!
//! # every poll of every waiter
//! RUST_LOG=scaleway_provider=debug ./host
//! ```

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Crates whose logs are capped at `warn` unless `RUST_LOG` says otherwise.
const NOISY_DEPENDENCIES: &[&str] = &["hyper", "hyper_util", "reqwest", "rustls"];

fn default_filter(level: &str) -> EnvFilter {
    let directives = NOISY_DEPENDENCIES
        .iter()
        .fold(level.to_string(), |acc, krate| format!("{},{}=warn", acc, krate));
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(directives))
}

fn stderr_layer<S>() -> impl tracing_subscriber::Layer<S>
where
    S: tracing::Subscriber + for<'a> tracing_subscriber::registry::LookupSpan<'a>,
{
    fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
}

/// Install the stderr subscriber at `info` (or `RUST_LOG`).
///
/// # Panics
///
/// Panics if a global subscriber has already been set.
pub fn init_logging() {
    init_logging_with_default("info");
}

/// Install the stderr subscriber at `default_level` unless `RUST_LOG` is set.
///
/// # Panics
///
/// Panics if a global subscriber has already been set.
pub fn init_logging_with_default(default_level: &str) {
    tracing_subscriber::registry()
        .with(default_filter(default_level))
        .with(stderr_layer())
        .init();
}

/// Like [`init_logging`], but returns `false` instead of panicking when a
/// subscriber is already installed. Handy in tests.
pub fn try_init_logging() -> bool {
    tracing_subscriber::registry()
        .with(default_filter("info"))
        .with(stderr_layer())
        .try_init()
        .is_ok()
}

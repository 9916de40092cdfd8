#![forbid(unsafe_code)]

//! Tracing subscriber setup for the demo binary.

use tracing_subscriber::EnvFilter;
use tracing_subscriber::util::TryInitError;

/// Build the filter for `directive`, falling back to `warn` when it does not
/// parse.
#[must_use]
pub fn filter(directive: &str) -> EnvFilter {
    EnvFilter::try_new(directive).unwrap_or_else(|err| {
        eprintln!("Invalid log filter '{directive}': {err}; using 'warn'");
        EnvFilter::new("warn")
    })
}

/// Install the global subscriber, writing to stderr.
///
/// # Errors
///
/// Fails if a global subscriber is already installed.
pub fn init(directive: &str, json: bool) -> Result<(), TryInitError> {
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;

    let registry = tracing_subscriber::registry().with(filter(directive));
    if json {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(std::io::stderr),
            )
            .try_init()
    } else {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .compact()
                    .with_target(false)
                    .with_writer(std::io::stderr),
            )
            .try_init()
    }
}

//! Tracing subscriber setup

use tracing_subscriber::EnvFilter;

/// Environment variable holding the log filter
pub const LOG_ENV: &str = "ISSUELINKS_LOG";

fn filter(default_directive: &str) -> EnvFilter {
    EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(default_directive))
}

/// Install a human-readable fmt subscriber
///
/// Uses `ISSUELINKS_LOG` if set, `default_directive` otherwise. Returns
/// false if a global subscriber was already installed.
pub fn init_tracing(default_directive: &str) -> bool {
    tracing_subscriber::fmt()
        .with_env_filter(filter(default_directive))
        .with_target(false)
        .try_init()
        .is_ok()
}

/// Install a JSON-lines subscriber
///
/// Same filter rules as [`init_tracing`].
pub fn init_json_tracing(default_directive: &str) -> bool {
    tracing_subscriber::fmt()
        .json()
        .with_env_filter(filter(default_directive))
        .with_current_span(true)
        .try_init()
        .is_ok()
}

//! Tracing subscriber setup.

use std::env;

use tracing_subscriber::EnvFilter;

/// Any non-empty value turns on debug output.
pub const DEBUG_ENV_VAR: &str = "LAZYCOMMIT_DEBUG";

/// Level used when `RUST_LOG` is not set.
pub fn default_level() -> &'static str {
    match env::var(DEBUG_ENV_VAR) {
        Ok(v) if !v.is_empty() => "debug",
        _ => "warn",
    }
}

/// Install a compact stderr subscriber. `RUST_LOG` takes precedence over
/// [`default_level`].
pub fn init_subscriber() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level()));

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .compact();

    // No-op if a subscriber is already installed
    let _ = subscriber.try_init();
}

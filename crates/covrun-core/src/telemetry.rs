//! Tracing setup for the covrun binary.
//!
//! Call [`init_tracing`] once at startup. Log lines go to stderr; stdout
//! belongs to the cargo and grcov processes, which inherit it.
//!
//! Filtering follows `RUST_LOG` when set, e.g. `RUST_LOG=covrun_ci=debug`
//! shows each stage's argv and environment without the rest of the debug
//! output.

use tracing::Level;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

/// Install the global subscriber.
///
/// * `json`: emit newline-delimited JSON instead of human-readable lines.
/// * `level`: verbosity used when `RUST_LOG` is unset.
///
/// Safe to call more than once: the global subscriber can only be set
/// once per process, so later calls are ignored.
pub fn init_tracing(json: bool, level: Level) {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level.as_str()));

    let layer = fmt::layer().with_target(false).with_writer(std::io::stderr);

    if json {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(layer.json())
            .try_init()
            .ok();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(layer)
            .try_init()
            .ok();
    }
}

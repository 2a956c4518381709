//! Tandem Logging - one tracing subscriber per process
//!
//! Library crates only emit `tracing` events. Binaries and tests call
//! [`init`] once at startup; both participants of an in-process run share the
//! same subscriber, and events carry the participant as a field.
//!
//! The filter comes from `RUST_LOG` when set, otherwise from the directives
//! passed to [`init`]:
//!
//! ```rust
//! tandem_logging::init("tandem_scheme=info");
//! tandem_logging::init("tandem_scheme=debug"); // already installed, ignored
//! tracing::info!(participant = "Fluid", "Coupling started");
//! ```

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Directives used by the binaries when `RUST_LOG` is unset.
pub const DEFAULT_DIRECTIVES: &str = "tandem_demo=info,tandem_scheme=info,tandem_transfer=warn";

/// Build the filter from `RUST_LOG`, falling back to `default_directives`.
pub fn env_filter(default_directives: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| default_directives.into())
}

/// Install the process-wide subscriber.
///
/// Returns `false` if a subscriber was already installed, in which case the
/// existing one stays active.
pub fn init(default_directives: &str) -> bool {
    tracing_subscriber::registry()
        .with(env_filter(default_directives))
        .with(tracing_subscriber::fmt::layer())
        .try_init()
        .is_ok()
}

/// Install a subscriber that writes through the test harness capture.
pub fn init_for_tests() -> bool {
    tracing_subscriber::registry()
        .with(env_filter("warn"))
        .with(tracing_subscriber::fmt::layer().with_test_writer())
        .try_init()
        .is_ok()
}

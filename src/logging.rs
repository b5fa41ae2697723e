//! Logging setup for sweep runs
//!
//! `RUST_LOG` takes precedence; otherwise the crate logs at the requested
//! level and everything else at `warn`.
//!
//! ```bash
//! RUST_LOG=mmc_queue=debug cargo run --bin mmc_sweep
//! ```

use tracing::debug;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Build the filter used when `RUST_LOG` is unset
pub fn default_filter(level: &str) -> String {
    format!("warn,{}={}", env!("CARGO_CRATE_NAME"), level)
}

/// Initialize logging to stderr at the given level.
///
/// Returns `false` when a global subscriber was already installed, which
/// leaves the existing one in place.
pub fn init_logging(level: &str) -> bool {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_filter(level)))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let installed = tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(true)
                .with_level(true),
        )
        .with(filter)
        .try_init()
        .is_ok();

    if installed {
        debug!(level, "logging initialized");
    }
    installed
}

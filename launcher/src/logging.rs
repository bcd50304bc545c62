//! Tracing setup for the launcher.
//!
//! Tracing is for debugging the launcher itself and is off below `warn`
//! unless `RUST_LOG` says otherwise. What the operator is meant to read
//! (printed command lines, dependency diagnostics, fixes) is written by
//! `main` directly and does not depend on the filter.

use tracing::level_filters::LevelFilter;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Install the stderr subscriber.
///
/// Lines carry no timestamp: they share stderr with the launched JVM.
///
/// ```bash
/// RUST_LOG=tornado_launcher=debug tornado --printJavaFlags
/// ```
pub fn init() {
    let filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::WARN.into())
        .from_env_lossy();

    tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .without_time()
                .with_target(false)
                .compact(),
        )
        .init();
}

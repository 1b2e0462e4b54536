//! Logging configuration using tracing

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Initialize the logging subsystem.
///
/// Log output goes to stderr so it never interleaves with streamed build
/// output or container logs on stdout. Log level is controlled by the
/// `STEVEDORE_LOG` environment variable.
///
/// # Examples
/// ```bash
/// STEVEDORE_LOG=debug stevedore logs my-container --follow
/// ```
pub fn init() {
    // Default to info, allow override via STEVEDORE_LOG
    let env_filter = EnvFilter::try_from_env("STEVEDORE_LOG")
        .unwrap_or_else(|_| EnvFilter::new("stevedore=info,warn"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(true)
                .with_timer(fmt::time::ChronoLocal::new(
                    "%Y-%m-%d %H:%M:%S%.3f".to_string(),
                )),
        )
        .init();
}

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

const DEFAULT_FILTER: &str = "info,hub_authority=debug";

/// Initialize tracing for processes embedding the store.
///
/// - Compact, human-readable stdout by default
/// - JSON lines when `HUB_LOG_FORMAT=json`
/// - Default level: INFO (crate at DEBUG), override via RUST_LOG env
///
/// Safe to call more than once; later calls are no-ops.
pub fn init() {
    let json = std::env::var("HUB_LOG_FORMAT")
        .map(|v| v.trim().eq_ignore_ascii_case("json"))
        .unwrap_or(false);
    init_with(json);
}

pub fn init_with(json: bool) {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    let result = if json {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt::layer().json().with_current_span(false))
            .try_init()
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(
                fmt::layer()
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_file(true)
                    .with_line_number(true)
                    .compact(),
            )
            .try_init()
    };

    if result.is_ok() {
        tracing::debug!(json, "Tracing initialized");
    }
}

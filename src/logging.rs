use std::sync::Once;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

// Ensure initialization happens only once
static INIT: Once = Once::new();

fn env_filter(default_directives: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directives))
}

/// Initialize the logging system with sensible defaults.
///
/// Log level can be set using the RUST_LOG environment variable.
/// Example: RUST_LOG=debug,resilient_notifier=trace
pub fn init() {
    init_with("info");
}

/// Like [`init`], with the filter used when RUST_LOG is unset
pub fn init_with(default_directives: &str) {
    INIT.call_once(|| {
        tracing_subscriber::registry()
            .with(env_filter(default_directives))
            .with(
                fmt::layer()
                    .with_target(true) // Include module path in logs
                    .with_thread_ids(true) // Concurrent producers share the status lock
                    .with_line_number(true),
            )
            // A host application may have installed its own subscriber
            .try_init()
            .ok();

        tracing::info!("Logging initialized");
    });
}

/// Initialize logging with one JSON object per event.
///
/// Shares the same once-guard as [`init`], whichever runs first wins.
pub fn init_json() {
    INIT.call_once(|| {
        tracing_subscriber::registry()
            .with(env_filter("info"))
            .with(fmt::layer().json().with_current_span(false))
            .try_init()
            .ok();

        tracing::info!("JSON logging initialized");
    });
}

/// Macro for logging a single channel attempt
#[macro_export]
macro_rules! delivery_event {
    ($channel:expr, $attempt:expr, $outcome:expr) => {
        tracing::debug!(
            channel = $channel,
            attempt = $attempt,
            outcome = $outcome,
            "Channel attempt"
        )
    };
}

/// Macro for logging storage operations with timing
#[macro_export]
macro_rules! storage_op {
    ($operation:expr, $key:expr, $result:expr, $elapsed_ms:expr) => {
        tracing::debug!(
            operation = $operation,
            key = $key,
            success = $result.is_ok(),
            elapsed_ms = $elapsed_ms,
            "Storage operation"
        )
    };
}

// Tests live in tests/logging.rs: they install a global subscriber, which
// would conflict with #[traced_test] in the lib unit-test binary.

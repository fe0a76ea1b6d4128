// ==========================================
// Logging initialisation
// ==========================================
// tracing + tracing-subscriber
// Level comes from RUST_LOG (default: info)
// ==========================================

use tracing_subscriber::{fmt, EnvFilter};

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Human-readable logs on stderr
///
/// # Environment
/// - RUST_LOG: filter directives, e.g. `RUST_LOG=debug` or
///   `RUST_LOG=boq_import=trace`
///
/// # Example
/// ```no_run
/// use boq_import::logging;
/// logging::init();
/// ```
pub fn init() {
    let _ = fmt()
        .with_env_filter(env_filter())
        .with_target(true)
        .with_thread_ids(false)
        .with_line_number(true)
        .with_writer(std::io::stderr)
        .try_init();
}

/// One JSON object per event (log shippers)
pub fn init_json() {
    let _ = fmt()
        .json()
        .with_env_filter(env_filter())
        .with_current_span(true)
        .with_writer(std::io::stderr)
        .try_init();
}

/// Test logging: debug level, captured by the test harness; safe to call repeatedly
pub fn init_test() {
    let _ = fmt()
        .with_env_filter(EnvFilter::new("debug"))
        .with_test_writer()
        .try_init();
}

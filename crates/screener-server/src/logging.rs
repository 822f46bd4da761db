//! Process-wide logging setup for the server binary.

use tracing_subscriber::EnvFilter;

/// Filter used when `RUST_LOG` is unset.
pub const DEFAULT_FILTER: &str = "info,screener=debug,tower_http=info";

/// Set to `json` for one JSON object per line.
pub const LOG_FORMAT_ENV: &str = "SCREENER_LOG_FORMAT";

/// Installs the global subscriber and routes `log` records into it.
///
/// Safe to call more than once; later calls keep the first subscriber.
pub fn init_logging() {
    // The screening engine logs through the `log` facade
    if let Err(e) = tracing_log::LogTracer::init() {
        eprintln!("Log bridge already installed: {}", e);
    }

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
    let json = std::env::var(LOG_FORMAT_ENV)
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    let installed = if json {
        let subscriber = tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_current_span(true)
            .finish();
        tracing::subscriber::set_global_default(subscriber)
    } else {
        let subscriber = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_thread_names(true)
            .finish();
        tracing::subscriber::set_global_default(subscriber)
    };

    if installed.is_err() {
        eprintln!("Global tracing subscriber already set");
    }
}

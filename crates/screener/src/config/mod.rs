pub mod filters;
pub mod loader;
pub mod schema;

pub use filters::{default_filters, normalize_filters, DEFAULT_FILTERS};
pub use loader::{load_config, load_config_from_str, CONFIG_PATH_ENV};
pub use schema::{default_worker_count, ScreenerConfig, SearchConfig, MAX_WORKERS};

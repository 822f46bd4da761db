use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::config::filters::default_filters;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScreenerConfig {
    #[serde(default = "default_version")]
    pub version: String,
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,
    #[serde(default = "default_upload_directory")]
    pub upload_directory: PathBuf,
    #[serde(default = "default_output_directory")]
    pub output_directory: PathBuf,
    #[serde(default = "default_worker_count")]
    pub worker_count: usize,
    #[serde(default)]
    pub search: SearchConfig,
    #[serde(default = "default_filters")]
    pub filters: Vec<String>,
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: usize,
}

fn default_version() -> String {
    "1.0".to_string()
}

fn default_bind_addr() -> String {
    "0.0.0.0:2000".to_string()
}

fn default_upload_directory() -> PathBuf {
    std::env::temp_dir().join("uploads")
}

fn default_output_directory() -> PathBuf {
    std::env::temp_dir().join("downloads")
}

fn default_max_upload_bytes() -> usize {
    16 * 1024 * 1024
}

/// Largest dispatcher pool a config may ask for.
pub const MAX_WORKERS: usize = 200;

/// Dispatcher pool size: one below the logical CPU count, clamped to
/// `[5, 200]`. Workers spend nearly all their time waiting on the network,
/// so the floor matters more than the CPU count.
pub fn default_worker_count() -> usize {
    worker_count_for(num_cpus::get())
}

pub(crate) fn worker_count_for(cpus: usize) -> usize {
    cpus.saturating_sub(1).clamp(5, MAX_WORKERS)
}

impl Default for ScreenerConfig {
    fn default() -> Self {
        Self {
            version: default_version(),
            bind_addr: default_bind_addr(),
            upload_directory: default_upload_directory(),
            output_directory: default_output_directory(),
            worker_count: default_worker_count(),
            search: SearchConfig::default(),
            filters: default_filters(),
            max_upload_bytes: default_max_upload_bytes(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    #[serde(default = "default_target_results")]
    pub target_results: usize,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,
    #[serde(default = "default_throttle_min_ms")]
    pub throttle_min_ms: u64,
    #[serde(default = "default_throttle_max_ms")]
    pub throttle_max_ms: u64,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_region")]
    pub region: String,
}

fn default_target_results() -> usize {
    10
}

fn default_max_retries() -> u32 {
    3
}

fn default_retry_backoff_ms() -> u64 {
    500
}

fn default_throttle_min_ms() -> u64 {
    500
}

fn default_throttle_max_ms() -> u64 {
    1000
}

fn default_timeout_secs() -> u64 {
    15
}

fn default_region() -> String {
    "wt-wt".to_string()
}

impl SearchConfig {
    pub fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_ms)
    }

    pub fn throttle_range(&self) -> (Duration, Duration) {
        (
            Duration::from_millis(self.throttle_min_ms),
            Duration::from_millis(self.throttle_max_ms),
        )
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            target_results: default_target_results(),
            max_retries: default_max_retries(),
            retry_backoff_ms: default_retry_backoff_ms(),
            throttle_min_ms: default_throttle_min_ms(),
            throttle_max_ms: default_throttle_max_ms(),
            timeout_secs: default_timeout_secs(),
            region: default_region(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_worker_count_clamps() {
        assert_eq!(worker_count_for(1), 5);
        assert_eq!(worker_count_for(4), 5);
        assert_eq!(worker_count_for(6), 5);
        assert_eq!(worker_count_for(7), 6);
        assert_eq!(worker_count_for(64), 63);
        assert_eq!(worker_count_for(512), 200);
    }

    #[test]
    fn test_defaults_deserialize_from_empty_object() {
        let config: ScreenerConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config.version, "1.0");
        assert_eq!(config.bind_addr, "0.0.0.0:2000");
        assert_eq!(config.search.target_results, 10);
        assert_eq!(config.search.max_retries, 3);
        assert_eq!(
            config.search.throttle_range(),
            (Duration::from_millis(500), Duration::from_millis(1000))
        );
        assert!(config.filters.iter().any(|f| f == "bribery"));
        assert!(config.worker_count >= 5);
    }

    #[test]
    fn test_partial_search_section_keeps_other_defaults() {
        let config: ScreenerConfig =
            serde_json::from_str(r#"{"search": {"target_results": 20}}"#).unwrap();
        assert_eq!(config.search.target_results, 20);
        assert_eq!(config.search.retry_backoff_ms, 500);
        assert_eq!(config.search.region, "wt-wt");
    }
}

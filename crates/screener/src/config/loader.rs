use std::path::{Path, PathBuf};

use log::info;

use crate::config::schema::{ScreenerConfig, MAX_WORKERS};
use crate::error::ConfigError;

pub const CONFIG_PATH_ENV: &str = "SCREENER_CONFIG";

pub fn load_config<P: AsRef<Path>>(path: P) -> Result<ScreenerConfig, ConfigError> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadFile {
        path: path.to_path_buf(),
        source: e,
    })?;

    load_config_from_str(&content)
}

pub fn load_config_from_str(content: &str) -> Result<ScreenerConfig, ConfigError> {
    let config: ScreenerConfig = serde_json::from_str(content)?;

    validate_config(&config)?;

    Ok(config)
}

impl ScreenerConfig {
    /// Loads the file named by `SCREENER_CONFIG` (or defaults), then applies
    /// the `PORT`, `SCREENER_UPLOAD_DIR`, `SCREENER_OUTPUT_DIR` and
    /// `SCREENER_WORKERS` overrides.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = match std::env::var(CONFIG_PATH_ENV) {
            Ok(path) if !path.trim().is_empty() => {
                info!("Loading configuration from {}", path);
                load_config(path)?
            }
            _ => ScreenerConfig::default(),
        };

        if let Ok(port) = std::env::var("PORT") {
            let port: u16 = port.parse().map_err(|_| ConfigError::InvalidOverride {
                name: "PORT".to_string(),
                value: port.clone(),
                reason: "expected a port number".to_string(),
            })?;
            config.bind_addr = with_port(&config.bind_addr, port);
        }

        if let Ok(dir) = std::env::var("SCREENER_UPLOAD_DIR") {
            config.upload_directory = PathBuf::from(dir);
        }

        if let Ok(dir) = std::env::var("SCREENER_OUTPUT_DIR") {
            config.output_directory = PathBuf::from(dir);
        }

        if let Ok(workers) = std::env::var("SCREENER_WORKERS") {
            config.worker_count =
                workers
                    .parse()
                    .map_err(|_| ConfigError::InvalidOverride {
                        name: "SCREENER_WORKERS".to_string(),
                        value: workers.clone(),
                        reason: "expected a positive integer".to_string(),
                    })?;
        }

        validate_config(&config)?;

        Ok(config)
    }
}

fn with_port(bind_addr: &str, port: u16) -> String {
    let host = match bind_addr.rsplit_once(':') {
        Some((host, _)) => host,
        None => bind_addr,
    };
    format!("{}:{}", host, port)
}

fn validate_config(config: &ScreenerConfig) -> Result<(), ConfigError> {
    if config.version != "1.0" {
        return Err(ConfigError::Validation {
            message: format!("Unsupported config version: {}", config.version),
        });
    }

    if config.worker_count == 0 {
        return Err(ConfigError::Validation {
            message: "worker_count must be greater than 0".to_string(),
        });
    }

    if config.worker_count > MAX_WORKERS {
        return Err(ConfigError::Validation {
            message: format!(
                "worker_count ({}) exceeds the maximum of {}",
                config.worker_count, MAX_WORKERS
            ),
        });
    }

    if config.search.target_results == 0 {
        return Err(ConfigError::Validation {
            message: "search.target_results must be greater than 0".to_string(),
        });
    }

    if config.search.throttle_min_ms > config.search.throttle_max_ms {
        return Err(ConfigError::Validation {
            message: format!(
                "search.throttle_min_ms ({}) exceeds search.throttle_max_ms ({})",
                config.search.throttle_min_ms, config.search.throttle_max_ms
            ),
        });
    }

    if config.filters.is_empty() {
        return Err(ConfigError::Validation {
            message: "filters must contain at least one keyword".to_string(),
        });
    }

    if let Some(index) = config.filters.iter().position(|f| f.trim().is_empty()) {
        return Err(ConfigError::Validation {
            message: format!("filters[{}] is blank", index),
        });
    }

    Ok(())
}

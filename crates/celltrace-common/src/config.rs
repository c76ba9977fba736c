//! Configuration types for Celltrace
//!
//! All sections are optional in the TOML file; missing sections and fields
//! fall back to the defaults below. Absence of the geolocation token or the
//! sink URL is a supported degraded mode, never an error.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Root configuration for the celltrace pipeline
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Trace storage configuration
    pub storage: StorageConfig,
    /// Scan scheduler configuration
    pub scan: ScanConfig,
    /// Export sink configuration
    pub export: ExportConfig,
    /// Remote geolocation configuration
    pub geolocation: GeolocationConfig,
    /// Location cache configuration
    pub cache: CacheConfig,
}

impl Config {
    /// Absolute path of the durable cache file; relative paths live under
    /// the data directory.
    #[must_use]
    pub fn cache_file_path(&self) -> PathBuf {
        if self.cache.cache_file.is_absolute() {
            self.cache.cache_file.clone()
        } else {
            self.storage.data_dir.join(&self.cache.cache_file)
        }
    }
}

/// Trace storage configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Directory holding the ring files, merged traces and the cache file
    pub data_dir: PathBuf,
    /// Number of files in the trace ring
    pub max_files: u32,
    /// Records per ring file before rotation
    pub events_per_file: u32,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./celltrace-data"),
            max_files: 10,
            events_per_file: 50,
        }
    }
}

/// Scan scheduler configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanConfig {
    /// Seconds between cell scans
    pub interval_secs: u64,
    /// Concurrent location resolutions allowed at any moment
    pub max_concurrent_resolutions: usize,
    /// Seconds granted to in-flight tasks when the pipeline stops
    pub shutdown_grace_secs: u64,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            interval_secs: 5,
            max_concurrent_resolutions: 8,
            shutdown_grace_secs: 5,
        }
    }
}

/// Export sink configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportConfig {
    /// Sink endpoint; `None` disables both export paths
    pub sink_url: Option<String>,
    /// Seconds between partial exports
    pub interval_secs: u64,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            sink_url: None,
            interval_secs: 60,
        }
    }
}

/// Remote geolocation configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct GeolocationConfig {
    /// API credential; `None` degrades to local-only resolution
    pub api_token: Option<String>,
    /// Provider endpoint
    pub endpoint: String,
    /// Connect timeout in seconds
    pub connect_timeout_secs: u64,
    /// Overall request timeout in seconds
    pub request_timeout_secs: u64,
}

impl Default for GeolocationConfig {
    fn default() -> Self {
        Self {
            api_token: None,
            endpoint: "https://us1.unwiredlabs.com/v2/process.php".to_string(),
            connect_timeout_secs: 10,
            request_timeout_secs: 30,
        }
    }
}

/// Location cache configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Bundled read-only reference dataset (CSV); optional
    pub reference_dataset: Option<PathBuf>,
    /// Durable read-write cache file, relative to the data directory
    pub cache_file: PathBuf,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            reference_dataset: None,
            cache_file: PathBuf::from("cell_cache.csv"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.storage.max_files, 10);
        assert_eq!(config.storage.events_per_file, 50);
        assert_eq!(config.scan.interval_secs, 5);
        assert_eq!(config.export.interval_secs, 60);
        assert!(config.export.sink_url.is_none());
        assert!(config.geolocation.api_token.is_none());
        assert_eq!(config.geolocation.connect_timeout_secs, 10);
        assert_eq!(config.geolocation.request_timeout_secs, 30);
    }

    #[test]
    fn test_partial_toml_fills_defaults() {
        let config: Config = toml::from_str(
            r#"
            [storage]
            max_files = 3
            events_per_file = 2

            [export]
            sink_url = "https://sink.example/hook"
            "#,
        )
        .unwrap();
        assert_eq!(config.storage.max_files, 3);
        assert_eq!(config.storage.events_per_file, 2);
        assert_eq!(config.storage.data_dir, PathBuf::from("./celltrace-data"));
        assert_eq!(
            config.export.sink_url.as_deref(),
            Some("https://sink.example/hook")
        );
        assert_eq!(config.scan.interval_secs, 5);
    }

    #[test]
    fn test_cache_file_path_joins_data_dir() {
        let config = Config::default();
        assert_eq!(
            config.cache_file_path(),
            PathBuf::from("./celltrace-data/cell_cache.csv")
        );

        let mut absolute = Config::default();
        absolute.cache.cache_file = PathBuf::from("/var/lib/celltrace/cache.csv");
        assert_eq!(
            absolute.cache_file_path(),
            PathBuf::from("/var/lib/celltrace/cache.csv")
        );
    }
}

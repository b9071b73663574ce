/**
 * @module config
 * @description Configuration for the chain indexing core's storage layer.
 *
 * Layered loading strategy: try an explicit path,
 * fall back to a `store.yaml` discovered near the current directory, and
 * fall back again to compiled-in defaults if neither is found or parses.
 * Config loading never fails the caller — a missing or malformed file is
 * logged and defaults are used, since this module sits below the API layer
 * that decides whether degraded startup is acceptable.
 *
 * ## Sections
 *
 * ### StoreConfig (root)
 * - `database_path`: file path for the SQLite database, or `:memory:`.
 * - `page_size`: SQLite page size in bytes (default: 4096).
 * - `max_connections`: reader pool size (default: 4; the pool always
 *   carries one connection usable for writes).
 *
 * ### StabilizationConfig
 * - `stable_flush_interval`: blocks between stabilization passes.
 * - `max_fork_depth`: reorg margin.
 * - `new_tx_cleanup_wait_secs`: loose-transaction retention window.
 */
use crate::constants;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

#[derive(Debug, Deserialize, Clone)]
pub struct StoreConfig {
    #[serde(default = "default_database_path")]
    pub database_path: String,
    #[serde(default = "default_page_size")]
    pub page_size: u32,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    #[serde(default)]
    pub stabilization: StabilizationConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct StabilizationConfig {
    #[serde(default = "default_stable_flush_interval")]
    pub stable_flush_interval: u64,
    #[serde(default = "default_max_fork_depth")]
    pub max_fork_depth: u64,
    #[serde(default = "default_new_tx_cleanup_wait_secs")]
    pub new_tx_cleanup_wait_secs: i64,
}

fn default_database_path() -> String {
    "chain-index.db".to_string()
}

fn default_page_size() -> u32 {
    4096
}

fn default_max_connections() -> u32 {
    4
}

fn default_stable_flush_interval() -> u64 {
    constants::STABLE_FLUSH_INTERVAL
}

fn default_max_fork_depth() -> u64 {
    constants::MAX_FORK_DEPTH
}

fn default_new_tx_cleanup_wait_secs() -> i64 {
    constants::NEW_TX_CLEANUP_WAIT_SECS
}

impl Default for StoreConfig {
    fn default() -> Self {
        StoreConfig {
            database_path: default_database_path(),
            page_size: default_page_size(),
            max_connections: default_max_connections(),
            stabilization: StabilizationConfig::default(),
        }
    }
}

impl Default for StabilizationConfig {
    fn default() -> Self {
        StabilizationConfig {
            stable_flush_interval: default_stable_flush_interval(),
            max_fork_depth: default_max_fork_depth(),
            new_tx_cleanup_wait_secs: default_new_tx_cleanup_wait_secs(),
        }
    }
}

/// Load configuration from an explicit path, or search up to 3 parent
/// directories from the current directory for `store.yaml`, or fall back
/// to defaults.
pub fn load_config(explicit_path: Option<&Path>) -> StoreConfig {
    if let Some(path) = explicit_path {
        if let Some(config) = try_load(path) {
            return config;
        }
        warn!("could not load config from {:?}, falling back to search", path);
    }

    let mut dir = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
    for _ in 0..3 {
        let candidate = dir.join("store.yaml");
        if candidate.exists() {
            if let Some(config) = try_load(&candidate) {
                return config;
            }
        }
        dir = match dir.parent() {
            Some(parent) => parent.to_path_buf(),
            None => break,
        };
    }

    debug!("using default store configuration");
    StoreConfig::default()
}

fn try_load(path: &Path) -> Option<StoreConfig> {
    match fs::read_to_string(path) {
        Ok(contents) => match serde_yaml::from_str(&contents) {
            Ok(config) => {
                debug!("loaded store configuration from {:?}", path);
                Some(config)
            }
            Err(e) => {
                warn!("error parsing {:?}: {}", path, e);
                None
            }
        },
        Err(_) => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_matches_spec_constants() {
        let config = StoreConfig::default();
        assert_eq!(config.database_path, "chain-index.db");
        assert_eq!(config.page_size, 4096);
        assert_eq!(config.stabilization.stable_flush_interval, constants::STABLE_FLUSH_INTERVAL);
        assert_eq!(config.stabilization.max_fork_depth, constants::MAX_FORK_DEPTH);
        assert_eq!(
            config.stabilization.new_tx_cleanup_wait_secs,
            constants::NEW_TX_CLEANUP_WAIT_SECS
        );
    }

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let config = load_config(Some(Path::new("/nonexistent/store.yaml")));
        assert_eq!(config.database_path, default_database_path());
    }

    #[test]
    fn explicit_path_is_loaded() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.yaml");
        fs::write(&path, "database_path: custom.db\nmax_connections: 8\n").unwrap();

        let config = load_config(Some(&path));
        assert_eq!(config.database_path, "custom.db");
        assert_eq!(config.max_connections, 8);
        assert_eq!(config.page_size, default_page_size());
    }
}

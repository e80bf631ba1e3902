//! # xbridge-config
//!
//! Configuration management for the bridge.
//!
//! Loads configuration from:
//! 1. `~/.xbridge/config.toml` (global)
//! 2. `.xbridge/config.toml` (project-local, overrides global)
//! 3. Environment variables (highest priority)
//!
//! The call timeout is an operator knob: [`call_timeout`] re-reads the
//! environment and the config file on every invocation so it can be tuned
//! without restarting either process.

pub mod logging;

use std::path::{Path, PathBuf};
use std::sync::RwLock;
use std::time::Duration;

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Global config instance
static CONFIG: Lazy<RwLock<Config>> = Lazy::new(|| RwLock::new(Config::load().unwrap_or_default()));

/// Get global config (read-only)
pub fn config() -> std::sync::RwLockReadGuard<'static, Config> {
    CONFIG.read().unwrap()
}

/// Reload config from disk
pub fn reload() -> Result<(), ConfigError> {
    let new_config = Config::load()?;
    *CONFIG.write().unwrap() = new_config;
    Ok(())
}

/// The per-call timeout for correlated bridge operations. Checks
/// `XBRIDGE_TIMEOUT_MS` first, then reloads the config file, so an operator
/// editing either one tunes the very next call of an already-running
/// process. An unreadable file falls back to the last loaded value.
pub fn call_timeout() -> Duration {
    if let Some(ms) = std::env::var("XBRIDGE_TIMEOUT_MS")
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
    {
        return Duration::from_millis(ms);
    }
    let ms = match Config::load() {
        Ok(fresh) => {
            let ms = fresh.bridge.timeout_ms;
            *CONFIG.write().unwrap() = fresh;
            ms
        }
        Err(e) => {
            debug!("config reload failed, keeping cached values: {e}");
            config().bridge.timeout_ms
        }
    };
    Duration::from_millis(ms)
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
}

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub bridge: BridgeConfig,
    pub server: ServerConfig,
}

impl Config {
    /// Load config from standard locations
    pub fn load() -> Result<Self, ConfigError> {
        let mut config = Config::default();

        // 1. Load global config (~/.xbridge/config.toml)
        if let Some(global_path) = Self::global_config_path() {
            if global_path.exists() {
                debug!("Loading global config from {:?}", global_path);
                let contents = std::fs::read_to_string(&global_path)?;
                config = toml::from_str(&contents)?;
            }
        }

        // 2. Load project config (.xbridge/config.toml) - overrides global
        let project_path = Path::new(".xbridge/config.toml");
        if project_path.exists() {
            debug!("Loading project config from {:?}", project_path);
            let contents = std::fs::read_to_string(project_path)?;
            let project_config: Config = toml::from_str(&contents)?;
            config = project_config;
        }

        // 3. Apply environment variable overrides
        config.apply_env_overrides();

        Ok(config)
    }

    /// Global config path: ~/.xbridge/config.toml
    pub fn global_config_path() -> Option<PathBuf> {
        dirs::home_dir().map(|h| h.join(".xbridge/config.toml"))
    }

    /// Apply environment variable overrides
    fn apply_env_overrides(&mut self) {
        if let Ok(dir) = std::env::var("XBRIDGE_CHANNEL_DIR") {
            self.bridge.channel_dir = PathBuf::from(dir);
        }
        if let Ok(ms) = std::env::var("XBRIDGE_TIMEOUT_MS") {
            if let Ok(n) = ms.parse() {
                self.bridge.timeout_ms = n;
            }
        }
        if let Ok(cap) = std::env::var("XBRIDGE_CHANNEL_CAPACITY") {
            if let Ok(n) = cap.parse() {
                self.server.channel_capacity = n;
            }
        }
    }

    /// Generate default config TOML string
    pub fn default_toml() -> String {
        toml::to_string_pretty(&Config::default()).unwrap_or_default()
    }
}

/// Knobs shared by both endpoints
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    /// Directory holding the channel ring files
    pub channel_dir: PathBuf,
    /// Deadline for correlated calls, in milliseconds
    pub timeout_ms: u64,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            channel_dir: default_channel_dir(),
            timeout_ms: 5000,
        }
    }
}

/// Executing-side knobs
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Ring capacity in bytes per direction (rounded up to a power of two)
    pub channel_capacity: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            channel_capacity: 4 * 1024 * 1024,
        }
    }
}

fn default_channel_dir() -> PathBuf {
    // /dev/shm keeps the rings off disk where it exists; /tmp is still a
    // mappable file elsewhere.
    let shm = Path::new("/dev/shm");
    if shm.is_dir() {
        shm.join("xbridge")
    } else {
        std::env::temp_dir().join("xbridge")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.bridge.timeout_ms, 5000);
        assert!(config.server.channel_capacity.is_power_of_two());
    }

    #[test]
    fn test_default_toml_generation() {
        let toml_str = Config::default_toml();
        assert!(toml_str.contains("[bridge]"));
        assert!(toml_str.contains("timeout_ms"));
    }

    #[test]
    fn test_toml_roundtrip() {
        let config = Config::default();
        let toml_str = toml::to_string(&config).unwrap();
        let parsed: Config = toml::from_str(&toml_str).unwrap();
        assert_eq!(config.bridge.timeout_ms, parsed.bridge.timeout_ms);
        assert_eq!(
            config.server.channel_capacity,
            parsed.server.channel_capacity
        );
    }

    #[test]
    fn call_timeout_tracks_live_edits() {
        // The only test in this crate touching cwd or the environment, so
        // no serialization with the other tests is needed.
        let dir = tempfile::tempdir().unwrap();
        std::env::set_current_dir(dir.path()).unwrap();
        std::fs::create_dir_all(".xbridge").unwrap();

        std::fs::write(".xbridge/config.toml", "[bridge]\ntimeout_ms = 250\n").unwrap();
        assert_eq!(call_timeout(), Duration::from_millis(250));

        // An edit between two calls of the same process takes effect.
        std::fs::write(".xbridge/config.toml", "[bridge]\ntimeout_ms = 750\n").unwrap();
        assert_eq!(call_timeout(), Duration::from_millis(750));

        // The environment still wins over the file.
        std::env::set_var("XBRIDGE_TIMEOUT_MS", "99");
        assert_eq!(call_timeout(), Duration::from_millis(99));
        std::env::remove_var("XBRIDGE_TIMEOUT_MS");
        assert_eq!(call_timeout(), Duration::from_millis(750));
    }

    #[test]
    fn test_partial_toml_fills_defaults() {
        let parsed: Config = toml::from_str("[bridge]\ntimeout_ms = 250\n").unwrap();
        assert_eq!(parsed.bridge.timeout_ms, 250);
        assert_eq!(
            parsed.server.channel_capacity,
            ServerConfig::default().channel_capacity
        );
    }
}

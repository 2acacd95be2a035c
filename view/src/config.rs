//! Player configuration.
//!
//! TOML-backed; every field has a default so an absent or partial config
//! file is fine. Buffer thresholds tune the engine's loading behavior,
//! cache bounds size the media disk cache.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Main configuration structure
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct PlayerConfig {
    #[serde(default)]
    pub buffer: BufferConfig,

    #[serde(default)]
    pub cache: CacheConfig,
}

/// Engine buffering thresholds, in milliseconds
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BufferConfig {
    /// Minimum buffered media before the engine stops loading
    #[serde(default = "default_min_buffer_ms")]
    pub min_buffer_ms: u64,

    /// Buffering window the engine tries to keep filled
    #[serde(default = "default_max_buffer_ms")]
    pub max_buffer_ms: u64,

    /// Buffered media required before playback first starts
    #[serde(default = "default_playback_buffer_ms")]
    pub playback_buffer_ms: u64,

    /// Buffered media required before playback resumes after a stall
    #[serde(default = "default_rebuffer_ms")]
    pub rebuffer_ms: u64,
}

impl Default for BufferConfig {
    fn default() -> Self {
        Self {
            min_buffer_ms: default_min_buffer_ms(),
            max_buffer_ms: default_max_buffer_ms(),
            playback_buffer_ms: default_playback_buffer_ms(),
            rebuffer_ms: default_rebuffer_ms(),
        }
    }
}

fn default_min_buffer_ms() -> u64 {
    5000
}
fn default_max_buffer_ms() -> u64 {
    10000
}
fn default_playback_buffer_ms() -> u64 {
    1500
}
fn default_rebuffer_ms() -> u64 {
    3500
}

/// Media disk cache bounds
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CacheConfig {
    /// Cache directory; defaults to `<platform cache dir>/nagi/media`
    #[serde(default)]
    pub dir: Option<PathBuf>,

    /// Total byte window before least-recently-used eviction kicks in
    #[serde(default = "default_max_cache_bytes")]
    pub max_cache_bytes: u64,

    /// Entries larger than this are never cached
    #[serde(default = "default_max_file_bytes")]
    pub max_file_bytes: u64,

    /// How long a resolve waits for an in-flight fill of the same URL
    /// before falling back to the network
    #[serde(default = "default_in_flight_wait_ms")]
    pub in_flight_wait_ms: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            dir: None,
            max_cache_bytes: default_max_cache_bytes(),
            max_file_bytes: default_max_file_bytes(),
            in_flight_wait_ms: default_in_flight_wait_ms(),
        }
    }
}

fn default_max_cache_bytes() -> u64 {
    80 * 1024 * 1024
}
fn default_max_file_bytes() -> u64 {
    5 * 1024 * 1024
}
fn default_in_flight_wait_ms() -> u64 {
    10_000
}

impl CacheConfig {
    /// The configured cache directory, or the platform default
    pub fn resolved_dir(&self) -> PathBuf {
        if let Some(dir) = &self.dir {
            return dir.clone();
        }
        dirs::cache_dir()
            .unwrap_or_else(std::env::temp_dir)
            .join("nagi")
            .join("media")
    }
}

impl PlayerConfig {
    /// Default config file location
    pub fn default_config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir().context("could not determine config directory")?;
        Ok(config_dir.join("nagi").join("config.toml"))
    }

    /// Load from the default location, falling back to defaults when no
    /// config file exists
    pub fn load() -> Result<Self> {
        let path = Self::default_config_path()?;
        if !path.exists() {
            log::info!("no config file at {}, using defaults", path.display());
            return Ok(Self::default());
        }
        Self::load_from(&path)
    }

    /// Load and validate a specific config file
    pub fn load_from(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("read config file {}", path.display()))?;
        let config: Self = toml::from_str(&contents)
            .with_context(|| format!("parse config file {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.buffer.min_buffer_ms > self.buffer.max_buffer_ms {
            anyhow::bail!(
                "min_buffer_ms ({}) exceeds max_buffer_ms ({})",
                self.buffer.min_buffer_ms,
                self.buffer.max_buffer_ms
            );
        }
        if self.cache.max_file_bytes > self.cache.max_cache_bytes {
            anyhow::bail!(
                "max_file_bytes ({}) exceeds max_cache_bytes ({})",
                self.cache.max_file_bytes,
                self.cache.max_cache_bytes
            );
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = PlayerConfig::default();
        assert_eq!(config.buffer.min_buffer_ms, 5000);
        assert_eq!(config.buffer.max_buffer_ms, 10000);
        assert_eq!(config.buffer.playback_buffer_ms, 1500);
        assert_eq!(config.buffer.rebuffer_ms, 3500);
        assert_eq!(config.cache.max_cache_bytes, 80 * 1024 * 1024);
        assert_eq!(config.cache.max_file_bytes, 5 * 1024 * 1024);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_file_fills_in_defaults() {
        let config: PlayerConfig = toml::from_str(
            r#"
            [buffer]
            max_buffer_ms = 20000

            [cache]
            max_cache_bytes = 1048576
            max_file_bytes = 524288
            "#,
        )
        .unwrap();

        assert_eq!(config.buffer.max_buffer_ms, 20000);
        assert_eq!(config.buffer.min_buffer_ms, 5000);
        assert_eq!(config.cache.max_cache_bytes, 1_048_576);
        assert_eq!(config.cache.in_flight_wait_ms, 10_000);
    }

    #[test]
    fn test_validation_rejects_inverted_bounds() {
        let mut config = PlayerConfig::default();
        config.buffer.min_buffer_ms = 20_000;
        assert!(config.validate().is_err());

        let mut config = PlayerConfig::default();
        config.cache.max_file_bytes = config.cache.max_cache_bytes + 1;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_resolved_dir_prefers_configured() {
        let config = CacheConfig {
            dir: Some(PathBuf::from("/tmp/custom-cache")),
            ..Default::default()
        };
        assert_eq!(config.resolved_dir(), PathBuf::from("/tmp/custom-cache"));
    }
}

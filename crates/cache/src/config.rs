//! Cache configuration
//!
//! Centralized, user-configurable budgets and tunables for the read-ahead
//! cache. Configuration can be created programmatically with the builder
//! methods or loaded from environment variables. The source tree this
//! engine replaces had several experimental variants disagreeing on these
//! constants; they are deliberately configuration here, not behavior.

use thiserror::Error;

/// Configuration for the read-ahead cache engine.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheConfig {
    /// Byte budget for decoded full images.
    pub max_cache_bytes: u64,

    /// Number of icons normally resident around the pivot.
    pub icon_chunk_size: usize,

    /// Icons may grow to `icon_chunk_size * icon_expansion_factor`
    /// before a cleanup sweep triggers.
    pub icon_expansion_factor: f64,

    /// How many rows must have metadata loaded before full-image caching
    /// starts for a generation.
    pub full_image_trigger_count: usize,

    /// Consecutive opposite-sign steps required to flip the scroll
    /// direction.
    pub direction_threshold: u32,

    /// Share of the byte budget allotted ahead of the pivot (0..1); the
    /// rest goes behind.
    pub ahead_weight: f64,

    /// Byte estimate for a row whose metadata has not loaded yet.
    pub default_row_bytes: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_cache_bytes: 512 * 1024 * 1024, // 512 MB
            icon_chunk_size: 100,
            icon_expansion_factor: 2.0,
            full_image_trigger_count: 32,
            direction_threshold: 3,
            ahead_weight: 0.7,
            default_row_bytes: 16 * 1024 * 1024, // 16 MB, a typical decoded photo
        }
    }
}

impl CacheConfig {
    /// Sets the full-image byte budget in megabytes.
    pub fn with_max_cache_mb(mut self, mb: u64) -> Self {
        self.max_cache_bytes = mb * 1024 * 1024;
        self
    }

    /// Sets the resident icon count.
    pub fn with_icon_chunk_size(mut self, count: usize) -> Self {
        self.icon_chunk_size = count;
        self
    }

    /// Sets the icon expansion factor (clamped to at least 1.0).
    pub fn with_icon_expansion_factor(mut self, factor: f64) -> Self {
        self.icon_expansion_factor = factor.max(1.0);
        self
    }

    /// Sets the metadata count that triggers the full-image pass.
    pub fn with_full_image_trigger(mut self, count: usize) -> Self {
        self.full_image_trigger_count = count;
        self
    }

    /// Sets the direction hysteresis threshold.
    pub fn with_direction_threshold(mut self, threshold: u32) -> Self {
        self.direction_threshold = threshold.max(1);
        self
    }

    /// Sets the ahead share of the byte budget (clamped to 0.0..=1.0).
    pub fn with_ahead_weight(mut self, weight: f64) -> Self {
        self.ahead_weight = weight.clamp(0.0, 1.0);
        self
    }

    /// Sets the byte estimate used before a row's metadata is known.
    pub fn with_default_row_bytes(mut self, bytes: u64) -> Self {
        self.default_row_bytes = bytes;
        self
    }

    /// Maximum resident icons before a cleanup sweep triggers.
    pub fn icon_limit(&self) -> usize {
        (self.icon_chunk_size as f64 * self.icon_expansion_factor) as usize
    }

    /// Loads configuration from environment variables.
    ///
    /// Environment variables:
    /// - `GALLERY_CACHE_MB`: full-image budget in MB (default: 512)
    /// - `GALLERY_ICON_CHUNK`: resident icon count (default: 100)
    /// - `GALLERY_ICON_EXPANSION`: icon expansion factor (default: 2.0)
    /// - `GALLERY_FULL_TRIGGER`: full-image trigger count (default: 32)
    /// - `GALLERY_AHEAD_WEIGHT`: ahead budget share (default: 0.7)
    ///
    /// # Errors
    /// Returns an error if any variable contains an invalid value.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Ok(val) = std::env::var("GALLERY_CACHE_MB") {
            let mb: u64 = val
                .parse()
                .map_err(|_| ConfigError::InvalidValue("GALLERY_CACHE_MB".to_string()))?;
            config.max_cache_bytes = mb * 1024 * 1024;
        }

        if let Ok(val) = std::env::var("GALLERY_ICON_CHUNK") {
            config.icon_chunk_size = val
                .parse()
                .map_err(|_| ConfigError::InvalidValue("GALLERY_ICON_CHUNK".to_string()))?;
        }

        if let Ok(val) = std::env::var("GALLERY_ICON_EXPANSION") {
            let factor: f64 = val
                .parse()
                .map_err(|_| ConfigError::InvalidValue("GALLERY_ICON_EXPANSION".to_string()))?;
            config.icon_expansion_factor = factor.max(1.0);
        }

        if let Ok(val) = std::env::var("GALLERY_FULL_TRIGGER") {
            config.full_image_trigger_count = val
                .parse()
                .map_err(|_| ConfigError::InvalidValue("GALLERY_FULL_TRIGGER".to_string()))?;
        }

        if let Ok(val) = std::env::var("GALLERY_AHEAD_WEIGHT") {
            let weight: f64 = val
                .parse()
                .map_err(|_| ConfigError::InvalidValue("GALLERY_AHEAD_WEIGHT".to_string()))?;
            config.ahead_weight = weight.clamp(0.0, 1.0);
        }

        Ok(config)
    }
}

/// Errors from configuration loading.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// An environment variable held a value that failed to parse.
    #[error("invalid value for {0}")]
    InvalidValue(String),
}

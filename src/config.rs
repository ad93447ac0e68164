//! Pipeline configuration module.
//!
//! Handles loading, validating, and merging `variant-pool.toml`. A user file
//! is sparse: its values are merged over the stock defaults, so it only needs
//! the keys it wants to change.
//!
//! ## Configuration Options
//!
//! ```toml
//! # All options are optional - defaults shown below
//!
//! [pool]
//! concurrency = 2           # Jobs encoding at once (1-5)
//! max_queue_depth = 256     # Waiting jobs before submissions are rejected
//!
//! [sizes.small]
//! width = 150
//! height = 150
//!
//! [sizes.medium]
//! width = 600
//! height = 600
//!
//! [sizes.large]
//! width = 1200
//! height = 1200
//!
//! [encoding]
//! avif_quality = 80         # Modern format quality (1-100)
//! avif_speed = 6            # rav1e speed preset (1 = slowest, 10 = fastest)
//! jpeg_quality = 85         # Progressive fallback quality (1-100)
//!
//! [placeholder]
//! size = 20                 # Placeholder box edge in pixels
//! quality = 20              # Placeholder JPEG quality (1-100)
//! ```
//!
//! Unknown keys are rejected to catch typos early.

use crate::dispatcher::{MAX_CONCURRENCY, MIN_CONCURRENCY};
use crate::imaging::BoundingBox;
use crate::types::SizeLabel;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

/// File name looked up in the working directory when no path is given.
pub const DEFAULT_CONFIG_FILE: &str = "variant-pool.toml";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// Pipeline configuration loaded from `variant-pool.toml`.
///
/// All fields have sensible defaults. Unknown keys are rejected.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PipelineConfig {
    /// Worker pool settings (concurrency ceiling, queue depth).
    pub pool: PoolConfig,
    /// Bounding box for each size label.
    pub sizes: SizesConfig,
    /// AVIF and JPEG encoder settings.
    pub encoding: EncodingConfig,
    /// Inline placeholder settings.
    pub placeholder: PlaceholderConfig,
}

impl PipelineConfig {
    /// Validate config values are within acceptable ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(MIN_CONCURRENCY..=MAX_CONCURRENCY).contains(&self.pool.concurrency) {
            return Err(ConfigError::Validation(format!(
                "pool.concurrency must be {MIN_CONCURRENCY}-{MAX_CONCURRENCY}"
            )));
        }
        if self.pool.max_queue_depth == 0 {
            return Err(ConfigError::Validation(
                "pool.max_queue_depth must be non-zero".into(),
            ));
        }
        for label in SizeLabel::ALL {
            let bounds = self.sizes.get(label);
            if bounds.width == 0 || bounds.height == 0 {
                return Err(ConfigError::Validation(format!(
                    "sizes.{label} width and height must be non-zero"
                )));
            }
        }
        for (key, value) in [
            ("encoding.avif_quality", self.encoding.avif_quality),
            ("encoding.jpeg_quality", self.encoding.jpeg_quality),
            ("placeholder.quality", self.placeholder.quality),
        ] {
            if !(1..=100).contains(&value) {
                return Err(ConfigError::Validation(format!("{key} must be 1-100")));
            }
        }
        if !(1..=10).contains(&self.encoding.avif_speed) {
            return Err(ConfigError::Validation(
                "encoding.avif_speed must be 1-10".into(),
            ));
        }
        if self.placeholder.size == 0 {
            return Err(ConfigError::Validation(
                "placeholder.size must be non-zero".into(),
            ));
        }
        Ok(())
    }
}

/// Worker pool settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PoolConfig {
    /// Maximum number of jobs encoding at once. Can be changed at runtime
    /// through the dispatcher; runtime values are clamped to 1-5.
    pub concurrency: usize,
    /// Maximum number of waiting jobs. Submissions beyond this are rejected.
    pub max_queue_depth: usize,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            concurrency: 2,
            max_queue_depth: 256,
        }
    }
}

/// Bounding boxes per size label.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SizesConfig {
    pub small: BoundingBox,
    pub medium: BoundingBox,
    pub large: BoundingBox,
}

impl SizesConfig {
    pub fn get(&self, label: SizeLabel) -> BoundingBox {
        match label {
            SizeLabel::Small => self.small,
            SizeLabel::Medium => self.medium,
            SizeLabel::Large => self.large,
        }
    }
}

impl Default for SizesConfig {
    fn default() -> Self {
        Self {
            small: BoundingBox::square(150),
            medium: BoundingBox::square(600),
            large: BoundingBox::square(1200),
        }
    }
}

/// Encoder settings shared by every variant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EncodingConfig {
    pub avif_quality: u32,
    pub avif_speed: u8,
    pub jpeg_quality: u32,
}

impl Default for EncodingConfig {
    fn default() -> Self {
        Self {
            avif_quality: 80,
            avif_speed: 6,
            jpeg_quality: 85,
        }
    }
}

/// Placeholder settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PlaceholderConfig {
    /// Edge of the square box the placeholder must fit inside.
    pub size: u32,
    pub quality: u32,
}

impl Default for PlaceholderConfig {
    fn default() -> Self {
        Self {
            size: 20,
            quality: 20,
        }
    }
}

/// Returns the stock default config as a `toml::Value::Table`.
///
/// This is the base layer user overrides are merged on top of.
pub fn stock_defaults_value() -> toml::Value {
    toml::Value::try_from(PipelineConfig::default()).expect("default config must serialize")
}

/// Recursively merge `overlay` on top of `base`.
///
/// - Tables are merged key-by-key (overlay keys override base keys).
/// - Non-table values in overlay replace base values entirely.
/// - Keys in base that are not in overlay are preserved.
pub fn merge_toml(base: toml::Value, overlay: toml::Value) -> toml::Value {
    match (base, overlay) {
        (toml::Value::Table(mut base_table), toml::Value::Table(overlay_table)) => {
            for (key, overlay_val) in overlay_table {
                let merged = match base_table.remove(&key) {
                    Some(base_val) => merge_toml(base_val, overlay_val),
                    None => overlay_val,
                };
                base_table.insert(key, merged);
            }
            toml::Value::Table(base_table)
        }
        (_, overlay) => overlay,
    }
}

/// Load a config file as a raw TOML value.
///
/// Returns `Ok(None)` if the file does not exist.
pub fn load_raw_config(path: &Path) -> Result<Option<toml::Value>, ConfigError> {
    if !path.exists() {
        return Ok(None);
    }
    let content = fs::read_to_string(path)?;
    let value: toml::Value = toml::from_str(&content)?;
    Ok(Some(value))
}

/// Merge an optional overlay onto a base value, then deserialize and validate.
pub fn resolve_config(
    base: toml::Value,
    overlay: Option<toml::Value>,
) -> Result<PipelineConfig, ConfigError> {
    let merged = match overlay {
        Some(ov) => merge_toml(base, ov),
        None => base,
    };
    let config: PipelineConfig = merged.try_into()?;
    config.validate()?;
    Ok(config)
}

/// Load config from a file, falling back to stock defaults when it is absent.
pub fn load_config(path: &Path) -> Result<PipelineConfig, ConfigError> {
    resolve_config(stock_defaults_value(), load_raw_config(path)?)
}

/// Returns a fully-commented stock config file.
///
/// Used by the `gen-config` CLI command.
pub fn stock_config_toml() -> &'static str {
    r##"# variant-pool configuration
# ==========================
#
# Every key is optional. Values here are the stock defaults; delete any
# you do not want to change.

[pool]
# Jobs that may encode at once. Each job can itself use several threads
# while encoding its sizes, so keep this small. Allowed: 1-5.
concurrency = 2
# Waiting jobs held in memory. Further submissions are rejected until the
# queue drains.
max_queue_depth = 256

# Bounding boxes per size. Images are scaled down to fit inside the box,
# preserving aspect ratio, and are never scaled up.
[sizes.small]
width = 150
height = 150

[sizes.medium]
width = 600
height = 600

[sizes.large]
width = 1200
height = 1200

[encoding]
# AVIF quality (1-100).
avif_quality = 80
# rav1e speed preset: 1 is slowest and smallest, 10 is fastest.
avif_speed = 6
# Progressive JPEG fallback quality (1-100).
jpeg_quality = 85

[placeholder]
# The placeholder fits inside a size x size box.
size = 20
quality = 20
"##
}

//! Engine configuration.
//!
//! Every section and field has a default, so an empty (or partial) TOML file
//! is a valid configuration.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Top-level engine configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub viewport: ViewportConfig,
    pub interaction: InteractionConfig,
    pub text: TextConfig,
    pub sync: SyncConfig,
}

impl EngineConfig {
    /// Load configuration from a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref())?;
        let config = Self::from_toml_str(&content)?;
        log::debug!("loaded engine config from {}", path.as_ref().display());
        Ok(config)
    }

    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }
}

/// Pan/zoom limits and wheel tuning.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewportConfig {
    pub min_scale: f64,
    pub max_scale: f64,
    /// Multiplier applied to wheel pan deltas.
    pub wheel_pan_speed: f64,
    /// Base of the exponential wheel zoom curve.
    pub zoom_step: f64,
    /// Zoom sensitivity for coarse (mouse wheel) deltas.
    pub mouse_sensitivity: f64,
    /// Zoom sensitivity for fine (trackpad pinch) deltas.
    pub trackpad_sensitivity: f64,
    /// Deltas with magnitude below this are treated as trackpad input.
    pub trackpad_delta_threshold: f64,
    /// Factor used by the zoom in/out buttons.
    pub button_zoom_factor: f64,
    /// Padding in pixels around content for zoom-to-fit.
    pub fit_padding: f64,
}

impl Default for ViewportConfig {
    fn default() -> Self {
        Self {
            min_scale: 0.1,
            max_scale: 5.0,
            wheel_pan_speed: 1.0,
            zoom_step: 2.0,
            mouse_sensitivity: 0.002,
            trackpad_sensitivity: 0.01,
            trackpad_delta_threshold: 50.0,
            button_zoom_factor: 1.2,
            fit_padding: 50.0,
        }
    }
}

impl ViewportConfig {
    pub fn clamp_scale(&self, scale: f64) -> f64 {
        scale.clamp(self.min_scale, self.max_scale)
    }
}

/// Gesture thresholds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InteractionConfig {
    /// Hit tolerance in screen pixels (divided by scale for world space).
    pub hit_tolerance_px: f64,
    /// Padding around text boxes for hit testing, in world units.
    pub text_hit_padding: f64,
    /// Whether a click inside a shape's bounds may select it without an exact hit.
    pub allow_bounds_fallback: bool,
    /// Drafts must exceed this size on both axes to be committed.
    pub min_draft_size: f64,
    /// Floor for each dimension during corner resize.
    pub min_resize_size: f64,
    /// Inset subtracted from segment and freehand bounds before rescaling.
    pub resize_inset: f64,
    /// Coalescing interval for pan updates and freehand redraws, in milliseconds.
    pub frame_interval_ms: u64,
    /// Ramer-Douglas-Peucker tolerance applied to committed strokes (0 disables).
    pub freehand_simplify_tolerance: f64,
}

impl Default for InteractionConfig {
    fn default() -> Self {
        Self {
            hit_tolerance_px: 6.0,
            text_hit_padding: 4.0,
            allow_bounds_fallback: false,
            min_draft_size: 1.0,
            min_resize_size: 10.0,
            resize_inset: 5.0,
            frame_interval_ms: 8,
            freehand_simplify_tolerance: 0.5,
        }
    }
}

impl InteractionConfig {
    pub fn frame_interval(&self) -> Duration {
        Duration::from_millis(self.frame_interval_ms)
    }
}

/// Defaults for newly created text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TextConfig {
    pub font_family: String,
    pub font_size: f64,
    pub line_height: f64,
}

impl Default for TextConfig {
    fn default() -> Self {
        Self {
            font_family: crate::shapes::Typography::DEFAULT_FONT_FAMILY.to_string(),
            font_size: crate::shapes::Typography::DEFAULT_FONT_SIZE,
            line_height: crate::shapes::Typography::DEFAULT_LINE_HEIGHT,
        }
    }
}

impl TextConfig {
    /// Typography for a freshly placed text shape.
    pub fn typography(&self) -> crate::shapes::Typography {
        crate::shapes::Typography {
            font_family: self.font_family.clone(),
            font_size: self.font_size,
            line_height: self.line_height,
            ..Default::default()
        }
    }
}

/// Persistence timing and retry policy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    pub local_debounce_ms: u64,
    pub remote_debounce_ms: u64,
    pub retry_base_ms: u64,
    pub retry_max_ms: u64,
    /// Retryable remote failures allowed before giving up.
    pub max_attempts: u32,
    /// Cache entries evicted when the local store is full.
    pub eviction_batch: usize,
    /// Version string stamped into saved documents.
    pub document_version: String,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            local_debounce_ms: 1000,
            remote_debounce_ms: 2000,
            retry_base_ms: 1000,
            retry_max_ms: 30_000,
            max_attempts: 5,
            eviction_batch: 4,
            document_version: crate::canvas::DOCUMENT_VERSION.to_string(),
        }
    }
}

impl SyncConfig {
    pub fn local_debounce(&self) -> Duration {
        Duration::from_millis(self.local_debounce_ms)
    }

    pub fn remote_debounce(&self) -> Duration {
        Duration::from_millis(self.remote_debounce_ms)
    }

    /// Backoff before retry number `attempt` (1-based): `base * 2^(attempt-1)`, capped.
    pub fn backoff(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(31);
        let delay = self.retry_base_ms.saturating_mul(1u64 << exponent);
        Duration::from_millis(delay.min(self.retry_max_ms))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_empty_config_is_default() {
        let config = EngineConfig::from_toml_str("").unwrap();
        assert_eq!(config, EngineConfig::default());
    }

    #[test]
    fn test_partial_section_keeps_other_defaults() {
        let config = EngineConfig::from_toml_str(
            r#"
            [viewport]
            max_scale = 8.0

            [sync]
            max_attempts = 3
            "#,
        )
        .unwrap();
        assert_eq!(config.viewport.max_scale, 8.0);
        assert_eq!(config.viewport.min_scale, 0.1);
        assert_eq!(config.sync.max_attempts, 3);
        assert_eq!(config.sync.local_debounce_ms, 1000);
    }

    #[test]
    fn test_parse_error() {
        let err = EngineConfig::from_toml_str("[viewport]\nmax_scale = \"big\"").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[interaction]\nhit_tolerance_px = 10.0").unwrap();
        let config = EngineConfig::load(file.path()).unwrap();
        assert_eq!(config.interaction.hit_tolerance_px, 10.0);
    }

    #[test]
    fn test_load_missing_file() {
        let err = EngineConfig::load("/definitely/not/here.toml").unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
    }

    #[test]
    fn test_backoff_doubles_and_caps() {
        let sync = SyncConfig::default();
        assert_eq!(sync.backoff(1), Duration::from_millis(1000));
        assert_eq!(sync.backoff(2), Duration::from_millis(2000));
        assert_eq!(sync.backoff(3), Duration::from_millis(4000));
        assert_eq!(sync.backoff(10), Duration::from_millis(30_000));
    }
}

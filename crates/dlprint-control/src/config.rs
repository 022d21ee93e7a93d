//! Print job configuration.

use std::path::Path;
use std::time::Duration;

use dlprint_slicer::{LayerColor, DEFAULT_HEIGHT, DEFAULT_WIDTH};
use serde::{Deserialize, Serialize};

use crate::error::{ControlError, Result};

/// Stepper steps for one hundredth of an inch of stage travel.
pub const STEPS_PER_HUNDREDTH_INCH: i64 = 720;

/// Fixed parameters of one print job.
///
/// Every field has a default, so a TOML file only needs the values it
/// changes:
///
/// ```toml
/// layer_step = 0.02
/// exposure_ms = 2500
/// color = "highlight"
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PrintConfig {
    /// Height of the first layer.
    pub start_height: f64,
    /// Last height to print; unbounded when absent.
    pub end_height: Option<f64>,
    /// Distance between layers.
    pub layer_step: f64,
    /// Exposure per layer in milliseconds.
    pub exposure_ms: u64,
    /// Color of lit pixels.
    pub color: LayerColor,
    /// Stepper steps sent after each layer.
    pub steps_per_layer: i64,
    /// Frame width in pixels.
    pub width: usize,
    /// Frame height in pixels.
    pub height: usize,
    /// Grace period beyond the exposure to wait for an acknowledgment.
    pub display_timeout_ms: u64,
    /// How long one stage move may take.
    pub actuator_timeout_ms: u64,
}

impl Default for PrintConfig {
    fn default() -> Self {
        Self {
            start_height: 0.0,
            end_height: None,
            layer_step: 0.01,
            exposure_ms: 1000,
            color: LayerColor::Normal,
            steps_per_layer: STEPS_PER_HUNDREDTH_INCH,
            width: DEFAULT_WIDTH,
            height: DEFAULT_HEIGHT,
            display_timeout_ms: 30_000,
            actuator_timeout_ms: 30_000,
        }
    }
}

impl PrintConfig {
    /// Parse and validate a TOML document.
    pub fn from_toml_str(s: &str) -> Result<Self> {
        let config: Self = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a TOML file.
    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path.as_ref())?;
        Self::from_toml_str(&text)
    }

    /// Check that the values describe a runnable job.
    pub fn validate(&self) -> Result<()> {
        if !self.start_height.is_finite() {
            return Err(ControlError::Config("start_height must be finite".into()));
        }
        if !(self.layer_step.is_finite() && self.layer_step > 0.0) {
            return Err(ControlError::Config("layer_step must be positive".into()));
        }
        if let Some(end) = self.end_height {
            if !end.is_finite() || end < self.start_height {
                return Err(ControlError::Config(format!(
                    "end_height {end} must not be below start_height {}",
                    self.start_height
                )));
            }
        }
        if self.exposure_ms == 0 {
            return Err(ControlError::Config("exposure_ms must be positive".into()));
        }
        if self.width < 2 || self.height < 2 {
            return Err(ControlError::Config(format!(
                "frame size {}x{} is too small",
                self.width, self.height
            )));
        }
        if self.display_timeout_ms == 0 || self.actuator_timeout_ms == 0 {
            return Err(ControlError::Config("timeouts must be positive".into()));
        }
        Ok(())
    }

    /// Height of layer `index`.
    pub fn height_of(&self, index: u64) -> f64 {
        self.start_height + index as f64 * self.layer_step
    }

    /// Exposure per layer.
    pub fn exposure(&self) -> Duration {
        Duration::from_millis(self.exposure_ms)
    }

    /// Longest wait for a frame acknowledgment: exposure plus grace.
    pub fn acknowledgment_deadline(&self) -> Duration {
        self.exposure() + Duration::from_millis(self.display_timeout_ms)
    }

    /// Longest wait for one stage move.
    pub fn actuator_timeout(&self) -> Duration {
        Duration::from_millis(self.actuator_timeout_ms)
    }
}

use serde::{Deserialize, Serialize};

use crate::error::{DetectionError, Result};

/// Tunable knobs for the room extractor (component B), §6 "recognized
/// options". Per-call, serde-deserializable from the wire with the
/// spec's defaults, validated on construction rather than at use time.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ExtractorConfig {
    #[serde(default = "default_min_room_area")]
    pub min_room_area: u64,
    #[serde(default = "default_kernel_size")]
    pub kernel_size: u32,
    #[serde(default = "default_epsilon_factor")]
    pub epsilon_factor: f64,
}

fn default_min_room_area() -> u64 {
    2000
}

fn default_kernel_size() -> u32 {
    3
}

fn default_epsilon_factor() -> f64 {
    0.01
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self {
            min_room_area: default_min_room_area(),
            kernel_size: default_kernel_size(),
            epsilon_factor: default_epsilon_factor(),
        }
    }
}

impl ExtractorConfig {
    /// Validate the spec's constraints: `A_min >= 100`, `kernel_size`
    /// odd and `>= 1`, `epsilon_factor` in `(0, 1)`.
    pub fn validate(&self) -> Result<()> {
        if self.min_room_area < 100 {
            return Err(DetectionError::validation(format!(
                "min_room_area must be >= 100, got {}",
                self.min_room_area
            )));
        }
        if self.kernel_size == 0 || self.kernel_size % 2 == 0 {
            return Err(DetectionError::validation(format!(
                "kernel_size must be odd and >= 1, got {}",
                self.kernel_size
            )));
        }
        if !(self.epsilon_factor > 0.0 && self.epsilon_factor < 1.0) {
            return Err(DetectionError::validation(format!(
                "epsilon_factor must be in (0, 1), got {}",
                self.epsilon_factor
            )));
        }
        Ok(())
    }
}

/// The two detector confidence defaults of §4.1: permissive for the
/// wall variant (the extractor tolerates over-detection), conservative
/// for the direct room variant (user-facing output).
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct DetectorConfig {
    pub confidence_threshold: f64,
}

impl DetectorConfig {
    pub const WALL_DEFAULT_THRESHOLD: f64 = 0.10;
    pub const ROOM_DEFAULT_THRESHOLD: f64 = 0.50;

    pub fn for_wall_detector() -> Self {
        Self {
            confidence_threshold: Self::WALL_DEFAULT_THRESHOLD,
        }
    }

    pub fn for_direct_detector() -> Self {
        Self {
            confidence_threshold: Self::ROOM_DEFAULT_THRESHOLD,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.confidence_threshold) {
            return Err(DetectionError::validation(format!(
                "confidence_threshold must be in [0, 1], got {}",
                self.confidence_threshold
            )));
        }
        Ok(())
    }
}

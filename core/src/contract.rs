//! Component D: the detection contract. Routes a request to the v1
//! pipeline (wall detector A -> room extractor B) or the v2 pipeline
//! (direct room detector C), and normalizes both into one response
//! shape so callers never need to know which version ran.

use image::DynamicImage;
use serde::{Deserialize, Serialize};

use crate::config::{DetectorConfig, ExtractorConfig};
use crate::direct_detector::DirectRoomDetector;
use crate::error::{DetectionError, Result};
use crate::room_extractor;
use crate::types::{Canvas, Room};
use crate::wall_detector::WallDetector;

/// Which pipeline produced a [`DetectionResponse`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PipelineVersion {
    V1,
    V2,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectionOptions {
    #[serde(default)]
    pub version: Option<PipelineVersion>,
    #[serde(default)]
    pub extractor: Option<ExtractorConfig>,
    #[serde(default)]
    pub wall_confidence_threshold: Option<f64>,
    #[serde(default)]
    pub room_confidence_threshold: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectionResponse {
    pub version: PipelineVersion,
    pub rooms: Vec<Room>,
    pub canvas_width: u32,
    pub canvas_height: u32,
    pub processing_time_ms: f64,
}

/// Holds at most one loaded model per pipeline. A `None` field means
/// that pipeline version is unavailable; routing a request to it
/// returns [`DetectionError::ModelUnavailable`] rather than panicking.
pub struct DetectionRouter {
    wall_detector: Option<WallDetector>,
    direct_detector: Option<DirectRoomDetector>,
}

impl DetectionRouter {
    pub fn new(wall_detector: Option<WallDetector>, direct_detector: Option<DirectRoomDetector>) -> Self {
        Self { wall_detector, direct_detector }
    }

    pub fn v1_available(&self) -> bool {
        self.wall_detector.is_some()
    }

    pub fn v2_available(&self) -> bool {
        self.direct_detector.is_some()
    }

    pub fn detect(&self, image: &DynamicImage, options: &DetectionOptions) -> Result<DetectionResponse> {
        match options.version.unwrap_or(PipelineVersion::V1) {
            PipelineVersion::V1 => self.detect_v1(image, options),
            PipelineVersion::V2 => self.detect_v2(image, options),
        }
    }

    fn detect_v1(&self, image: &DynamicImage, options: &DetectionOptions) -> Result<DetectionResponse> {
        let detector = self
            .wall_detector
            .as_ref()
            .ok_or_else(|| DetectionError::model_unavailable("v1 wall detector is not loaded"))?;

        let canvas = WallDetector::canvas_of(image)?;
        let mut detector_cfg = DetectorConfig::for_wall_detector();
        if let Some(t) = options.wall_confidence_threshold {
            detector_cfg.confidence_threshold = t;
        }
        detector_cfg.validate()?;

        let start_a = std::time::Instant::now();
        let walls = detector.detect(image, detector_cfg.confidence_threshold)?;
        let elapsed_a = start_a.elapsed().as_secs_f64() * 1000.0;

        let extractor_cfg = options.extractor.unwrap_or_default();
        let (rooms, elapsed_b) = room_extractor::extract_rooms(&walls, canvas, &extractor_cfg)?;

        Ok(DetectionResponse {
            version: PipelineVersion::V1,
            rooms,
            canvas_width: canvas.width,
            canvas_height: canvas.height,
            processing_time_ms: elapsed_a + elapsed_b,
        })
    }

    fn detect_v2(&self, image: &DynamicImage, options: &DetectionOptions) -> Result<DetectionResponse> {
        let detector = self
            .direct_detector
            .as_ref()
            .ok_or_else(|| DetectionError::model_unavailable("v2 direct room detector is not loaded"))?;

        let canvas = WallDetector::canvas_of(image)?;
        let mut detector_cfg = DetectorConfig::for_direct_detector();
        if let Some(t) = options.room_confidence_threshold {
            detector_cfg.confidence_threshold = t;
        }
        detector_cfg.validate()?;
        let extractor_cfg = options.extractor.unwrap_or_default();
        extractor_cfg.validate()?;

        let start = std::time::Instant::now();
        let rooms = detector.detect(image, detector_cfg.confidence_threshold, extractor_cfg.min_room_area)?;
        let elapsed = start.elapsed().as_secs_f64() * 1000.0;

        Ok(DetectionResponse {
            version: PipelineVersion::V2,
            rooms,
            canvas_width: canvas.width,
            canvas_height: canvas.height,
            processing_time_ms: elapsed,
        })
    }

    /// Run only the wall detector, bypassing room extraction entirely
    /// (the `detect-walls` debug endpoint, §6).
    pub fn detect_walls(
        &self,
        image: &DynamicImage,
        confidence_threshold: Option<f64>,
    ) -> Result<(Vec<crate::types::Wall>, Canvas, f64)> {
        let detector = self
            .wall_detector
            .as_ref()
            .ok_or_else(|| DetectionError::model_unavailable("v1 wall detector is not loaded"))?;

        let canvas = WallDetector::canvas_of(image)?;
        let mut detector_cfg = DetectorConfig::for_wall_detector();
        if let Some(t) = confidence_threshold {
            detector_cfg.confidence_threshold = t;
        }
        detector_cfg.validate()?;

        let start = std::time::Instant::now();
        let walls = detector.detect(image, detector_cfg.confidence_threshold)?;
        let elapsed = start.elapsed().as_secs_f64() * 1000.0;
        Ok((walls, canvas, elapsed))
    }

    /// Run the extractor directly on caller-supplied wall boxes, bypassing
    /// detection entirely (the `convert-to-rooms` endpoint, §6.3).
    pub fn convert(
        &self,
        walls: &[crate::types::Wall],
        canvas: Canvas,
        extractor_cfg: &ExtractorConfig,
    ) -> Result<(Vec<Room>, f64)> {
        room_extractor::extract_rooms(walls, canvas, extractor_cfg)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn v1_without_a_loaded_wall_detector_is_unavailable() {
        let router = DetectionRouter::new(None, None);
        assert!(!router.v1_available());
        assert!(!router.v2_available());
    }

    #[test]
    fn convert_runs_the_extractor_directly() {
        let router = DetectionRouter::new(None, None);
        let canvas = Canvas::new(200, 200).unwrap();
        let walls = vec![
            crate::types::Wall::new("w1", crate::types::BoundingBox::new(0, 0, 200, 5), 1.0),
            crate::types::Wall::new("w2", crate::types::BoundingBox::new(0, 195, 200, 200), 1.0),
            crate::types::Wall::new("w3", crate::types::BoundingBox::new(0, 0, 5, 200), 1.0),
            crate::types::Wall::new("w4", crate::types::BoundingBox::new(195, 0, 200, 200), 1.0),
        ];
        let (rooms, _) = router.convert(&walls, canvas, &ExtractorConfig::default()).unwrap();
        assert_eq!(rooms.len(), 1);
    }
}

//! Request/response shapes for the three HTTP endpoints (§6). These
//! are deliberately distinct from [`vision_core`]'s domain types: the
//! wire format is a contract with callers, the domain types are free
//! to evolve independently of it.

use serde::{Deserialize, Serialize};
use vision_core::{BoundingBox, DetectionError, DetectionOptions, ExtractorConfig, PipelineVersion, Room, Wall};

fn default_true() -> bool {
    true
}

/// Validates the caller-supplied `image_format` hint against the set
/// §6 documents (`"png"|"jpg"|"jpeg"`), case-insensitively. `None` is
/// always accepted: the field is advisory, not required, since the
/// image bytes themselves are format-sniffed on decode.
pub fn validate_image_format(image_format: Option<&str>) -> Result<(), DetectionError> {
    match image_format {
        None => Ok(()),
        Some(fmt) if matches!(fmt.to_ascii_lowercase().as_str(), "png" | "jpg" | "jpeg") => Ok(()),
        Some(fmt) => Err(DetectionError::validation(format!(
            "unsupported image_format '{fmt}': expected one of png, jpg, jpeg"
        ))),
    }
}

#[derive(Debug, Deserialize)]
pub struct DetectRoomsRequest {
    pub image: String,
    #[serde(default)]
    pub version: Option<String>,
    pub confidence_threshold: Option<f64>,
    pub min_room_area: Option<u64>,
    #[serde(default = "default_true")]
    pub return_visualization: bool,
    #[serde(default)]
    pub enable_refinement: bool,
    #[serde(default)]
    pub image_format: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct DetectRoomsMetadata {
    pub image_dimensions: [u32; 2],
    pub model_type: &'static str,
    pub refinement_applied: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub intermediate_detections: Option<usize>,
}

#[derive(Debug, Serialize)]
pub struct DetectRoomsResponse {
    pub success: bool,
    pub rooms: Vec<Room>,
    pub total_rooms: usize,
    pub processing_time_ms: f64,
    pub model_version: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub visualization: Option<String>,
    pub metadata: DetectRoomsMetadata,
}

impl DetectRoomsRequest {
    pub fn detection_options(&self) -> DetectionOptions {
        DetectionOptions {
            version: match self.version.as_deref() {
                Some("v2") => Some(PipelineVersion::V2),
                _ => Some(PipelineVersion::V1),
            },
            extractor: self.min_room_area.map(|min_room_area| ExtractorConfig {
                min_room_area,
                ..ExtractorConfig::default()
            }),
            wall_confidence_threshold: self.confidence_threshold,
            room_confidence_threshold: self.confidence_threshold,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub code: &'static str,
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub error: ErrorBody,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model_version: Option<&'static str>,
}

#[derive(Debug, Deserialize)]
pub struct DetectWallsRequest {
    pub image: String,
    pub confidence_threshold: Option<f64>,
    #[serde(default)]
    pub image_format: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct DetectWallsResponse {
    pub walls: Vec<Wall>,
    pub total_walls: usize,
    pub image_dimensions: [u32; 2],
    pub processing_time_ms: f64,
}

#[derive(Debug, Deserialize)]
pub struct ConvertToRoomsRequest {
    pub walls: Vec<WireWall>,
    pub image_dimensions: [u32; 2],
    pub min_room_area: Option<u64>,
    #[serde(default = "default_true")]
    pub return_visualization: bool,
}

#[derive(Debug, Deserialize)]
pub struct WireWall {
    pub id: String,
    pub bounding_box: [i64; 4],
    #[serde(default = "default_confidence")]
    pub confidence: f64,
}

fn default_confidence() -> f64 {
    1.0
}

impl From<WireWall> for Wall {
    fn from(w: WireWall) -> Self {
        let [x1, y1, x2, y2] = w.bounding_box;
        Wall::new(w.id, BoundingBox::new(x1, y1, x2, y2), w.confidence)
    }
}

#[derive(Debug, Serialize)]
pub struct ConvertToRoomsResponse {
    pub success: bool,
    pub rooms: Vec<Room>,
    pub total_rooms: usize,
    pub processing_time_ms: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub visualization: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_version_defaults_to_v1() {
        let req = DetectRoomsRequest {
            image: String::new(),
            version: None,
            confidence_threshold: None,
            min_room_area: None,
            return_visualization: true,
            enable_refinement: false,
            image_format: None,
        };
        assert_eq!(req.detection_options().version, Some(PipelineVersion::V1));
    }

    #[test]
    fn v2_string_maps_to_v2_variant() {
        let req = DetectRoomsRequest {
            image: String::new(),
            version: Some("v2".to_string()),
            confidence_threshold: None,
            min_room_area: None,
            return_visualization: true,
            enable_refinement: false,
            image_format: None,
        };
        assert_eq!(req.detection_options().version, Some(PipelineVersion::V2));
    }

    #[test]
    fn wire_wall_converts_box_fields_in_order() {
        let wire = WireWall { id: "w1".into(), bounding_box: [1, 2, 3, 4], confidence: 0.5 };
        let wall: Wall = wire.into();
        assert_eq!(wall.bounding_box, BoundingBox::new(1, 2, 3, 4));
        assert_eq!(wall.confidence, 0.5);
    }

    #[test]
    fn missing_image_format_is_accepted() {
        assert!(validate_image_format(None).is_ok());
    }

    #[test]
    fn known_image_formats_are_accepted_case_insensitively() {
        assert!(validate_image_format(Some("png")).is_ok());
        assert!(validate_image_format(Some("JPG")).is_ok());
        assert!(validate_image_format(Some("Jpeg")).is_ok());
    }

    #[test]
    fn unknown_image_format_is_rejected() {
        let err = validate_image_format(Some("bmp")).unwrap_err();
        assert_eq!(err.code(), "ValidationError");
    }
}

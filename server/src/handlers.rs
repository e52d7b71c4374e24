use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use vision_core::{DetectionError, ExtractorConfig, PipelineVersion};

use crate::error::ApiError;
use crate::state::AppState;
use crate::wire::{
    validate_image_format, ConvertToRoomsRequest, ConvertToRoomsResponse, DetectRoomsMetadata, DetectRoomsRequest,
    DetectRoomsResponse, DetectWallsRequest, DetectWallsResponse,
};

pub async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

fn decode_image(base64_image: &str) -> Result<image::DynamicImage, ApiError> {
    let bytes = STANDARD
        .decode(base64_image)
        .map_err(|e| DetectionError::validation(format!("invalid base64 image: {e}")))?;
    let image = image::load_from_memory(&bytes)?;
    Ok(image)
}

pub async fn detect_rooms(
    State(state): State<Arc<AppState>>,
    Json(req): Json<DetectRoomsRequest>,
) -> Result<Json<DetectRoomsResponse>, ApiError> {
    validate_image_format(req.image_format.as_deref())?;
    let image = decode_image(&req.image)?;
    let options = req.detection_options();
    let model_version = match options.version {
        Some(PipelineVersion::V2) => "v2",
        _ => "v1",
    };

    let result = state.router.detect(&image, &options)?;

    let visualization = if req.return_visualization {
        let base = image.to_rgba8();
        Some(vision_core::visualizer::render(&base, &result.rooms, state.label_font.as_ref())?)
    } else {
        None
    };

    Ok(Json(DetectRoomsResponse {
        success: true,
        total_rooms: result.rooms.len(),
        rooms: result.rooms,
        processing_time_ms: result.processing_time_ms,
        model_version,
        visualization,
        metadata: DetectRoomsMetadata {
            image_dimensions: [result.canvas_width, result.canvas_height],
            model_type: model_version,
            refinement_applied: req.enable_refinement && model_version == "v2",
            intermediate_detections: None,
        },
    }))
}

pub async fn detect_walls(
    State(state): State<Arc<AppState>>,
    Json(req): Json<DetectWallsRequest>,
) -> Result<Json<DetectWallsResponse>, ApiError> {
    validate_image_format(req.image_format.as_deref())?;
    let image = decode_image(&req.image)?;
    let (walls, canvas, elapsed) = state.router.detect_walls(&image, req.confidence_threshold)?;

    Ok(Json(DetectWallsResponse {
        total_walls: walls.len(),
        walls,
        image_dimensions: [canvas.width, canvas.height],
        processing_time_ms: elapsed,
    }))
}

pub async fn convert_to_rooms(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ConvertToRoomsRequest>,
) -> Result<Json<ConvertToRoomsResponse>, ApiError> {
    let [w, h] = req.image_dimensions;
    let canvas = vision_core::Canvas::new(w, h)?;

    let mut extractor_cfg = ExtractorConfig::default();
    if let Some(min_room_area) = req.min_room_area {
        extractor_cfg.min_room_area = min_room_area;
    }

    let walls: Vec<vision_core::Wall> = req.walls.into_iter().map(Into::into).collect();
    let (rooms, elapsed) = state.router.convert(&walls, canvas, &extractor_cfg)?;

    let visualization = if req.return_visualization {
        let base = image::RgbaImage::from_pixel(w, h, image::Rgba([255, 255, 255, 255]));
        Some(vision_core::visualizer::render(&base, &rooms, state.label_font.as_ref())?)
    } else {
        None
    };

    Ok(Json(ConvertToRoomsResponse {
        success: true,
        total_rooms: rooms.len(),
        rooms,
        processing_time_ms: elapsed,
        visualization,
    }))
}

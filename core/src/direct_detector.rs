//! Component C: a model that predicts rooms directly from a raster
//! image, bypassing the wall-detection-then-extraction pipeline.
//!
//! Mirrors [`crate::wall_detector::WallDetector`]'s load/run shape so
//! the two detectors are interchangeable behind [`crate::contract`],
//! but decodes its output into [`Room`] records instead of [`Wall`]
//! boxes. Models that only emit boxes (no per-instance mask) fall back
//! to a 4-vertex rectangle room, which is a legitimate room shape, not
//! an error.

use image::{DynamicImage, GenericImageView};
use ort::session::Session;
use ort::value::Value;

use crate::error::{DetectionError, Result};
use crate::types::{BoundingBox, Canvas, Point, Room, ShapeType};

const INPUT_SIDE: u32 = 640;
const IOU_THRESHOLD: f32 = 0.5;

pub struct DirectRoomDetector {
    session: Session,
}

impl DirectRoomDetector {
    pub fn load(model_path: &str) -> Result<Self> {
        let session = Session::builder()
            .map_err(|e| DetectionError::model_unavailable(format!("session builder: {e}")))?
            .commit_from_file(model_path)
            .map_err(|e| {
                DetectionError::model_unavailable(format!(
                    "failed to load direct room detector model at {model_path}: {e}"
                ))
            })?;
        tracing::info!(model_path, "direct room detector model loaded");
        Ok(Self { session })
    }

    /// `min_room_area` applies the same `A_min` semantics as the room
    /// extractor (component B) so the two pipelines stay interchangeable
    /// (spec §4.3): a room below the threshold is dropped here exactly
    /// as it would be after morphological filtering in B.
    pub fn detect(&self, image: &DynamicImage, confidence_threshold: f64, min_room_area: u64) -> Result<Vec<Room>> {
        let (orig_w, orig_h) = image.dimensions();
        let canvas = Canvas::new(orig_w, orig_h)?;
        let (tensor, scale, pad_x, pad_y) = crate::wall_detector::letterbox_to_tensor(image, INPUT_SIDE);

        let input_name = self
            .session
            .inputs
            .first()
            .map(|i| i.name.clone())
            .ok_or_else(|| DetectionError::detection("model has no declared inputs"))?;
        let input_value = Value::from_array(tensor)
            .map_err(|e| DetectionError::detection(format!("failed to build input tensor: {e}")))?;

        let inputs = ort::inputs![input_name.as_str() => input_value]
            .map_err(|e| DetectionError::detection(format!("failed to build session inputs: {e}")))?;
        let outputs = self
            .session
            .run(inputs)
            .map_err(|e| DetectionError::detection(format!("inference failed: {e}")))?;

        let (_, output) = outputs
            .iter()
            .next()
            .ok_or_else(|| DetectionError::detection("model produced no outputs"))?;
        let tensor = output
            .try_extract_tensor::<f32>()
            .map_err(|e| DetectionError::detection(format!("unexpected output tensor: {e}")))?;

        let shape = tensor.shape().to_vec();
        if shape.len() != 3 || shape[2] < 5 {
            return Err(DetectionError::detection("unexpected direct-detector output shape"));
        }
        let view = tensor.view().to_owned();
        let count = shape[1];

        let mut boxes = Vec::new();
        for i in 0..count {
            let conf = view[[0, i, 4]];
            if (conf as f64) < confidence_threshold {
                continue;
            }
            let cx = view[[0, i, 0]];
            let cy = view[[0, i, 1]];
            let w = view[[0, i, 2]];
            let h = view[[0, i, 3]];

            let x1 = ((cx - w / 2.0 - pad_x) / scale).round() as i64;
            let y1 = ((cy - h / 2.0 - pad_y) / scale).round() as i64;
            let x2 = ((cx + w / 2.0 - pad_x) / scale).round() as i64;
            let y2 = ((cy + h / 2.0 - pad_y) / scale).round() as i64;

            let x1 = x1.clamp(0, orig_w as i64 - 1);
            let y1 = y1.clamp(0, orig_h as i64 - 1);
            let x2 = x2.clamp(x1 + 1, orig_w as i64);
            let y2 = y2.clamp(y1 + 1, orig_h as i64);
            if x2 <= x1 || y2 <= y1 {
                continue;
            }
            boxes.push((BoundingBox::new(x1, y1, x2, y2), conf));
        }

        let kept = suppress_overlaps(boxes, IOU_THRESHOLD);
        Ok(rooms_from_boxes(kept, canvas, min_room_area))
    }
}

/// Build final `Room` records from NMS-survived boxes, applying the
/// same `[min_room_area, 0.9 * W * H]` bound the room extractor (B)
/// applies, so the two pipelines stay interchangeable (spec §4.3).
fn rooms_from_boxes(boxes: Vec<(BoundingBox, f32)>, canvas: Canvas, min_room_area: u64) -> Vec<Room> {
    let max_area = (canvas.area() as f64 * 0.9) as u64;

    let mut rooms = Vec::new();
    for (bbox, conf) in boxes {
        let area = (bbox.width() * bbox.height()) as u64;
        if area < min_room_area || area > max_area {
            continue;
        }
        let polygon = rectangle_polygon(bbox);
        let centroid = Point {
            x: (bbox.x1 + bbox.x2) / 2,
            y: (bbox.y1 + bbox.y2) / 2,
        };
        rooms.push(Room {
            id: Room::room_id(rooms.len()),
            polygon,
            bounding_box: bbox,
            area_pixels: area,
            centroid,
            confidence: conf as f64, // the detector's own score; no contour to score by vertex count
            shape_type: ShapeType::Rectangle,
            num_vertices: 4,
        });
    }
    rooms
}

fn rectangle_polygon(bbox: BoundingBox) -> Vec<Point> {
    vec![
        Point { x: bbox.x1, y: bbox.y1 },
        Point { x: bbox.x2, y: bbox.y1 },
        Point { x: bbox.x2, y: bbox.y2 },
        Point { x: bbox.x1, y: bbox.y2 },
    ]
}

fn suppress_overlaps(mut boxes: Vec<(BoundingBox, f32)>, iou_threshold: f32) -> Vec<(BoundingBox, f32)> {
    boxes.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
    let mut kept: Vec<(BoundingBox, f32)> = Vec::new();
    for (bbox, conf) in boxes {
        let overlaps = kept.iter().any(|(k, _)| box_iou(*k, bbox) >= iou_threshold);
        if !overlaps {
            kept.push((bbox, conf));
        }
    }
    kept
}

fn box_iou(a: BoundingBox, b: BoundingBox) -> f32 {
    let ix1 = a.x1.max(b.x1);
    let iy1 = a.y1.max(b.y1);
    let ix2 = a.x2.min(b.x2);
    let iy2 = a.y2.min(b.y2);
    let iw = (ix2 - ix1).max(0);
    let ih = (iy2 - iy1).max(0);
    let inter = (iw * ih) as f32;
    let union = (a.width() * a.height() + b.width() * b.height()) as f32 - inter;
    if union <= 0.0 {
        0.0
    } else {
        inter / union
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rectangle_polygon_has_four_vertices_in_winding_order() {
        let bbox = BoundingBox::new(10, 20, 110, 220);
        let poly = rectangle_polygon(bbox);
        assert_eq!(poly.len(), 4);
        assert_eq!(poly[0], Point { x: 10, y: 20 });
        assert_eq!(poly[2], Point { x: 110, y: 220 });
    }

    #[test]
    fn suppress_overlaps_keeps_highest_confidence() {
        let a = (BoundingBox::new(0, 0, 100, 100), 0.9);
        let b = (BoundingBox::new(5, 5, 105, 105), 0.5);
        let c = (BoundingBox::new(500, 500, 600, 600), 0.8);
        let kept = suppress_overlaps(vec![a, b, c], 0.5);
        assert_eq!(kept.len(), 2);
    }

    #[test]
    fn box_iou_of_identical_boxes_is_one() {
        let a = BoundingBox::new(0, 0, 50, 50);
        assert!((box_iou(a, a) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn rooms_from_boxes_drops_areas_below_min_room_area() {
        let canvas = Canvas::new(1000, 1000).unwrap();
        let tiny = (BoundingBox::new(0, 0, 10, 5), 0.9); // area 50
        let normal = (BoundingBox::new(0, 0, 100, 100), 0.9); // area 10000
        let rooms = rooms_from_boxes(vec![tiny, normal], canvas, 2000);
        assert_eq!(rooms.len(), 1);
        assert_eq!(rooms[0].area_pixels, 10000);
    }

    #[test]
    fn rooms_from_boxes_drops_areas_above_ninety_percent_of_canvas() {
        let canvas = Canvas::new(100, 100).unwrap(); // area 10000, 90% = 9000
        let huge = (BoundingBox::new(0, 0, 100, 95), 0.9); // area 9500
        let rooms = rooms_from_boxes(vec![huge], canvas, 100);
        assert!(rooms.is_empty());
    }
}

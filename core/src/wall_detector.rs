//! Component A: an ONNX wall detector over a raster image.
//!
//! The session is loaded once at process startup and never touches
//! interior mutability afterwards beyond `ort`'s own thread-safety
//! contract (`Session::run` takes `&self`); a failed load should stop
//! the process from serving traffic rather than limp along degraded.

use image::{DynamicImage, GenericImageView};
use ndarray::{Array, IxDyn};
use ort::session::{Session, SessionOutputs};
use ort::value::Value;

use crate::error::{DetectionError, Result};
use crate::types::{BoundingBox, Canvas, Wall};

const INPUT_SIDE: u32 = 640;
const NMS_IOU_THRESHOLD: f32 = 0.45;

/// Loads and runs a YOLO-family wall-box detector.
pub struct WallDetector {
    session: Session,
}

impl WallDetector {
    /// Build a session from a model file on disk. Intended to run once
    /// at startup; any error here should be treated as fatal by the caller.
    pub fn load(model_path: &str) -> Result<Self> {
        let session = Session::builder()
            .map_err(|e| DetectionError::model_unavailable(format!("session builder: {e}")))?
            .commit_from_file(model_path)
            .map_err(|e| {
                DetectionError::model_unavailable(format!(
                    "failed to load wall detector model at {model_path}: {e}"
                ))
            })?;
        tracing::info!(model_path, "wall detector model loaded");
        Ok(Self { session })
    }

    /// Run inference over `image`, returning wall boxes above
    /// `confidence_threshold` in the image's own pixel coordinates.
    pub fn detect(&self, image: &DynamicImage, confidence_threshold: f64) -> Result<Vec<Wall>> {
        let (orig_w, orig_h) = image.dimensions();
        let (tensor, scale, pad_x, pad_y) = letterbox_to_tensor(image, INPUT_SIDE);

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

        let detections = decode_detections(&outputs, confidence_threshold as f32)?;
        let kept = non_maximum_suppression(detections, NMS_IOU_THRESHOLD);

        let walls = kept
            .into_iter()
            .enumerate()
            .filter_map(|(i, d)| {
                let bbox = d.to_bounding_box(scale, pad_x, pad_y, orig_w, orig_h)?;
                Some(Wall::new(format!("wall_{:03}", i + 1), bbox, d.confidence as f64))
            })
            .collect();

        Ok(walls)
    }

    /// Canvas the detector reasons over, for callers that need it before
    /// the wall list is available (e.g. to size a placeholder response).
    pub fn canvas_of(image: &DynamicImage) -> Result<Canvas> {
        let (w, h) = image.dimensions();
        Canvas::new(w, h)
    }
}

struct RawDetection {
    cx: f32,
    cy: f32,
    w: f32,
    h: f32,
    confidence: f32,
}

impl RawDetection {
    fn to_bounding_box(
        &self,
        scale: f32,
        pad_x: f32,
        pad_y: f32,
        orig_w: u32,
        orig_h: u32,
    ) -> Option<BoundingBox> {
        let x1 = ((self.cx - self.w / 2.0 - pad_x) / scale).round() as i64;
        let y1 = ((self.cy - self.h / 2.0 - pad_y) / scale).round() as i64;
        let x2 = ((self.cx + self.w / 2.0 - pad_x) / scale).round() as i64;
        let y2 = ((self.cy + self.h / 2.0 - pad_y) / scale).round() as i64;

        let x1 = x1.clamp(0, orig_w as i64 - 1);
        let y1 = y1.clamp(0, orig_h as i64 - 1);
        let x2 = x2.clamp(x1 + 1, orig_w as i64);
        let y2 = y2.clamp(y1 + 1, orig_h as i64);

        if x2 <= x1 || y2 <= y1 {
            return None;
        }
        Some(BoundingBox::new(x1, y1, x2, y2))
    }
}

/// Resize preserving aspect ratio onto a square `side x side` canvas,
/// padding with mid-gray, and produce an NCHW f32 tensor in `[0, 1]`.
pub(crate) fn letterbox_to_tensor(image: &DynamicImage, side: u32) -> (Array<f32, IxDyn>, f32, f32, f32) {
    let (w, h) = image.dimensions();
    let scale = (side as f32 / w as f32).min(side as f32 / h as f32);
    let new_w = (w as f32 * scale).round() as u32;
    let new_h = (h as f32 * scale).round() as u32;

    let resized = image.resize_exact(new_w.max(1), new_h.max(1), image::imageops::FilterType::Triangle);
    let pad_x = ((side - new_w) / 2) as f32;
    let pad_y = ((side - new_h) / 2) as f32;

    let mut canvas = DynamicImage::new_rgb8(side, side).to_rgb8();
    for p in canvas.pixels_mut() {
        *p = image::Rgb([114, 114, 114]);
    }
    image::imageops::overlay(&mut canvas, &resized.to_rgb8(), pad_x as i64, pad_y as i64);

    let mut tensor = Array::zeros(IxDyn(&[1, 3, side as usize, side as usize]));
    for y in 0..side {
        for x in 0..side {
            let p = canvas.get_pixel(x, y);
            for c in 0..3 {
                tensor[[0, c, y as usize, x as usize]] = p[c] as f32 / 255.0;
            }
        }
    }
    (tensor, scale, pad_x, pad_y)
}

/// Decode a `[1, N, 5+]` or `[1, 5+, N]` output tensor into raw boxes.
/// The first four channels are `cx, cy, w, h` in input-tensor pixels;
/// the fifth is an objectness/confidence score.
fn decode_detections(outputs: &SessionOutputs, threshold: f32) -> Result<Vec<RawDetection>> {
    let (_, output) = outputs
        .iter()
        .next()
        .ok_or_else(|| DetectionError::detection("model produced no outputs"))?;
    let tensor = output
        .try_extract_tensor::<f32>()
        .map_err(|e| DetectionError::detection(format!("unexpected output tensor: {e}")))?;

    let shape = tensor.shape().to_vec();
    let transposed = shape.len() == 3 && shape[1] < shape[2];
    let view = tensor.view().to_owned();

    let mut detections = Vec::new();
    if transposed {
        let channels = shape[1];
        let count = shape[2];
        if channels < 5 {
            return Err(DetectionError::detection("output has too few channels"));
        }
        for i in 0..count {
            let conf = view[[0, 4, i]];
            if conf < threshold {
                continue;
            }
            detections.push(RawDetection {
                cx: view[[0, 0, i]],
                cy: view[[0, 1, i]],
                w: view[[0, 2, i]],
                h: view[[0, 3, i]],
                confidence: conf,
            });
        }
    } else {
        let count = shape[1];
        let channels = shape[2];
        if channels < 5 {
            return Err(DetectionError::detection("output has too few channels"));
        }
        for i in 0..count {
            let conf = view[[0, i, 4]];
            if conf < threshold {
                continue;
            }
            detections.push(RawDetection {
                cx: view[[0, i, 0]],
                cy: view[[0, i, 1]],
                w: view[[0, i, 2]],
                h: view[[0, i, 3]],
                confidence: conf,
            });
        }
    }
    Ok(detections)
}

fn iou(a: &RawDetection, b: &RawDetection) -> f32 {
    let (ax1, ay1, ax2, ay2) = (a.cx - a.w / 2.0, a.cy - a.h / 2.0, a.cx + a.w / 2.0, a.cy + a.h / 2.0);
    let (bx1, by1, bx2, by2) = (b.cx - b.w / 2.0, b.cy - b.h / 2.0, b.cx + b.w / 2.0, b.cy + b.h / 2.0);

    let ix1 = ax1.max(bx1);
    let iy1 = ay1.max(by1);
    let ix2 = ax2.min(bx2);
    let iy2 = ay2.min(by2);

    let iw = (ix2 - ix1).max(0.0);
    let ih = (iy2 - iy1).max(0.0);
    let inter = iw * ih;
    let union = a.w * a.h + b.w * b.h - inter;
    if union <= 0.0 {
        0.0
    } else {
        inter / union
    }
}

fn non_maximum_suppression(mut detections: Vec<RawDetection>, iou_threshold: f32) -> Vec<RawDetection> {
    detections.sort_by(|a, b| b.confidence.partial_cmp(&a.confidence).unwrap_or(std::cmp::Ordering::Equal));
    let mut kept: Vec<RawDetection> = Vec::new();
    for d in detections {
        if kept.iter().all(|k| iou(k, &d) < iou_threshold) {
            kept.push(d);
        }
    }
    kept
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nms_drops_overlapping_lower_confidence_box() {
        let boxes = vec![
            RawDetection { cx: 50.0, cy: 50.0, w: 40.0, h: 40.0, confidence: 0.9 },
            RawDetection { cx: 52.0, cy: 52.0, w: 40.0, h: 40.0, confidence: 0.6 },
            RawDetection { cx: 300.0, cy: 300.0, w: 20.0, h: 20.0, confidence: 0.8 },
        ];
        let kept = non_maximum_suppression(boxes, 0.45);
        assert_eq!(kept.len(), 2);
        assert!((kept[0].confidence - 0.9).abs() < 1e-6);
    }

    #[test]
    fn to_bounding_box_clamps_to_original_dimensions() {
        let d = RawDetection { cx: 5.0, cy: 5.0, w: 20.0, h: 20.0, confidence: 0.9 };
        let bbox = d.to_bounding_box(1.0, 0.0, 0.0, 100, 100).unwrap();
        assert!(bbox.x1 >= 0 && bbox.y1 >= 0);
        assert!(bbox.x2 <= 100 && bbox.y2 <= 100);
    }
}

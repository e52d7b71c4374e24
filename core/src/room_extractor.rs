//! Component B: wall boxes + canvas size -> room polygons.
//!
//! This is the deterministic geometric heart of the system (§4.2). It
//! never touches the network, a model, or randomness; the same inputs
//! always produce the same room list, identifiers included.

use std::collections::HashMap;
use std::time::Instant;

use image::{GrayImage, Luma};
use imageproc::contours::{find_contours, BorderType, Contour};
use imageproc::distance_transform::Norm;
use imageproc::geometry::approximate_polygon_dp;
use imageproc::morphology::{dilate, erode};
use imageproc::point::Point as ImgPoint;
use imageproc::region_labelling::{connected_components, Connectivity};

use crate::config::ExtractorConfig;
use crate::error::{DetectionError, Result};
use crate::types::{confidence_from_vertex_count, BoundingBox, Canvas, Point, Room, ShapeType, Wall};

const WALL: u8 = 255;
const OPEN: u8 = 255;

/// Paint every wall's interior onto a blank canvas-sized binary buffer.
/// Clipping is half-open in both axes, matching the box convention
/// `0 <= x1 < x2`: a wall with `x2 == x1 + 1` paints exactly one column.
fn rasterize_walls(canvas: Canvas, walls: &[Wall]) -> GrayImage {
    let mut img = GrayImage::new(canvas.width, canvas.height);
    for wall in walls {
        let bbox = wall.bounding_box;
        let x1 = bbox.x1.max(0) as i64;
        let y1 = bbox.y1.max(0) as i64;
        let x2 = bbox.x2.min(canvas.width as i64);
        let y2 = bbox.y2.min(canvas.height as i64);
        if x1 >= x2 || y1 >= y2 {
            continue; // wholly outside the canvas, or degenerate after clipping
        }
        for y in y1..y2 {
            for x in x1..x2 {
                img.put_pixel(x as u32, y as u32, Luma([WALL]));
            }
        }
    }
    img
}

/// Morphological closing: dilate then erode, same kernel both passes.
fn close(img: &GrayImage, radius: u8) -> GrayImage {
    erode(&dilate(img, Norm::LInf, radius), Norm::LInf, radius)
}

/// Morphological opening: erode then dilate, same kernel both passes.
fn open(img: &GrayImage, radius: u8) -> GrayImage {
    dilate(&erode(img, Norm::LInf, radius), Norm::LInf, radius)
}

/// `kernel_size` is the side of the square structuring element (odd,
/// `k >= 1`); imageproc's L-infinity ball of radius `r` is a square of
/// side `2r + 1`, so `r = (k - 1) / 2`.
fn kernel_radius(kernel_size: u32) -> u8 {
    (((kernel_size.saturating_sub(1)) / 2) as u8).max(0)
}

struct LabelStats {
    count: u64,
    min_x: u32,
    min_y: u32,
    max_x: u32,
    max_y: u32,
    sum_x: u64,
    sum_y: u64,
}

impl LabelStats {
    fn new(x: u32, y: u32) -> Self {
        Self {
            count: 1,
            min_x: x,
            min_y: y,
            max_x: x,
            max_y: y,
            sum_x: x as u64,
            sum_y: y as u64,
        }
    }

    fn absorb(&mut self, x: u32, y: u32) {
        self.count += 1;
        self.min_x = self.min_x.min(x);
        self.min_y = self.min_y.min(y);
        self.max_x = self.max_x.max(x);
        self.max_y = self.max_y.max(y);
        self.sum_x += x as u64;
        self.sum_y += y as u64;
    }

    fn centroid(&self) -> Point {
        Point {
            x: ((self.sum_x as f64 / self.count as f64).round()) as i64,
            y: ((self.sum_y as f64 / self.count as f64).round()) as i64,
        }
    }

    fn bounding_box(&self) -> BoundingBox {
        BoundingBox::new(
            self.min_x as i64,
            self.min_y as i64,
            self.max_x as i64 + 1,
            self.max_y as i64 + 1,
        )
    }
}

/// Walk the label image row-major and accumulate per-label statistics,
/// recording the order in which labels are first encountered. Row-major
/// top-to-bottom, left-to-right traversal is exactly the tie-break rule
/// §4.2 requires for deterministic room identifier assignment.
fn label_stats_in_encounter_order(
    labels: &image::ImageBuffer<Luma<u32>, Vec<u32>>,
) -> (Vec<u32>, HashMap<u32, LabelStats>) {
    let mut order = Vec::new();
    let mut stats: HashMap<u32, LabelStats> = HashMap::new();

    for y in 0..labels.height() {
        for x in 0..labels.width() {
            let label = labels.get_pixel(x, y)[0];
            if label == 0 {
                continue; // background of the labeling operation
            }
            stats
                .entry(label)
                .and_modify(|s| s.absorb(x, y))
                .or_insert_with(|| {
                    order.push(label);
                    LabelStats::new(x, y)
                });
        }
    }

    (order, stats)
}

/// Crop a single label's pixels into their own binary image (with a
/// 1px margin so the contour tracer sees a fully enclosed boundary),
/// returning the image and the (x, y) offset needed to translate
/// contour points back into canvas coordinates.
fn crop_label_mask(
    labels: &image::ImageBuffer<Luma<u32>, Vec<u32>>,
    label: u32,
    bbox: BoundingBox,
) -> (GrayImage, i64, i64) {
    let ox = bbox.x1 - 1;
    let oy = bbox.y1 - 1;
    let w = (bbox.width() + 2) as u32;
    let h = (bbox.height() + 2) as u32;

    let mut crop = GrayImage::new(w, h);
    for y in bbox.y1..bbox.y2 {
        for x in bbox.x1..bbox.x2 {
            if labels.get_pixel(x as u32, y as u32)[0] == label {
                crop.put_pixel((x - ox) as u32, (y - oy) as u32, Luma([OPEN]));
            }
        }
    }
    (crop, ox, oy)
}

fn polygon_area(points: &[ImgPoint<i32>]) -> f64 {
    if points.len() < 3 {
        return 0.0;
    }
    let mut acc = 0i64;
    for i in 0..points.len() {
        let a = points[i];
        let b = points[(i + 1) % points.len()];
        acc += a.x as i64 * b.y as i64 - b.x as i64 * a.y as i64;
    }
    (acc.abs() as f64) / 2.0
}

fn polygon_perimeter(points: &[ImgPoint<i32>]) -> f64 {
    if points.len() < 2 {
        return 0.0;
    }
    let mut total = 0.0;
    for i in 0..points.len() {
        let a = points[i];
        let b = points[(i + 1) % points.len()];
        let dx = (a.x - b.x) as f64;
        let dy = (a.y - b.y) as f64;
        total += (dx * dx + dy * dy).sqrt();
    }
    total
}

/// Pick the outer contour with the greatest enclosed area; §4.2 step 7
/// keeps only one contour per component when extraction yields several.
fn largest_outer_contour(contours: Vec<Contour<i32>>) -> Option<Contour<i32>> {
    contours
        .into_iter()
        .filter(|c| c.border_type == BorderType::Outer)
        .max_by(|a, b| {
            polygon_area(&a.points)
                .partial_cmp(&polygon_area(&b.points))
                .unwrap_or(std::cmp::Ordering::Equal)
        })
}

/// Extract, simplify, classify and score the rooms for one canvas and
/// wall list. Returns the rooms (possibly empty) and the elapsed time.
pub fn extract_rooms(
    walls: &[Wall],
    canvas: Canvas,
    config: &ExtractorConfig,
) -> Result<(Vec<Room>, f64)> {
    config.validate()?;
    let start = Instant::now();

    let wall_mask = rasterize_walls(canvas, walls);
    tracing::debug!(walls = walls.len(), "rasterized walls");

    let radius = kernel_radius(config.kernel_size);
    let wall_closed = close(&wall_mask, radius);

    let mut interior = wall_closed.clone();
    image::imageops::invert(&mut interior);
    let interior_clean = open(&interior, radius);
    tracing::debug!(kernel_size = config.kernel_size, "morphology complete");

    let labels = connected_components(&interior_clean, Connectivity::Eight, Luma([0u8]));
    let (order, stats) = label_stats_in_encounter_order(&labels);
    tracing::debug!(components = order.len(), "labeled connected components");

    let canvas_area = canvas.area();
    let max_area = (canvas_area as f64 * 0.9) as u64;

    let mut rooms = Vec::new();
    for label in order {
        let s = &stats[&label];
        let area = s.count;
        if area < config.min_room_area || area > max_area {
            continue;
        }

        let bbox = s.bounding_box();
        let (crop, ox, oy) = crop_label_mask(&labels, label, bbox);

        let contours = find_contours::<i32>(&crop);
        let Some(contour) = largest_outer_contour(contours) else {
            continue; // degenerate component, skip silently
        };
        if contour.points.len() < 3 {
            continue;
        }

        let perimeter = polygon_perimeter(&contour.points);
        let epsilon = (config.epsilon_factor * perimeter).max(0.0);
        let simplified = approximate_polygon_dp(&contour.points, epsilon, true);
        if simplified.len() < 3 {
            continue;
        }

        let polygon: Vec<Point> = simplified
            .iter()
            .map(|p| Point {
                x: p.x as i64 + ox,
                y: p.y as i64 + oy,
            })
            .collect();

        let num_vertices = polygon.len();
        let shape_type = ShapeType::from_vertex_count(num_vertices);
        let confidence = confidence_from_vertex_count(num_vertices);

        rooms.push(Room {
            id: Room::room_id(rooms.len()),
            polygon,
            bounding_box: bbox,
            area_pixels: area,
            centroid: s.centroid(),
            confidence,
            shape_type,
            num_vertices,
        });
    }

    let elapsed = start.elapsed().as_secs_f64() * 1000.0;
    tracing::debug!(rooms = rooms.len(), elapsed_ms = elapsed, "extraction complete");
    Ok((rooms, elapsed))
}

/// Raised when the extractor hits an internal state it cannot recover
/// from (§4.2 "Failure semantics"). Geometric failures inside a single
/// component are swallowed per-component; this is reserved for
/// programming errors surfaced from lower layers.
pub fn internal_error(msg: impl Into<String>) -> DetectionError {
    DetectionError::detection(msg.into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::BoundingBox;

    fn wall(x1: i64, y1: i64, x2: i64, y2: i64) -> Wall {
        Wall::new("w", BoundingBox::new(x1, y1, x2, y2), 1.0)
    }

    fn frame(w: i64, h: i64, t: i64) -> Vec<Wall> {
        vec![
            wall(0, 0, w, t),
            wall(0, h - t, w, h),
            wall(0, 0, t, h),
            wall(w - t, 0, w, h),
        ]
    }

    #[test]
    fn empty_walls_on_valid_canvas_yield_zero_rooms() {
        let canvas = Canvas::new(200, 200).unwrap();
        let (rooms, _) = extract_rooms(&[], canvas, &ExtractorConfig::default()).unwrap();
        assert!(rooms.is_empty());
    }

    #[test]
    fn single_rectangular_room_scenario() {
        let canvas = Canvas::new(200, 200).unwrap();
        let walls = frame(200, 200, 5);
        let (rooms, _) = extract_rooms(&walls, canvas, &ExtractorConfig::default()).unwrap();

        assert_eq!(rooms.len(), 1);
        let room = &rooms[0];
        assert_eq!(room.id, "room_001");
        assert_eq!(room.shape_type, ShapeType::Rectangle);
        assert_eq!(room.num_vertices, 4);
        assert!((room.confidence - 0.95).abs() < 1e-9);
        assert!(room.area_pixels >= 37000 && room.area_pixels <= 38025);
        assert!((room.centroid.x - 100).abs() <= 2);
        assert!((room.centroid.y - 100).abs() <= 2);
    }

    #[test]
    fn two_adjacent_rooms_scenario() {
        let canvas = Canvas::new(200, 200).unwrap();
        let mut walls = frame(200, 200, 5);
        walls.push(wall(97, 5, 103, 195));
        let (rooms, _) = extract_rooms(&walls, canvas, &ExtractorConfig::default()).unwrap();

        assert_eq!(rooms.len(), 2);
        for room in &rooms {
            assert_eq!(room.shape_type, ShapeType::Rectangle);
            assert_eq!(room.num_vertices, 4);
            assert!(room.area_pixels >= 15000 && room.area_pixels <= 19000);
        }
        assert!(rooms[0].centroid.x < 100);
        assert!(rooms[1].centroid.x > 100);
    }

    #[test]
    fn missing_wall_segment_merges_rooms() {
        let canvas = Canvas::new(200, 200).unwrap();
        let mut walls = frame(200, 200, 5);
        walls.push(wall(97, 5, 103, 100)); // half-height divider: doesn't close
        let (rooms, _) = extract_rooms(&walls, canvas, &ExtractorConfig::default()).unwrap();

        assert_eq!(rooms.len(), 1, "a non-closing divider must not split the room");
    }

    #[test]
    fn noise_only_walls_yield_zero_rooms() {
        let canvas = Canvas::new(500, 500).unwrap();
        let mut walls = Vec::new();
        for i in 0..100 {
            let x = 10 + (i % 40) * 10;
            let y = 10 + (i / 40) * 10;
            walls.push(wall(x as i64, y as i64, x as i64 + 2, y as i64 + 2));
        }
        let (rooms, _) = extract_rooms(&walls, canvas, &ExtractorConfig::default()).unwrap();
        assert!(rooms.is_empty());
    }

    #[test]
    fn wall_outside_canvas_is_dropped_silently() {
        let canvas = Canvas::new(200, 200).unwrap();
        let mut walls = frame(200, 200, 5);
        walls.push(wall(300, 300, 350, 350));
        let (rooms, _) = extract_rooms(&walls, canvas, &ExtractorConfig::default()).unwrap();
        assert_eq!(rooms.len(), 1);
    }

    #[test]
    fn single_pixel_line_wall_rasterizes_to_one_column() {
        let canvas = Canvas::new(100, 100).unwrap();
        let mask = rasterize_walls(canvas, &[wall(10, 10, 11, 20)]);
        assert_eq!(mask.get_pixel(10, 15)[0], WALL);
        assert_eq!(mask.get_pixel(11, 15)[0], 0);
        assert_eq!(mask.get_pixel(9, 15)[0], 0);
    }

    #[test]
    fn every_room_bbox_contains_its_polygon() {
        let canvas = Canvas::new(200, 200).unwrap();
        let mut walls = frame(200, 200, 5);
        walls.push(wall(97, 5, 103, 195));
        let (rooms, _) = extract_rooms(&walls, canvas, &ExtractorConfig::default()).unwrap();
        for room in &rooms {
            for p in &room.polygon {
                assert!(room.bounding_box.contains_point(p.x, p.y));
            }
            assert!(room.bounding_box.contains_point(room.centroid.x, room.centroid.y));
        }
    }

    #[test]
    fn deterministic_across_repeated_calls() {
        let canvas = Canvas::new(200, 200).unwrap();
        let mut walls = frame(200, 200, 5);
        walls.push(wall(97, 5, 103, 195));
        let (a, _) = extract_rooms(&walls, canvas, &ExtractorConfig::default()).unwrap();
        let (b, _) = extract_rooms(&walls, canvas, &ExtractorConfig::default()).unwrap();
        assert_eq!(a.len(), b.len());
        for (ra, rb) in a.iter().zip(b.iter()) {
            assert_eq!(ra.id, rb.id);
            assert_eq!(ra.polygon.len(), rb.polygon.len());
            assert_eq!(ra.area_pixels, rb.area_pixels);
        }
    }

    #[test]
    fn invalid_config_is_rejected() {
        let canvas = Canvas::new(200, 200).unwrap();
        let mut cfg = ExtractorConfig::default();
        cfg.kernel_size = 4; // even, invalid
        assert!(extract_rooms(&[], canvas, &cfg).is_err());
    }
}

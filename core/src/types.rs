use serde::{Deserialize, Serialize};

use crate::error::{DetectionError, Result};

/// An axis-aligned integer bounding box, `[x1, y1, x2, y2]` with
/// `x1 < x2` and `y1 < y2`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x1: i64,
    pub y1: i64,
    pub x2: i64,
    pub y2: i64,
}

impl BoundingBox {
    pub fn new(x1: i64, y1: i64, x2: i64, y2: i64) -> Self {
        Self { x1, y1, x2, y2 }
    }

    pub fn width(&self) -> i64 {
        self.x2 - self.x1
    }

    pub fn height(&self) -> i64 {
        self.y2 - self.y1
    }

    pub fn contains_point(&self, x: i64, y: i64) -> bool {
        x >= self.x1 && x <= self.x2 && y >= self.y1 && y <= self.y2
    }
}

/// An integer pixel point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Point {
    pub x: i64,
    pub y: i64,
}

/// A wall box detected upstream (component A) or supplied directly by
/// a caller of the extractor (component B).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Wall {
    pub id: String,
    pub bounding_box: BoundingBox,
    pub confidence: f64,
}

impl Wall {
    pub fn new(id: impl Into<String>, bounding_box: BoundingBox, confidence: f64) -> Self {
        Self {
            id: id.into(),
            bounding_box,
            confidence,
        }
    }
}

/// The pixel coordinate space shared by walls and rooms within one
/// invocation of the extractor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Canvas {
    pub width: u32,
    pub height: u32,
}

impl Canvas {
    pub const MIN_SIDE: u32 = 100;
    pub const MAX_SIDE: u32 = 4096;

    pub fn new(width: u32, height: u32) -> Result<Self> {
        if width < Self::MIN_SIDE || height < Self::MIN_SIDE {
            return Err(DetectionError::validation(format!(
                "canvas {width}x{height} is smaller than the minimum side of {}",
                Self::MIN_SIDE
            )));
        }
        if width > Self::MAX_SIDE || height > Self::MAX_SIDE {
            return Err(DetectionError::validation(format!(
                "canvas {width}x{height} exceeds the maximum side of {}",
                Self::MAX_SIDE
            )));
        }
        Ok(Self { width, height })
    }

    pub fn area(&self) -> u64 {
        self.width as u64 * self.height as u64
    }
}

/// Shape classification derived purely from vertex count (§3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShapeType {
    Rectangle,
    LShape,
    Complex,
}

impl ShapeType {
    /// `rectangle` iff 4 vertices; `l_shape` iff 5-8; `complex` otherwise.
    pub fn from_vertex_count(n: usize) -> Self {
        match n {
            4 => ShapeType::Rectangle,
            5..=8 => ShapeType::LShape,
            _ => ShapeType::Complex,
        }
    }
}

/// Confidence assigned by vertex count, per the definitive table in §4.2.
pub fn confidence_from_vertex_count(n: usize) -> f64 {
    match n {
        4 => 0.95,
        5 | 6 => 0.85,
        7 | 8 => 0.75,
        _ => 0.65,
    }
}

/// A room record: the shape produced by both the v1 (A+B) and v2 (C)
/// pipelines (§4.3), and the unit the rest of the system operates on.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Room {
    pub id: String,
    pub polygon: Vec<Point>,
    pub bounding_box: BoundingBox,
    pub area_pixels: u64,
    pub centroid: Point,
    pub confidence: f64,
    pub shape_type: ShapeType,
    pub num_vertices: usize,
}

impl Room {
    pub fn room_id(index: usize) -> String {
        format!("room_{:03}", index + 1)
    }
}
